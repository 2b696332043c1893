//! Headless match runner for AI testing and CI verification.
//!
//! Plays skirmish matches without graphics, with every seat driven by the
//! heuristic planner, and reports the outcome as JSON:
//!
//! - **stdout**: the match or batch report
//! - **stderr**: logs, filtered through `RUST_LOG` or `--verbose`
//!
//! Opponents can be routed through the external decision bridge to a
//! simulated remote service (see [`remote`]) to exercise latency, timeouts
//! and stale answers end to end.
//!
//! # Example
//!
//! ```bash
//! cargo run -p skirmish_headless -- run --seed 7 --ticks 6000 --opponents 2
//! cargo run -p skirmish_headless -- run --remote-latency-ms 40
//! cargo run -p skirmish_headless -- batch --count 50 --ticks 12000
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod batch;
pub mod error;
pub mod remote;
pub mod report;
pub mod runner;

pub use batch::{run_batch, BatchConfig, BatchReport, BatchSummary};
pub use error::{HeadlessError, Result};
pub use remote::{RemoteConfig, RemoteProvider};
pub use report::{MatchReport, PlayerReport};
pub use runner::{MatchRunner, MatchSettings};
