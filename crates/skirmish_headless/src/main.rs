//! Headless skirmish runner.
//!
//! Runs AI-vs-AI matches without graphics and prints a JSON report.
//!
//! # Usage
//!
//! ```bash
//! # One match, printed as a report
//! cargo run -p skirmish_headless -- run --seed 42 --ticks 6000
//!
//! # Opponents answered by a simulated remote service
//! cargo run -p skirmish_headless -- run --remote-latency-ms 50
//!
//! # Balance batch across consecutive seeds
//! cargo run -p skirmish_headless -- batch --count 100 --parallel 8
//! ```
//!
//! Logs go to stderr; stdout carries only the JSON.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_core::config::{Difficulty, Personality, SimConfig};
use skirmish_headless::{run_batch, BatchConfig, MatchRunner, MatchSettings, Result};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless skirmish runner for AI testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Simulation config in RON (defaults to the stock settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one match and print its report
    Run(MatchArgs),

    /// Play matches on consecutive seeds and print the batch report
    Batch {
        #[command(flatten)]
        game: MatchArgs,

        /// Number of matches
        #[arg(short, long, default_value = "10")]
        count: u32,

        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value = "0")]
        parallel: usize,
    },
}

#[derive(Args)]
struct MatchArgs {
    /// Map seed (first seed for a batch)
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Tick limit
    #[arg(long, default_value = "18000")]
    ticks: u64,

    /// Opponents besides the first seat
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=3))]
    opponents: u8,

    /// Play style of every seat
    #[arg(long, value_enum, default_value = "balanced")]
    personality: PersonalityArg,

    /// Difficulty of every seat
    #[arg(long, value_enum, default_value = "normal")]
    difficulty: DifficultyArg,

    /// Send opponent decisions through a simulated remote service with this latency
    #[arg(long)]
    remote_latency_ms: Option<u64>,

    /// Deadline for remote answers
    #[arg(long, default_value = "2000")]
    remote_timeout_ms: u64,
}

impl MatchArgs {
    fn settings(&self) -> MatchSettings {
        MatchSettings {
            seed: self.seed,
            max_ticks: self.ticks,
            opponents: usize::from(self.opponents),
            personality: self.personality.into(),
            difficulty: self.difficulty.into(),
            remote_latency_ms: self.remote_latency_ms,
            remote_timeout_ms: self.remote_timeout_ms,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PersonalityArg {
    Balanced,
    Aggressive,
    Economic,
}

impl From<PersonalityArg> for Personality {
    fn from(arg: PersonalityArg) -> Self {
        match arg {
            PersonalityArg::Balanced => Self::Balanced,
            PersonalityArg::Aggressive => Self::Aggressive,
            PersonalityArg::Economic => Self::Economic,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Easy,
    Normal,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Self::Easy,
            DifficultyArg::Normal => Self::Normal,
            DifficultyArg::Hard => Self::Hard,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs to stderr (stdout is for the report). RUST_LOG wins over --verbose.
    let fallback = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match execute(&cli) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "headless run failed");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<String> {
    let runner = MatchRunner::new(load_config(cli.config.as_deref())?);
    match &cli.command {
        Commands::Run(game) => runner.run(&game.settings())?.to_json(),
        Commands::Batch { game, count, parallel } => {
            let config = BatchConfig {
                settings: game.settings(),
                count: *count,
                parallel: *parallel,
            };
            let report = run_batch(&runner, &config);
            Ok(serde_json::to_string_pretty(&report)?)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    let Some(path) = path else {
        return Ok(SimConfig::default());
    };
    tracing::info!(path = %path.display(), "loading config");
    let source = std::fs::read_to_string(path)?;
    Ok(SimConfig::from_ron_str(&source)?)
}
