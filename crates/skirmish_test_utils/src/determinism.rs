//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Sources of non-determinism
//!
//! - **Floating-point math**: the tick path uses
//!   [`skirmish_core::math::Fixed`] throughout.
//! - **Hash map iteration order**: entity, player and patch collections are
//!   ordered maps, iterated by ascending id.
//! - **System randomness and wall clocks**: map generation is seeded and
//!   game time is `tick * tick_ms`.
//!
//! # Test levels
//!
//! 1. **Unit tests**: individual subsystems
//! 2. **Property tests**: random inputs still produce reproducible outputs
//! 3. **Integration tests**: whole matches are reproducible
//! 4. **Parallel tests**: N matches on N threads all agree

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use skirmish_core::simulation::{advance, Simulation};
use skirmish_core::state::GameState;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// All unique hashes (one for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                self.unique_hashes().len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Example
///
/// ```ignore
/// let result = verify_determinism(
///     3,
///     100,
///     || fixtures::skirmish_state(),
///     |state| *state = advance(state).state,
///     GameState::state_hash,
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);
    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run [`advance`] from the same starting snapshot twice and compare.
pub fn verify_advance_determinism<F>(setup_fn: F, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> GameState,
{
    verify_determinism(
        2,
        num_ticks,
        setup_fn,
        |state| *state = advance(state).state,
        GameState::state_hash,
    )
}

/// Run a [`Simulation`] setup twice and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        setup_fn,
        |sim| {
            sim.tick();
        },
        |sim| sim.state().state_hash(),
    )
    .is_deterministic
}

/// Run N matches on scoped threads and collect the final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> GameState + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut state = setup_fn();
                    for _ in 0..num_ticks {
                        state = advance(&state).state;
                    }
                    state.state_hash()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Step two runs side by side and report the first tick where their
/// hashes differ, or `None` if they never do.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> GameState,
{
    let mut a = setup_fn();
    let mut b = setup_fn();
    if a.state_hash() != b.state_hash() {
        return Some(0);
    }
    for tick in 1..=num_ticks {
        a = advance(&a).state;
        b = advance(&b).state;
        if a.state_hash() != b.state_hash() {
            tracing::warn!(tick, "runs diverged");
            return Some(tick);
        }
    }
    None
}

/// Compute a hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
