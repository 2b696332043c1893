//! Many matches in parallel for balance checks.
//!
//! Seeds run from `seed_start` upward, one match per seed, spread over a
//! rayon pool. Results come back in seed order regardless of which worker
//! finished first.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::report::MatchReport;
use crate::runner::{MatchRunner, MatchSettings};

/// A batch of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Settings shared by every match; the seed is replaced per match.
    pub settings: MatchSettings,
    /// Number of matches.
    pub count: u32,
    /// Worker threads (0 = rayon default).
    pub parallel: usize,
}

/// A match that failed to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    /// Seed of the failed match.
    pub seed: u64,
    /// What went wrong.
    pub message: String,
}

/// Aggregate numbers over a batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Matches that ran.
    pub games: usize,
    /// Matches that failed to run.
    pub failures: usize,
    /// Final status counts, keyed by status name.
    pub statuses: BTreeMap<String, usize>,
    /// Wins per player id. Matches without a sole survivor are not counted.
    pub wins: BTreeMap<String, usize>,
    /// Mean match length in ticks.
    pub mean_ticks: f64,
}

impl BatchSummary {
    fn from_reports(reports: &[MatchReport], failures: usize) -> Self {
        let mut summary = Self {
            games: reports.len(),
            failures,
            ..Self::default()
        };
        for report in reports {
            *summary.statuses.entry(format!("{:?}", report.status)).or_default() += 1;
            if let Some(winner) = report.winner {
                *summary.wins.entry(winner.to_string()).or_default() += 1;
            }
        }
        if !reports.is_empty() {
            let total: u64 = reports.iter().map(|r| r.ticks).sum();
            summary.mean_ticks = total as f64 / reports.len() as f64;
        }
        summary
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Aggregates.
    pub summary: BatchSummary,
    /// Per-match reports in seed order.
    pub matches: Vec<MatchReport>,
    /// Matches that could not run.
    pub errors: Vec<BatchError>,
}

/// Run every match in the batch.
pub fn run_batch(runner: &MatchRunner, config: &BatchConfig) -> BatchReport {
    let seeds: Vec<u64> = (0..u64::from(config.count)).map(|i| config.settings.seed + i).collect();
    info!(count = config.count, first_seed = config.settings.seed, parallel = config.parallel, "batch starting");

    let play = |seed: u64| {
        let settings = config.settings.clone().with_seed(seed);
        runner.run(&settings).map_err(|e| BatchError {
            seed,
            message: e.to_string(),
        })
    };
    let outcomes: Vec<Result<MatchReport, BatchError>> = if config.parallel == 0 {
        seeds.par_iter().map(|&seed| play(seed)).collect()
    } else {
        match rayon::ThreadPoolBuilder::new().num_threads(config.parallel).build() {
            Ok(pool) => pool.install(|| seeds.par_iter().map(|&seed| play(seed)).collect()),
            Err(e) => {
                warn!(error = %e, "could not build a dedicated pool, using the global one");
                seeds.par_iter().map(|&seed| play(seed)).collect()
            }
        }
    };

    let mut matches = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(report) => matches.push(report),
            Err(error) => {
                warn!(seed = error.seed, message = %error.message, "match failed");
                errors.push(error);
            }
        }
    }
    let summary = BatchSummary::from_reports(&matches, errors.len());
    info!(games = summary.games, failures = summary.failures, "batch finished");
    BatchReport {
        summary,
        matches,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_is_seed_ordered_and_reproducible() {
        let config = BatchConfig {
            settings: MatchSettings {
                max_ticks: 100,
                ..Default::default()
            },
            count: 3,
            parallel: 2,
        };
        let runner = MatchRunner::default();
        let first = run_batch(&runner, &config);
        let second = run_batch(&runner, &config);
        let seeds: Vec<u64> = first.matches.iter().map(|m| m.settings.seed).collect();
        assert_eq!(seeds, vec![12345, 12346, 12347]);
        let hashes = |b: &BatchReport| b.matches.iter().map(|m| m.state_hash).collect::<Vec<_>>();
        assert_eq!(hashes(&first), hashes(&second));
        assert_eq!(first.summary.games, 3);
        assert_eq!(first.summary.statuses.get("Playing"), Some(&3));
        assert!((first.summary.mean_ticks - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failures_are_collected() {
        let config = BatchConfig {
            settings: MatchSettings {
                opponents: 9,
                ..Default::default()
            },
            count: 2,
            parallel: 0,
        };
        let report = run_batch(&MatchRunner::default(), &config);
        assert!(report.matches.is_empty());
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.summary.failures, 2);
    }
}
