//! Runs one AI-vs-AI match to completion or a tick limit.
//!
//! Every seat, including the first, is driven by the heuristic planner.
//! With a remote latency set, the opponents' decisions instead go through
//! the external decision bridge to a [`RemoteProvider`] on a tokio runtime,
//! and the simulation waits for outstanding answers between ticks.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use skirmish_core::ai::ExternalDecisionBridge;
use skirmish_core::config::{Difficulty, Personality, SimConfig};
use skirmish_core::events::{GameEvent, TracingSink};
use skirmish_core::map_generation::{new_game, MatchSetup, Opponent};
use skirmish_core::player::{Controller, PlayerId};
use skirmish_core::rules::Rules;
use skirmish_core::simulation::Simulation;
use skirmish_core::state::GameStatus;

use crate::error::{HeadlessError, Result};
use crate::remote::{RemoteConfig, RemoteProvider, DEFAULT_TIMEOUT_MS};
use crate::report::MatchReport;

/// Default tick limit: 30 minutes of game time at 100 ms per tick.
pub const DEFAULT_MAX_TICKS: u64 = 18_000;

/// What to play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    /// Map seed.
    pub seed: u64,
    /// Stop after this many ticks if nobody has won.
    pub max_ticks: u64,
    /// Number of opponents besides the first seat (1-3).
    pub opponents: usize,
    /// Play style of every seat.
    pub personality: Personality,
    /// Difficulty of every seat.
    pub difficulty: Difficulty,
    /// Route opponents through the simulated remote provider with this
    /// latency.
    pub remote_latency_ms: Option<u64>,
    /// Deadline for remote answers.
    pub remote_timeout_ms: u64,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            seed: 12345,
            max_ticks: DEFAULT_MAX_TICKS,
            opponents: 1,
            personality: Personality::Balanced,
            difficulty: Difficulty::Normal,
            remote_latency_ms: None,
            remote_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl MatchSettings {
    /// Same settings with another seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject settings that cannot produce a match.
    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.opponents) {
            return Err(HeadlessError::InvalidSettings(format!(
                "opponents must be 1-3, got {}",
                self.opponents
            )));
        }
        if self.max_ticks == 0 {
            return Err(HeadlessError::InvalidSettings("ticks must be positive".to_string()));
        }
        Ok(())
    }

    /// The roster for [`new_game`]: the first seat is AI-driven too.
    #[must_use]
    pub fn setup(&self) -> MatchSetup {
        let seat = Opponent {
            personality: self.personality,
            difficulty: self.difficulty,
        };
        MatchSetup {
            seed: self.seed,
            human: Controller::Ai {
                personality: seat.personality,
                difficulty: seat.difficulty,
            },
            opponents: vec![seat; self.opponents],
        }
    }
}

/// Plays matches with a fixed config and rules catalog.
#[derive(Debug, Clone)]
pub struct MatchRunner {
    config: SimConfig,
    rules: Rules,
}

impl Default for MatchRunner {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl MatchRunner {
    /// Runner with the stock catalog.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            rules: Rules::stock(),
        }
    }

    /// Use another rules catalog.
    #[must_use]
    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    /// The simulation config in use.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Play one match and report on it.
    pub fn run(&self, settings: &MatchSettings) -> Result<MatchReport> {
        settings.validate()?;
        let state = new_game(self.config.clone(), self.rules.clone(), &settings.setup())?;
        info!(
            seed = settings.seed,
            opponents = settings.opponents,
            personality = ?settings.personality,
            difficulty = ?settings.difficulty,
            remote = settings.remote_latency_ms.is_some(),
            "match starting"
        );

        let counts: Arc<Mutex<BTreeMap<String, usize>>> = Arc::default();
        let sink_counts = Arc::clone(&counts);
        let mut sim = Simulation::new(state);
        sim.add_sink(TracingSink);
        sim.add_sink(move |_tick: u64, event: &GameEvent| {
            if let Ok(mut counts) = sink_counts.lock() {
                *counts.entry(event.name().to_string()).or_default() += 1;
            }
        });

        let status = match settings.remote_latency_ms {
            None => sim.run(settings.max_ticks),
            Some(latency_ms) => run_remote(&mut sim, settings, latency_ms)?,
        };

        let events = counts.lock().map(|c| c.clone()).unwrap_or_default();
        let report = MatchReport::from_state(settings, sim.state(), events);
        info!(
            seed = settings.seed,
            ?status,
            winner = ?report.winner,
            ticks = report.ticks,
            "match finished"
        );
        Ok(report)
    }
}

fn run_remote(sim: &mut Simulation, settings: &MatchSettings, latency_ms: u64) -> Result<GameStatus> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()?;

    let first_seat = sim.state().human();
    let remote: Vec<PlayerId> = sim.state().players().keys().copied().filter(|id| *id != first_seat).collect();
    let mut remote_config = RemoteConfig::new(latency_ms).with_timeout(settings.remote_timeout_ms);
    for id in &remote {
        remote_config = remote_config.with_personality(*id, settings.personality);
    }
    let max_wait = remote_config.max_wait();

    runtime.block_on(async {
        let (bridge, endpoint) = ExternalDecisionBridge::channel();
        let provider = RemoteProvider::spawn(endpoint, remote_config);
        sim.connect_remote(bridge, remote);

        for _ in 0..settings.max_ticks {
            if sim.state().status().is_over() {
                break;
            }
            sim.tick();
            if sim.awaiting_remote() && tokio::time::timeout(max_wait, provider.arrival()).await.is_err() {
                warn!(tick = sim.state().tick(), "no remote answer within the deadline");
            }
        }
        debug!("stopping remote provider");
        provider.shutdown();
    });
    Ok(sim.state().status())
}
