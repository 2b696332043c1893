//! Tick orchestration.
//!
//! [`advance`] is the pure entry point: one snapshot in, the next snapshot
//! and the tick's events out, with every AI player driven by the built-in
//! [`HeuristicPlanner`]. [`Simulation`] wraps the same tick for a running
//! match with pluggable decision providers, an optional bridge to an
//! external provider, and event sinks.
//!
//! # Tick order
//!
//! 1. Construction
//! 2. Production
//! 3. Units (movement, gathering, repair, combat)
//! 4. Power, then superweapon charge
//! 5. Fog
//! 6. Effect pruning
//! 7. AI cooldowns
//! 8. Win/loss
//! 9. Tick counter
//! 10. One decision for every AI player whose cooldown elapsed
//!
//! Responses from an external provider are applied at the start of the
//! next tick, before step 1.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::ai::{
    apply_ai_action, AiAction, DecisionProvider, ExternalDecisionBridge, HeuristicPlanner, Observation,
    ProviderError,
};
use crate::commands::{apply_command_with_events, Command};
use crate::config::{Difficulty, Personality};
use crate::economy::update_power;
use crate::effects;
use crate::error::CommandError;
use crate::events::{EventSink, GameEvent};
use crate::fog::update_fog;
use crate::player::{Controller, PlayerId};
use crate::production::{update_construction, update_production};
use crate::state::{GameState, GameStatus};
use crate::superweapon::update_superweapons;
use crate::units::update_units;

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// The new snapshot.
    pub state: GameState,
    /// Everything that happened, in order.
    pub events: Vec<GameEvent>,
}

/// Advance a snapshot by one tick.
///
/// Outside [`GameStatus::Playing`] this returns an unchanged copy and no
/// events.
#[must_use]
pub fn advance(state: &GameState) -> TickOutcome {
    let mut events = Vec::new();
    if state.status() != GameStatus::Playing {
        return TickOutcome {
            state: state.clone(),
            events,
        };
    }

    let mut next = simulate(state, &mut events);
    for player in due_players(&next) {
        let Some(observation) = Observation::capture(&next, player) else {
            continue;
        };
        let planner = HeuristicPlanner::new(personality_of(&next, player));
        next = apply_decision(&next, player, Ok(planner.plan(&observation)), &mut events);
    }
    log_hash(&next);
    TickOutcome { state: next, events }
}

/// Steps 1 to 9 of the tick.
fn simulate(state: &GameState, events: &mut Vec<GameEvent>) -> GameState {
    let mut next = state.clone();
    update_construction(&mut next, events);
    update_production(&mut next, events);
    update_units(&mut next, events);
    update_power(&mut next);
    update_superweapons(&mut next, events);
    update_fog(&mut next);

    let now = next.now_ms();
    if next.effects().iter().any(|e| !e.is_alive(now)) {
        effects::prune(next.effects_mut(), now);
    }

    let tick_ms = i64::try_from(next.config().tick_ms).unwrap_or(i64::MAX);
    let ai: Vec<PlayerId> = next
        .players()
        .values()
        .filter(|p| p.controller.is_ai() && p.decision_cooldown_ms > 0)
        .map(|p| p.id)
        .collect();
    for id in ai {
        if let Some(player) = next.player_mut(id) {
            player.decision_cooldown_ms = (player.decision_cooldown_ms - tick_ms).max(0);
        }
    }

    if let Some(status) = outcome(&next) {
        next.set_status(status);
        events.push(GameEvent::GameOver { status });
        info!(tick = next.tick(), ?status, "game over");
    }
    next.advance_tick();
    next
}

/// Final status if the match just ended.
fn outcome(state: &GameState) -> Option<GameStatus> {
    let human = state.human();
    if state.player(human).is_some() && state.is_defeated(human) {
        return Some(GameStatus::AiWon);
    }
    let mut rivals = state.players().keys().filter(|id| **id != human).peekable();
    rivals.peek()?;
    rivals
        .all(|id| state.is_defeated(*id))
        .then_some(GameStatus::PlayerWon)
}

/// AI players allowed to act this tick, ascending.
fn due_players(state: &GameState) -> Vec<PlayerId> {
    if state.status() != GameStatus::Playing {
        return Vec::new();
    }
    state
        .players()
        .values()
        .filter(|p| p.controller.is_ai() && p.decision_cooldown_ms <= 0)
        .map(|p| p.id)
        .filter(|id| !state.is_defeated(*id))
        .collect()
}

fn personality_of(state: &GameState, player: PlayerId) -> Personality {
    match state.player(player).map(|p| p.controller) {
        Some(Controller::Ai { personality, .. }) => personality,
        _ => Personality::default(),
    }
}

fn decision_interval(state: &GameState, player: PlayerId) -> i64 {
    let difficulty = match state.player(player).map(|p| p.controller) {
        Some(Controller::Ai { difficulty, .. }) => difficulty,
        _ => Difficulty::default(),
    };
    let ms = state.config().difficulty.get(difficulty).decision_interval_ms;
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Apply one decision and restart the player's cooldown. A failed decision
/// becomes an idle turn with a doubled cooldown.
fn apply_decision(
    state: &GameState,
    player: PlayerId,
    result: Result<AiAction, ProviderError>,
    events: &mut Vec<GameEvent>,
) -> GameState {
    let interval = decision_interval(state, player);
    let result = result.and_then(|action| {
        if action.player == player {
            Ok(action)
        } else {
            Err(ProviderError::Malformed)
        }
    });

    let (mut next, cooldown) = match result {
        Ok(action) => (apply_ai_action(state, &action, events), interval),
        Err(error) => {
            warn!(player = %player, %error, "decision provider failed, idling");
            events.push(GameEvent::ProviderFailed { player, error });
            (state.clone(), interval.saturating_mul(2))
        }
    };
    if let Some(p) = next.player_mut(player) {
        p.decision_cooldown_ms = cooldown;
    }
    next
}

fn log_hash(state: &GameState) {
    debug!(tick = state.tick(), state_hash = state.state_hash(), "state hash");
}

/// A running match.
///
/// AI players use, in order of preference: the external bridge if they
/// were connected to it, a registered provider, or a heuristic planner
/// with their controller's personality.
pub struct Simulation {
    state: GameState,
    providers: BTreeMap<PlayerId, Box<dyn DecisionProvider>>,
    bridge: Option<ExternalDecisionBridge>,
    remote: BTreeSet<PlayerId>,
    sinks: Vec<Box<dyn EventSink + Send>>,
}

impl Simulation {
    /// Wrap a starting snapshot.
    #[must_use]
    pub fn new(state: GameState) -> Self {
        Self {
            state,
            providers: BTreeMap::new(),
            bridge: None,
            remote: BTreeSet::new(),
            sinks: Vec::new(),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Mutable snapshot, for scenario setup.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    /// Consume the match and return its final snapshot.
    #[must_use]
    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Drive `player` with a local provider.
    pub fn set_provider(&mut self, player: PlayerId, provider: impl DecisionProvider + 'static) {
        self.providers.insert(player, Box::new(provider));
    }

    /// Route the decisions of `players` through an external provider.
    pub fn connect_remote(&mut self, bridge: ExternalDecisionBridge, players: impl IntoIterator<Item = PlayerId>) {
        self.bridge = Some(bridge);
        self.remote = players.into_iter().collect();
    }

    /// Whether any remote decision is outstanding.
    #[must_use]
    pub fn awaiting_remote(&self) -> bool {
        self.bridge.as_ref().is_some_and(|b| b.in_flight_count() > 0)
    }

    /// Receive every event from now on.
    pub fn add_sink(&mut self, sink: impl EventSink + Send + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Apply a player command. A rejection leaves the snapshot untouched
    /// and is reported to the sinks as [`GameEvent::CommandRejected`].
    pub fn command(&mut self, player: PlayerId, command: &Command) -> Result<(), CommandError> {
        let mut events = Vec::new();
        match apply_command_with_events(&self.state, player, command, &mut events) {
            Ok(next) => {
                self.state = next;
                self.emit(&events);
                Ok(())
            }
            Err(reason) => {
                debug!(player = %player, ?command, %reason, "command rejected");
                self.emit(&[GameEvent::CommandRejected {
                    player,
                    reason: reason.clone(),
                }]);
                Err(reason)
            }
        }
    }

    /// Run one tick and return its events.
    pub fn tick(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        match self.state.status() {
            GameStatus::Playing => {}
            GameStatus::Paused => return events,
            GameStatus::PlayerWon | GameStatus::AiWon => {
                self.discard_responses();
                return events;
            }
        }

        let mut state = self.state.clone();
        if let Some(bridge) = self.bridge.as_mut() {
            for response in bridge.drain() {
                if state.is_defeated(response.player) {
                    warn!(player = %response.player, id = response.id, "discarding decision for defeated player");
                    continue;
                }
                state = apply_decision(&state, response.player, response.result, &mut events);
            }
        }

        let mut next = simulate(&state, &mut events);

        if let Some(bridge) = self.bridge.as_mut() {
            let over = next.status().is_over();
            for &player in &self.remote {
                if over || next.is_defeated(player) {
                    bridge.cancel(player);
                }
            }
        }

        for player in due_players(&next) {
            if let (true, Some(bridge)) = (self.remote.contains(&player), self.bridge.as_mut()) {
                if bridge.is_in_flight(player) {
                    continue;
                }
                let Some(observation) = Observation::capture(&next, player) else {
                    continue;
                };
                if let Err(error) = bridge.request(observation) {
                    next = apply_decision(&next, player, Err(error), &mut events);
                }
                continue;
            }

            let Some(observation) = Observation::capture(&next, player) else {
                continue;
            };
            let result = match self.providers.get_mut(&player) {
                Some(provider) => provider.decide(&observation),
                None => Ok(HeuristicPlanner::new(personality_of(&next, player)).plan(&observation)),
            };
            next = apply_decision(&next, player, result, &mut events);
        }

        log_hash(&next);
        self.state = next;
        self.emit(&events);
        events
    }

    /// Tick until the match ends or `max_ticks` ticks have run. Returns the
    /// status at the end.
    pub fn run(&mut self, max_ticks: u64) -> GameStatus {
        for _ in 0..max_ticks {
            if self.state.status() != GameStatus::Playing {
                break;
            }
            self.tick();
        }
        self.state.status()
    }

    fn discard_responses(&mut self) {
        if let Some(bridge) = self.bridge.as_mut() {
            for response in bridge.drain() {
                warn!(player = %response.player, id = response.id, "discarding decision after game over");
            }
        }
    }

    fn emit(&mut self, events: &[GameEvent]) {
        let tick = self.state.tick();
        for sink in &mut self.sinks {
            for event in events {
                sink.emit(tick, event);
            }
        }
    }
}
