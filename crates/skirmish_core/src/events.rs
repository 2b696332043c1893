//! Discrete events emitted alongside each tick.
//!
//! The simulation never plays sounds or shows messages itself. It returns
//! events with every tick and forwards them to any [`EventSink`]s the
//! [`Simulation`](crate::simulation::Simulation) was given.

use serde::Serialize;

use crate::ai::ProviderError;
use crate::economy::ResourceId;
use crate::entity::EntityId;
use crate::error::CommandError;
use crate::math::Vec2Fixed;
use crate::player::PlayerId;
use crate::rules::{BuildingType, ItemType, SuperweaponKind, UnitType};
use crate::state::GameStatus;

/// Something a presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    /// A building order was accepted and construction started.
    BuildingPlaced {
        /// Owner.
        player: PlayerId,
        /// New building.
        building: EntityId,
        /// Its type.
        building_type: BuildingType,
    },
    /// Construction finished.
    ConstructionComplete {
        /// Owner.
        player: PlayerId,
        /// Building.
        building: EntityId,
        /// Its type.
        building_type: BuildingType,
    },
    /// A unit left a production building.
    UnitReady {
        /// Owner.
        player: PlayerId,
        /// New unit.
        unit: EntityId,
        /// Its type.
        unit_type: UnitType,
    },
    /// A finished item could not be placed and was refunded.
    ProductionBlocked {
        /// Owner.
        player: PlayerId,
        /// Producer.
        building: EntityId,
        /// Item dropped from the queue.
        item: ItemType,
    },
    /// A weapon fired.
    AttackFired {
        /// Shooter.
        attacker: EntityId,
        /// Target.
        target: EntityId,
        /// Damage dealt.
        damage: i32,
    },
    /// An entity reached zero hit points and was removed.
    EntityDestroyed {
        /// Dead entity.
        id: EntityId,
        /// Its owner.
        owner: PlayerId,
        /// Player credited with the kill.
        killer: Option<PlayerId>,
        /// Where it died.
        position: Vec2Fixed,
        /// Whether it was a building.
        was_building: bool,
    },
    /// A miner unloaded at a refinery.
    OreDeposited {
        /// Owner.
        player: PlayerId,
        /// Credits added.
        amount: i64,
    },
    /// A resource patch ran out and disappeared.
    PatchDepleted {
        /// Patch.
        patch: ResourceId,
    },
    /// An engineer restored hit points.
    Repaired {
        /// Engineer.
        engineer: EntityId,
        /// Repaired entity.
        target: EntityId,
        /// Hit points restored.
        amount: i32,
    },
    /// A superweapon finished charging.
    SuperweaponReady {
        /// Owner.
        player: PlayerId,
        /// Which one.
        kind: SuperweaponKind,
    },
    /// A nuke detonated.
    NukeLaunched {
        /// Launcher.
        player: PlayerId,
        /// Ground zero.
        target: Vec2Fixed,
    },
    /// Units were teleported.
    ChronoShift {
        /// Owner.
        player: PlayerId,
        /// Destination.
        target: Vec2Fixed,
        /// How many units moved.
        units: usize,
    },
    /// A command or AI action was refused.
    CommandRejected {
        /// Acting player.
        player: PlayerId,
        /// Why.
        reason: CommandError,
    },
    /// A decision provider failed; the player idles for an extended cooldown.
    ProviderFailed {
        /// AI player.
        player: PlayerId,
        /// Failure.
        error: ProviderError,
    },
    /// The match ended.
    GameOver {
        /// Final status.
        status: GameStatus,
    },
}

impl GameEvent {
    /// Stable snake_case name, used for audio cues and report counters.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BuildingPlaced { .. } => "building_placed",
            Self::ConstructionComplete { .. } => "construction_complete",
            Self::UnitReady { .. } => "unit_ready",
            Self::ProductionBlocked { .. } => "production_blocked",
            Self::AttackFired { .. } => "attack_fired",
            Self::EntityDestroyed { .. } => "entity_destroyed",
            Self::OreDeposited { .. } => "ore_deposited",
            Self::PatchDepleted { .. } => "patch_depleted",
            Self::Repaired { .. } => "repaired",
            Self::SuperweaponReady { .. } => "superweapon_ready",
            Self::NukeLaunched { .. } => "nuke_launched",
            Self::ChronoShift { .. } => "chrono_shift",
            Self::CommandRejected { .. } => "command_rejected",
            Self::ProviderFailed { .. } => "provider_failed",
            Self::GameOver { .. } => "game_over",
        }
    }

    /// Player the event concerns, if any. Presentation layers use this to
    /// only voice events for the local player.
    #[must_use]
    pub const fn player(&self) -> Option<PlayerId> {
        match self {
            Self::BuildingPlaced { player, .. }
            | Self::ConstructionComplete { player, .. }
            | Self::UnitReady { player, .. }
            | Self::ProductionBlocked { player, .. }
            | Self::OreDeposited { player, .. }
            | Self::SuperweaponReady { player, .. }
            | Self::NukeLaunched { player, .. }
            | Self::ChronoShift { player, .. }
            | Self::CommandRejected { player, .. }
            | Self::ProviderFailed { player, .. } => Some(*player),
            Self::EntityDestroyed { owner, .. } => Some(*owner),
            _ => None,
        }
    }
}

/// Consumer of tick events.
pub trait EventSink {
    /// Receive one event produced during `tick`.
    fn emit(&mut self, tick: u64, event: &GameEvent);
}

impl<F> EventSink for F
where
    F: FnMut(u64, &GameEvent),
{
    fn emit(&mut self, tick: u64, event: &GameEvent) {
        self(tick, event);
    }
}

/// Sink that records everything it receives.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    /// Recorded `(tick, event)` pairs.
    pub entries: Vec<(u64, GameEvent)>,
}

impl EventLog {
    /// Count of recorded events with a given name.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.entries.iter().filter(|(_, e)| e.name() == name).count()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, tick: u64, event: &GameEvent) {
        self.entries.push((tick, event.clone()));
    }
}

/// Sink that logs every event through `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, tick: u64, event: &GameEvent) {
        tracing::debug!(tick, event = event.name(), ?event, "game event");
    }
}
