//! The AI action contract and its translation into player commands.
//!
//! Local planners and external providers both answer with an [`AiAction`].
//! Actions go through the same command entry points as human input. Ids
//! that no longer exist are dropped silently; any other rejection is logged
//! and reported as a [`GameEvent::CommandRejected`].

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::commands::{apply_command_with_events, Command};
use crate::economy::ResourceId;
use crate::entity::{Entity, EntityId, UnitStatus};
use crate::error::CommandError;
use crate::events::GameEvent;
use crate::math::Vec2Fixed;
use crate::player::PlayerId;
use crate::production::find_build_site;
use crate::rules::{BuildingType, ItemType, SuperweaponKind, UnitType};
use crate::state::GameState;
use crate::terrain::TileCoord;

/// What an attack order aims at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackTarget {
    /// A specific entity.
    Entity(EntityId),
    /// Attack-move to a point.
    Position(Vec2Fixed),
}

/// The discriminated payload of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AiActionKind {
    /// Place a building. Without a tile the engine searches around the HQ.
    Build {
        /// What to build.
        building_type: BuildingType,
        /// Requested footprint tile.
        #[serde(default)]
        placement: Option<TileCoord>,
    },
    /// Queue a unit at the first producer with room.
    Train {
        /// What to train.
        unit_type: UnitType,
    },
    /// Send units at a target. An empty list means every combat unit.
    Attack {
        /// Attackers.
        #[serde(default)]
        units: Vec<EntityId>,
        /// Target.
        target: AttackTarget,
    },
    /// Send miners to a patch. An empty list means the first idle miner.
    Gather {
        /// Miners.
        #[serde(default)]
        units: Vec<EntityId>,
        /// Patch.
        patch: ResourceId,
    },
    /// Send engineers to a damaged entity. An empty list means every idle
    /// engineer.
    Repair {
        /// Engineers.
        #[serde(default)]
        units: Vec<EntityId>,
        /// Damaged entity.
        target: EntityId,
    },
    /// Fire a superweapon at a tile. The chronoshift moves `units`.
    LaunchSuperweapon {
        /// Which one.
        kind: SuperweaponKind,
        /// Strike or destination tile.
        target: TileCoord,
        /// Units to teleport.
        #[serde(default)]
        units: Vec<EntityId>,
    },
    /// Do nothing this decision.
    Idle,
}

/// One decision for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiAction {
    /// Acting player.
    pub player: PlayerId,
    /// What to do.
    #[serde(flatten)]
    pub kind: AiActionKind,
    /// Free-form explanation, for logs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl AiAction {
    /// An action without a rationale.
    #[must_use]
    pub const fn new(player: PlayerId, kind: AiActionKind) -> Self {
        Self {
            player,
            kind,
            rationale: None,
        }
    }

    /// An explicit no-op.
    #[must_use]
    pub const fn idle(player: PlayerId) -> Self {
        Self::new(player, AiActionKind::Idle)
    }

    /// Attach a rationale.
    #[must_use]
    pub fn because(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Whether this is the idle action.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.kind, AiActionKind::Idle)
    }

    /// Translate into a command against `state`.
    ///
    /// `Ok(None)` means nothing to do: an idle action, or one whose
    /// referenced entities are all gone.
    pub fn to_command(&self, state: &GameState) -> Result<Option<Command>, CommandError> {
        let player = self.player;
        let live = |ids: &[EntityId]| -> Vec<EntityId> {
            ids.iter()
                .copied()
                .filter(|id| state.entity(*id).is_some_and(|e| e.owner == player))
                .collect()
        };

        let command = match &self.kind {
            AiActionKind::Idle => return Ok(None),
            AiActionKind::Build {
                building_type,
                placement,
            } => {
                let position = match placement {
                    Some(tile) => state.terrain().tile_center(*tile),
                    None => find_build_site(state, player, *building_type).ok_or_else(|| {
                        CommandError::InvalidPlacement(format!("no site for {building_type:?} near base"))
                    })?,
                };
                Command::PlaceBuilding {
                    building_type: *building_type,
                    position,
                }
            }
            AiActionKind::Train { unit_type } => {
                let item = ItemType::Unit(*unit_type);
                let producer = state
                    .rules()
                    .producer(item)
                    .ok_or_else(|| CommandError::NotPermitted(format!("{unit_type:?} has no producer")))?;
                let capacity = state.config().queue_capacity;
                let building = state
                    .entities()
                    .completed(player, producer)
                    .find(|e| e.as_building().is_some_and(|b| b.powered && b.queue.len() < capacity))
                    .map(|e| e.id)
                    .ok_or_else(|| CommandError::NotReady(format!("no {producer:?} can take orders")))?;
                Command::QueueProduction { building, item }
            }
            AiActionKind::Attack { units, target } => {
                let units = if units.is_empty() {
                    state
                        .entities()
                        .owned_by(player)
                        .filter(|e| is_combat_unit(e))
                        .map(|e| e.id)
                        .collect()
                } else {
                    live(units)
                };
                if units.is_empty() {
                    return Ok(None);
                }
                match target {
                    AttackTarget::Entity(id) if state.entity(*id).is_none() => return Ok(None),
                    AttackTarget::Entity(id) => Command::Attack { units, target: *id },
                    AttackTarget::Position(target) => Command::AttackMove {
                        units,
                        target: *target,
                    },
                }
            }
            AiActionKind::Gather { units, patch } => {
                if state.resources().get(*patch).is_none() {
                    return Ok(None);
                }
                let units = if units.is_empty() {
                    state
                        .entities()
                        .owned_by(player)
                        .filter(|e| {
                            e.as_unit()
                                .is_some_and(|u| u.miner().is_some() && u.status == UnitStatus::Idle)
                        })
                        .map(|e| e.id)
                        .take(1)
                        .collect()
                } else {
                    live(units)
                };
                if units.is_empty() {
                    return Ok(None);
                }
                Command::Gather { units, patch: *patch }
            }
            AiActionKind::Repair { units, target } => {
                if state.entity(*target).is_none() {
                    return Ok(None);
                }
                let units = if units.is_empty() {
                    state
                        .entities()
                        .owned_by(player)
                        .filter(|e| {
                            e.as_unit().is_some_and(|u| {
                                u.engineer().is_some() && u.status == UnitStatus::Idle
                            })
                        })
                        .map(|e| e.id)
                        .collect()
                } else {
                    live(units)
                };
                if units.is_empty() {
                    return Ok(None);
                }
                Command::Repair {
                    units,
                    target: *target,
                }
            }
            AiActionKind::LaunchSuperweapon { kind, target, units } => {
                let target = state.terrain().tile_center(*target);
                match kind {
                    SuperweaponKind::Nuke => Command::LaunchNuke { target },
                    SuperweaponKind::Chronoshift => {
                        let units = live(units);
                        if units.is_empty() {
                            return Ok(None);
                        }
                        Command::ChronoShift { units, target }
                    }
                }
            }
        };
        Ok(Some(command))
    }
}

fn is_combat_unit(e: &Entity) -> bool {
    e.attack.is_some() && e.as_unit().is_some_and(|u| u.miner().is_none() && u.engineer().is_none())
}

/// Apply an action, never failing.
///
/// Returns the next snapshot, or a clone of `state` when the action was a
/// no-op or got rejected.
pub fn apply_ai_action(state: &GameState, action: &AiAction, events: &mut Vec<GameEvent>) -> GameState {
    let player = action.player;
    let result = action
        .to_command(state)
        .and_then(|command| match command {
            Some(command) => apply_command_with_events(state, player, &command, events).map(Some),
            None => Ok(None),
        });

    match result {
        Ok(Some(next)) => {
            debug!(player = %player, action = ?action.kind, rationale = ?action.rationale, "ai action applied");
            next
        }
        Ok(None) => {
            trace!(player = %player, action = ?action.kind, "ai action had nothing to do");
            state.clone()
        }
        Err(reason) => {
            debug!(player = %player, action = ?action.kind, %reason, "ai action rejected");
            events.push(GameEvent::CommandRejected { player, reason });
            state.clone()
        }
    }
}
