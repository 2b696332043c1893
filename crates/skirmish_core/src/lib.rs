//! # Skirmish Core
//!
//! Deterministic simulation core for a single-player skirmish RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No wall-clock time (game time is `tick * tick_ms`)
//! - No floating-point math in the tick path (uses fixed-point)
//!
//! Every tick consumes an immutable [`GameState`](state::GameState) snapshot and
//! produces a new one plus a list of [`GameEvent`](events::GameEvent)s.
//! Collections inside a snapshot are reference counted, so a tick only
//! clones the collections it actually touches.
//!
//! ## Crate Structure
//!
//! - [`terrain`] - tile grid and per-domain passability
//! - [`pathfinding`] - A* over the tile grid
//! - [`spatial`] - uniform-grid spatial hash for proximity queries
//! - [`fog`] - per-player fog of war
//! - [`economy`], [`production`], [`combat`], [`superweapon`] - tick subsystems
//! - [`units`] - per-unit state machine
//! - [`commands`] - player command entry points
//! - [`ai`] - observations, action contract, heuristic planner, provider bridge
//! - [`simulation`] - tick orchestration

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod clustering;
pub mod combat;
pub mod commands;
pub mod config;
pub mod economy;
pub mod effects;
pub mod entity;
pub mod error;
pub mod events;
pub mod fog;
pub mod map_generation;
pub mod math;
pub mod pathfinding;
pub mod player;
pub mod production;
pub mod rules;
pub mod simulation;
pub mod spatial;
pub mod state;
pub mod store;
pub mod superweapon;
pub mod terrain;
pub mod units;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{AiAction, AiActionKind, DecisionProvider, HeuristicPlanner, Observation};
    pub use crate::commands::{apply_command, Command};
    pub use crate::config::{Difficulty, Personality, SimConfig};
    pub use crate::entity::{Entity, EntityId, EntityKind, UnitStatus};
    pub use crate::error::{CommandError, GameError, Result};
    pub use crate::events::{EventSink, GameEvent};
    pub use crate::fog::{FogState, VisibilityPolicy};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::player::{Controller, PlayerId};
    pub use crate::rules::{BuildingType, ItemType, Rules, UnitType};
    pub use crate::simulation::{advance, Simulation, TickOutcome};
    pub use crate::state::{GameState, GameStatus};
    pub use crate::terrain::{TerrainGrid, TerrainType, TileCoord, UnitDomain};
}
