//! Simulation configuration.
//!
//! Everything tunable that is not a per-type stat lives here. The defaults
//! describe the stock skirmish: 100 ms ticks on an 80x60 grid of 40-unit
//! tiles. Configs are loaded from RON the same way [`Rules`](crate::rules::Rules)
//! are.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::fog::VisibilityPolicy;
use crate::math::Fixed;
use crate::player::PlayerId;

/// AI difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Difficulty {
    /// More credits, slow decisions.
    Easy,
    /// Stock settings.
    #[default]
    Normal,
    /// Fewer credits, fast decisions.
    Hard,
}

/// AI play style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Personality {
    /// Mixes economy and army.
    #[default]
    Balanced,
    /// Rushes an army.
    Aggressive,
    /// Builds economy first.
    Economic,
}

/// Per-difficulty tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultySettings {
    /// Credits an AI player starts with.
    pub starting_credits: i64,
    /// Milliseconds between AI decisions.
    pub decision_interval_ms: u64,
    /// Army size at which a balanced AI attacks. Other personalities scale it.
    pub aggression_threshold: u32,
}

/// Settings for all three difficulties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyTable {
    /// Easy.
    pub easy: DifficultySettings,
    /// Normal.
    pub normal: DifficultySettings,
    /// Hard.
    pub hard: DifficultySettings,
}

impl DifficultyTable {
    /// Settings for one difficulty.
    #[must_use]
    pub const fn get(&self, difficulty: Difficulty) -> &DifficultySettings {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Normal => &self.normal,
            Difficulty::Hard => &self.hard,
        }
    }
}

impl Default for DifficultyTable {
    fn default() -> Self {
        Self {
            easy: DifficultySettings {
                starting_credits: 1500,
                decision_interval_ms: 8000,
                aggression_threshold: 12,
            },
            normal: DifficultySettings {
                starting_credits: 1000,
                decision_interval_ms: 5000,
                aggression_threshold: 8,
            },
            hard: DifficultySettings {
                starting_credits: 500,
                decision_interval_ms: 3000,
                aggression_threshold: 5,
            },
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Game milliseconds per tick.
    pub tick_ms: u64,
    /// Tile edge length in world units.
    pub tile_size: i32,
    /// Generated map width in tiles.
    pub map_width: u32,
    /// Generated map height in tiles.
    pub map_height: u32,
    /// Spatial hash cell edge in world units.
    pub spatial_cell_size: i32,
    /// World units a unit moves per tick.
    pub move_speed: i32,
    /// Distance at which a waypoint counts as reached.
    pub arrival_radius: i32,
    /// Nuke blast radius in world units.
    pub nuke_radius: i32,
    /// Nuke damage at ground zero.
    pub nuke_damage: i32,
    /// Maximum items per production queue.
    pub queue_capacity: usize,
    /// What AI observations may include.
    pub visibility: VisibilityPolicy,
    /// The human-controlled player.
    pub human_player: PlayerId,
    /// Difficulty tuning.
    pub difficulty: DifficultyTable,
    /// Percent of max hp under which the AI dispatches engineers.
    pub repair_threshold_percent: i32,
    /// Radius around own buildings (in tiles) the AI defends.
    pub defense_radius_tiles: i32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            tile_size: 40,
            map_width: 80,
            map_height: 60,
            spatial_cell_size: 160,
            move_speed: 2,
            arrival_radius: 20,
            nuke_radius: 200,
            nuke_damage: 1000,
            queue_capacity: 5,
            visibility: VisibilityPolicy::VisibleOnly,
            human_player: PlayerId::HUMAN,
            difficulty: DifficultyTable::default(),
            repair_threshold_percent: 75,
            defense_radius_tiles: 8,
        }
    }
}

impl SimConfig {
    /// Parse a config from RON. Missing fields take their defaults.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "<config>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        let bad = |what: &str| Err(GameError::InvalidState(format!("config: {what}")));
        if self.tick_ms == 0 {
            return bad("tick_ms must be positive");
        }
        if self.tile_size <= 0 || self.spatial_cell_size <= 0 {
            return bad("tile and cell sizes must be positive");
        }
        if self.map_width == 0 || self.map_height == 0 {
            return bad("map dimensions must be positive");
        }
        if self.move_speed <= 0 || self.arrival_radius <= 0 {
            return bad("movement values must be positive");
        }
        if self.queue_capacity == 0 {
            return bad("queue_capacity must be positive");
        }
        Ok(())
    }

    /// Tile size as a fixed-point length.
    #[must_use]
    pub fn tile(&self) -> Fixed {
        Fixed::from_num(self.tile_size)
    }

    /// Spatial hash cell edge, falling back to the tile size when the
    /// configured cell is not positive.
    #[must_use]
    pub fn spatial_cell(&self) -> Fixed {
        let size = if self.spatial_cell_size > 0 {
            self.spatial_cell_size
        } else {
            self.tile_size
        };
        Fixed::from_num(size.max(1))
    }

    /// Convert a millisecond duration into whole ticks, rounding up.
    #[must_use]
    pub const fn ticks_for(&self, ms: u64) -> u64 {
        ms.div_ceil(self.tick_ms)
    }
}
