//! Per-player fog of war.
//!
//! Each tick every tile a player could see last tick drops back to
//! `Explored`, then every tile within vision range of one of the player's
//! entities becomes `Visible`. Tiles never return to `Unexplored`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::player::PlayerId;
use crate::state::GameState;
use crate::terrain::{TerrainGrid, TileCoord};

/// Knowledge a player has of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FogState {
    /// Never seen.
    #[default]
    Unexplored,
    /// Seen before, not currently in vision. Static structures stay known.
    Explored,
    /// Currently in vision.
    Visible,
}

/// Which fog states AI observations may draw enemy information from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VisibilityPolicy {
    /// Only tiles in current vision.
    #[default]
    VisibleOnly,
    /// Anything the player has ever seen.
    ExploredOrVisible,
}

impl VisibilityPolicy {
    /// Whether a tile in `state` is admitted under this policy.
    #[must_use]
    pub const fn admits(self, state: FogState) -> bool {
        match self {
            Self::VisibleOnly => matches!(state, FogState::Visible),
            Self::ExploredOrVisible => !matches!(state, FogState::Unexplored),
        }
    }
}

/// One player's fog grid, same shape as the terrain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FogGrid {
    width: u32,
    height: u32,
    cells: Vec<FogState>,
}

impl FogGrid {
    /// Fully unexplored grid matching `terrain`.
    #[must_use]
    pub fn new(terrain: &TerrainGrid) -> Self {
        Self {
            width: terrain.width(),
            height: terrain.height(),
            cells: vec![FogState::Unexplored; (terrain.width() as usize) * (terrain.height() as usize)],
        }
    }

    fn index(&self, tile: TileCoord) -> Option<usize> {
        (tile.x >= 0 && tile.y >= 0 && (tile.x as u32) < self.width && (tile.y as u32) < self.height)
            .then(|| (tile.y as usize) * (self.width as usize) + (tile.x as usize))
    }

    /// Fog state of a tile. Out-of-bounds tiles read as `Unexplored`.
    #[must_use]
    pub fn get(&self, tile: TileCoord) -> FogState {
        self.index(tile).map_or(FogState::Unexplored, |i| self.cells[i])
    }

    /// Whether a tile is currently visible.
    #[must_use]
    pub fn is_visible(&self, tile: TileCoord) -> bool {
        self.get(tile) == FogState::Visible
    }

    /// Number of tiles in each state: (unexplored, explored, visible).
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        self.cells.iter().fold((0, 0, 0), |(u, e, v), s| match s {
            FogState::Unexplored => (u + 1, e, v),
            FogState::Explored => (u, e + 1, v),
            FogState::Visible => (u, e, v + 1),
        })
    }

    /// Compute next tick's grid from vision sources `(tile, radius in tiles)`.
    ///
    /// A tile is visible when its offset from a source satisfies
    /// `dx^2 + dy^2 <= radius^2`.
    #[must_use]
    pub fn recompute<I>(&self, sources: I) -> Self
    where
        I: IntoIterator<Item = (TileCoord, i32)>,
    {
        let mut next = self.clone();
        for cell in &mut next.cells {
            if *cell == FogState::Visible {
                *cell = FogState::Explored;
            }
        }

        for (center, radius) in sources {
            let radius = radius.max(0);
            let r2 = radius * radius;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx * dx + dy * dy > r2 {
                        continue;
                    }
                    if let Some(i) = next.index(TileCoord::new(center.x + dx, center.y + dy)) {
                        next.cells[i] = FogState::Visible;
                    }
                }
            }
        }
        next
    }
}

/// Recompute every player's fog from the entities they own.
pub fn update_fog(state: &mut GameState) {
    let terrain = state.terrain();
    let mut sources: BTreeMap<PlayerId, Vec<(TileCoord, i32)>> = BTreeMap::new();
    for entity in state.entities().iter() {
        sources
            .entry(entity.owner)
            .or_default()
            .push((terrain.world_to_tile(entity.position), entity.vision()));
    }

    let mut next = BTreeMap::new();
    for &player in state.players().keys() {
        let current = state
            .fog_for(player)
            .cloned()
            .unwrap_or_else(|| FogGrid::new(terrain));
        let seen = sources.remove(&player).unwrap_or_default();
        next.insert(player, current.recompute(seen));
    }
    state.set_fog(next);
}
