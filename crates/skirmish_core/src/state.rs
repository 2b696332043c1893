//! Immutable game snapshots with structural sharing.
//!
//! A [`GameState`] is cheap to clone: every collection sits behind an
//! `Arc`. Mutating accessors go through `Arc::make_mut`, so a tick that
//! only touches entities leaves terrain, fog and players shared with the
//! previous snapshot. Holding on to an old snapshot is always safe.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::economy::{ResourceField, ResourceId};
use crate::effects::{EffectKind, VisualEffect};
use crate::entity::{Entity, EntityId};
use crate::error::{GameError, Result};
use crate::fog::FogGrid;
use crate::math::{Fixed, Vec2Fixed};
use crate::player::{Controller, PlayerId, PlayerState};
use crate::rules::{BuildingType, Rules, UnitType};
use crate::store::EntityStore;
use crate::terrain::{TerrainGrid, TileCoord};

/// Match status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameStatus {
    /// Ticks advance.
    #[default]
    Playing,
    /// Ticks are no-ops until resumed.
    Paused,
    /// Every AI headquarters is gone.
    PlayerWon,
    /// The human headquarters is gone.
    AiWon,
}

impl GameStatus {
    /// Whether the match has ended.
    #[must_use]
    pub const fn is_over(self) -> bool {
        matches!(self, Self::PlayerWon | Self::AiWon)
    }
}

/// Human selection and numbered control groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selection {
    /// Currently selected entities.
    pub selected: Vec<EntityId>,
    /// Saved groups by number.
    pub groups: BTreeMap<u8, Vec<EntityId>>,
}

/// One immutable snapshot of the whole match.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    tick: u64,
    status: GameStatus,
    config: Arc<SimConfig>,
    rules: Arc<Rules>,
    terrain: Arc<TerrainGrid>,
    entities: Arc<EntityStore>,
    resources: Arc<ResourceField>,
    players: Arc<BTreeMap<PlayerId, PlayerState>>,
    fog: Arc<BTreeMap<PlayerId, FogGrid>>,
    effects: Arc<Vec<VisualEffect>>,
    selection: Arc<Selection>,
}

impl GameState {
    /// Empty match on the given terrain.
    #[must_use]
    pub fn new(config: SimConfig, rules: Rules, terrain: TerrainGrid) -> Self {
        Self {
            tick: 0,
            status: GameStatus::Playing,
            config: Arc::new(config),
            rules: Arc::new(rules),
            terrain: Arc::new(terrain),
            entities: Arc::new(EntityStore::new()),
            resources: Arc::new(ResourceField::default()),
            players: Arc::new(BTreeMap::new()),
            fog: Arc::new(BTreeMap::new()),
            effects: Arc::new(Vec::new()),
            selection: Arc::new(Selection::default()),
        }
    }

    /// Ticks simulated so far.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Game time in milliseconds, derived from the tick counter.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.tick * self.config.tick_ms
    }

    /// Match status.
    #[must_use]
    pub const fn status(&self) -> GameStatus {
        self.status
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Catalog.
    #[must_use]
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Terrain.
    #[must_use]
    pub fn terrain(&self) -> &TerrainGrid {
        &self.terrain
    }

    /// Entities.
    #[must_use]
    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Resource patches.
    #[must_use]
    pub fn resources(&self) -> &ResourceField {
        &self.resources
    }

    /// All players in id order.
    #[must_use]
    pub fn players(&self) -> &BTreeMap<PlayerId, PlayerState> {
        &self.players
    }

    /// Visual effects.
    #[must_use]
    pub fn effects(&self) -> &[VisualEffect] {
        &self.effects
    }

    /// Selection and control groups.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// One entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// One player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    /// A player's fog grid.
    #[must_use]
    pub fn fog_for(&self, id: PlayerId) -> Option<&FogGrid> {
        self.fog.get(&id)
    }

    /// Whether `player` currently sees `tile`.
    #[must_use]
    pub fn is_visible_to(&self, player: PlayerId, tile: TileCoord) -> bool {
        self.fog_for(player).is_some_and(|f| f.is_visible(tile))
    }

    /// The human player id.
    #[must_use]
    pub fn human(&self) -> PlayerId {
        self.config.human_player
    }

    /// A player is defeated once its headquarters or all of its buildings are gone.
    #[must_use]
    pub fn is_defeated(&self, player: PlayerId) -> bool {
        let Some(state) = self.player(player) else {
            return true;
        };
        let has_base = state.base.is_some_and(|id| self.entities.contains(id));
        !has_base || self.entities.building_count(player) == 0
    }

    /// Mutable entities (clones the store if shared).
    pub fn entities_mut(&mut self) -> &mut EntityStore {
        Arc::make_mut(&mut self.entities)
    }

    /// Mutable entity.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if !self.entities.contains(id) {
            return None;
        }
        self.entities_mut().get_mut(id)
    }

    /// Mutable players.
    pub fn players_mut(&mut self) -> &mut BTreeMap<PlayerId, PlayerState> {
        Arc::make_mut(&mut self.players)
    }

    /// Mutable player.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        if !self.players.contains_key(&id) {
            return None;
        }
        self.players_mut().get_mut(&id)
    }

    /// Mutable resource patches.
    pub fn resources_mut(&mut self) -> &mut ResourceField {
        Arc::make_mut(&mut self.resources)
    }

    /// Mutable selection.
    pub fn selection_mut(&mut self) -> &mut Selection {
        Arc::make_mut(&mut self.selection)
    }

    /// Mutable effects.
    pub(crate) fn effects_mut(&mut self) -> &mut Vec<VisualEffect> {
        Arc::make_mut(&mut self.effects)
    }

    /// Replace the fog map. Keeps the old allocation when nothing changed.
    pub(crate) fn set_fog(&mut self, fog: BTreeMap<PlayerId, FogGrid>) {
        if *self.fog != fog {
            self.fog = Arc::new(fog);
        }
    }

    pub(crate) fn set_status(&mut self, status: GameStatus) {
        self.status = status;
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }

    /// Spawn a visual effect at the current time.
    pub fn add_effect(&mut self, kind: EffectKind) {
        let created_ms = self.now_ms();
        self.effects_mut().push(VisualEffect { kind, created_ms });
    }

    /// Register a player with an unexplored fog grid.
    pub fn add_player(&mut self, id: PlayerId, controller: Controller, credits: i64) {
        self.players_mut()
            .insert(id, PlayerState::new(id, controller, credits));
        let grid = FogGrid::new(&self.terrain);
        Arc::make_mut(&mut self.fog).insert(id, grid);
    }

    /// Spawn a unit at full health.
    pub fn spawn_unit(&mut self, owner: PlayerId, unit_type: UnitType, position: Vec2Fixed) -> Result<EntityId> {
        let stats = self
            .rules
            .unit(unit_type)
            .ok_or_else(|| GameError::MissingRule(format!("{unit_type:?}")))?;
        let entity = Entity::new_unit(owner, unit_type, stats, position);
        Ok(self.entities_mut().insert(entity))
    }

    /// Spawn a building. The first headquarters becomes the owner's base.
    pub fn spawn_building(
        &mut self,
        owner: PlayerId,
        building_type: BuildingType,
        position: Vec2Fixed,
        under_construction: bool,
    ) -> Result<EntityId> {
        let stats = self
            .rules
            .building(building_type)
            .ok_or_else(|| GameError::MissingRule(format!("{building_type:?}")))?;
        let entity = Entity::new_building(owner, building_type, stats, position, under_construction);
        let id = self.entities_mut().insert(entity);
        if building_type == BuildingType::Headquarters {
            if let Some(player) = self.player_mut(owner) {
                if player.base.is_none() {
                    player.base = Some(id);
                }
            }
        }
        Ok(id)
    }

    /// Add a resource patch holding `amount` ore.
    pub fn add_resource_patch(&mut self, position: Vec2Fixed, amount: i32) -> ResourceId {
        let size = self.config.tile() / Fixed::from_num(2);
        self.resources_mut().insert(position, amount, size)
    }

    /// Whether two snapshots share the same entity store allocation.
    #[must_use]
    pub fn shares_entities_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entities, &other.entities)
    }

    /// Whether two snapshots share the same terrain allocation.
    #[must_use]
    pub fn shares_terrain_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.terrain, &other.terrain)
    }

    /// Whether two snapshots share the same fog allocation.
    #[must_use]
    pub fn shares_fog_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fog, &other.fog)
    }

    /// Compute a hash of the simulation-relevant state for desync and
    /// determinism checks. Effects and selection are excluded.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.status.hash(&mut hasher);
        self.entities.hash(&mut hasher);
        self.resources.hash(&mut hasher);
        self.players.hash(&mut hasher);
        self.fog.hash(&mut hasher);
        hasher.finish()
    }
}
