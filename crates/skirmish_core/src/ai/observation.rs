//! Fog-filtered view of the match handed to decision providers.
//!
//! Own entities are always listed. Enemy entities and resource patches are
//! listed only when their tile passes the configured
//! [`VisibilityPolicy`](crate::fog::VisibilityPolicy).

use serde::{Deserialize, Serialize};

use crate::config::Difficulty;
use crate::economy::ResourceId;
use crate::entity::{EntityId, UnitStatus};
use crate::math::{Fixed, Vec2Fixed};
use crate::player::{Controller, PlayerId, PowerBalance};
use crate::production::producible_items;
use crate::rules::{BuildingType, ItemType, SuperweaponKind, UnitType};
use crate::state::GameState;
use crate::terrain::{TileCoord, UnitDomain};

/// One of the observer's units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnUnit {
    /// Id.
    pub id: EntityId,
    /// Type.
    pub unit_type: UnitType,
    /// Position.
    pub position: Vec2Fixed,
    /// Hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Current status.
    pub status: UnitStatus,
    /// Movement domain.
    pub domain: UnitDomain,
    /// Whether it carries a weapon.
    pub armed: bool,
    /// Ore carried (miners).
    pub cargo: i32,
    /// Assigned patch (miners).
    pub patch: Option<ResourceId>,
}

impl OwnUnit {
    /// Armed and not a miner or engineer.
    #[must_use]
    pub fn is_combat(&self) -> bool {
        self.armed && !matches!(self.unit_type, UnitType::ChronoMiner | UnitType::Engineer)
    }
}

/// One of the observer's buildings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnBuilding {
    /// Id.
    pub id: EntityId,
    /// Type.
    pub building_type: BuildingType,
    /// Position.
    pub position: Vec2Fixed,
    /// Hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Still under construction.
    pub constructing: bool,
    /// Powered.
    pub powered: bool,
    /// Items waiting in its queue.
    pub queue_len: usize,
}

impl OwnBuilding {
    /// Powered, finished, and queue not at `capacity`.
    #[must_use]
    pub const fn accepts_orders(&self, capacity: usize) -> bool {
        self.powered && !self.constructing && self.queue_len < capacity
    }
}

/// What an enemy entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SightingKind {
    /// A unit.
    Unit(UnitType),
    /// A building.
    Building(BuildingType),
}

/// An enemy entity on an admitted tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sighting {
    /// Id.
    pub id: EntityId,
    /// Owner.
    pub owner: PlayerId,
    /// What it is.
    pub kind: SightingKind,
    /// Position.
    pub position: Vec2Fixed,
    /// Hit points.
    pub hp: i32,
    /// Whether it carries a weapon.
    pub armed: bool,
}

/// A resource patch on an admitted tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSighting {
    /// Id.
    pub id: ResourceId,
    /// Position.
    pub position: Vec2Fixed,
    /// Ore left.
    pub amount: i32,
}

/// Something the observer could order right now, with its price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOption {
    /// Item.
    pub item: ItemType,
    /// Credit cost.
    pub cost: i64,
    /// Building type that produces it.
    pub producer: BuildingType,
}

/// Everything a decision provider may know when deciding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// The deciding player.
    pub player: PlayerId,
    /// Tick the observation was taken.
    pub tick: u64,
    /// Whole credits.
    pub credits: i64,
    /// Power totals.
    pub power: PowerBalance,
    /// Army size that triggers an attack for a balanced player.
    pub aggression_threshold: u32,
    /// Tile edge length in world units.
    pub tile_size: i32,
    /// Radius around own buildings considered base territory, world units.
    pub defense_radius: i32,
    /// Percent of max hp below which a building wants repair.
    pub repair_threshold_percent: i32,
    /// Production queue capacity.
    pub queue_capacity: usize,
    /// Own units, ascending by id.
    pub units: Vec<OwnUnit>,
    /// Own buildings, ascending by id.
    pub buildings: Vec<OwnBuilding>,
    /// Enemy entities on admitted tiles, ascending by id.
    pub enemies: Vec<Sighting>,
    /// Resource patches on admitted tiles, ascending by id.
    pub patches: Vec<PatchSighting>,
    /// Items whose prerequisites are met.
    pub options: Vec<ProductionOption>,
    /// Superweapons and whether each is ready.
    pub superweapons: Vec<(SuperweaponKind, bool)>,
    /// Start positions of surviving opponents.
    pub enemy_starts: Vec<Vec2Fixed>,
}

impl Observation {
    /// Build the view for `player`, or `None` for an unknown player.
    #[must_use]
    pub fn capture(state: &GameState, player: PlayerId) -> Option<Self> {
        let me = state.player(player)?;
        let config = state.config();
        let terrain = state.terrain();
        let policy = config.visibility;
        let fog = state.fog_for(player);
        let admitted = |pos: Vec2Fixed| fog.is_some_and(|f| policy.admits(f.get(terrain.world_to_tile(pos))));

        let mut units = Vec::new();
        let mut buildings = Vec::new();
        let mut enemies = Vec::new();
        for e in state.entities().iter() {
            if e.owner == player {
                if let Some(u) = e.as_unit() {
                    units.push(OwnUnit {
                        id: e.id,
                        unit_type: u.unit_type,
                        position: e.position,
                        hp: e.hp,
                        max_hp: e.max_hp,
                        status: u.status,
                        domain: u.domain,
                        armed: e.attack.is_some(),
                        cargo: u.miner().map_or(0, |m| m.cargo),
                        patch: u.miner().and_then(|m| m.patch),
                    });
                } else if let Some(b) = e.as_building() {
                    buildings.push(OwnBuilding {
                        id: e.id,
                        building_type: b.building_type,
                        position: e.position,
                        hp: e.hp,
                        max_hp: e.max_hp,
                        constructing: b.is_constructing(),
                        powered: b.powered,
                        queue_len: b.queue.len(),
                    });
                }
            } else if admitted(e.position) {
                let kind = match (e.unit_type(), e.building_type()) {
                    (Some(t), _) => SightingKind::Unit(t),
                    (None, Some(t)) => SightingKind::Building(t),
                    (None, None) => continue,
                };
                enemies.push(Sighting {
                    id: e.id,
                    owner: e.owner,
                    kind,
                    position: e.position,
                    hp: e.hp,
                    armed: e.attack.is_some(),
                });
            }
        }

        let patches = state
            .resources()
            .iter()
            .filter(|p| admitted(p.position))
            .map(|p| PatchSighting {
                id: p.id,
                position: p.position,
                amount: p.amount,
            })
            .collect();

        let rules = state.rules();
        let options = producible_items(state, player)
            .into_iter()
            .filter_map(|item| {
                Some(ProductionOption {
                    item,
                    cost: rules.cost(item)?,
                    producer: rules.producer(item)?,
                })
            })
            .collect();

        let enemy_starts = state
            .players()
            .values()
            .filter(|p| p.id != player && !state.is_defeated(p.id))
            .filter_map(|p| p.start_position)
            .collect();

        let difficulty = match me.controller {
            Controller::Ai { difficulty, .. } => difficulty,
            Controller::Human => Difficulty::default(),
        };

        Some(Self {
            player,
            tick: state.tick(),
            credits: me.whole_credits(),
            power: me.power,
            aggression_threshold: config.difficulty.get(difficulty).aggression_threshold,
            tile_size: config.tile_size,
            defense_radius: config.defense_radius_tiles * config.tile_size,
            repair_threshold_percent: config.repair_threshold_percent,
            queue_capacity: config.queue_capacity,
            units,
            buildings,
            enemies,
            patches,
            options,
            superweapons: me.superweapons.values().map(|s| (s.kind, s.is_ready())).collect(),
            enemy_starts,
        })
    }

    /// Own buildings of a type, finished or not.
    pub fn buildings_of(&self, building_type: BuildingType) -> impl Iterator<Item = &OwnBuilding> + '_ {
        self.buildings.iter().filter(move |b| b.building_type == building_type)
    }

    /// Whether the player owns at least one building of a type.
    #[must_use]
    pub fn has(&self, building_type: BuildingType) -> bool {
        self.buildings_of(building_type).next().is_some()
    }

    /// Own units of a type.
    pub fn units_of(&self, unit_type: UnitType) -> impl Iterator<Item = &OwnUnit> + '_ {
        self.units.iter().filter(move |u| u.unit_type == unit_type)
    }

    /// Price and producer of an item, if it can be ordered now.
    #[must_use]
    pub fn option(&self, item: ItemType) -> Option<&ProductionOption> {
        self.options.iter().find(|o| o.item == item)
    }

    /// Whether a superweapon is ready.
    #[must_use]
    pub fn superweapon_ready(&self, kind: SuperweaponKind) -> bool {
        self.superweapons.iter().any(|(k, ready)| *k == kind && *ready)
    }

    /// Tile containing a world position.
    #[must_use]
    pub fn tile_of(&self, position: Vec2Fixed) -> TileCoord {
        let size = Fixed::from_num(self.tile_size.max(1));
        TileCoord::new(
            (position.x / size).floor().to_num::<i32>(),
            (position.y / size).floor().to_num::<i32>(),
        )
    }

    /// The observer's headquarters position, if it still has one.
    #[must_use]
    pub fn base_position(&self) -> Option<Vec2Fixed> {
        self.buildings_of(BuildingType::Headquarters).next().map(|b| b.position)
    }
}
