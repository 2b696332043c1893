//! Entity records: the common header plus a unit or building payload.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::economy::ResourceId;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::player::PlayerId;
use crate::rules::{BuildingStats, BuildingType, DomainSet, ItemType, RoleStats, UnitStats, UnitType};
use crate::terrain::{TerrainGrid, TileCoord, UnitDomain};

/// Unique identifier for entities, assigned in creation order.
pub type EntityId = u64;

/// Unit state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitStatus {
    /// No orders. Armed units auto-acquire targets.
    #[default]
    Idle,
    /// Plain move; ignores enemies.
    Moving,
    /// Move that engages enemies on the way.
    AttackMoving,
    /// Chasing or firing at a target.
    Attacking,
    /// Miner heading to a patch.
    MovingToOre,
    /// Miner extracting ore.
    Gathering,
    /// Miner carrying cargo home.
    ReturningToRefinery,
    /// Engineer heading to a repair target.
    MovingToRepair,
    /// Engineer repairing.
    Repairing,
}

/// Weapon state carried by armed entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attack {
    /// Damage per shot.
    pub damage: i32,
    /// Firing range.
    #[serde(with = "fixed_serde")]
    pub range: Fixed,
    /// Minimum milliseconds between shots.
    pub attack_speed_ms: u64,
    /// Auto-acquire radius.
    #[serde(with = "fixed_serde")]
    pub aggro_range: Fixed,
    /// Target domains.
    pub targets: DomainSet,
    /// Game time of the last shot.
    pub last_attack_ms: Option<u64>,
}

impl Attack {
    /// Whether the weapon has cooled down at `now_ms`.
    #[must_use]
    pub fn is_ready(&self, now_ms: u64) -> bool {
        self.last_attack_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.attack_speed_ms)
    }
}

/// Miner job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinerState {
    /// Maximum cargo.
    pub capacity: i32,
    /// Ore per gathering tick.
    pub gather_amount: i32,
    /// Ore carried.
    pub cargo: i32,
    /// Patch being mined.
    pub patch: Option<ResourceId>,
    /// Refinery being returned to.
    pub refinery: Option<EntityId>,
}

impl MinerState {
    /// Whether the cargo hold is full.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.cargo >= self.capacity
    }
}

/// Engineer job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineerState {
    /// Hit points restored per second.
    pub repair_per_second: i32,
    /// Credits per 100 hit points restored.
    pub cost_per_100_hp: i64,
    /// Structure being repaired.
    pub target: Option<EntityId>,
}

/// Role-specific transient fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitRole {
    /// Armed or plain unit.
    Combat,
    /// Harvester.
    Miner(MinerState),
    /// Repairer.
    Engineer(EngineerState),
}

/// Unit payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Catalog type.
    pub unit_type: UnitType,
    /// Movement domain.
    pub domain: UnitDomain,
    /// State machine.
    pub status: UnitStatus,
    /// Remaining waypoints; the front is the next one.
    pub path: VecDeque<Vec2Fixed>,
    /// Final destination of a move or attack-move.
    pub destination: Option<Vec2Fixed>,
    /// Attack target.
    pub target: Option<EntityId>,
    /// Vision radius in tiles.
    pub vision: i32,
    /// Miner/engineer state.
    pub role: UnitRole,
    /// Enemy this unit last failed to route to, with the tile it stood on.
    /// Not re-acquired until it leaves that tile or the unit gets new orders.
    #[serde(default)]
    pub unreachable: Option<(EntityId, TileCoord)>,
}

impl Unit {
    /// Drop all orders and go idle.
    pub fn stop(&mut self) {
        self.status = UnitStatus::Idle;
        self.path.clear();
        self.destination = None;
        self.target = None;
        self.unreachable = None;
    }

    /// Miner state, if this is a miner.
    #[must_use]
    pub fn miner(&self) -> Option<&MinerState> {
        match &self.role {
            UnitRole::Miner(m) => Some(m),
            _ => None,
        }
    }

    /// Mutable miner state.
    pub fn miner_mut(&mut self) -> Option<&mut MinerState> {
        match &mut self.role {
            UnitRole::Miner(m) => Some(m),
            _ => None,
        }
    }

    /// Engineer state, if this is an engineer.
    #[must_use]
    pub fn engineer(&self) -> Option<&EngineerState> {
        match &self.role {
            UnitRole::Engineer(e) => Some(e),
            _ => None,
        }
    }

    /// Mutable engineer state.
    pub fn engineer_mut(&mut self) -> Option<&mut EngineerState> {
        match &mut self.role {
            UnitRole::Engineer(e) => Some(e),
            _ => None,
        }
    }
}

/// Construction progress of a building that is not finished yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Construction {
    /// Milliseconds spent so far.
    pub elapsed_ms: u64,
    /// Milliseconds needed.
    pub total_ms: u64,
}

/// Building payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Building {
    /// Catalog type.
    pub building_type: BuildingType,
    /// Set once construction completes.
    pub powered: bool,
    /// Production queue, front item in progress.
    pub queue: VecDeque<ItemType>,
    /// Milliseconds spent on the front item.
    pub progress_ms: u64,
    /// `Some` while under construction.
    pub construction: Option<Construction>,
    /// Where fresh units are sent.
    pub rally_point: Option<Vec2Fixed>,
    /// Vision radius in tiles.
    pub vision: i32,
}

impl Building {
    /// Whether construction is still running.
    #[must_use]
    pub const fn is_constructing(&self) -> bool {
        self.construction.is_some()
    }

    /// Whether the building can run its production queue.
    #[must_use]
    pub const fn is_operational(&self) -> bool {
        self.powered && !self.is_constructing()
    }
}

/// Unit-or-building discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Mobile unit.
    Unit(Unit),
    /// Structure.
    Building(Building),
}

/// A unit or building.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier.
    pub id: EntityId,
    /// Owning player.
    pub owner: PlayerId,
    /// Current hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Center in world units.
    pub position: Vec2Fixed,
    /// Footprint diameter.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
    /// Weapon, if armed.
    pub attack: Option<Attack>,
    /// Payload.
    pub kind: EntityKind,
}

impl Entity {
    /// Build a unit at full health. The id is assigned by the store.
    #[must_use]
    pub fn new_unit(owner: PlayerId, unit_type: UnitType, stats: &UnitStats, position: Vec2Fixed) -> Self {
        let role = match stats.role {
            RoleStats::Combat => UnitRole::Combat,
            RoleStats::Miner {
                capacity,
                gather_amount,
            } => UnitRole::Miner(MinerState {
                capacity,
                gather_amount,
                cargo: 0,
                patch: None,
                refinery: None,
            }),
            RoleStats::Engineer {
                repair_per_second,
                cost_per_100_hp,
            } => UnitRole::Engineer(EngineerState {
                repair_per_second,
                cost_per_100_hp,
                target: None,
            }),
        };
        Self {
            id: 0,
            owner,
            hp: stats.hp,
            max_hp: stats.hp,
            position,
            size: Fixed::from_num(stats.size),
            attack: stats.weapon.as_ref().map(|w| Attack {
                damage: w.damage,
                range: Fixed::from_num(w.range),
                attack_speed_ms: w.attack_speed_ms,
                aggro_range: Fixed::from_num(w.aggro_range),
                targets: w.targets,
                last_attack_ms: None,
            }),
            kind: EntityKind::Unit(Unit {
                unit_type,
                domain: stats.domain,
                status: UnitStatus::Idle,
                path: VecDeque::new(),
                destination: None,
                target: None,
                vision: stats.vision,
                role,
                unreachable: None,
            }),
        }
    }

    /// Build a structure. Under construction it starts at 1 hp and unpowered.
    #[must_use]
    pub fn new_building(
        owner: PlayerId,
        building_type: BuildingType,
        stats: &BuildingStats,
        position: Vec2Fixed,
        under_construction: bool,
    ) -> Self {
        let constructing = under_construction && stats.build_time_ms > 0;
        Self {
            id: 0,
            owner,
            hp: if constructing { 1 } else { stats.hp },
            max_hp: stats.hp,
            position,
            size: Fixed::from_num(stats.size),
            attack: None,
            kind: EntityKind::Building(Building {
                building_type,
                powered: !constructing,
                queue: VecDeque::new(),
                progress_ms: 0,
                construction: constructing.then_some(Construction {
                    elapsed_ms: 0,
                    total_ms: stats.build_time_ms,
                }),
                rally_point: None,
                vision: stats.vision,
            }),
        }
    }

    /// Unit payload.
    #[must_use]
    pub fn as_unit(&self) -> Option<&Unit> {
        match &self.kind {
            EntityKind::Unit(u) => Some(u),
            EntityKind::Building(_) => None,
        }
    }

    /// Mutable unit payload.
    pub fn as_unit_mut(&mut self) -> Option<&mut Unit> {
        match &mut self.kind {
            EntityKind::Unit(u) => Some(u),
            EntityKind::Building(_) => None,
        }
    }

    /// Building payload.
    #[must_use]
    pub fn as_building(&self) -> Option<&Building> {
        match &self.kind {
            EntityKind::Building(b) => Some(b),
            EntityKind::Unit(_) => None,
        }
    }

    /// Mutable building payload.
    pub fn as_building_mut(&mut self) -> Option<&mut Building> {
        match &mut self.kind {
            EntityKind::Building(b) => Some(b),
            EntityKind::Unit(_) => None,
        }
    }

    /// Whether this is a unit.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self.kind, EntityKind::Unit(_))
    }

    /// Whether this is a building.
    #[must_use]
    pub const fn is_building(&self) -> bool {
        matches!(self.kind, EntityKind::Building(_))
    }

    /// Unit type, if a unit.
    #[must_use]
    pub fn unit_type(&self) -> Option<UnitType> {
        self.as_unit().map(|u| u.unit_type)
    }

    /// Building type, if a building.
    #[must_use]
    pub fn building_type(&self) -> Option<BuildingType> {
        self.as_building().map(|b| b.building_type)
    }

    /// Whether this is a completed building of `building_type`.
    #[must_use]
    pub fn is_completed(&self, building_type: BuildingType) -> bool {
        self.as_building()
            .is_some_and(|b| b.building_type == building_type && !b.is_constructing())
    }

    /// Domain for targeting. Buildings count as ground.
    #[must_use]
    pub fn domain(&self) -> UnitDomain {
        self.as_unit().map_or(UnitDomain::Ground, |u| u.domain)
    }

    /// Vision radius in tiles.
    #[must_use]
    pub fn vision(&self) -> i32 {
        match &self.kind {
            EntityKind::Unit(u) => u.vision,
            EntityKind::Building(b) => b.vision,
        }
    }

    /// Whether hit points are below maximum.
    #[must_use]
    pub const fn is_damaged(&self) -> bool {
        self.hp < self.max_hp
    }

    /// Tile the entity's center lies on.
    #[must_use]
    pub fn tile(&self, terrain: &TerrainGrid) -> TileCoord {
        terrain.world_to_tile(self.position)
    }

    /// Status, if a unit.
    #[must_use]
    pub fn status(&self) -> Option<UnitStatus> {
        self.as_unit().map(|u| u.status)
    }
}
