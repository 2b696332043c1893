//! Unit and building catalog.
//!
//! Stats are plain data: [`Rules::stock`] returns the built-in catalog and
//! [`Rules::from_ron_str`] loads a modded one. Lengths are integer world
//! units, times are milliseconds and costs are whole credits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::terrain::UnitDomain;

/// Every trainable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitType {
    /// Basic infantry.
    Rifleman,
    /// Short-range shock infantry.
    TeslaTrooper,
    /// Repairs friendly structures for credits.
    Engineer,
    /// Main battle tank.
    Tank,
    /// Long-range beam artillery.
    PrismTank,
    /// Heavy tank.
    ApocalypseTank,
    /// Resource harvester.
    ChronoMiner,
    /// Jetpack infantry.
    Rocketeer,
    /// Air superiority fighter.
    FighterJet,
    /// Siege airship.
    Kirov,
    /// Main warship.
    Destroyer,
    /// Anti-air patrol boat.
    SeaScorpion,
}

impl UnitType {
    /// All unit types in catalog order.
    pub const ALL: [Self; 12] = [
        Self::Rifleman,
        Self::TeslaTrooper,
        Self::Engineer,
        Self::Tank,
        Self::PrismTank,
        Self::ApocalypseTank,
        Self::ChronoMiner,
        Self::Rocketeer,
        Self::FighterJet,
        Self::Kirov,
        Self::Destroyer,
        Self::SeaScorpion,
    ];
}

/// Every constructible building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingType {
    /// Command center; losing it loses the match.
    Headquarters,
    /// Drop-off point for miners.
    Refinery,
    /// Produces power.
    PowerPlant,
    /// Trains infantry.
    Barracks,
    /// Builds vehicles.
    WarFactory,
    /// Builds aircraft.
    Airfield,
    /// Builds ships. Coastal only.
    NavalYard,
    /// Vehicle service depot.
    RepairBay,
    /// Teleport superweapon.
    ChronoSphere,
    /// Nuclear superweapon.
    NuclearSilo,
}

impl BuildingType {
    /// All building types in catalog order.
    pub const ALL: [Self; 10] = [
        Self::Headquarters,
        Self::Refinery,
        Self::PowerPlant,
        Self::Barracks,
        Self::WarFactory,
        Self::Airfield,
        Self::NavalYard,
        Self::RepairBay,
        Self::ChronoSphere,
        Self::NuclearSilo,
    ];
}

/// Anything a production queue can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemType {
    /// A unit.
    Unit(UnitType),
    /// A building.
    Building(BuildingType),
}

impl From<UnitType> for ItemType {
    fn from(t: UnitType) -> Self {
        Self::Unit(t)
    }
}

impl From<BuildingType> for ItemType {
    fn from(t: BuildingType) -> Self {
        Self::Building(t)
    }
}

/// Broad unit family, used by the sidebar and AI army counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitCategory {
    /// Foot soldiers.
    Infantry,
    /// Armed vehicles.
    CombatVehicle,
    /// Unarmed vehicles.
    SupportVehicle,
    /// Aircraft.
    Aircraft,
    /// Ships.
    Vessel,
}

/// The two superweapons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SuperweaponKind {
    /// Teleports friendly units.
    Chronoshift,
    /// Area strike with linear damage falloff.
    Nuke,
}

/// Where a building may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlacementRule {
    /// Any land tile.
    #[default]
    Land,
    /// Land tile adjacent to water.
    Coastal,
}

/// Set of domains a weapon can hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DomainSet {
    /// Hits ground targets (buildings count as ground).
    pub ground: bool,
    /// Hits aircraft.
    pub air: bool,
    /// Hits ships.
    pub sea: bool,
}

impl DomainSet {
    /// Build a set from a list of domains.
    #[must_use]
    pub fn of(domains: &[UnitDomain]) -> Self {
        let mut set = Self::default();
        for d in domains {
            match d {
                UnitDomain::Ground => set.ground = true,
                UnitDomain::Air => set.air = true,
                UnitDomain::Sea => set.sea = true,
            }
        }
        set
    }

    /// Whether the set includes `domain`.
    #[must_use]
    pub const fn contains(self, domain: UnitDomain) -> bool {
        match domain {
            UnitDomain::Ground => self.ground,
            UnitDomain::Air => self.air,
            UnitDomain::Sea => self.sea,
        }
    }
}

/// Weapon stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponStats {
    /// Damage per shot.
    pub damage: i32,
    /// Firing range in world units.
    pub range: i32,
    /// Minimum milliseconds between shots.
    pub attack_speed_ms: u64,
    /// Auto-acquire radius in world units.
    pub aggro_range: i32,
    /// Target domains.
    pub targets: DomainSet,
}

/// Role-specific unit stats.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoleStats {
    /// Fights with its weapon (or does nothing if it has none).
    #[default]
    Combat,
    /// Harvests ore.
    Miner {
        /// Cargo capacity in credits.
        capacity: i32,
        /// Ore extracted per gathering tick.
        gather_amount: i32,
    },
    /// Repairs friendly structures.
    Engineer {
        /// Hit points restored per second.
        repair_per_second: i32,
        /// Credits charged per 100 hit points restored.
        cost_per_100_hp: i64,
    },
}

/// Stats for one unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Display name.
    pub name: String,
    /// Family.
    pub category: UnitCategory,
    /// Movement domain.
    pub domain: UnitDomain,
    /// Credit cost.
    pub cost: i64,
    /// Production time in milliseconds.
    pub build_time_ms: u64,
    /// Maximum hit points.
    pub hp: i32,
    /// Footprint diameter in world units.
    pub size: i32,
    /// Vision radius in tiles.
    pub vision: i32,
    /// Weapon, if armed.
    pub weapon: Option<WeaponStats>,
    /// Miner / engineer specifics.
    #[serde(default)]
    pub role: RoleStats,
    /// Building that trains this unit.
    pub produced_by: BuildingType,
}

/// Superweapon attached to a building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperweaponStats {
    /// Which ability.
    pub kind: SuperweaponKind,
    /// Recharge time in milliseconds.
    pub cooldown_ms: u64,
}

/// Stats for one building type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingStats {
    /// Display name.
    pub name: String,
    /// Credit cost.
    pub cost: i64,
    /// Construction time in milliseconds.
    pub build_time_ms: u64,
    /// Maximum hit points.
    pub hp: i32,
    /// Footprint diameter in world units.
    pub size: i32,
    /// Vision radius in tiles.
    pub vision: i32,
    /// Power generated once complete.
    #[serde(default)]
    pub power_produced: i32,
    /// Power drawn once complete.
    #[serde(default)]
    pub power_consumed: i32,
    /// Terrain placement rule.
    #[serde(default)]
    pub placement: PlacementRule,
    /// Buildings that must be complete before this one can be ordered.
    #[serde(default)]
    pub requires: Vec<BuildingType>,
    /// Superweapon granted once complete.
    #[serde(default)]
    pub superweapon: Option<SuperweaponStats>,
}

/// The complete catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    /// Unit stats.
    pub units: BTreeMap<UnitType, UnitStats>,
    /// Building stats.
    pub buildings: BTreeMap<BuildingType, BuildingStats>,
}

impl Default for Rules {
    fn default() -> Self {
        Self::stock()
    }
}

const TILE: i32 = 40;

fn weapon(damage: i32, range_tiles: i32, attack_speed_ms: u64, aggro_tiles: i32, targets: &[UnitDomain]) -> Option<WeaponStats> {
    Some(WeaponStats {
        damage,
        range: range_tiles * TILE,
        attack_speed_ms,
        aggro_range: aggro_tiles * TILE,
        targets: DomainSet::of(targets),
    })
}

impl Rules {
    /// The built-in catalog.
    #[must_use]
    pub fn stock() -> Self {
        use UnitDomain::{Air, Ground, Sea};

        let unit = |name: &str,
                    category: UnitCategory,
                    domain: UnitDomain,
                    cost: i64,
                    build_time_ms: u64,
                    hp: i32,
                    size: i32,
                    vision: i32,
                    weapon: Option<WeaponStats>,
                    produced_by: BuildingType| UnitStats {
            name: name.to_string(),
            category,
            domain,
            cost,
            build_time_ms,
            hp,
            size,
            vision,
            weapon,
            role: RoleStats::Combat,
            produced_by,
        };

        let mut units = BTreeMap::new();
        units.insert(
            UnitType::Rifleman,
            unit("Rifleman", UnitCategory::Infantry, Ground, 50, 3000, 50, 20, 6,
                weapon(5, 4, 1000, 5, &[Ground, Air]), BuildingType::Barracks),
        );
        units.insert(
            UnitType::TeslaTrooper,
            unit("Tesla Trooper", UnitCategory::Infantry, Ground, 150, 5000, 80, 22, 4,
                Some(WeaponStats {
                    damage: 30,
                    range: 60,
                    attack_speed_ms: 1500,
                    aggro_range: 3 * TILE,
                    targets: DomainSet::of(&[Ground]),
                }),
                BuildingType::Barracks),
        );
        units.insert(
            UnitType::Engineer,
            UnitStats {
                role: RoleStats::Engineer {
                    repair_per_second: 20,
                    cost_per_100_hp: 10,
                },
                ..unit("Engineer", UnitCategory::Infantry, Ground, 200, 4000, 60, 20, 4, None,
                    BuildingType::Barracks)
            },
        );
        units.insert(
            UnitType::Tank,
            unit("Grizzly Tank", UnitCategory::CombatVehicle, Ground, 200, 8000, 200, 35, 5,
                weapon(25, 6, 2000, 7, &[Ground]), BuildingType::WarFactory),
        );
        units.insert(
            UnitType::PrismTank,
            unit("Prism Tank", UnitCategory::CombatVehicle, Ground, 1200, 15000, 100, 35, 6,
                weapon(100, 10, 3000, 11, &[Ground]), BuildingType::WarFactory),
        );
        units.insert(
            UnitType::ApocalypseTank,
            unit("Apocalypse Tank", UnitCategory::CombatVehicle, Ground, 1750, 25000, 800, 45, 5,
                weapon(100, 7, 3000, 8, &[Ground, Air]), BuildingType::WarFactory),
        );
        units.insert(
            UnitType::ChronoMiner,
            UnitStats {
                role: RoleStats::Miner {
                    capacity: 500,
                    gather_amount: 25,
                },
                ..unit("Chrono Miner", UnitCategory::SupportVehicle, Ground, 1400, 10000, 150, 30, 4,
                    None, BuildingType::WarFactory)
            },
        );
        units.insert(
            UnitType::Rocketeer,
            unit("Rocketeer", UnitCategory::Aircraft, Air, 600, 7000, 75, 20, 7,
                weapon(20, 5, 1200, 6, &[Ground, Air]), BuildingType::Airfield),
        );
        units.insert(
            UnitType::FighterJet,
            unit("Fighter Jet", UnitCategory::Aircraft, Air, 500, 12000, 150, 30, 9,
                weapon(40, 7, 1800, 8, &[Ground, Air, Sea]), BuildingType::Airfield),
        );
        units.insert(
            UnitType::Kirov,
            unit("Kirov Airship", UnitCategory::Aircraft, Air, 2000, 30000, 2000, 60, 8,
                weapon(500, 1, 5000, 3, &[Ground, Sea]), BuildingType::Airfield),
        );
        units.insert(
            UnitType::Destroyer,
            unit("Destroyer", UnitCategory::Vessel, Sea, 800, 15000, 400, 45, 7,
                weapon(50, 8, 2500, 9, &[Ground, Sea]), BuildingType::NavalYard),
        );
        units.insert(
            UnitType::SeaScorpion,
            unit("Sea Scorpion", UnitCategory::Vessel, Sea, 600, 9000, 250, 30, 8,
                weapon(20, 7, 1500, 8, &[Air, Sea]), BuildingType::NavalYard),
        );

        let building = |name: &str, cost: i64, build_time_ms: u64, hp: i32, size: i32, vision: i32| {
            BuildingStats {
                name: name.to_string(),
                cost,
                build_time_ms,
                hp,
                size,
                vision,
                power_produced: 0,
                power_consumed: 0,
                placement: PlacementRule::Land,
                requires: Vec::new(),
                superweapon: None,
            }
        };
        let basic = vec![BuildingType::Barracks, BuildingType::PowerPlant];

        let mut buildings = BTreeMap::new();
        buildings.insert(
            BuildingType::Headquarters,
            BuildingStats {
                power_consumed: 10,
                ..building("HQ", 2000, 0, 2000, 2 * TILE, 10)
            },
        );
        buildings.insert(
            BuildingType::Refinery,
            BuildingStats {
                power_consumed: 10,
                ..building("Refinery", 600, 5000, 800, 60, 4)
            },
        );
        buildings.insert(
            BuildingType::PowerPlant,
            BuildingStats {
                power_produced: 50,
                ..building("Power Plant", 200, 2000, 500, TILE, 4)
            },
        );
        buildings.insert(
            BuildingType::Barracks,
            BuildingStats {
                power_consumed: 10,
                ..building("Barracks", 300, 4000, 600, 50, 5)
            },
        );
        buildings.insert(
            BuildingType::WarFactory,
            BuildingStats {
                power_consumed: 20,
                requires: basic.clone(),
                ..building("War Factory", 800, 10000, 1000, 60, 5)
            },
        );
        buildings.insert(
            BuildingType::Airfield,
            BuildingStats {
                power_consumed: 15,
                requires: basic.clone(),
                ..building("Airfield", 700, 8000, 800, 70, 6)
            },
        );
        buildings.insert(
            BuildingType::NavalYard,
            BuildingStats {
                power_consumed: 25,
                placement: PlacementRule::Coastal,
                requires: basic,
                ..building("Naval Yard", 1000, 12000, 1200, 2 * TILE, 6)
            },
        );
        buildings.insert(
            BuildingType::RepairBay,
            BuildingStats {
                power_consumed: 25,
                requires: vec![BuildingType::WarFactory],
                ..building("Repair Bay", 1000, 12000, 1000, 70, 5)
            },
        );
        buildings.insert(
            BuildingType::ChronoSphere,
            BuildingStats {
                power_consumed: 100,
                requires: vec![BuildingType::WarFactory, BuildingType::Airfield],
                superweapon: Some(SuperweaponStats {
                    kind: SuperweaponKind::Chronoshift,
                    cooldown_ms: 300_000,
                }),
                ..building("Chrono Sphere", 3000, 45000, 1000, 100, 5)
            },
        );
        buildings.insert(
            BuildingType::NuclearSilo,
            BuildingStats {
                power_consumed: 150,
                requires: vec![BuildingType::WarFactory],
                superweapon: Some(SuperweaponStats {
                    kind: SuperweaponKind::Nuke,
                    cooldown_ms: 420_000,
                }),
                ..building("Nuclear Missile Silo", 5000, 60000, 1500, 100, 5)
            },
        );

        Self { units, buildings }
    }

    /// Parse a catalog from RON and check that every type has an entry.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let rules: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "<rules>".to_string(),
            message: e.to_string(),
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Check that every unit and building type has stats.
    pub fn validate(&self) -> Result<()> {
        if let Some(missing) = UnitType::ALL.iter().find(|t| !self.units.contains_key(t)) {
            return Err(GameError::MissingRule(format!("{missing:?}")));
        }
        if let Some(missing) = BuildingType::ALL
            .iter()
            .find(|t| !self.buildings.contains_key(t))
        {
            return Err(GameError::MissingRule(format!("{missing:?}")));
        }
        Ok(())
    }

    /// Stats for a unit type.
    #[must_use]
    pub fn unit(&self, unit_type: UnitType) -> Option<&UnitStats> {
        self.units.get(&unit_type)
    }

    /// Stats for a building type.
    #[must_use]
    pub fn building(&self, building_type: BuildingType) -> Option<&BuildingStats> {
        self.buildings.get(&building_type)
    }

    /// Credit cost of any item.
    #[must_use]
    pub fn cost(&self, item: ItemType) -> Option<i64> {
        match item {
            ItemType::Unit(t) => self.unit(t).map(|s| s.cost),
            ItemType::Building(t) => self.building(t).map(|s| s.cost),
        }
    }

    /// Production or construction time of any item.
    #[must_use]
    pub fn build_time_ms(&self, item: ItemType) -> Option<u64> {
        match item {
            ItemType::Unit(t) => self.unit(t).map(|s| s.build_time_ms),
            ItemType::Building(t) => self.building(t).map(|s| s.build_time_ms),
        }
    }

    /// Building type that produces `item`. Every building comes from the HQ.
    #[must_use]
    pub fn producer(&self, item: ItemType) -> Option<BuildingType> {
        match item {
            ItemType::Unit(t) => self.unit(t).map(|s| s.produced_by),
            ItemType::Building(_) => Some(BuildingType::Headquarters),
        }
    }

    /// Buildings required before `item` may be ordered.
    #[must_use]
    pub fn requirements(&self, item: ItemType) -> &[BuildingType] {
        match item {
            ItemType::Unit(_) => &[],
            ItemType::Building(t) => match self.building(t) {
                Some(stats) => &stats.requires,
                None => &[],
            },
        }
    }

    /// Items the given building type can produce, in catalog order.
    #[must_use]
    pub fn producible_by(&self, producer: BuildingType) -> Vec<ItemType> {
        let mut items: Vec<ItemType> = UnitType::ALL
            .iter()
            .filter(|t| self.unit(**t).is_some_and(|s| s.produced_by == producer))
            .map(|t| ItemType::Unit(*t))
            .collect();
        if producer == BuildingType::Headquarters {
            items.extend(
                BuildingType::ALL
                    .iter()
                    .filter(|t| **t != BuildingType::Headquarters)
                    .map(|t| ItemType::Building(*t)),
            );
        }
        items
    }

    /// Which building type grants a superweapon.
    #[must_use]
    pub fn superweapon_building(&self, kind: SuperweaponKind) -> Option<BuildingType> {
        self.buildings
            .iter()
            .find(|(_, s)| s.superweapon.as_ref().is_some_and(|sw| sw.kind == kind))
            .map(|(t, _)| *t)
    }
}
