//! Rule-based planner for AI opponents.
//!
//! Rules are evaluated in a fixed order and the first one that fires wins:
//! base defense, then repair, then the personality's build order. When
//! nothing fires the planner idles.

use std::collections::BTreeSet;

use crate::config::Personality;
use crate::entity::UnitStatus;
use crate::math::{Fixed, Vec2Fixed};
use crate::player::PlayerId;
use crate::rules::{BuildingType, ItemType, SuperweaponKind, UnitType};

use super::action::{AiAction, AiActionKind, AttackTarget};
use super::observation::{Observation, SightingKind};
use super::provider::{DecisionProvider, ProviderError};

/// Extra power headroom an economic player keeps.
const ECONOMIC_POWER_MARGIN: i32 = 150;

/// Deterministic heuristic decision maker for one personality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeuristicPlanner {
    personality: Personality,
}

impl HeuristicPlanner {
    /// Planner for a play style.
    #[must_use]
    pub const fn new(personality: Personality) -> Self {
        Self { personality }
    }

    /// The play style.
    #[must_use]
    pub const fn personality(&self) -> Personality {
        self.personality
    }

    /// Army size at which this personality attacks, scaled from the
    /// balanced difficulty threshold.
    #[must_use]
    pub fn attack_threshold(&self, base: u32) -> usize {
        let scaled = match self.personality {
            Personality::Aggressive => base * 5 / 8,
            Personality::Balanced => base * 10 / 8,
            Personality::Economic => base * 15 / 8,
        };
        scaled.max(1) as usize
    }

    /// Pick exactly one action.
    #[must_use]
    pub fn plan(&self, obs: &Observation) -> AiAction {
        defend(obs)
            .or_else(|| repair(obs))
            .or_else(|| match self.personality {
                Personality::Aggressive => self.aggressive(obs),
                Personality::Economic => self.economic(obs),
                Personality::Balanced => self.balanced(obs),
            })
            .unwrap_or_else(|| AiAction::idle(obs.player).because("nothing to do"))
    }

    fn aggressive(&self, obs: &Observation) -> Option<AiAction> {
        let p = obs.player;
        if combat_count(obs) >= self.attack_threshold(obs.aggression_threshold) {
            if let Some(a) = attack(obs, "rush") {
                return Some(a);
            }
        }
        if obs.power.is_low() && can_build(obs, BuildingType::PowerPlant) {
            return Some(build(p, BuildingType::PowerPlant, "power for the war machine"));
        }
        if !obs.has(BuildingType::Barracks) && can_build(obs, BuildingType::Barracks) {
            return Some(build(p, BuildingType::Barracks, "boots on the ground"));
        }
        if !obs.has(BuildingType::WarFactory) && can_build(obs, BuildingType::WarFactory) {
            return Some(build(p, BuildingType::WarFactory, "need a factory"));
        }
        if let Some(a) = gather(obs) {
            return Some(a);
        }
        if miner_count(obs) < 2 && can_train(obs, UnitType::ChronoMiner, obs.queue_capacity) {
            return Some(train(p, UnitType::ChronoMiner, "money for soldiers"));
        }
        if can_train(obs, UnitType::Rifleman, obs.queue_capacity) {
            return Some(train(p, UnitType::Rifleman, "more"));
        }
        if !obs.has(BuildingType::Refinery) && can_build(obs, BuildingType::Refinery) {
            return Some(build(p, BuildingType::Refinery, "somewhere to drop ore"));
        }
        None
    }

    fn economic(&self, obs: &Observation) -> Option<AiAction> {
        let p = obs.player;
        if let Some(a) = nuke(obs) {
            return Some(a);
        }
        let short = obs.power.consumed + ECONOMIC_POWER_MARGIN > obs.power.produced;
        if short && can_build(obs, BuildingType::PowerPlant) {
            return Some(build(p, BuildingType::PowerPlant, "solid power grid"));
        }
        if obs.buildings_of(BuildingType::Refinery).count() < 2 && can_build(obs, BuildingType::Refinery) {
            return Some(build(p, BuildingType::Refinery, "expand the economy"));
        }
        if !obs.has(BuildingType::WarFactory) && can_build(obs, BuildingType::WarFactory) {
            return Some(build(p, BuildingType::WarFactory, "vehicle production"));
        }
        if let Some(a) = gather(obs) {
            return Some(a);
        }
        if miner_count(obs) < 4 && can_train(obs, UnitType::ChronoMiner, obs.queue_capacity) {
            return Some(train(p, UnitType::ChronoMiner, "the economy must grow"));
        }
        if !obs.has(BuildingType::Barracks) && can_build(obs, BuildingType::Barracks) {
            return Some(build(p, BuildingType::Barracks, "basic military"));
        }
        if !obs.has(BuildingType::NuclearSilo) && can_build(obs, BuildingType::NuclearSilo) {
            return Some(build(p, BuildingType::NuclearSilo, "ultimate power"));
        }
        if combat_count(obs) >= self.attack_threshold(obs.aggression_threshold) {
            if let Some(a) = attack(obs, "overwhelming force") {
                return Some(a);
            }
        }
        if can_train(obs, UnitType::ApocalypseTank, 2) {
            return Some(train(p, UnitType::ApocalypseTank, "heavy armor"));
        }
        if can_train(obs, UnitType::Tank, obs.queue_capacity) {
            return Some(train(p, UnitType::Tank, "a solid tank"));
        }
        None
    }

    fn balanced(&self, obs: &Observation) -> Option<AiAction> {
        let p = obs.player;
        if let Some(a) = nuke(obs) {
            return Some(a);
        }
        if obs.power.is_low() && can_build(obs, BuildingType::PowerPlant) {
            return Some(build(p, BuildingType::PowerPlant, "need power"));
        }
        if !obs.has(BuildingType::Refinery) && can_build(obs, BuildingType::Refinery) {
            return Some(build(p, BuildingType::Refinery, "economy first"));
        }
        if obs.has(BuildingType::Refinery) && !obs.has(BuildingType::WarFactory) && can_build(obs, BuildingType::WarFactory) {
            return Some(build(p, BuildingType::WarFactory, "vehicle production"));
        }
        if let Some(a) = gather(obs) {
            return Some(a);
        }
        if miner_count(obs) < 3 && can_train(obs, UnitType::ChronoMiner, obs.queue_capacity) {
            return Some(train(p, UnitType::ChronoMiner, "healthy economy"));
        }
        if !obs.has(BuildingType::Barracks) && can_build(obs, BuildingType::Barracks) {
            return Some(build(p, BuildingType::Barracks, "infantry"));
        }
        if !obs.has(BuildingType::NuclearSilo) && can_build(obs, BuildingType::NuclearSilo) {
            return Some(build(p, BuildingType::NuclearSilo, "doomsday protocol"));
        }
        if combat_count(obs) >= self.attack_threshold(obs.aggression_threshold) {
            if let Some(a) = attack(obs, "army ready") {
                return Some(a);
            }
        }
        if obs.units_of(UnitType::Tank).count() < 5 && can_train(obs, UnitType::Tank, 3) {
            return Some(train(p, UnitType::Tank, "new tank"));
        }
        if can_train(obs, UnitType::Rifleman, obs.queue_capacity) {
            return Some(train(p, UnitType::Rifleman, "reinforcements"));
        }
        None
    }
}

impl DecisionProvider for HeuristicPlanner {
    fn decide(&mut self, observation: &Observation) -> Result<AiAction, ProviderError> {
        Ok(self.plan(observation))
    }
}

fn build(player: PlayerId, building_type: BuildingType, why: &str) -> AiAction {
    AiAction::new(
        player,
        AiActionKind::Build {
            building_type,
            placement: None,
        },
    )
    .because(why)
}

fn train(player: PlayerId, unit_type: UnitType, why: &str) -> AiAction {
    AiAction::new(player, AiActionKind::Train { unit_type }).because(why)
}

fn combat_count(obs: &Observation) -> usize {
    obs.units.iter().filter(|u| u.is_combat()).count()
}

fn miner_count(obs: &Observation) -> usize {
    obs.units_of(UnitType::ChronoMiner).count()
}

fn can_build(obs: &Observation, building_type: BuildingType) -> bool {
    obs.option(ItemType::Building(building_type))
        .is_some_and(|o| o.cost <= obs.credits)
}

/// Affordable, and some producer has fewer than `queue_limit` items queued.
fn can_train(obs: &Observation, unit_type: UnitType, queue_limit: usize) -> bool {
    let limit = queue_limit.min(obs.queue_capacity);
    obs.option(ItemType::Unit(unit_type)).is_some_and(|o| {
        o.cost <= obs.credits && obs.buildings_of(o.producer).any(|b| b.accepts_orders(limit))
    })
}

/// Idle combat units engage the nearest armed enemy unit inside base territory.
fn defend(obs: &Observation) -> Option<AiAction> {
    let radius = Fixed::from_num(obs.defense_radius);
    let base = obs.base_position().or_else(|| obs.buildings.first().map(|b| b.position))?;
    let threat = obs
        .enemies
        .iter()
        .filter(|e| e.armed && matches!(e.kind, SightingKind::Unit(_)))
        .filter(|e| obs.buildings.iter().any(|b| b.position.within(e.position, radius)))
        .min_by_key(|e| (e.position.distance_squared(base), e.id))?;
    let defenders: Vec<_> = obs
        .units
        .iter()
        .filter(|u| u.is_combat() && u.status == UnitStatus::Idle)
        .map(|u| u.id)
        .collect();
    if defenders.is_empty() {
        return None;
    }
    Some(
        AiAction::new(
            obs.player,
            AiActionKind::Attack {
                units: defenders,
                target: AttackTarget::Entity(threat.id),
            },
        )
        .because("defending the base"),
    )
}

/// Send an idle engineer to the most damaged finished building, or train one
/// if there is none at all.
fn repair(obs: &Observation) -> Option<AiAction> {
    let threshold = obs.repair_threshold_percent;
    let target = obs
        .buildings
        .iter()
        .filter(|b| !b.constructing && b.hp * 100 < b.max_hp * threshold)
        .min_by_key(|b| (i64::from(b.hp) * 1000 / i64::from(b.max_hp.max(1)), b.id))?;

    let mut engineers = obs.units_of(UnitType::Engineer).peekable();
    if engineers.peek().is_none() {
        return can_train(obs, UnitType::Engineer, obs.queue_capacity)
            .then(|| train(obs.player, UnitType::Engineer, "someone to fix the base"));
    }
    let already_repairing = obs
        .units_of(UnitType::Engineer)
        .any(|u| matches!(u.status, UnitStatus::MovingToRepair | UnitStatus::Repairing));
    if already_repairing {
        return None;
    }
    let engineer = engineers.find(|u| u.status == UnitStatus::Idle)?;
    Some(
        AiAction::new(
            obs.player,
            AiActionKind::Repair {
                units: vec![engineer.id],
                target: target.id,
            },
        )
        .because("repairing damage"),
    )
}

/// First idle miner goes to the nearest patch nobody else is assigned to.
fn gather(obs: &Observation) -> Option<AiAction> {
    let miner = obs
        .units_of(UnitType::ChronoMiner)
        .find(|u| u.status == UnitStatus::Idle)?;
    let assigned: BTreeSet<_> = obs.units_of(UnitType::ChronoMiner).filter_map(|u| u.patch).collect();
    let patch = obs
        .patches
        .iter()
        .filter(|p| !assigned.contains(&p.id))
        .min_by_key(|p| (p.position.distance_squared(miner.position), p.id))?;
    Some(
        AiAction::new(
            obs.player,
            AiActionKind::Gather {
                units: vec![miner.id],
                patch: patch.id,
            },
        )
        .because("mining"),
    )
}

/// Where to send the army: a seen enemy HQ, else the nearest seen enemy
/// building, else an enemy start position.
fn army_target(obs: &Observation) -> Option<AttackTarget> {
    let base = obs.base_position().unwrap_or(Vec2Fixed::ZERO);
    let hq = obs
        .enemies
        .iter()
        .find(|e| e.kind == SightingKind::Building(BuildingType::Headquarters));
    let building = || {
        obs.enemies
            .iter()
            .filter(|e| matches!(e.kind, SightingKind::Building(_)))
            .min_by_key(|e| (e.position.distance_squared(base), e.id))
    };
    hq.or_else(building)
        .map(|e| AttackTarget::Entity(e.id))
        .or_else(|| {
            obs.enemy_starts
                .iter()
                .min_by_key(|p| p.distance_squared(base))
                .map(|p| AttackTarget::Position(*p))
        })
}

fn attack(obs: &Observation, why: &str) -> Option<AiAction> {
    let target = army_target(obs)?;
    let units = obs.units.iter().filter(|u| u.is_combat()).map(|u| u.id).collect();
    Some(AiAction::new(obs.player, AiActionKind::Attack { units, target }).because(why))
}

fn nuke(obs: &Observation) -> Option<AiAction> {
    if !obs.superweapon_ready(SuperweaponKind::Nuke) {
        return None;
    }
    let position = match army_target(obs)? {
        AttackTarget::Entity(id) => obs.enemies.iter().find(|e| e.id == id)?.position,
        AttackTarget::Position(p) => p,
    };
    Some(
        AiAction::new(
            obs.player,
            AiActionKind::LaunchSuperweapon {
                kind: SuperweaponKind::Nuke,
                target: obs.tile_of(position),
                units: Vec::new(),
            },
        )
        .because("nuclear launch detected"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::observation::{OwnBuilding, OwnUnit, PatchSighting, ProductionOption, Sighting};
    use crate::economy::ResourceId;
    use crate::player::PowerBalance;
    use crate::terrain::UnitDomain;

    const AI: PlayerId = PlayerId(2);

    fn obs() -> Observation {
        Observation {
            player: AI,
            tick: 0,
            credits: 1000,
            power: PowerBalance {
                produced: 100,
                consumed: 10,
            },
            aggression_threshold: 8,
            tile_size: 40,
            defense_radius: 320,
            repair_threshold_percent: 75,
            queue_capacity: 5,
            units: Vec::new(),
            buildings: vec![building(1, BuildingType::Headquarters, 400, 400)],
            enemies: Vec::new(),
            patches: Vec::new(),
            options: Vec::new(),
            superweapons: Vec::new(),
            enemy_starts: vec![Vec2Fixed::from_ints(2800, 2000)],
        }
    }

    fn building(id: u64, building_type: BuildingType, x: i32, y: i32) -> OwnBuilding {
        OwnBuilding {
            id,
            building_type,
            position: Vec2Fixed::from_ints(x, y),
            hp: 500,
            max_hp: 500,
            constructing: false,
            powered: true,
            queue_len: 0,
        }
    }

    fn unit(id: u64, unit_type: UnitType, armed: bool) -> OwnUnit {
        OwnUnit {
            id,
            unit_type,
            position: Vec2Fixed::from_ints(500, 500),
            hp: 100,
            max_hp: 100,
            status: UnitStatus::Idle,
            domain: UnitDomain::Ground,
            armed,
            cargo: 0,
            patch: None,
        }
    }

    fn option(item: ItemType, cost: i64, producer: BuildingType) -> ProductionOption {
        ProductionOption { item, cost, producer }
    }

    fn enemy_tank(id: u64, x: i32, y: i32) -> Sighting {
        Sighting {
            id,
            owner: PlayerId(1),
            kind: SightingKind::Unit(UnitType::Tank),
            position: Vec2Fixed::from_ints(x, y),
            hp: 200,
            armed: true,
        }
    }

    #[test]
    fn test_thresholds_scale_by_personality() {
        assert_eq!(HeuristicPlanner::new(Personality::Aggressive).attack_threshold(8), 5);
        assert_eq!(HeuristicPlanner::new(Personality::Balanced).attack_threshold(8), 10);
        assert_eq!(HeuristicPlanner::new(Personality::Economic).attack_threshold(8), 15);
        assert_eq!(HeuristicPlanner::new(Personality::Aggressive).attack_threshold(1), 1);
    }

    #[test]
    fn test_nothing_to_do_is_idle() {
        let action = HeuristicPlanner::default().plan(&obs());
        assert!(action.is_idle());
    }

    #[test]
    fn test_defense_beats_everything() {
        let mut o = obs();
        o.power.consumed = 500;
        o.options.push(option(ItemType::Building(BuildingType::PowerPlant), 200, BuildingType::Headquarters));
        o.units.push(unit(10, UnitType::Tank, true));
        o.units.push(unit(11, UnitType::ChronoMiner, false));
        o.enemies.push(enemy_tank(50, 2000, 2000));
        o.enemies.push(enemy_tank(51, 600, 400));

        let action = HeuristicPlanner::new(Personality::Economic).plan(&o);
        assert_eq!(
            action.kind,
            AiActionKind::Attack {
                units: vec![10],
                target: AttackTarget::Entity(51),
            }
        );
    }

    #[test]
    fn test_repair_dispatches_idle_engineer() {
        let mut o = obs();
        o.buildings[0].hp = 100;
        o.units.push(unit(20, UnitType::Engineer, false));
        let action = HeuristicPlanner::default().plan(&o);
        assert_eq!(
            action.kind,
            AiActionKind::Repair {
                units: vec![20],
                target: 1,
            }
        );
    }

    #[test]
    fn test_low_power_builds_power_plant() {
        let mut o = obs();
        o.power = PowerBalance {
            produced: 0,
            consumed: 10,
        };
        o.options.push(option(ItemType::Building(BuildingType::PowerPlant), 200, BuildingType::Headquarters));
        let action = HeuristicPlanner::new(Personality::Balanced).plan(&o);
        assert_eq!(
            action.kind,
            AiActionKind::Build {
                building_type: BuildingType::PowerPlant,
                placement: None,
            }
        );
    }

    #[test]
    fn test_idle_miner_takes_unassigned_patch() {
        let mut o = obs();
        let mut busy = unit(30, UnitType::ChronoMiner, false);
        busy.status = UnitStatus::Gathering;
        busy.patch = Some(ResourceId(1));
        o.units.push(busy);
        o.units.push(unit(31, UnitType::ChronoMiner, false));
        o.buildings.push(building(2, BuildingType::Refinery, 600, 400));
        o.patches = vec![
            PatchSighting {
                id: ResourceId(1),
                position: Vec2Fixed::from_ints(520, 520),
                amount: 4000,
            },
            PatchSighting {
                id: ResourceId(2),
                position: Vec2Fixed::from_ints(900, 900),
                amount: 4000,
            },
        ];
        let action = HeuristicPlanner::new(Personality::Aggressive).plan(&o);
        assert_eq!(
            action.kind,
            AiActionKind::Gather {
                units: vec![31],
                patch: ResourceId(2),
            }
        );
    }

    #[test]
    fn test_aggressive_attacks_start_position_when_nothing_seen() {
        let mut o = obs();
        o.units = (0..5).map(|i| unit(100 + i, UnitType::Rifleman, true)).collect();
        let action = HeuristicPlanner::new(Personality::Aggressive).plan(&o);
        assert_eq!(
            action.kind,
            AiActionKind::Attack {
                units: (100..105).collect(),
                target: AttackTarget::Position(Vec2Fixed::from_ints(2800, 2000)),
            }
        );
        let balanced = HeuristicPlanner::new(Personality::Balanced).plan(&o);
        assert!(!matches!(balanced.kind, AiActionKind::Attack { .. }));
    }

    #[test]
    fn test_ready_nuke_targets_seen_hq() {
        let mut o = obs();
        o.superweapons.push((SuperweaponKind::Nuke, true));
        o.enemies.push(Sighting {
            id: 77,
            owner: PlayerId(1),
            kind: SightingKind::Building(BuildingType::Headquarters),
            position: Vec2Fixed::from_ints(1220, 860),
            hp: 2000,
            armed: false,
        });
        let action = HeuristicPlanner::new(Personality::Balanced).plan(&o);
        assert_eq!(
            action.kind,
            AiActionKind::LaunchSuperweapon {
                kind: SuperweaponKind::Nuke,
                target: crate::terrain::TileCoord::new(30, 21),
                units: Vec::new(),
            }
        );
    }

    #[test]
    fn test_train_respects_queue_limit() {
        let mut o = obs();
        let mut factory = building(3, BuildingType::WarFactory, 700, 400);
        factory.queue_len = 3;
        o.buildings.push(factory);
        o.buildings.push(building(4, BuildingType::Refinery, 300, 400));
        o.units = (0..3).map(|i| unit(200 + i, UnitType::ChronoMiner, false)).collect();
        for u in &mut o.units {
            u.status = UnitStatus::Gathering;
        }
        o.options.push(option(ItemType::Unit(UnitType::Tank), 200, BuildingType::WarFactory));
        o.options.push(option(ItemType::Unit(UnitType::Rifleman), 50, BuildingType::Barracks));
        // The factory's queue is at the balanced tank limit and there is no barracks.
        assert!(HeuristicPlanner::new(Personality::Balanced).plan(&o).is_idle());
    }
}
