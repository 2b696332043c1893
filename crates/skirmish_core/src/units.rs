//! Per-tick unit behavior: the status state machine, movement, harvesting,
//! repairing and combat.
//!
//! Units are processed in ascending id order against the snapshot being
//! built, so a unit killed earlier in the tick no longer acts. The spatial
//! index is built once at the start of the pass.

use tracing::trace;

use crate::combat;
use crate::economy::nearest_refinery;
use crate::effects::EffectKind;
use crate::entity::{Entity, EntityId, MinerState, Unit, UnitRole, UnitStatus};
use crate::events::GameEvent;
use crate::math::{Fixed, Vec2Fixed};
use crate::pathfinding::find_path;
use crate::spatial::SpatialIndex;
use crate::state::GameState;

/// Run one tick of behavior for every unit.
pub fn update_units(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let index = SpatialIndex::build(state.entities(), state.config().spatial_cell());

    for id in state.entities().ids() {
        let Some(role) = state.entity(id).and_then(Entity::as_unit).map(|u| u.role) else {
            continue;
        };
        match role {
            UnitRole::Miner(_) => update_miner(state, id, events),
            UnitRole::Engineer(_) => update_engineer(state, id, events),
            UnitRole::Combat => update_combat(state, &index, id, events),
        }
        advance_along_path(state, id, events);
    }
}

/// Route for unit `id` from where it stands to `to`.
#[must_use]
pub fn plan_route(state: &GameState, id: EntityId, to: Vec2Fixed) -> Option<Vec<Vec2Fixed>> {
    let entity = state.entity(id)?;
    let unit = entity.as_unit()?;
    find_path(state.terrain(), entity.position, to, unit.domain)
}

fn unit_mut(state: &mut GameState, id: EntityId) -> Option<&mut Unit> {
    state.entity_mut(id).and_then(Entity::as_unit_mut)
}

fn unit_of(state: &GameState, id: EntityId) -> Option<(&Entity, &Unit)> {
    let entity = state.entity(id)?;
    entity.as_unit().map(|u| (entity, u))
}

fn stop(state: &mut GameState, id: EntityId) {
    if let Some(unit) = unit_mut(state, id) {
        unit.stop();
    }
}

// --- harvesting ---

fn update_miner(state: &mut GameState, id: EntityId, events: &mut Vec<GameEvent>) {
    let Some((status, miner)) = unit_of(state, id).and_then(|(_, u)| u.miner().map(|m| (u.status, *m))) else {
        return;
    };
    match status {
        UnitStatus::Gathering => gather(state, id, miner, events),
        UnitStatus::MovingToOre => {
            if miner.patch.and_then(|p| state.resources().get(p)).is_none() {
                stop(state, id);
            }
        }
        UnitStatus::ReturningToRefinery => {
            if !miner.refinery.is_some_and(|r| state.entities().contains(r)) {
                head_to_refinery(state, id);
            }
        }
        _ => {}
    }
}

fn gather(state: &mut GameState, id: EntityId, miner: MinerState, events: &mut Vec<GameEvent>) {
    let Some(patch) = miner.patch.filter(|p| state.resources().get(*p).is_some()) else {
        if miner.cargo > 0 {
            head_to_refinery(state, id);
        } else {
            stop(state, id);
        }
        return;
    };

    let room = (miner.capacity - miner.cargo).max(0);
    let (taken, depleted) = state.resources_mut().extract(patch, miner.gather_amount.min(room));
    if depleted {
        events.push(GameEvent::PatchDepleted { patch });
    }

    let Some(m) = unit_mut(state, id).and_then(Unit::miner_mut) else {
        return;
    };
    m.cargo += taken;
    if depleted {
        m.patch = None;
    }
    if m.is_full() || depleted {
        head_to_refinery(state, id);
    }
}

/// Path the miner to its owner's nearest powered refinery, or idle it.
pub(crate) fn head_to_refinery(state: &mut GameState, id: EntityId) {
    let Some((entity, unit)) = unit_of(state, id) else {
        return;
    };
    let (position, domain) = (entity.position, unit.domain);
    let route = nearest_refinery(state, entity.owner, position).and_then(|refinery| {
        let target = state.entity(refinery)?.position;
        find_path(state.terrain(), position, target, domain).map(|path| (refinery, path))
    });

    let Some(unit) = unit_mut(state, id) else {
        return;
    };
    match route {
        Some((refinery, path)) => {
            unit.status = UnitStatus::ReturningToRefinery;
            unit.path = path.into();
            if let Some(m) = unit.miner_mut() {
                m.refinery = Some(refinery);
            }
        }
        None => {
            trace!(unit = id, "no reachable refinery");
            unit.status = UnitStatus::Idle;
            unit.path.clear();
            if let Some(m) = unit.miner_mut() {
                m.refinery = None;
            }
        }
    }
}

/// Send a miner to its patch, or the nearest one if it has none.
pub(crate) fn head_to_ore(state: &mut GameState, id: EntityId) -> bool {
    let Some((entity, unit)) = unit_of(state, id) else {
        return false;
    };
    let Some(miner) = unit.miner() else {
        return false;
    };
    let patch = miner
        .patch
        .filter(|p| state.resources().get(*p).is_some())
        .or_else(|| state.resources().nearest(entity.position));
    let route = patch.and_then(|p| {
        let target = state.resources().get(p)?.position;
        find_path(state.terrain(), entity.position, target, unit.domain).map(|path| (p, path))
    });

    let Some(unit) = unit_mut(state, id) else {
        return false;
    };
    let Some((patch, path)) = route else {
        return false;
    };
    unit.status = UnitStatus::MovingToOre;
    unit.path = path.into();
    unit.target = None;
    if let Some(m) = unit.miner_mut() {
        m.patch = Some(patch);
        m.refinery = None;
    }
    true
}

fn deposit(state: &mut GameState, id: EntityId, events: &mut Vec<GameEvent>) {
    let Some((entity, unit)) = unit_of(state, id) else {
        return;
    };
    let Some(miner) = unit.miner().copied() else {
        return;
    };
    let owner = entity.owner;
    if !miner.refinery.is_some_and(|r| state.entities().contains(r)) {
        head_to_refinery(state, id);
        return;
    }

    if miner.cargo > 0 {
        if let Some(player) = state.player_mut(owner) {
            player.earn(i64::from(miner.cargo));
        }
        events.push(GameEvent::OreDeposited {
            player: owner,
            amount: i64::from(miner.cargo),
        });
    }
    if let Some(m) = unit_mut(state, id).and_then(Unit::miner_mut) {
        m.cargo = 0;
        m.refinery = None;
    }

    let patch_alive = miner.patch.and_then(|p| state.resources().get(p)).is_some();
    if !patch_alive || !head_to_ore(state, id) {
        if let Some(unit) = unit_mut(state, id) {
            unit.stop();
            if let Some(m) = unit.miner_mut() {
                m.patch = None;
            }
        }
    }
}

// --- repairing ---

fn update_engineer(state: &mut GameState, id: EntityId, events: &mut Vec<GameEvent>) {
    let Some((entity, unit)) = unit_of(state, id) else {
        return;
    };
    let Some(engineer) = unit.engineer().copied() else {
        return;
    };
    let status = unit.status;
    if !matches!(status, UnitStatus::MovingToRepair | UnitStatus::Repairing) {
        return;
    }
    let (owner, position) = (entity.owner, entity.position);

    let target = engineer
        .target
        .and_then(|t| state.entity(t))
        .filter(|t| t.owner == owner && t.is_damaged());
    let Some(target) = target else {
        stop(state, id);
        return;
    };
    if status == UnitStatus::MovingToRepair {
        return;
    }

    let (target_id, target_pos) = (target.id, target.position);
    let reach = target.size / Fixed::from_num(2) + state.config().tile();
    if position.distance(target_pos) > reach {
        match plan_route(state, id, target_pos) {
            Some(path) => {
                if let Some(unit) = unit_mut(state, id) {
                    unit.status = UnitStatus::MovingToRepair;
                    unit.path = path.into();
                }
            }
            None => stop(state, id),
        }
        return;
    }

    let per_tick = (i64::from(engineer.repair_per_second) * state.config().tick_ms as i64 / 1000).max(1) as i32;
    let amount = per_tick.min(target.max_hp - target.hp);
    let cost = Fixed::from_num(amount) * Fixed::from_num(engineer.cost_per_100_hp) / Fixed::from_num(100);

    let charged = match state.player_mut(owner).map(|p| p.spend_exact(cost)) {
        Some(Ok(())) => true,
        Some(Err(reason)) => {
            events.push(GameEvent::CommandRejected { player: owner, reason });
            false
        }
        None => false,
    };
    if !charged {
        stop(state, id);
        return;
    }

    let mut finished = false;
    if let Some(t) = state.entity_mut(target_id) {
        t.hp = (t.hp + amount).min(t.max_hp);
        finished = !t.is_damaged();
    }
    state.add_effect(EffectKind::RepairText {
        position: target_pos,
        amount,
    });
    events.push(GameEvent::Repaired {
        engineer: id,
        target: target_id,
        amount,
    });
    if finished {
        stop(state, id);
    }
}

// --- combat ---

fn update_combat(state: &mut GameState, index: &SpatialIndex, id: EntityId, events: &mut Vec<GameEvent>) {
    let Some((entity, unit)) = unit_of(state, id) else {
        return;
    };
    let Some(attack) = entity.attack else {
        return;
    };
    if matches!(unit.status, UnitStatus::Idle | UnitStatus::AttackMoving) {
        if let Some(target) = combat::acquire_target(state, index, id) {
            trace!(unit = id, target, "target acquired");
            if let Some(unit) = unit_mut(state, id) {
                unit.status = UnitStatus::Attacking;
                unit.target = Some(target);
                unit.path.clear();
            }
        }
    }

    let Some((entity, unit)) = unit_of(state, id) else {
        return;
    };
    if unit.status != UnitStatus::Attacking {
        return;
    }
    let Some(target_id) = unit.target.filter(|t| state.entities().contains(*t)) else {
        target_lost(state, id);
        return;
    };
    let target_pos = state.entity(target_id).map_or(entity.position, |t| t.position);

    let in_range = entity.position.distance_squared(target_pos) <= attack.range.saturating_mul(attack.range);
    if !in_range {
        if unit.path.len() < 2 {
            match plan_route(state, id, target_pos) {
                Some(path) => {
                    if let Some(unit) = unit_mut(state, id) {
                        unit.path = path.into();
                    }
                }
                None => {
                    trace!(unit = id, target = target_id, "target unreachable");
                    let tile = state.terrain().world_to_tile(target_pos);
                    target_lost(state, id);
                    if let Some(unit) = unit_mut(state, id) {
                        unit.unreachable = Some((target_id, tile));
                    }
                }
            }
        }
        return;
    }

    if !unit.path.is_empty() {
        if let Some(unit) = unit_mut(state, id) {
            unit.path.clear();
        }
    }
    if combat::fire(state, id, target_id, events) && !state.entities().contains(target_id) {
        target_lost(state, id);
    }
}

/// Resume an attack-move toward the recorded destination, or idle.
fn target_lost(state: &mut GameState, id: EntityId) {
    let destination = unit_of(state, id).and_then(|(_, u)| u.destination);
    let path = destination.and_then(|d| plan_route(state, id, d));
    let Some(unit) = unit_mut(state, id) else {
        return;
    };
    unit.target = None;
    match path {
        Some(path) => {
            unit.status = UnitStatus::AttackMoving;
            unit.path = path.into();
        }
        None => unit.stop(),
    }
}

// --- movement ---

fn advance_along_path(state: &mut GameState, id: EntityId, events: &mut Vec<GameEvent>) {
    let Some((entity, unit)) = unit_of(state, id) else {
        return;
    };
    let Some(next) = unit.path.front().copied() else {
        return;
    };
    let position = entity.position;
    let arrival = Fixed::from_num(state.config().arrival_radius);
    let speed = Fixed::from_num(state.config().move_speed);

    if position.within(next, arrival) {
        let done = unit_mut(state, id).is_some_and(|u| {
            u.path.pop_front();
            u.path.is_empty()
        });
        if done {
            arrive(state, id, events);
        }
    } else if let Some(e) = state.entity_mut(id) {
        e.position = position.step_toward(next, speed);
    }
}

fn arrive(state: &mut GameState, id: EntityId, events: &mut Vec<GameEvent>) {
    let Some(status) = unit_of(state, id).map(|(_, u)| u.status) else {
        return;
    };
    match status {
        UnitStatus::ReturningToRefinery => deposit(state, id, events),
        UnitStatus::Attacking => {}
        other => {
            if let Some(unit) = unit_mut(state, id) {
                unit.destination = None;
                unit.status = match other {
                    UnitStatus::MovingToOre => UnitStatus::Gathering,
                    UnitStatus::MovingToRepair => UnitStatus::Repairing,
                    _ => UnitStatus::Idle,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::fog::FogGrid;
    use crate::player::{Controller, PlayerId};
    use crate::rules::{BuildingType, Rules, UnitType};
    use crate::commands::{apply_command, Command};
    use crate::terrain::{TerrainGrid, TerrainType, TileCoord};
    use std::collections::BTreeMap;

    const P1: PlayerId = PlayerId(1);
    const P2: PlayerId = PlayerId(2);

    fn state() -> GameState {
        let mut s = GameState::new(
            SimConfig::default(),
            Rules::stock(),
            TerrainGrid::new(40, 40, Fixed::from_num(40)),
        );
        s.add_player(P1, Controller::Human, 1000);
        s.add_player(P2, Controller::Human, 1000);
        s
    }

    fn reveal_all(s: &mut GameState) {
        let center = TileCoord::new(s.terrain().width() as i32 / 2, s.terrain().height() as i32 / 2);
        let mut fog = BTreeMap::new();
        for id in s.players().keys() {
            fog.insert(*id, FogGrid::new(s.terrain()).recompute([(center, 60)]));
        }
        s.set_fog(fog);
    }

    fn status(s: &GameState, id: EntityId) -> UnitStatus {
        s.entity(id).and_then(Entity::status).unwrap()
    }

    #[test]
    fn test_miner_fills_after_twenty_ticks_then_returns() {
        let mut s = state();
        s.spawn_building(P1, BuildingType::Refinery, Vec2Fixed::from_ints(100, 100), false).unwrap();
        let patch = s.add_resource_patch(Vec2Fixed::from_ints(620, 620), 10_000);
        let miner = s.spawn_unit(P1, UnitType::ChronoMiner, Vec2Fixed::from_ints(620, 620)).unwrap();
        {
            let u = s.entity_mut(miner).unwrap().as_unit_mut().unwrap();
            u.status = UnitStatus::Gathering;
            u.miner_mut().unwrap().patch = Some(patch);
        }

        let mut events = Vec::new();
        for _ in 0..19 {
            update_units(&mut s, &mut events);
            assert_eq!(status(&s, miner), UnitStatus::Gathering);
        }
        update_units(&mut s, &mut events);
        let unit = s.entity(miner).unwrap().as_unit().unwrap();
        assert_eq!(unit.miner().unwrap().cargo, 500);
        assert_eq!(unit.status, UnitStatus::ReturningToRefinery);
        assert!(!unit.path.is_empty());
        assert_eq!(s.resources().get(patch).unwrap().amount, 9_500);
    }

    #[test]
    fn test_miner_deposits_and_heads_back() {
        let mut s = state();
        s.spawn_building(P1, BuildingType::Refinery, Vec2Fixed::from_ints(100, 100), false).unwrap();
        let patch = s.add_resource_patch(Vec2Fixed::from_ints(260, 100), 10_000);
        let miner = s.spawn_unit(P1, UnitType::ChronoMiner, Vec2Fixed::from_ints(260, 100)).unwrap();
        {
            let u = s.entity_mut(miner).unwrap().as_unit_mut().unwrap();
            u.status = UnitStatus::Gathering;
            let m = u.miner_mut().unwrap();
            m.patch = Some(patch);
            m.cargo = 475;
        }

        let mut events = Vec::new();
        for _ in 0..200 {
            update_units(&mut s, &mut events);
            if events.iter().any(|e| matches!(e, GameEvent::OreDeposited { .. })) {
                break;
            }
        }
        assert!(events.contains(&GameEvent::OreDeposited { player: P1, amount: 500 }));
        assert_eq!(s.player(P1).unwrap().whole_credits(), 1500);
        assert_eq!(status(&s, miner), UnitStatus::MovingToOre);
    }

    #[test]
    fn test_miner_without_refinery_idles() {
        let mut s = state();
        let patch = s.add_resource_patch(Vec2Fixed::from_ints(260, 100), 20);
        let miner = s.spawn_unit(P1, UnitType::ChronoMiner, Vec2Fixed::from_ints(260, 100)).unwrap();
        {
            let u = s.entity_mut(miner).unwrap().as_unit_mut().unwrap();
            u.status = UnitStatus::Gathering;
            u.miner_mut().unwrap().patch = Some(patch);
        }
        let mut events = Vec::new();
        update_units(&mut s, &mut events);
        assert!(s.resources().get(patch).is_none());
        assert!(events.contains(&GameEvent::PatchDepleted { patch }));
        assert_eq!(status(&s, miner), UnitStatus::Idle);
        assert_eq!(s.entity(miner).unwrap().as_unit().unwrap().miner().unwrap().cargo, 20);
    }

    #[test]
    fn test_unit_walks_path_and_idles() {
        let mut s = state();
        let tank = s.spawn_unit(P1, UnitType::Tank, Vec2Fixed::from_ints(20, 20)).unwrap();
        let path = plan_route(&s, tank, Vec2Fixed::from_ints(220, 20)).unwrap();
        {
            let u = s.entity_mut(tank).unwrap().as_unit_mut().unwrap();
            u.status = UnitStatus::Moving;
            u.path = path.into();
        }
        let mut events = Vec::new();
        for _ in 0..200 {
            update_units(&mut s, &mut events);
        }
        let e = s.entity(tank).unwrap();
        assert_eq!(e.status(), Some(UnitStatus::Idle));
        assert!(e.position.within(Vec2Fixed::from_ints(220, 20), Fixed::from_num(20)));
    }

    #[test]
    fn test_idle_unit_acquires_visible_enemy() {
        let mut s = state();
        let tank = s.spawn_unit(P1, UnitType::Tank, Vec2Fixed::from_ints(400, 400)).unwrap();
        let enemy = s.spawn_unit(P2, UnitType::Rifleman, Vec2Fixed::from_ints(500, 400)).unwrap();
        let mut events = Vec::new();

        update_units(&mut s, &mut events);
        assert_eq!(status(&s, tank), UnitStatus::Idle, "fogged enemies are not acquired");

        reveal_all(&mut s);
        update_units(&mut s, &mut events);
        let unit = s.entity(tank).unwrap().as_unit().unwrap();
        assert_eq!(unit.status, UnitStatus::Attacking);
        assert_eq!(unit.target, Some(enemy));
        assert!(events.iter().any(|e| matches!(e, GameEvent::AttackFired { .. })));
    }

    #[test]
    fn test_enemy_across_river_is_not_rerouted_every_tick() {
        let mut terrain = TerrainGrid::new(24, 20, Fixed::from_num(40));
        for y in 0..20 {
            for x in 12..14 {
                terrain.set(TileCoord::new(x, y), TerrainType::DeepWater);
            }
        }
        let mut s = GameState::new(SimConfig::default(), Rules::stock(), terrain);
        s.add_player(P1, Controller::Human, 1000);
        s.add_player(P2, Controller::Human, 1000);
        reveal_all(&mut s);
        let tank_at = s.terrain().tile_center(TileCoord::new(9, 10));
        let tank = s.spawn_unit(P1, UnitType::Tank, tank_at).unwrap();
        let enemy_tile = TileCoord::new(15, 12);
        let enemy_at = s.terrain().tile_center(enemy_tile);
        let enemy = s.spawn_unit(P2, UnitType::Engineer, enemy_at).unwrap();

        let mut events = Vec::new();
        update_units(&mut s, &mut events);
        let unit = s.entity(tank).unwrap().as_unit().unwrap();
        assert_eq!(unit.status, UnitStatus::Idle);
        assert_eq!(unit.unreachable, Some((enemy, enemy_tile)));

        for _ in 0..50 {
            update_units(&mut s, &mut events);
            let unit = s.entity(tank).unwrap().as_unit().unwrap();
            assert_eq!(unit.status, UnitStatus::Idle, "same target picked up again");
            assert_eq!(unit.target, None);
        }
        assert_eq!(s.entity(tank).unwrap().position, tank_at);

        // Once it wades over to the tank's bank it is fair game again.
        s.entity_mut(enemy).unwrap().position = s.terrain().tile_center(TileCoord::new(11, 12));
        update_units(&mut s, &mut events);
        let unit = s.entity(tank).unwrap().as_unit().unwrap();
        assert_eq!(unit.status, UnitStatus::Attacking);
        assert_eq!(unit.target, Some(enemy));
    }

    #[test]
    fn test_new_order_forgets_unreachable_target() {
        let mut s = state();
        let tank = s.spawn_unit(P1, UnitType::Tank, Vec2Fixed::from_ints(400, 400)).unwrap();
        s.entity_mut(tank).unwrap().as_unit_mut().unwrap().unreachable = Some((99, TileCoord::new(1, 1)));
        let order = Command::Move {
            units: vec![tank],
            target: Vec2Fixed::from_ints(600, 400),
        };
        let s = apply_command(&s, P1, &order).unwrap();
        assert_eq!(s.entity(tank).unwrap().as_unit().unwrap().unreachable, None);
    }

    #[test]
    fn test_attacker_returns_to_idle_after_kill() {
        let mut s = state();
        reveal_all(&mut s);
        let tank = s.spawn_unit(P1, UnitType::Tank, Vec2Fixed::from_ints(400, 400)).unwrap();
        let enemy = s.spawn_unit(P2, UnitType::Rifleman, Vec2Fixed::from_ints(500, 400)).unwrap();
        s.entity_mut(enemy).unwrap().hp = 10;
        let mut events = Vec::new();
        update_units(&mut s, &mut events);
        assert!(s.entity(enemy).is_none());
        assert_eq!(status(&s, tank), UnitStatus::Idle);
    }

    #[test]
    fn test_engineer_repairs_and_bills() {
        let mut s = state();
        let hq = s
            .spawn_building(P1, BuildingType::Headquarters, Vec2Fixed::from_ints(200, 200), false)
            .unwrap();
        s.entity_mut(hq).unwrap().hp = 1990;
        let eng = s.spawn_unit(P1, UnitType::Engineer, Vec2Fixed::from_ints(240, 200)).unwrap();
        {
            let u = s.entity_mut(eng).unwrap().as_unit_mut().unwrap();
            u.status = UnitStatus::Repairing;
            u.engineer_mut().unwrap().target = Some(hq);
        }
        let mut events = Vec::new();
        for _ in 0..5 {
            update_units(&mut s, &mut events);
        }
        assert_eq!(s.entity(hq).unwrap().hp, 2000);
        assert_eq!(status(&s, eng), UnitStatus::Idle);
        // 10 hp at 10 credits per 100 hp.
        let spent = Fixed::from_num(1000) - s.player(P1).unwrap().credits;
        assert!((spent - Fixed::ONE).abs() < Fixed::from_num(0.001));
    }

    #[test]
    fn test_engineer_stops_when_broke() {
        let mut s = state();
        s.player_mut(P1).unwrap().credits = Fixed::ZERO;
        let hq = s
            .spawn_building(P1, BuildingType::Headquarters, Vec2Fixed::from_ints(200, 200), false)
            .unwrap();
        s.entity_mut(hq).unwrap().hp = 1000;
        let eng = s.spawn_unit(P1, UnitType::Engineer, Vec2Fixed::from_ints(240, 200)).unwrap();
        {
            let u = s.entity_mut(eng).unwrap().as_unit_mut().unwrap();
            u.status = UnitStatus::Repairing;
            u.engineer_mut().unwrap().target = Some(hq);
        }
        let mut events = Vec::new();
        update_units(&mut s, &mut events);
        assert_eq!(s.entity(hq).unwrap().hp, 1000);
        assert_eq!(status(&s, eng), UnitStatus::Idle);
        assert!(matches!(events.as_slice(), [GameEvent::CommandRejected { .. }]));
    }
}
