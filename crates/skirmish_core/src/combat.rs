//! Target acquisition, direct fire and area damage.
//!
//! Damage is applied to the snapshot being built, so later units in the
//! same tick see earlier kills. An entity is removed the moment its hit
//! points reach zero.

use tracing::debug;

use crate::effects::EffectKind;
use crate::entity::{Entity, EntityId};
use crate::events::GameEvent;
use crate::math::{Fixed, Vec2Fixed};
use crate::player::PlayerId;
use crate::spatial::SpatialIndex;
use crate::state::GameState;

/// Whether `attacker` may shoot at `target`: different owner and a weapon
/// that covers the target's domain.
#[must_use]
pub fn can_target(attacker: &Entity, target: &Entity) -> bool {
    attacker.owner != target.owner
        && attacker
            .attack
            .is_some_and(|a| a.targets.contains(target.domain()))
}

/// Nearest enemy within the attacker's aggro range on a tile its owner can
/// currently see. Ties go to the lower id. An enemy the attacker already
/// failed to reach is skipped while it stays on the same tile.
#[must_use]
pub fn acquire_target(state: &GameState, index: &SpatialIndex, attacker_id: EntityId) -> Option<EntityId> {
    let attacker = state.entity(attacker_id)?;
    let attack = attacker.attack?;
    let terrain = state.terrain();
    let unreachable = attacker.as_unit().and_then(|u| u.unreachable);

    index
        .query_radius(attacker.position, attack.aggro_range)
        .into_iter()
        .filter_map(|id| state.entity(id))
        .filter(|candidate| can_target(attacker, candidate))
        .filter(|candidate| state.is_visible_to(attacker.owner, candidate.tile(terrain)))
        .filter(|candidate| attacker.position.within(candidate.position, attack.aggro_range))
        .filter(|candidate| unreachable != Some((candidate.id, candidate.tile(terrain))))
        .min_by_key(|candidate| (candidate.position.distance_squared(attacker.position), candidate.id))
        .map(|candidate| candidate.id)
}

/// Fire `attacker`'s weapon at `target` if it has cooled down.
///
/// Returns `true` when a shot was fired.
pub fn fire(state: &mut GameState, attacker_id: EntityId, target_id: EntityId, events: &mut Vec<GameEvent>) -> bool {
    let now = state.now_ms();
    let (Some(attacker), Some(target)) = (state.entity(attacker_id), state.entity(target_id)) else {
        return false;
    };
    let Some(attack) = attacker.attack else {
        return false;
    };
    if !attack.is_ready(now) {
        return false;
    }
    let from = attacker.position;
    let to = target.position;
    let owner = attacker.owner;

    if let Some(a) = state.entity_mut(attacker_id).and_then(|e| e.attack.as_mut()) {
        a.last_attack_ms = Some(now);
    }
    state.add_effect(EffectKind::AttackLine { from, to });
    state.add_effect(EffectKind::DamageText {
        position: to,
        amount: attack.damage,
    });
    events.push(GameEvent::AttackFired {
        attacker: attacker_id,
        target: target_id,
        damage: attack.damage,
    });
    apply_damage(state, target_id, attack.damage, Some(owner), events);
    true
}

/// Subtract hit points; removes the entity at zero. Returns `true` on a kill.
pub fn apply_damage(
    state: &mut GameState,
    target_id: EntityId,
    damage: i32,
    source: Option<PlayerId>,
    events: &mut Vec<GameEvent>,
) -> bool {
    let Some(target) = state.entity_mut(target_id) else {
        return false;
    };
    target.hp -= damage.max(0);
    if target.hp > 0 {
        return false;
    }
    destroy(state, target_id, source, events);
    true
}

/// Remove an entity, update statistics and emit the death event.
pub fn destroy(state: &mut GameState, id: EntityId, killer: Option<PlayerId>, events: &mut Vec<GameEvent>) {
    let Some(dead) = state.entities_mut().remove(id) else {
        return;
    };
    let was_building = dead.is_building();
    debug!(entity = id, owner = %dead.owner, ?killer, was_building, "entity destroyed");

    if let Some(owner) = state.player_mut(dead.owner) {
        if was_building {
            owner.stats.buildings_lost += 1;
        } else {
            owner.stats.units_lost += 1;
        }
    }
    if let Some(killer) = killer.filter(|k| *k != dead.owner) {
        if let Some(player) = state.player_mut(killer) {
            player.stats.enemies_destroyed += 1;
        }
    }
    state.add_effect(EffectKind::Explosion {
        position: dead.position,
        large: was_building,
    });
    events.push(GameEvent::EntityDestroyed {
        id,
        owner: dead.owner,
        killer,
        position: dead.position,
        was_building,
    });
}

/// Damage everything within `radius` of `center`, falling off linearly from
/// `max_damage` at the center to zero at the edge. Hits every owner.
///
/// Returns the ids destroyed, in ascending order.
pub fn apply_area_damage(
    state: &mut GameState,
    center: Vec2Fixed,
    radius: Fixed,
    max_damage: i32,
    source: Option<PlayerId>,
    events: &mut Vec<GameEvent>,
) -> Vec<EntityId> {
    if radius <= Fixed::ZERO {
        return Vec::new();
    }
    let index = SpatialIndex::build(state.entities(), state.config().spatial_cell());
    let hits: Vec<(EntityId, i32)> = index
        .query_radius(center, radius)
        .into_iter()
        .filter_map(|id| state.entity(id))
        .filter_map(|e| {
            let dist = e.position.distance(center);
            (dist < radius).then(|| {
                let falloff = Fixed::ONE - dist / radius;
                (e.id, (Fixed::from_num(max_damage) * falloff).to_num::<i32>())
            })
        })
        .collect();

    let mut destroyed = Vec::new();
    for (id, damage) in hits {
        if damage <= 0 {
            continue;
        }
        if apply_damage(state, id, damage, source, events) {
            destroyed.push(id);
        }
    }
    destroyed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::player::Controller;
    use crate::rules::{BuildingType, Rules, UnitType};
    use crate::terrain::TerrainGrid;

    fn state() -> GameState {
        let mut s = GameState::new(
            SimConfig::default(),
            Rules::stock(),
            TerrainGrid::new(40, 40, Fixed::from_num(40)),
        );
        s.add_player(PlayerId(1), Controller::Human, 1000);
        s.add_player(PlayerId(2), Controller::Human, 1000);
        s
    }

    #[test]
    fn test_can_target_respects_domain_and_owner() {
        let mut s = state();
        let tank = s.spawn_unit(PlayerId(1), UnitType::Tank, Vec2Fixed::from_ints(100, 100)).unwrap();
        let jet = s.spawn_unit(PlayerId(2), UnitType::FighterJet, Vec2Fixed::from_ints(120, 100)).unwrap();
        let friend = s.spawn_unit(PlayerId(1), UnitType::Tank, Vec2Fixed::from_ints(140, 100)).unwrap();
        let enemy = s.spawn_unit(PlayerId(2), UnitType::Tank, Vec2Fixed::from_ints(160, 100)).unwrap();
        let t = s.entity(tank).unwrap();
        assert!(!can_target(t, s.entity(jet).unwrap()), "tanks cannot hit aircraft");
        assert!(!can_target(t, s.entity(friend).unwrap()));
        assert!(can_target(t, s.entity(enemy).unwrap()));
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let mut s = state();
        let tank = s.spawn_unit(PlayerId(1), UnitType::Tank, Vec2Fixed::from_ints(100, 100)).unwrap();
        let enemy = s.spawn_unit(PlayerId(2), UnitType::Tank, Vec2Fixed::from_ints(160, 100)).unwrap();
        let mut events = Vec::new();
        assert!(fire(&mut s, tank, enemy, &mut events));
        assert!(!fire(&mut s, tank, enemy, &mut events));
        assert_eq!(s.entity(enemy).unwrap().hp, 175);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_kill_removes_and_records_stats() {
        let mut s = state();
        let victim = s.spawn_unit(PlayerId(2), UnitType::Rifleman, Vec2Fixed::from_ints(100, 100)).unwrap();
        let mut events = Vec::new();
        assert!(!apply_damage(&mut s, victim, 49, Some(PlayerId(1)), &mut events));
        assert!(apply_damage(&mut s, victim, 1, Some(PlayerId(1)), &mut events));
        assert!(s.entity(victim).is_none());
        assert_eq!(s.player(PlayerId(2)).unwrap().stats.units_lost, 1);
        assert_eq!(s.player(PlayerId(1)).unwrap().stats.enemies_destroyed, 1);
        assert!(matches!(events.last(), Some(GameEvent::EntityDestroyed { id, .. }) if *id == victim));
    }

    #[test]
    fn test_area_damage_falls_off_linearly() {
        let mut s = state();
        let center = Vec2Fixed::from_ints(800, 800);
        let at_center = s.spawn_building(PlayerId(2), BuildingType::Headquarters, center, false).unwrap();
        let halfway = s
            .spawn_building(PlayerId(2), BuildingType::Refinery, Vec2Fixed::from_ints(900, 800), false)
            .unwrap();
        let outside = s.spawn_unit(PlayerId(1), UnitType::Tank, Vec2Fixed::from_ints(1001, 800)).unwrap();

        let mut events = Vec::new();
        apply_area_damage(&mut s, center, Fixed::from_num(200), 1000, Some(PlayerId(1)), &mut events);
        assert_eq!(s.entity(at_center).unwrap().hp, 1000);
        assert_eq!(s.entity(halfway).unwrap().hp, 300);
        assert_eq!(s.entity(outside).unwrap().hp, 200);
    }

    #[test]
    fn test_area_damage_hits_own_units_and_kills() {
        let mut s = state();
        let center = Vec2Fixed::from_ints(800, 800);
        let own = s.spawn_unit(PlayerId(1), UnitType::Rifleman, center).unwrap();
        let mut events = Vec::new();
        let destroyed = apply_area_damage(&mut s, center, Fixed::from_num(200), 1000, Some(PlayerId(1)), &mut events);
        assert_eq!(destroyed, vec![own]);
        assert_eq!(s.player(PlayerId(1)).unwrap().stats.enemies_destroyed, 0);
    }
}
