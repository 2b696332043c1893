//! Superweapon charge state and activation.
//!
//! A completed superweapon building grants its ability in the `Charging`
//! state. Losing the building drops the ability entirely; a replacement
//! building starts charging from scratch.

use tracing::info;

use crate::combat::apply_area_damage;
use crate::effects::EffectKind;
use crate::entity::EntityId;
use crate::error::CommandError;
use crate::events::GameEvent;
use crate::math::{Fixed, Vec2Fixed};
use crate::player::{PlayerId, Readiness, SuperweaponState};
use crate::rules::SuperweaponKind;
use crate::state::GameState;

const KINDS: [SuperweaponKind; 2] = [SuperweaponKind::Chronoshift, SuperweaponKind::Nuke];

fn cooldown_ms(state: &GameState, kind: SuperweaponKind) -> u64 {
    state
        .rules()
        .superweapon_building(kind)
        .and_then(|t| state.rules().building(t))
        .and_then(|s| s.superweapon.as_ref())
        .map_or(0, |sw| sw.cooldown_ms)
}

fn next_state(state: &GameState, player: PlayerId, kind: SuperweaponKind) -> Option<SuperweaponState> {
    let building_type = state.rules().superweapon_building(kind)?;
    let current = state.player(player)?.superweapon(kind).copied();
    let keeps_building = current.is_some_and(|s| {
        state
            .entity(s.building)
            .is_some_and(|e| e.owner == player && e.is_completed(building_type))
    });
    let grantor = if keeps_building {
        current.map(|s| s.building)
    } else {
        state.entities().completed(player, building_type).map(|e| e.id).next()
    }?;

    let tick_ms = state.config().tick_ms;
    Some(match current {
        Some(s) if keeps_building => match s.readiness {
            Readiness::Ready => s,
            Readiness::Charging { remaining_ms } => {
                let remaining_ms = remaining_ms.saturating_sub(tick_ms);
                SuperweaponState {
                    readiness: if remaining_ms == 0 {
                        Readiness::Ready
                    } else {
                        Readiness::Charging { remaining_ms }
                    },
                    ..s
                }
            }
        },
        _ => SuperweaponState {
            kind,
            building: grantor,
            readiness: Readiness::Charging {
                remaining_ms: cooldown_ms(state, kind),
            },
        },
    })
}

/// Grant, charge or revoke every player's superweapons for one tick.
pub fn update_superweapons(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let players: Vec<PlayerId> = state.players().keys().copied().collect();
    for player in players {
        for kind in KINDS {
            let before = state.player(player).and_then(|p| p.superweapon(kind)).copied();
            let after = next_state(state, player, kind);
            if before == after {
                continue;
            }
            let Some(p) = state.player_mut(player) else {
                continue;
            };
            match after {
                Some(s) => {
                    p.superweapons.insert(kind, s);
                }
                None => {
                    p.superweapons.remove(&kind);
                }
            }
            let became_ready = after.is_some_and(|s| s.is_ready()) && !before.is_some_and(|s| s.is_ready());
            if became_ready {
                info!(player = %player, ?kind, "superweapon ready");
                events.push(GameEvent::SuperweaponReady { player, kind });
            }
        }
    }
}

fn consume(state: &mut GameState, player: PlayerId, kind: SuperweaponKind) -> Result<(), CommandError> {
    let ready = state
        .player(player)
        .and_then(|p| p.superweapon(kind))
        .is_some_and(SuperweaponState::is_ready);
    if !ready {
        return Err(CommandError::NotReady(format!("{kind:?} is not ready")));
    }
    let remaining_ms = cooldown_ms(state, kind);
    if let Some(s) = state.player_mut(player).and_then(|p| p.superweapons.get_mut(&kind)) {
        s.readiness = Readiness::Charging { remaining_ms };
    }
    Ok(())
}

/// Detonate a nuke at `target`. Damage falls off linearly to zero at the
/// blast radius and hits every owner, including the launcher.
pub fn launch_nuke(
    state: &mut GameState,
    player: PlayerId,
    target: Vec2Fixed,
    events: &mut Vec<GameEvent>,
) -> Result<Vec<EntityId>, CommandError> {
    consume(state, player, SuperweaponKind::Nuke)?;
    info!(player = %player, x = %target.x, y = %target.y, "nuclear launch");
    state.add_effect(EffectKind::NukeImpact { position: target });
    events.push(GameEvent::NukeLaunched { player, target });
    let radius = Fixed::from_num(state.config().nuke_radius);
    let damage = state.config().nuke_damage;
    Ok(apply_area_damage(state, target, radius, damage, Some(player), events))
}

/// Teleport `units` owned by `player` to `target`. Units that cannot stand
/// on the target tile (ships on land, tanks in water) stay behind.
///
/// Returns how many units moved.
pub fn chrono_shift(
    state: &mut GameState,
    player: PlayerId,
    units: &[EntityId],
    target: Vec2Fixed,
    events: &mut Vec<GameEvent>,
) -> Result<usize, CommandError> {
    let terrain = state.terrain();
    let tile = terrain.world_to_tile(target);
    let mut movers: Vec<EntityId> = units
        .iter()
        .filter_map(|id| state.entity(*id))
        .filter(|e| e.owner == player && e.is_unit() && terrain.is_passable(tile, e.domain()))
        .map(|e| e.id)
        .collect();
    movers.sort_unstable();
    movers.dedup();
    if movers.is_empty() {
        return Err(CommandError::NotPermitted("no units can teleport there".to_string()));
    }
    consume(state, player, SuperweaponKind::Chronoshift)?;

    let mut sum = Vec2Fixed::ZERO;
    for id in &movers {
        let Some(entity) = state.entity_mut(*id) else {
            continue;
        };
        sum = sum + entity.position;
        entity.position = target;
        if let Some(unit) = entity.as_unit_mut() {
            unit.stop();
        }
    }
    let count = Fixed::from_num(movers.len());
    state.add_effect(EffectKind::ChronoVortex {
        position: Vec2Fixed::new(sum.x / count, sum.y / count),
    });
    state.add_effect(EffectKind::ChronoVortex { position: target });
    info!(player = %player, units = movers.len(), "chronoshift");
    events.push(GameEvent::ChronoShift {
        player,
        target,
        units: movers.len(),
    });
    Ok(movers.len())
}
