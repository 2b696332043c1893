//! Player command entry points.
//!
//! Every command takes the current snapshot and either returns a new one or
//! a [`CommandError`]. A rejected command never changes anything: the work
//! happens on a clone that is dropped on error.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::combat::can_target;
use crate::economy::ResourceId;
use crate::entity::{Entity, EntityId, UnitStatus};
use crate::error::CommandError;
use crate::events::GameEvent;
use crate::math::Vec2Fixed;
use crate::player::PlayerId;
use crate::production::{place_building, queue_production};
use crate::rules::{BuildingType, ItemType};
use crate::state::{GameState, GameStatus};
use crate::superweapon::{chrono_shift, launch_nuke};
use crate::units::plan_route;

/// Everything a player (human or AI) can order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Walk to a point, ignoring enemies.
    Move {
        /// Units to move.
        units: Vec<EntityId>,
        /// Destination.
        target: Vec2Fixed,
    },
    /// Walk to a point, engaging enemies on the way. Unarmed units ignore it.
    AttackMove {
        /// Units to move.
        units: Vec<EntityId>,
        /// Destination.
        target: Vec2Fixed,
    },
    /// Attack one entity.
    Attack {
        /// Attackers.
        units: Vec<EntityId>,
        /// Victim.
        target: EntityId,
    },
    /// Send miners to a patch.
    Gather {
        /// Miners.
        units: Vec<EntityId>,
        /// Patch to mine.
        patch: ResourceId,
    },
    /// Send engineers to repair a friendly entity.
    Repair {
        /// Engineers.
        units: Vec<EntityId>,
        /// Damaged entity.
        target: EntityId,
    },
    /// Where a building sends finished units.
    SetRallyPoint {
        /// Producer.
        building: EntityId,
        /// Rally point.
        point: Vec2Fixed,
    },
    /// Append an item to a production queue.
    QueueProduction {
        /// Producer.
        building: EntityId,
        /// Item to build.
        item: ItemType,
    },
    /// Start constructing a building.
    PlaceBuilding {
        /// What to build.
        building_type: BuildingType,
        /// Footprint center.
        position: Vec2Fixed,
    },
    /// Fire the nuke.
    LaunchNuke {
        /// Ground zero.
        target: Vec2Fixed,
    },
    /// Teleport units with the chrono sphere.
    ChronoShift {
        /// Units to move.
        units: Vec<EntityId>,
        /// Destination.
        target: Vec2Fixed,
    },
    /// Replace the selection.
    Select {
        /// New selection.
        ids: Vec<EntityId>,
    },
    /// Save the selection under a number.
    CreateControlGroup {
        /// Group number.
        group: u8,
    },
    /// Restore a saved group as the selection.
    SelectControlGroup {
        /// Group number.
        group: u8,
    },
    /// Stop ticking.
    Pause,
    /// Resume ticking.
    Resume,
}

impl Command {
    /// Whether the command may be issued after the match has ended.
    #[must_use]
    pub const fn allowed_after_game_over(&self) -> bool {
        matches!(
            self,
            Self::Select { .. } | Self::CreateControlGroup { .. } | Self::SelectControlGroup { .. }
        )
    }
}

/// Apply a command for `player`, discarding the events it produces.
pub fn apply_command(state: &GameState, player: PlayerId, command: &Command) -> Result<GameState, CommandError> {
    apply_command_with_events(state, player, command, &mut Vec::new())
}

/// Apply a command for `player`, appending any events to `events`.
pub fn apply_command_with_events(
    state: &GameState,
    player: PlayerId,
    command: &Command,
    events: &mut Vec<GameEvent>,
) -> Result<GameState, CommandError> {
    if state.player(player).is_none() {
        return Err(CommandError::NotPermitted(format!("unknown player {player}")));
    }
    if state.status().is_over() && !command.allowed_after_game_over() {
        return Err(CommandError::NotPermitted("match is over".to_string()));
    }

    let mut next = state.clone();
    let mut local = Vec::new();
    execute(&mut next, player, command, &mut local)?;
    trace!(player = %player, ?command, "command applied");
    events.append(&mut local);
    Ok(next)
}

fn execute(state: &mut GameState, player: PlayerId, command: &Command, events: &mut Vec<GameEvent>) -> Result<(), CommandError> {
    match command {
        Command::Move { units, target } => order_move(state, player, units, *target, UnitStatus::Moving),
        Command::AttackMove { units, target } => order_move(state, player, units, *target, UnitStatus::AttackMoving),
        Command::Attack { units, target } => order_attack(state, player, units, *target),
        Command::Gather { units, patch } => order_gather(state, player, units, *patch),
        Command::Repair { units, target } => order_repair(state, player, units, *target),
        Command::SetRallyPoint { building, point } => {
            let entity = state.entity(*building).ok_or(CommandError::StaleReference(*building))?;
            if entity.owner != player || !entity.is_building() {
                return Err(CommandError::NotPermitted("not your building".to_string()));
            }
            if let Some(b) = state.entity_mut(*building).and_then(Entity::as_building_mut) {
                b.rally_point = Some(*point);
            }
            Ok(())
        }
        Command::QueueProduction { building, item } => queue_production(state, player, *building, *item),
        Command::PlaceBuilding { building_type, position } => {
            let building = place_building(state, player, *building_type, *position)?;
            events.push(GameEvent::BuildingPlaced {
                player,
                building,
                building_type: *building_type,
            });
            Ok(())
        }
        Command::LaunchNuke { target } => launch_nuke(state, player, *target, events).map(|_| ()),
        Command::ChronoShift { units, target } => chrono_shift(state, player, units, *target, events).map(|_| ()),
        Command::Select { ids } => {
            let ids: Vec<EntityId> = ids.iter().copied().filter(|id| state.entities().contains(*id)).collect();
            state.selection_mut().selected = ids;
            Ok(())
        }
        Command::CreateControlGroup { group } => {
            let selected = state.selection().selected.clone();
            state.selection_mut().groups.insert(*group, selected);
            Ok(())
        }
        Command::SelectControlGroup { group } => {
            let Some(ids) = state.selection().groups.get(group) else {
                return Err(CommandError::NotPermitted(format!("no control group {group}")));
            };
            let live: Vec<EntityId> = ids.iter().copied().filter(|id| state.entities().contains(*id)).collect();
            let selection = state.selection_mut();
            selection.groups.insert(*group, live.clone());
            selection.selected = live;
            Ok(())
        }
        Command::Pause => match state.status() {
            GameStatus::Playing => {
                state.set_status(GameStatus::Paused);
                Ok(())
            }
            _ => Err(CommandError::NotReady("game is not running".to_string())),
        },
        Command::Resume => match state.status() {
            GameStatus::Paused => {
                state.set_status(GameStatus::Playing);
                Ok(())
            }
            _ => Err(CommandError::NotReady("game is not paused".to_string())),
        },
    }
}

/// Live units of `player` among `ids` matching `eligible`, ascending and
/// deduplicated.
fn select_units<F>(state: &GameState, player: PlayerId, ids: &[EntityId], eligible: F) -> Result<Vec<EntityId>, CommandError>
where
    F: Fn(&Entity) -> bool,
{
    let mut live: Vec<&Entity> = ids.iter().filter_map(|id| state.entity(*id)).collect();
    if live.is_empty() {
        return Err(ids
            .first()
            .map_or_else(|| CommandError::NotPermitted("no units given".to_string()), |id| CommandError::StaleReference(*id)));
    }
    live.retain(|e| e.owner == player && e.is_unit());
    if live.is_empty() {
        return Err(CommandError::NotPermitted("not your units".to_string()));
    }
    let mut chosen: Vec<EntityId> = live.into_iter().filter(|e| eligible(e)).map(|e| e.id).collect();
    chosen.sort_unstable();
    chosen.dedup();
    if chosen.is_empty() {
        return Err(CommandError::NotPermitted("no selected unit can do that".to_string()));
    }
    Ok(chosen)
}

fn is_miner(e: &Entity) -> bool {
    e.as_unit().is_some_and(|u| u.miner().is_some())
}

fn is_engineer(e: &Entity) -> bool {
    e.as_unit().is_some_and(|u| u.engineer().is_some())
}

fn order_move(
    state: &mut GameState,
    player: PlayerId,
    ids: &[EntityId],
    target: Vec2Fixed,
    status: UnitStatus,
) -> Result<(), CommandError> {
    let attack_move = status == UnitStatus::AttackMoving;
    let units = select_units(state, player, ids, |e| !attack_move || e.attack.is_some())?;

    let mut routed = 0;
    for id in units {
        let Some(path) = plan_route(state, id, target) else {
            continue;
        };
        if let Some(unit) = state.entity_mut(id).and_then(Entity::as_unit_mut) {
            unit.status = status;
            unit.path = path.into();
            unit.destination = Some(target);
            unit.target = None;
            unit.unreachable = None;
            routed += 1;
        }
    }
    if routed == 0 {
        return Err(CommandError::NoPath);
    }
    Ok(())
}

fn order_attack(state: &mut GameState, player: PlayerId, ids: &[EntityId], target: EntityId) -> Result<(), CommandError> {
    let victim = state.entity(target).ok_or(CommandError::StaleReference(target))?.clone();
    let units = select_units(state, player, ids, |e| can_target(e, &victim))?;
    for id in units {
        if let Some(unit) = state.entity_mut(id).and_then(Entity::as_unit_mut) {
            unit.status = UnitStatus::Attacking;
            unit.target = Some(target);
            unit.unreachable = None;
            unit.destination = None;
            unit.path.clear();
        }
    }
    Ok(())
}

fn order_gather(state: &mut GameState, player: PlayerId, ids: &[EntityId], patch: ResourceId) -> Result<(), CommandError> {
    let position = state
        .resources()
        .get(patch)
        .ok_or(CommandError::StaleReference(patch.0))?
        .position;
    let miners = select_units(state, player, ids, is_miner)?;

    let mut routed = 0;
    for id in miners {
        let Some(path) = plan_route(state, id, position) else {
            continue;
        };
        if let Some(unit) = state.entity_mut(id).and_then(Entity::as_unit_mut) {
            unit.status = UnitStatus::MovingToOre;
            unit.path = path.into();
            unit.destination = None;
            unit.target = None;
            unit.unreachable = None;
            if let Some(m) = unit.miner_mut() {
                m.patch = Some(patch);
                m.refinery = None;
            }
            routed += 1;
        }
    }
    if routed == 0 {
        return Err(CommandError::NoPath);
    }
    Ok(())
}

fn order_repair(state: &mut GameState, player: PlayerId, ids: &[EntityId], target: EntityId) -> Result<(), CommandError> {
    let victim = state.entity(target).ok_or(CommandError::StaleReference(target))?;
    if victim.owner != player {
        return Err(CommandError::NotPermitted("can only repair your own".to_string()));
    }
    if !victim.is_damaged() {
        return Err(CommandError::NotPermitted("target is not damaged".to_string()));
    }
    let position = victim.position;
    let engineers = select_units(state, player, ids, is_engineer)?;

    let mut routed = 0;
    for id in engineers {
        let Some(path) = plan_route(state, id, position) else {
            continue;
        };
        if let Some(unit) = state.entity_mut(id).and_then(Entity::as_unit_mut) {
            unit.status = UnitStatus::MovingToRepair;
            unit.path = path.into();
            unit.destination = None;
            unit.target = None;
            unit.unreachable = None;
            if let Some(e) = unit.engineer_mut() {
                e.target = Some(target);
            }
            routed += 1;
        }
    }
    if routed == 0 {
        return Err(CommandError::NoPath);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::math::Fixed;
    use crate::player::Controller;
    use crate::rules::{Rules, UnitType};
    use crate::terrain::TerrainGrid;

    const P1: PlayerId = PlayerId(1);
    const P2: PlayerId = PlayerId(2);

    fn state() -> GameState {
        let rows: Vec<String> = (0..20)
            .map(|y| if y == 10 { "#".repeat(20) } else { ".".repeat(20) })
            .collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let mut s = GameState::new(
            SimConfig::default(),
            Rules::stock(),
            TerrainGrid::from_ascii(&rows, Fixed::from_num(40)).unwrap(),
        );
        s.add_player(P1, Controller::Human, 1000);
        s.add_player(P2, Controller::Human, 1000);
        s
    }

    #[test]
    fn test_move_sets_path_and_destination() {
        let mut s = state();
        let tank = s.spawn_unit(P1, UnitType::Tank, Vec2Fixed::from_ints(20, 20)).unwrap();
        let target = Vec2Fixed::from_ints(300, 300);
        let next = apply_command(&s, P1, &Command::Move { units: vec![tank], target }).unwrap();
        let unit = next.entity(tank).unwrap().as_unit().unwrap();
        assert_eq!(unit.status, UnitStatus::Moving);
        assert_eq!(unit.destination, Some(target));
        assert!(!unit.path.is_empty());
        // The old snapshot is untouched.
        assert_eq!(s.entity(tank).unwrap().status(), Some(UnitStatus::Idle));
    }

    #[test]
    fn test_unreachable_move_is_rejected() {
        let mut s = state();
        let tank = s.spawn_unit(P1, UnitType::Tank, Vec2Fixed::from_ints(20, 20)).unwrap();
        let across = Vec2Fixed::from_ints(300, 700);
        assert_eq!(
            apply_command(&s, P1, &Command::Move { units: vec![tank], target: across }),
            Err(CommandError::NoPath)
        );
    }

    #[test]
    fn test_cannot_command_enemy_units() {
        let mut s = state();
        let tank = s.spawn_unit(P2, UnitType::Tank, Vec2Fixed::from_ints(20, 20)).unwrap();
        let cmd = Command::Move {
            units: vec![tank],
            target: Vec2Fixed::from_ints(300, 300),
        };
        assert!(matches!(apply_command(&s, P1, &cmd), Err(CommandError::NotPermitted(_))));
        let stale = Command::Move {
            units: vec![77],
            target: Vec2Fixed::from_ints(300, 300),
        };
        assert_eq!(apply_command(&s, P1, &stale), Err(CommandError::StaleReference(77)));
    }

    #[test]
    fn test_attack_move_skips_unarmed() {
        let mut s = state();
        let miner = s.spawn_unit(P1, UnitType::ChronoMiner, Vec2Fixed::from_ints(20, 20)).unwrap();
        let cmd = Command::AttackMove {
            units: vec![miner],
            target: Vec2Fixed::from_ints(300, 300),
        };
        assert!(matches!(apply_command(&s, P1, &cmd), Err(CommandError::NotPermitted(_))));
    }

    #[test]
    fn test_attack_checks_domain() {
        let mut s = state();
        let tank = s.spawn_unit(P1, UnitType::Tank, Vec2Fixed::from_ints(20, 20)).unwrap();
        let jet = s.spawn_unit(P2, UnitType::FighterJet, Vec2Fixed::from_ints(100, 20)).unwrap();
        let rifle = s.spawn_unit(P2, UnitType::Rifleman, Vec2Fixed::from_ints(100, 60)).unwrap();
        assert!(apply_command(&s, P1, &Command::Attack { units: vec![tank], target: jet }).is_err());
        let next = apply_command(&s, P1, &Command::Attack { units: vec![tank], target: rifle }).unwrap();
        let unit = next.entity(tank).unwrap().as_unit().unwrap();
        assert_eq!((unit.status, unit.target), (UnitStatus::Attacking, Some(rifle)));
    }

    #[test]
    fn test_gather_and_stale_patch() {
        let mut s = state();
        let patch = s.add_resource_patch(Vec2Fixed::from_ints(300, 100), 1000);
        let miner = s.spawn_unit(P1, UnitType::ChronoMiner, Vec2Fixed::from_ints(20, 20)).unwrap();
        let next = apply_command(&s, P1, &Command::Gather { units: vec![miner], patch }).unwrap();
        let unit = next.entity(miner).unwrap().as_unit().unwrap();
        assert_eq!(unit.status, UnitStatus::MovingToOre);
        assert_eq!(unit.miner().unwrap().patch, Some(patch));

        let gone = ResourceId(42);
        assert_eq!(
            apply_command(&s, P1, &Command::Gather { units: vec![miner], patch: gone }),
            Err(CommandError::StaleReference(42))
        );
    }

    #[test]
    fn test_repair_requires_damage() {
        let mut s = state();
        let hq = s
            .spawn_building(P1, BuildingType::Headquarters, Vec2Fixed::from_ints(300, 100), false)
            .unwrap();
        let eng = s.spawn_unit(P1, UnitType::Engineer, Vec2Fixed::from_ints(20, 20)).unwrap();
        let cmd = Command::Repair { units: vec![eng], target: hq };
        assert!(matches!(apply_command(&s, P1, &cmd), Err(CommandError::NotPermitted(_))));
        s.entity_mut(hq).unwrap().hp = 100;
        let next = apply_command(&s, P1, &cmd).unwrap();
        assert_eq!(next.entity(eng).unwrap().status(), Some(UnitStatus::MovingToRepair));
    }

    #[test]
    fn test_control_groups_filter_stale_ids() {
        let mut s = state();
        let a = s.spawn_unit(P1, UnitType::Tank, Vec2Fixed::from_ints(20, 20)).unwrap();
        let b = s.spawn_unit(P1, UnitType::Tank, Vec2Fixed::from_ints(60, 20)).unwrap();
        let s = apply_command(&s, P1, &Command::Select { ids: vec![a, b] }).unwrap();
        let mut s = apply_command(&s, P1, &Command::CreateControlGroup { group: 1 }).unwrap();
        s.entities_mut().remove(b);
        let s = apply_command(&s, P1, &Command::Select { ids: vec![] }).unwrap();
        let s = apply_command(&s, P1, &Command::SelectControlGroup { group: 1 }).unwrap();
        assert_eq!(s.selection().selected, vec![a]);
        assert!(apply_command(&s, P1, &Command::SelectControlGroup { group: 2 }).is_err());
    }

    #[test]
    fn test_pause_resume() {
        let s = state();
        let paused = apply_command(&s, P1, &Command::Pause).unwrap();
        assert_eq!(paused.status(), GameStatus::Paused);
        assert!(apply_command(&paused, P1, &Command::Pause).is_err());
        let resumed = apply_command(&paused, P1, &Command::Resume).unwrap();
        assert_eq!(resumed.status(), GameStatus::Playing);
    }

    #[test]
    fn test_place_building_emits_event() {
        let mut s = state();
        s.spawn_building(P1, BuildingType::Headquarters, Vec2Fixed::from_ints(100, 100), false)
            .unwrap();
        let mut events = Vec::new();
        let cmd = Command::PlaceBuilding {
            building_type: BuildingType::PowerPlant,
            position: Vec2Fixed::from_ints(300, 100),
        };
        let next = apply_command_with_events(&s, P1, &cmd, &mut events).unwrap();
        assert!(matches!(events.as_slice(), [GameEvent::BuildingPlaced { .. }]));
        assert_eq!(next.player(P1).unwrap().whole_credits(), 800);
    }
}
