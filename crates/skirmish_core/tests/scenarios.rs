//! Whole-tick scenarios driven through commands and `advance`.

use std::sync::{Arc, Mutex};

use skirmish_core::prelude::*;
use skirmish_core::commands::apply_command_with_events;
use skirmish_core::rules::SuperweaponKind;
use skirmish_test_utils::fixtures::{self, tile_center, HUMAN, RIVAL};

/// Advance until `done` holds or `max_ticks` elapse, checking `each` after
/// every tick. Returns the final state and every event seen.
fn run_until(
    mut state: GameState,
    max_ticks: u64,
    mut each: impl FnMut(&GameState, &[GameEvent]),
    done: impl Fn(&GameState) -> bool,
) -> (GameState, Vec<GameEvent>) {
    let mut seen = Vec::new();
    for _ in 0..max_ticks {
        let out = advance(&state);
        each(&out.state, &out.events);
        seen.extend(out.events);
        state = out.state;
        if done(&state) {
            break;
        }
    }
    (state, seen)
}

const RIDGE: [&str; 9] = [
    "......#.......",
    "......#.......",
    "......#.......",
    "......#.......",
    "......#.......",
    "......#.......",
    "......#.......",
    "..............",
    "..............",
];

#[test]
fn test_move_detours_around_ridge() {
    let mut state = fixtures::passive_rival(fixtures::with_bases(fixtures::ascii_state(&RIDGE)));
    let start = tile_center(&state, 3, 3);
    let goal = tile_center(&state, 10, 3);
    let unit = fixtures::spawn_units(&mut state, HUMAN, UnitType::Engineer, &[start])[0];
    let state = apply_command(&state, HUMAN, &Command::Move { units: vec![unit], target: goal }).unwrap();

    let mut deepest_row = 0;
    let (state, _) = run_until(
        state,
        2_000,
        |s, _| {
            let e = s.entity(unit).unwrap();
            let tile = e.tile(s.terrain());
            assert!(s.terrain().is_passable(tile, UnitDomain::Ground), "walked onto {tile:?}");
            deepest_row = deepest_row.max(tile.y);
        },
        |s| s.entity(unit).unwrap().status() == Some(UnitStatus::Idle),
    );

    let arrived = state.entity(unit).unwrap();
    assert_eq!(arrived.tile(state.terrain()), TileCoord::new(10, 3));
    assert!(deepest_row >= 7, "must pass below the ridge, reached row {deepest_row}");
}

#[test]
fn test_two_tanks_need_eight_hits() {
    let mut state = fixtures::passive_rival(fixtures::skirmish_state());
    let attacker_positions = [tile_center(&state, 10, 10), tile_center(&state, 10, 12)];
    let attackers = fixtures::spawn_units(&mut state, HUMAN, UnitType::Tank, &attacker_positions);
    let victim_position = tile_center(&state, 13, 11);
    let victim = fixtures::spawn_units(&mut state, RIVAL, UnitType::Tank, &[victim_position])[0];
    let state = apply_command(&state, HUMAN, &Command::Attack { units: attackers.clone(), target: victim }).unwrap();

    let (state, events) = run_until(state, 500, |_, _| {}, |s| s.entity(victim).is_none());

    let hits: Vec<i32> = events
        .iter()
        .filter_map(|e| match e {
            GameEvent::AttackFired { target, damage, .. } if *target == victim => Some(*damage),
            _ => None,
        })
        .collect();
    assert_eq!(hits, vec![25; 8]);
    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::EntityDestroyed { id, killer: Some(HUMAN), .. } if *id == victim
    )));
    for id in attackers {
        assert!(state.entity(id).is_some(), "attacker {id} should survive the duel");
    }
    assert_eq!(state.player(HUMAN).unwrap().stats.enemies_destroyed, 1);
    assert_eq!(state.player(RIVAL).unwrap().stats.units_lost, 1);
}

#[test]
fn test_silo_builds_then_charges() {
    let mut state = fixtures::passive_rival(fixtures::skirmish_state());
    let factory = tile_center(&state, 8, 22);
    fixtures::finished_building(&mut state, HUMAN, BuildingType::WarFactory, factory);
    let site = tile_center(&state, 14, 20);
    let mut placed = Vec::new();
    let state = apply_command_with_events(
        &state,
        HUMAN,
        &Command::PlaceBuilding { building_type: BuildingType::NuclearSilo, position: site },
        &mut placed,
    )
    .unwrap();
    assert!(matches!(placed.as_slice(), [GameEvent::BuildingPlaced { .. }]));

    // 60 s of construction, then 420 s of charging at 100 ms per tick.
    let (state, events) = run_until(
        state,
        5_000,
        |_, _| {},
        |s| {
            s.player(HUMAN)
                .and_then(|p| p.superweapon(SuperweaponKind::Nuke))
                .is_some_and(|w| w.is_ready())
        },
    );
    let completed_at = events
        .iter()
        .position(|e| matches!(e, GameEvent::ConstructionComplete { building_type: BuildingType::NuclearSilo, .. }));
    assert!(completed_at.is_some());
    assert!(events.contains(&GameEvent::SuperweaponReady { player: HUMAN, kind: SuperweaponKind::Nuke }));
    assert!(state.tick() >= 4_800, "ready too early at tick {}", state.tick());
    assert!(state.tick() <= 4_802, "ready too late at tick {}", state.tick());
}

#[test]
fn test_unaffordable_order_is_rejected_to_sinks() {
    let mut state = fixtures::skirmish_state();
    state.player_mut(HUMAN).unwrap().credits = Fixed::from_num(100);
    let site = tile_center(&state, 8, 22);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let mut sim = Simulation::new(state);
    sim.add_sink(move |_tick: u64, event: &GameEvent| log.lock().unwrap().push(event.clone()));

    let err = sim
        .command(HUMAN, &Command::PlaceBuilding { building_type: BuildingType::PowerPlant, position: site })
        .unwrap_err();
    assert_eq!(err, CommandError::InsufficientFunds { required: 200, available: 100 });
    assert_eq!(
        *seen.lock().unwrap(),
        vec![GameEvent::CommandRejected { player: HUMAN, reason: err }]
    );
    assert_eq!(sim.state().player(HUMAN).unwrap().whole_credits(), 100);
    assert_eq!(sim.state().entities().building_count(HUMAN), 1);
}

#[test]
fn test_refinery_miner_earns_credits() {
    let mut state = fixtures::passive_rival(fixtures::skirmish_state());
    let power_site = tile_center(&state, 5, 27);
    fixtures::finished_building(&mut state, HUMAN, BuildingType::PowerPlant, power_site);
    let patch = state.add_resource_patch(tile_center(&state, 12, 20), 6_000);
    let site = tile_center(&state, 6, 22);
    let state = apply_command(
        &state,
        HUMAN,
        &Command::PlaceBuilding { building_type: BuildingType::Refinery, position: site },
    )
    .unwrap();
    let spent = state.player(HUMAN).unwrap().stats.credits_spent;
    assert_eq!(spent, 600);

    let mut last_amount = 6_000;
    let (state, events) = run_until(
        state,
        1_500,
        |s, _| {
            let amount = s.resources().get(patch).map_or(0, |p| p.amount);
            assert!(amount <= last_amount, "patch grew from {last_amount} to {amount}");
            last_amount = amount;
        },
        |s| s.player(HUMAN).unwrap().stats.credits_earned >= 1_000,
    );

    assert!(events.iter().any(|e| matches!(
        e,
        GameEvent::UnitReady { player: HUMAN, unit_type: UnitType::ChronoMiner, .. }
    )));
    let stats = &state.player(HUMAN).unwrap().stats;
    assert!(stats.credits_earned >= 1_000);
    // Ore still in the hold has been mined but not yet paid out.
    assert!(i64::from(6_000 - last_amount) >= stats.credits_earned);
}

#[test]
fn test_commands_after_game_over_only_touch_selection() {
    let mut state = fixtures::skirmish_state();
    let hq = state.player(RIVAL).unwrap().base.unwrap();
    state.entities_mut().remove(hq);
    let over = advance(&state).state;
    assert_eq!(over.status(), GameStatus::PlayerWon);

    let site = tile_center(&over, 8, 22);
    let err = apply_command(&over, HUMAN, &Command::PlaceBuilding {
        building_type: BuildingType::PowerPlant,
        position: site,
    })
    .unwrap_err();
    assert!(matches!(err, CommandError::NotPermitted(_)));

    let hq = over.player(HUMAN).unwrap().base.unwrap();
    let selected = apply_command(&over, HUMAN, &Command::Select { ids: vec![hq] }).unwrap();
    assert_eq!(selected.selection().selected, vec![hq]);
    assert_eq!(advance(&selected).state.tick(), selected.tick());
}
