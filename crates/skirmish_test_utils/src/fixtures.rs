//! Test fixtures and helpers.
//!
//! Pre-built game states and entity placements for consistent testing.
//! Fixture maps are small and open so scenarios stay readable.

use skirmish_core::config::{Difficulty, Personality, SimConfig};
use skirmish_core::entity::EntityId;
use skirmish_core::map_generation::{new_game, MatchSetup, Opponent};
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::player::{Controller, PlayerId};
use skirmish_core::rules::{BuildingType, Rules, UnitType};
use skirmish_core::state::GameState;
use skirmish_core::terrain::{TerrainGrid, TileCoord};

/// The human player in fixture states.
pub const HUMAN: PlayerId = PlayerId::HUMAN;

/// The AI opponent in fixture states.
pub const RIVAL: PlayerId = PlayerId(2);

/// Credits both fixture players start with.
pub const FIXTURE_CREDITS: i64 = 10_000;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// World position from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Center of a tile in a state's terrain.
#[must_use]
pub fn tile_center(state: &GameState, x: i32, y: i32) -> Vec2Fixed {
    state.terrain().tile_center(TileCoord::new(x, y))
}

/// Open ground with a human player and a balanced AI rival, no entities.
///
/// Both players are rich enough to afford anything in the stock catalog.
#[must_use]
pub fn open_state(width: u32, height: u32) -> GameState {
    let config = SimConfig::default();
    let terrain = TerrainGrid::new(width, height, config.tile());
    with_players(GameState::new(config, Rules::stock(), terrain))
}

/// Like [`open_state`] but with terrain parsed from glyph rows.
///
/// # Panics
///
/// Panics if the rows are not a valid grid.
#[must_use]
pub fn ascii_state(rows: &[&str]) -> GameState {
    let config = SimConfig::default();
    let terrain = TerrainGrid::from_ascii(rows, config.tile()).expect("fixture terrain");
    with_players(GameState::new(config, Rules::stock(), terrain))
}

fn with_players(mut state: GameState) -> GameState {
    state.add_player(HUMAN, Controller::Human, FIXTURE_CREDITS);
    state.add_player(
        RIVAL,
        Controller::Ai {
            personality: Personality::Balanced,
            difficulty: Difficulty::Normal,
        },
        FIXTURE_CREDITS,
    );
    state
}

/// Give both players a finished headquarters in opposite corners so
/// neither counts as defeated.
///
/// # Panics
///
/// Panics if the map is too small for two headquarters.
#[must_use]
pub fn with_bases(mut state: GameState) -> GameState {
    let w = state.terrain().width() as i32;
    let h = state.terrain().height() as i32;
    let human_hq = tile_center(&state, 2, h - 3);
    let rival_hq = tile_center(&state, w - 3, 2);
    finished_building(&mut state, HUMAN, BuildingType::Headquarters, human_hq);
    finished_building(&mut state, RIVAL, BuildingType::Headquarters, rival_hq);
    state
}

/// Hand the rival to a manual controller so scripted scenarios are not
/// disturbed by its planner. Its units still defend themselves.
#[must_use]
pub fn passive_rival(mut state: GameState) -> GameState {
    if let Some(rival) = state.player_mut(RIVAL) {
        rival.controller = Controller::Human;
    }
    state
}

/// A 40x30 open map with both headquarters in place.
#[must_use]
pub fn skirmish_state() -> GameState {
    with_bases(open_state(40, 30))
}

/// A generated match against the given opponents.
///
/// # Panics
///
/// Panics if the roster is invalid (zero or more than three opponents).
#[must_use]
pub fn match_state(seed: u64, opponents: &[Opponent]) -> GameState {
    let setup = MatchSetup {
        seed,
        human: Controller::Human,
        opponents: opponents.to_vec(),
    };
    new_game(SimConfig::default(), Rules::stock(), &setup).expect("fixture match")
}

/// Spawn a finished building.
///
/// # Panics
///
/// Panics if the building type is missing from the rules.
pub fn finished_building(state: &mut GameState, owner: PlayerId, building_type: BuildingType, at: Vec2Fixed) -> EntityId {
    state
        .spawn_building(owner, building_type, at, false)
        .expect("fixture building")
}

/// Spawn one unit per position.
///
/// # Panics
///
/// Panics if the unit type is missing from the rules.
pub fn spawn_units(state: &mut GameState, owner: PlayerId, unit_type: UnitType, at: &[Vec2Fixed]) -> Vec<EntityId> {
    at.iter()
        .map(|p| state.spawn_unit(owner, unit_type, *p).expect("fixture unit"))
        .collect()
}
