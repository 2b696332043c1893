//! Proptest strategies for simulation properties.
//!
//! These generate random but reproducible inputs: terrain grids, tiles,
//! positions, damage sequences and command streams.

use proptest::prelude::*;
use skirmish_core::commands::Command;
use skirmish_core::entity::EntityId;
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::rules::UnitType;
use skirmish_core::terrain::{TerrainGrid, TerrainType, TileCoord};

/// Tile size used by generated grids.
pub const TILE: i32 = 40;

/// Any terrain type, weighted towards open ground.
pub fn arb_terrain_type() -> impl Strategy<Value = TerrainType> {
    prop_oneof![
        6 => Just(TerrainType::Ground),
        2 => Just(TerrainType::Mountain),
        1 => Just(TerrainType::Trees),
        1 => Just(TerrainType::ShallowWater),
        1 => Just(TerrainType::DeepWater),
    ]
}

/// A `width` x `height` grid of random terrain.
pub fn arb_terrain(width: u32, height: u32) -> impl Strategy<Value = TerrainGrid> {
    proptest::collection::vec(arb_terrain_type(), (width * height) as usize).prop_map(move |tiles| {
        let mut grid = TerrainGrid::new(width, height, Fixed::from_num(TILE));
        for (i, kind) in tiles.into_iter().enumerate() {
            let i = i as i32;
            grid.set(TileCoord::new(i % width as i32, i / width as i32), kind);
        }
        grid
    })
}

/// A tile inside a `width` x `height` grid.
pub fn arb_tile(width: u32, height: u32) -> impl Strategy<Value = TileCoord> {
    (0..width as i32, 0..height as i32).prop_map(|(x, y)| TileCoord::new(x, y))
}

/// A world position inside a `width` x `height` tile grid.
pub fn arb_position(width: u32, height: u32) -> impl Strategy<Value = Vec2Fixed> {
    let (w, h) = (width as i32 * TILE, height as i32 * TILE);
    (0..w, 0..h).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
}

/// Damage values, including overkill.
pub fn arb_damage() -> impl Strategy<Value = i32> {
    1i32..2000
}

/// A sequence of hits.
pub fn arb_damage_sequence(max_len: usize) -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(arb_damage(), 0..max_len)
}

/// Vision sources `(tile, radius)` for fog tests.
pub fn arb_vision_sources(width: u32, height: u32, max_len: usize) -> impl Strategy<Value = Vec<(TileCoord, i32)>> {
    proptest::collection::vec((arb_tile(width, height), 0i32..8), 0..max_len)
}

/// A ground unit type that is cheap and quick to build.
pub fn arb_infantry() -> impl Strategy<Value = UnitType> {
    prop_oneof![
        Just(UnitType::Rifleman),
        Just(UnitType::TeslaTrooper),
        Just(UnitType::Engineer),
    ]
}

/// Movement and attack orders for the given units, with targets anywhere
/// on a `width` x `height` map. Some targets may name entities that do not
/// exist.
pub fn arb_unit_command(units: Vec<EntityId>, width: u32, height: u32) -> impl Strategy<Value = Command> {
    let most = units.len().min(3);
    let pick = proptest::sample::subsequence(units, 0..=most);
    (pick, arb_position(width, height), 0u64..64, 0u8..3).prop_map(|(units, target, entity, kind)| match kind {
        0 => Command::Move { units, target },
        1 => Command::AttackMove { units, target },
        _ => Command::Attack { units, target: entity },
    })
}

/// A sequence of unit commands.
pub fn arb_command_sequence(
    units: Vec<EntityId>,
    width: u32,
    height: u32,
    max_len: usize,
) -> impl Strategy<Value = Vec<Command>> {
    proptest::collection::vec(arb_unit_command(units, width, height), 0..max_len)
}
