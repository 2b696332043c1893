//! Procedural skirmish maps and match setup.
//!
//! Generates maps with:
//! - Mountain and deep-water blobs, with a shallow shore around the water
//! - Forest blobs
//! - Cleared ground around every starting position
//! - Roads linking consecutive starting positions
//! - Ore fields near each base and contested fields mid-map
//!
//! Generation is seeded and fully deterministic.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Difficulty, Personality, SimConfig};
use crate::economy::update_power;
use crate::error::{GameError, Result};
use crate::fog::update_fog;
use crate::math::{fixed_sqrt, Fixed};
use crate::pathfinding::find_path_weighted;
use crate::player::{Controller, PlayerId};
use crate::rules::{BuildingType, Rules};
use crate::state::GameState;
use crate::terrain::{TerrainGrid, TerrainType, TileCoord};

/// Number and size range of one kind of terrain blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Blobs to place.
    pub count: u32,
    /// Smallest radius in tiles.
    pub min_size: i32,
    /// Largest radius in tiles (exclusive).
    pub max_size: i32,
}

impl FeatureSpec {
    /// A feature spec.
    #[must_use]
    pub const fn new(count: u32, min_size: i32, max_size: i32) -> Self {
        Self {
            count,
            min_size,
            max_size,
        }
    }
}

/// Map configuration for procedural generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Random seed for deterministic generation.
    pub seed: u64,
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// Number of starting positions (2 to 4).
    pub player_count: usize,
    /// Mountain blobs.
    pub mountains: FeatureSpec,
    /// Deep water blobs.
    pub deep_water: FeatureSpec,
    /// Forest blobs.
    pub forests: FeatureSpec,
    /// Radius in tiles kept as open ground around each start.
    pub clear_radius: i32,
    /// Tiles on each side of a road's center line.
    pub road_half_width: i32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            width: 80,
            height: 60,
            player_count: 2,
            mountains: FeatureSpec::new(15, 2, 6),
            deep_water: FeatureSpec::new(10, 3, 7),
            forests: FeatureSpec::new(30, 2, 8),
            clear_radius: 8,
            road_half_width: 1,
        }
    }
}

impl MapConfig {
    /// Map of the size a simulation config asks for.
    #[must_use]
    pub fn for_sim(config: &SimConfig) -> Self {
        Self {
            width: config.map_width,
            height: config.map_height,
            ..Default::default()
        }
    }

    /// Set the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of starting positions.
    #[must_use]
    pub fn with_players(mut self, count: usize) -> Self {
        self.player_count = count.clamp(2, 4);
        self
    }

    /// Starting tiles in player order: bottom-left, top-right, top-left,
    /// bottom-right.
    #[must_use]
    pub fn start_tiles(&self) -> Vec<TileCoord> {
        let w = self.width as i32;
        let h = self.height as i32;
        let corners = [
            TileCoord::new(5, h - 5),
            TileCoord::new(w - 5, 5),
            TileCoord::new(5, 5),
            TileCoord::new(w - 5, h - 5),
        ];
        corners
            .into_iter()
            .take(self.player_count.clamp(2, 4))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.width < 16 || self.height < 16 {
            return Err(GameError::InvalidState(format!(
                "map {}x{} is too small for corner starts",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// An ore patch to be created on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSpot {
    /// Tile holding the patch.
    pub tile: TileCoord,
    /// Ore amount.
    pub amount: i32,
}

/// Output of [`generate_map`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMap {
    /// Terrain.
    pub terrain: TerrainGrid,
    /// Starting tiles in player order.
    pub starts: Vec<TileCoord>,
    /// Ore patches.
    pub patches: Vec<PatchSpot>,
}

/// Deterministic LCG for map generation.
struct MapRng {
    state: u64,
}

impl MapRng {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    fn next(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(0x5DEE_CE66D).wrapping_add(11);
        // Low LCG bits cycle quickly.
        self.state >> 17
    }

    /// Uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> Fixed {
        Fixed::from_num(self.next() % 10_000) / Fixed::from_num(10_000)
    }

    /// Uniform integer in `[min, max)`, or `min` for an empty range.
    fn next_range(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = u64::from((max - min).unsigned_abs());
        min + i32::try_from(self.next() % span).unwrap_or(0)
    }
}

/// Generate terrain, starting tiles and ore fields.
pub fn generate_map(config: &MapConfig, tile_size: Fixed) -> Result<GeneratedMap> {
    config.validate()?;
    let mut rng = MapRng::new(config.seed);
    let mut terrain = TerrainGrid::new(config.width, config.height, tile_size);
    let starts = config.start_tiles();

    place_blobs(&mut terrain, &mut rng, TerrainType::Mountain, config.mountains);
    place_blobs(&mut terrain, &mut rng, TerrainType::DeepWater, config.deep_water);
    add_shorelines(&mut terrain);
    place_blobs(&mut terrain, &mut rng, TerrainType::Trees, config.forests);

    let radius = config.clear_radius;
    for start in &starts {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy < radius * radius {
                    terrain.set(TileCoord::new(start.x + dx, start.y + dy), TerrainType::Ground);
                }
            }
        }
    }

    if starts.len() >= 2 {
        for (i, from) in starts.iter().enumerate() {
            let to = starts[(i + 1) % starts.len()];
            if let Some(route) = find_path_weighted(&terrain, *from, to) {
                carve_road(&mut terrain, std::iter::once(*from).chain(route), config.road_half_width);
            }
        }
    }

    let mut patches = Vec::new();
    let mut taken = BTreeSet::new();
    for start in &starts {
        place_ore_field(&terrain, &mut rng, &mut patches, &mut taken, *start, 3, 5, (4000, 5000));
    }
    let (w, h) = (config.width as i32, config.height as i32);
    let contested = [
        TileCoord::new(w / 2, h / 2),
        TileCoord::new(w / 4, h / 4),
        TileCoord::new(w * 3 / 4, h * 3 / 4),
        TileCoord::new(w / 4, h * 3 / 4),
        TileCoord::new(w * 3 / 4, h / 4),
    ];
    for center in contested {
        let near_start = starts.iter().any(|s| {
            let (dx, dy) = (s.x - center.x, s.y - center.y);
            dx * dx + dy * dy < 20 * 20
        });
        if !near_start {
            place_ore_field(&terrain, &mut rng, &mut patches, &mut taken, center, 5, 8, (8000, 10000));
        }
    }

    Ok(GeneratedMap {
        terrain,
        starts,
        patches,
    })
}

/// Stamp roughly circular blobs with a jittered edge.
fn place_blobs(terrain: &mut TerrainGrid, rng: &mut MapRng, kind: TerrainType, spec: FeatureSpec) {
    let half = Fixed::from_num(0.5);
    for _ in 0..spec.count {
        let center = TileCoord::new(
            rng.next_range(0, terrain.width() as i32),
            rng.next_range(0, terrain.height() as i32),
        );
        let size = rng.next_range(spec.min_size, spec.max_size);
        let limit = Fixed::from_num(size);
        for dy in -size..=size {
            for dx in -size..=size {
                let jitter = (rng.next_unit() - half) * limit * half;
                let dist = fixed_sqrt(Fixed::from_num(dx * dx + dy * dy)) + jitter;
                if dist <= limit {
                    terrain.set(TileCoord::new(center.x + dx, center.y + dy), kind);
                }
            }
        }
    }
}

/// Ground touching deep water (8-neighborhood) becomes shallow water.
fn add_shorelines(terrain: &mut TerrainGrid) {
    let shore: Vec<TileCoord> = terrain
        .iter()
        .filter(|(_, t)| *t == TerrainType::Ground)
        .map(|(tile, _)| tile)
        .filter(|tile| {
            (-1..=1).any(|dy| {
                (-1..=1).any(|dx| {
                    (dx, dy) != (0, 0)
                        && terrain.get(TileCoord::new(tile.x + dx, tile.y + dy)) == Some(TerrainType::DeepWater)
                })
            })
        })
        .collect();
    for tile in shore {
        terrain.set(tile, TerrainType::ShallowWater);
    }
}

/// Make a road passable for ground units: deep water is bridged to shallow,
/// shallow water stays, everything else is cleared to ground.
fn carve_road(terrain: &mut TerrainGrid, route: impl Iterator<Item = TileCoord>, half_width: i32) {
    for node in route {
        for dy in -half_width..=half_width {
            for dx in -half_width..=half_width {
                let tile = TileCoord::new(node.x + dx, node.y + dy);
                match terrain.get(tile) {
                    Some(TerrainType::DeepWater) => {
                        terrain.set(tile, TerrainType::ShallowWater);
                    }
                    Some(TerrainType::ShallowWater) | None => {}
                    Some(_) => {
                        terrain.set(tile, TerrainType::Ground);
                    }
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn place_ore_field(
    terrain: &TerrainGrid,
    rng: &mut MapRng,
    patches: &mut Vec<PatchSpot>,
    taken: &mut BTreeSet<TileCoord>,
    center: TileCoord,
    attempts: u32,
    radius: i32,
    (min_amount, max_amount): (i32, i32),
) {
    for _ in 0..attempts {
        let dx = rng.next_range(-radius, radius + 1);
        let dy = rng.next_range(-radius, radius + 1);
        let amount = rng.next_range(min_amount, max_amount);
        if dx * dx + dy * dy > radius * radius {
            continue;
        }
        let tile = TileCoord::new(center.x + dx, center.y + dy);
        if terrain.get(tile) != Some(TerrainType::Ground) || !taken.insert(tile) {
            continue;
        }
        patches.push(PatchSpot { tile, amount });
    }
}

/// An AI opponent in a new match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Opponent {
    /// Play style.
    pub personality: Personality,
    /// Difficulty tier.
    pub difficulty: Difficulty,
}

/// Everything needed to start a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSetup {
    /// Map seed.
    pub seed: u64,
    /// Who drives the human player's slot. An AI controller here turns the
    /// match into an unattended AI-vs-AI game.
    pub human: Controller,
    /// One to three AI opponents.
    pub opponents: Vec<Opponent>,
}

impl Default for MatchSetup {
    fn default() -> Self {
        Self {
            seed: 12345,
            human: Controller::Human,
            opponents: vec![Opponent::default()],
        }
    }
}

/// Start a match: generate the map, create every player with the credits
/// and decision interval of its difficulty, place one finished headquarters
/// per starting position, then compute initial power and fog.
///
/// The human player takes the first starting position; opponents take the
/// following ids and positions in order.
pub fn new_game(config: SimConfig, rules: Rules, setup: &MatchSetup) -> Result<GameState> {
    config.validate()?;
    if setup.opponents.is_empty() || setup.opponents.len() > 3 {
        return Err(GameError::InvalidState(format!(
            "a match needs 1 to 3 opponents, got {}",
            setup.opponents.len()
        )));
    }

    let human = config.human_player;
    let mut roster = vec![(human, setup.human)];
    for (i, opponent) in setup.opponents.iter().enumerate() {
        let offset = u8::try_from(i + 1).map_err(|_| GameError::InvalidState("too many players".into()))?;
        let id = human
            .0
            .checked_add(offset)
            .map(PlayerId)
            .ok_or_else(|| GameError::InvalidState(format!("player id overflow after {human}")))?;
        roster.push((
            id,
            Controller::Ai {
                personality: opponent.personality,
                difficulty: opponent.difficulty,
            },
        ));
    }

    let map_config = MapConfig::for_sim(&config)
        .with_seed(setup.seed)
        .with_players(roster.len());
    let map = generate_map(&map_config, config.tile())?;
    let table = config.difficulty;
    let mut state = GameState::new(config, rules, map.terrain);

    for ((id, controller), start) in roster.into_iter().zip(&map.starts) {
        let difficulty = match controller {
            Controller::Ai { difficulty, .. } => difficulty,
            Controller::Human => Difficulty::Normal,
        };
        let settings = table.get(difficulty);
        state.add_player(id, controller, settings.starting_credits);
        let position = state.terrain().tile_center(*start);
        if let Some(player) = state.player_mut(id) {
            player.start_position = Some(position);
            if controller.is_ai() {
                player.decision_cooldown_ms = i64::try_from(settings.decision_interval_ms).unwrap_or(i64::MAX);
            }
        }
        state.spawn_building(id, BuildingType::Headquarters, position, false)?;
    }

    for spot in &map.patches {
        let position = state.terrain().tile_center(spot.tile);
        state.add_resource_patch(position, spot.amount);
    }

    update_power(&mut state);
    update_fog(&mut state);
    info!(
        seed = setup.seed,
        players = state.players().len(),
        patches = map.patches.len(),
        "new game"
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(seed: u64, players: usize) -> GeneratedMap {
        let config = MapConfig::default().with_seed(seed).with_players(players);
        generate_map(&config, Fixed::from_num(40)).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = MapConfig::default();
        assert_eq!((config.width, config.height), (80, 60));
        assert_eq!(config.start_tiles(), vec![TileCoord::new(5, 55), TileCoord::new(75, 5)]);
    }

    #[test]
    fn test_same_seed_same_map() {
        assert_eq!(generate(42, 2), generate(42, 2));
        assert_ne!(generate(42, 2).terrain, generate(43, 2).terrain);
    }

    #[test]
    fn test_starts_are_cleared_and_connected() {
        for seed in [1, 7, 12345, 99999] {
            let map = generate(seed, 4);
            assert_eq!(map.starts.len(), 4);
            for start in &map.starts {
                for dx in -4..=4 {
                    assert_eq!(
                        map.terrain.get(TileCoord::new(start.x + dx, start.y)),
                        Some(TerrainType::Ground)
                    );
                }
            }
            // Every start can reach the next one on foot.
            let first = map.terrain.tile_center(map.starts[0]);
            for start in &map.starts[1..] {
                let goal = map.terrain.tile_center(*start);
                assert!(
                    crate::pathfinding::find_path(&map.terrain, first, goal, crate::terrain::UnitDomain::Ground)
                        .is_some(),
                    "seed {seed}: start {start:?} unreachable"
                );
            }
        }
    }

    #[test]
    fn test_patches_on_ground_without_duplicates() {
        let map = generate(2024, 2);
        assert!(!map.patches.is_empty());
        let mut tiles = BTreeSet::new();
        for spot in &map.patches {
            assert_eq!(map.terrain.get(spot.tile), Some(TerrainType::Ground));
            assert!(tiles.insert(spot.tile));
            assert!((4000..10000).contains(&spot.amount));
        }
    }

    #[test]
    fn test_shoreline_rings_deep_water() {
        let mut terrain = TerrainGrid::from_ascii(&[".....", ".....", "..W..", ".....", "#...."], Fixed::from_num(40)).unwrap();
        add_shorelines(&mut terrain);
        assert_eq!(
            terrain.to_ascii(),
            vec![".....", ".~~~.", ".~W~.", ".~~~.", "#...."]
        );
    }

    #[test]
    fn test_road_bridges_water_and_clears_rock() {
        let mut terrain = TerrainGrid::from_ascii(&["#W~T."], Fixed::from_num(40)).unwrap();
        let route = (0..5).map(|x| TileCoord::new(x, 0));
        carve_road(&mut terrain, route, 0);
        assert_eq!(terrain.to_ascii(), vec![".~~.."]);
    }

    #[test]
    fn test_new_game_places_headquarters() {
        let setup = MatchSetup {
            seed: 5,
            human: Controller::Human,
            opponents: vec![
                Opponent {
                    personality: Personality::Aggressive,
                    difficulty: Difficulty::Hard,
                },
                Opponent::default(),
            ],
        };
        let state = new_game(SimConfig::default(), Rules::stock(), &setup).unwrap();
        assert_eq!(state.players().len(), 3);

        let human = state.player(PlayerId::HUMAN).unwrap();
        assert_eq!(human.whole_credits(), 1000);
        assert!(human.base.is_some());

        let hard = state.player(PlayerId(2)).unwrap();
        assert_eq!(hard.whole_credits(), 500);
        assert_eq!(hard.decision_cooldown_ms, 3000);
        assert_ne!(hard.start_position, human.start_position);

        let hq = state.entity(hard.base.unwrap()).unwrap();
        assert!(hq.is_completed(BuildingType::Headquarters));
        assert!(state.is_visible_to(PlayerId(2), state.terrain().world_to_tile(hq.position)));
        assert!(!state.is_defeated(PlayerId(3)));
        assert!(state.resources().total_amount() > 0);
    }

    #[test]
    fn test_new_game_rejects_bad_roster() {
        let setup = MatchSetup {
            opponents: Vec::new(),
            ..Default::default()
        };
        assert!(new_game(SimConfig::default(), Rules::stock(), &setup).is_err());
    }
}
