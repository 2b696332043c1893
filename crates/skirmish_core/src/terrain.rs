//! Tile grid with per-domain passability.
//!
//! The grid is built once at match start and never mutated afterwards;
//! snapshots share it through an `Arc`.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};

/// Terrain type of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TerrainType {
    /// Open ground.
    #[default]
    Ground,
    /// Impassable rock.
    Mountain,
    /// Forest, slow for map-generation roads but passable.
    Trees,
    /// Wadeable water: ground and sea units both pass.
    ShallowWater,
    /// Open sea.
    DeepWater,
}

impl TerrainType {
    /// Whether this tile is water of any depth.
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Self::ShallowWater | Self::DeepWater)
    }

    /// Whether units of `domain` may occupy this tile.
    #[must_use]
    pub const fn passable_for(self, domain: UnitDomain) -> bool {
        match domain {
            UnitDomain::Air => true,
            UnitDomain::Ground => !matches!(self, Self::Mountain | Self::DeepWater),
            UnitDomain::Sea => self.is_water(),
        }
    }

    /// Step cost used by the map-generation road carver.
    ///
    /// Every terrain is traversable there; rough tiles are just expensive.
    #[must_use]
    pub fn generation_cost(self) -> Fixed {
        match self {
            Self::Ground => Fixed::ONE,
            Self::Trees => Fixed::from_num(2),
            Self::ShallowWater => Fixed::from_num(5),
            Self::Mountain | Self::DeepWater => Fixed::from_num(100),
        }
    }

    /// ASCII glyph used by [`TerrainGrid::from_ascii`] and debug dumps.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Ground => '.',
            Self::Mountain => '#',
            Self::Trees => 'T',
            Self::ShallowWater => '~',
            Self::DeepWater => 'W',
        }
    }

    fn from_glyph(c: char) -> Option<Self> {
        match c {
            '.' => Some(Self::Ground),
            '#' => Some(Self::Mountain),
            'T' => Some(Self::Trees),
            '~' => Some(Self::ShallowWater),
            'W' => Some(Self::DeepWater),
            _ => None,
        }
    }
}

/// Movement domain of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitDomain {
    /// Walks on land and wades shallow water.
    Ground,
    /// Flies over everything.
    Air,
    /// Sails on water only.
    Sea,
}

/// Integer tile coordinates. May lie outside the grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct TileCoord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl TileCoord {
    /// Create tile coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Immutable grid of terrain tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainGrid {
    width: u32,
    height: u32,
    #[serde(with = "fixed_serde")]
    tile_size: Fixed,
    tiles: Vec<TerrainType>,
}

impl TerrainGrid {
    /// Create a grid of open ground.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero, or if `tile_size` is not positive.
    #[must_use]
    pub fn new(width: u32, height: u32, tile_size: Fixed) -> Self {
        assert!(width > 0, "TerrainGrid width must be positive");
        assert!(height > 0, "TerrainGrid height must be positive");
        assert!(tile_size > Fixed::ZERO, "TerrainGrid tile_size must be positive");

        Self {
            width,
            height,
            tile_size,
            tiles: vec![TerrainType::Ground; (width as usize) * (height as usize)],
        }
    }

    /// Parse a grid from rows of glyphs (`.` ground, `#` mountain, `T` trees,
    /// `~` shallow water, `W` deep water).
    pub fn from_ascii(rows: &[&str], tile_size: Fixed) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.chars().count());
        if width == 0 || height == 0 {
            return Err(GameError::InvalidTerrain("empty terrain layout".into()));
        }
        if tile_size <= Fixed::ZERO {
            return Err(GameError::InvalidTerrain("tile size must be positive".into()));
        }

        let mut tiles = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(GameError::InvalidTerrain(format!(
                    "row {y} has {} tiles, expected {width}",
                    row.chars().count()
                )));
            }
            for c in row.chars() {
                let terrain = TerrainType::from_glyph(c).ok_or_else(|| {
                    GameError::InvalidTerrain(format!("unknown glyph '{c}' in row {y}"))
                })?;
                tiles.push(terrain);
            }
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
            tile_size,
            tiles,
        })
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Tile edge length in world units.
    #[must_use]
    pub const fn tile_size(&self) -> Fixed {
        self.tile_size
    }

    /// World-space extent of the grid.
    #[must_use]
    pub fn world_size(&self) -> Vec2Fixed {
        Vec2Fixed::new(
            Fixed::from_num(self.width) * self.tile_size,
            Fixed::from_num(self.height) * self.tile_size,
        )
    }

    /// Check if a tile lies inside the grid.
    #[must_use]
    pub const fn in_bounds(&self, tile: TileCoord) -> bool {
        tile.x >= 0 && tile.y >= 0 && (tile.x as u32) < self.width && (tile.y as u32) < self.height
    }

    /// Row-major index of an in-bounds tile.
    #[must_use]
    pub fn index(&self, tile: TileCoord) -> Option<usize> {
        self.in_bounds(tile)
            .then(|| (tile.y as usize) * (self.width as usize) + (tile.x as usize))
    }

    /// Tile coordinates for a row-major index.
    #[must_use]
    pub const fn coord(&self, index: usize) -> TileCoord {
        TileCoord::new(
            (index % self.width as usize) as i32,
            (index / self.width as usize) as i32,
        )
    }

    /// Terrain at a tile, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, tile: TileCoord) -> Option<TerrainType> {
        self.index(tile).map(|i| self.tiles[i])
    }

    /// Overwrite a tile. Returns `false` when out of bounds.
    ///
    /// Only used while a map is being built.
    pub fn set(&mut self, tile: TileCoord, terrain: TerrainType) -> bool {
        match self.index(tile) {
            Some(i) => {
                self.tiles[i] = terrain;
                true
            }
            None => false,
        }
    }

    /// Whether `domain` may occupy `tile`. Out-of-bounds tiles are impassable.
    #[must_use]
    pub fn is_passable(&self, tile: TileCoord, domain: UnitDomain) -> bool {
        self.get(tile).is_some_and(|t| t.passable_for(domain))
    }

    /// Tile containing a world position (floor division).
    #[must_use]
    pub fn world_to_tile(&self, pos: Vec2Fixed) -> TileCoord {
        TileCoord::new(
            (pos.x / self.tile_size).floor().to_num::<i32>(),
            (pos.y / self.tile_size).floor().to_num::<i32>(),
        )
    }

    /// World position of a tile's center.
    #[must_use]
    pub fn tile_center(&self, tile: TileCoord) -> Vec2Fixed {
        let half = self.tile_size / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(tile.x) * self.tile_size + half,
            Fixed::from_num(tile.y) * self.tile_size + half,
        )
    }

    /// A land tile is coastal when any of its 8 neighbours is water.
    #[must_use]
    pub fn is_coastal(&self, tile: TileCoord) -> bool {
        if self.get(tile).map_or(true, TerrainType::is_water) {
            return false;
        }
        (-1..=1).any(|dy| {
            (-1..=1).any(|dx| {
                (dx, dy) != (0, 0)
                    && self
                        .get(TileCoord::new(tile.x + dx, tile.y + dy))
                        .is_some_and(TerrainType::is_water)
            })
        })
    }

    /// Iterate all tiles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (TileCoord, TerrainType)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, t)| (self.coord(i), *t))
    }

    /// Render the grid as glyph rows.
    #[must_use]
    pub fn to_ascii(&self) -> Vec<String> {
        self.tiles
            .chunks(self.width as usize)
            .map(|row| row.iter().map(|t| t.glyph()).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&str]) -> TerrainGrid {
        TerrainGrid::from_ascii(rows, Fixed::from_num(40)).unwrap()
    }

    #[test]
    fn test_passability_matrix() {
        use TerrainType::{DeepWater, Mountain, ShallowWater, Trees};
        let ground = UnitDomain::Ground;
        assert!(TerrainType::Ground.passable_for(ground));
        assert!(Trees.passable_for(ground));
        assert!(ShallowWater.passable_for(ground));
        assert!(!Mountain.passable_for(ground));
        assert!(!DeepWater.passable_for(ground));

        assert!(ShallowWater.passable_for(UnitDomain::Sea));
        assert!(DeepWater.passable_for(UnitDomain::Sea));
        assert!(!TerrainType::Ground.passable_for(UnitDomain::Sea));

        for t in [TerrainType::Ground, Mountain, Trees, ShallowWater, DeepWater] {
            assert!(t.passable_for(UnitDomain::Air));
        }
    }

    #[test]
    fn test_out_of_bounds_is_impassable() {
        let g = grid(&["..", ".."]);
        assert!(!g.is_passable(TileCoord::new(-1, 0), UnitDomain::Air));
        assert!(!g.is_passable(TileCoord::new(2, 0), UnitDomain::Ground));
        assert!(g.is_passable(TileCoord::new(1, 1), UnitDomain::Ground));
    }

    #[test]
    fn test_world_tile_conversion() {
        let g = grid(&["...", "..."]);
        let tile = g.world_to_tile(Vec2Fixed::from_ints(85, 39));
        assert_eq!(tile, TileCoord::new(2, 0));
        assert_eq!(g.tile_center(tile), Vec2Fixed::from_ints(100, 20));
        assert_eq!(
            g.world_to_tile(Vec2Fixed::from_ints(-1, 0)),
            TileCoord::new(-1, 0)
        );
    }

    #[test]
    fn test_coastal_detection() {
        let g = grid(&["..W", "...", "#.."]);
        assert!(g.is_coastal(TileCoord::new(1, 0)));
        assert!(g.is_coastal(TileCoord::new(1, 1)));
        assert!(!g.is_coastal(TileCoord::new(0, 2)));
        assert!(!g.is_coastal(TileCoord::new(2, 0)));
    }

    #[test]
    fn test_ascii_round_trip_and_errors() {
        let rows = [".#T", "~W."];
        let g = grid(&rows);
        assert_eq!(g.to_ascii(), vec![".#T".to_string(), "~W.".to_string()]);
        assert!(TerrainGrid::from_ascii(&["..", "."], Fixed::from_num(40)).is_err());
        assert!(TerrainGrid::from_ascii(&["?"], Fixed::from_num(40)).is_err());
        assert!(TerrainGrid::from_ascii(&[], Fixed::from_num(40)).is_err());
    }
}
