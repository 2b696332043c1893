//! Grid-based pathfinding using the A* algorithm.
//!
//! Two searches share one A* core:
//!
//! - [`find_path`] is the live query units use. Only tiles passable for the
//!   unit's [`UnitDomain`] are expanded, cardinal steps cost 1 and diagonal
//!   steps cost `sqrt(2)`. Diagonals may not cut blocked corners.
//! - [`find_path_weighted`] is used by map generation to carve roads. Every
//!   tile is traversable at its [`TerrainType::generation_cost`].
//!
//! All scores are fixed-point and ties are broken by tile index, so the
//! same query always returns the same route.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::math::{fixed_sqrt, Fixed, Vec2Fixed, SQRT_2};
use crate::terrain::{TerrainGrid, TerrainType, TileCoord, UnitDomain};

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    index: usize,
    f_score: Fixed,
    /// Lower tile index wins ties, keeping expansion order reproducible.
    tie_breaker: usize,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for min-heap behaviour.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// Straight-line distance between tile centers, in tiles.
#[inline]
fn euclidean_heuristic(a: TileCoord, b: TileCoord) -> Fixed {
    let dx = Fixed::from_num(a.x - b.x);
    let dy = Fixed::from_num(a.y - b.y);
    fixed_sqrt(dx * dx + dy * dy)
}

/// Core A* over tile coordinates.
///
/// `step_cost(from, to, diagonal)` returns `None` when the step is not
/// allowed. The returned route excludes `start` and ends at `goal`.
fn astar<F>(grid: &TerrainGrid, start: TileCoord, goal: TileCoord, step_cost: F) -> Option<Vec<TileCoord>>
where
    F: Fn(TileCoord, TileCoord, bool) -> Option<Fixed>,
{
    let start_index = grid.index(start)?;
    let goal_index = grid.index(goal)?;
    if start_index == goal_index {
        return Some(vec![goal]);
    }

    let cells = (grid.width() as usize) * (grid.height() as usize);
    let mut g_score = vec![Fixed::MAX; cells];
    let mut came_from: Vec<Option<usize>> = vec![None; cells];
    let mut closed = vec![false; cells];
    let mut open_set = BinaryHeap::new();

    g_score[start_index] = Fixed::ZERO;
    open_set.push(AStarNode {
        index: start_index,
        f_score: euclidean_heuristic(start, goal),
        tie_breaker: start_index,
    });

    while let Some(current) = open_set.pop() {
        if current.index == goal_index {
            return Some(reconstruct_path(grid, &came_from, start_index, goal_index));
        }
        if closed[current.index] {
            continue;
        }
        closed[current.index] = true;

        let here = grid.coord(current.index);
        let current_g = g_score[current.index];

        for &(dx, dy) in &DIRECTIONS {
            let next = TileCoord::new(here.x + dx, here.y + dy);
            let Some(next_index) = grid.index(next) else {
                continue;
            };
            if closed[next_index] {
                continue;
            }
            let Some(cost) = step_cost(here, next, dx != 0 && dy != 0) else {
                continue;
            };

            let tentative_g = current_g.saturating_add(cost);
            if tentative_g < g_score[next_index] {
                g_score[next_index] = tentative_g;
                came_from[next_index] = Some(current.index);
                open_set.push(AStarNode {
                    index: next_index,
                    f_score: tentative_g.saturating_add(euclidean_heuristic(next, goal)),
                    tie_breaker: next_index,
                });
            }
        }
    }

    None
}

fn reconstruct_path(
    grid: &TerrainGrid,
    came_from: &[Option<usize>],
    start_index: usize,
    goal_index: usize,
) -> Vec<TileCoord> {
    let mut path = vec![grid.coord(goal_index)];
    let mut current = goal_index;
    while let Some(prev) = came_from[current] {
        if prev == start_index {
            break;
        }
        path.push(grid.coord(prev));
        current = prev;
    }
    path.reverse();
    path
}

/// Find a route for a unit of `domain` from `start` to `end`.
///
/// Returns the waypoints to visit (tile centers, excluding the start tile),
/// or `None` when the goal tile is impassable or unreachable.
#[must_use]
pub fn find_path(
    grid: &TerrainGrid,
    start: Vec2Fixed,
    end: Vec2Fixed,
    domain: UnitDomain,
) -> Option<Vec<Vec2Fixed>> {
    let start_tile = grid.world_to_tile(start);
    let goal_tile = grid.world_to_tile(end);

    if !grid.is_passable(goal_tile, domain) {
        return None;
    }
    // A unit standing on an edge tile it cannot occupy (e.g. just spawned)
    // still needs to leave it, so the start tile only has to be in bounds.
    if !grid.in_bounds(start_tile) {
        return None;
    }

    let tiles = astar(grid, start_tile, goal_tile, |from, to, diagonal| {
        if !grid.is_passable(to, domain) {
            return None;
        }
        if diagonal {
            // No corner cutting through impassable tiles.
            let side_a = TileCoord::new(to.x, from.y);
            let side_b = TileCoord::new(from.x, to.y);
            if !grid.is_passable(side_a, domain) || !grid.is_passable(side_b, domain) {
                return None;
            }
            return Some(SQRT_2);
        }
        Some(Fixed::ONE)
    })?;

    Some(tiles.into_iter().map(|t| grid.tile_center(t)).collect())
}

/// Find the cheapest tile route for road carving, treating every terrain as
/// traversable at its generation cost.
///
/// Returns the tiles to visit after `start`, ending at `end`.
#[must_use]
pub fn find_path_weighted(
    grid: &TerrainGrid,
    start: TileCoord,
    end: TileCoord,
) -> Option<Vec<TileCoord>> {
    astar(grid, start, end, |_, to, diagonal| {
        let cost = grid.get(to).map_or(Fixed::MAX, TerrainType::generation_cost);
        Some(if diagonal { cost.saturating_mul(SQRT_2) } else { cost })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&str]) -> TerrainGrid {
        TerrainGrid::from_ascii(rows, Fixed::from_num(40)).unwrap()
    }

    fn center(g: &TerrainGrid, x: i32, y: i32) -> Vec2Fixed {
        g.tile_center(TileCoord::new(x, y))
    }

    #[test]
    fn test_straight_path() {
        let g = grid(&["....."]);
        let path = find_path(&g, center(&g, 0, 0), center(&g, 4, 0), UnitDomain::Ground).unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path.last().copied(), Some(center(&g, 4, 0)));
    }

    #[test]
    fn test_same_tile_returns_goal() {
        let g = grid(&["..."]);
        let path = find_path(&g, center(&g, 1, 0), center(&g, 1, 0), UnitDomain::Ground).unwrap();
        assert_eq!(path, vec![center(&g, 1, 0)]);
    }

    #[test]
    fn test_routes_around_mountain_ridge() {
        let g = grid(&[
            ".....", //
            ".###.", //
            ".#...", //
            ".#.#.", //
            ".....",
        ]);
        let start = center(&g, 0, 0);
        let goal = center(&g, 2, 2);
        let path = find_path(&g, start, goal, UnitDomain::Ground).unwrap();
        for p in &path {
            assert!(g.is_passable(g.world_to_tile(*p), UnitDomain::Ground));
        }
        assert_eq!(path.last().copied(), Some(goal));
    }

    #[test]
    fn test_no_path_when_goal_enclosed() {
        let g = grid(&[
            ".....", //
            ".###.", //
            ".#.#.", //
            ".###.", //
            ".....",
        ]);
        assert!(find_path(&g, center(&g, 0, 0), center(&g, 2, 2), UnitDomain::Ground).is_none());
        // Aircraft ignore terrain.
        assert!(find_path(&g, center(&g, 0, 0), center(&g, 2, 2), UnitDomain::Air).is_some());
    }

    #[test]
    fn test_impassable_goal_returns_none() {
        let g = grid(&["..W"]);
        assert!(find_path(&g, center(&g, 0, 0), center(&g, 2, 0), UnitDomain::Ground).is_none());
        assert!(find_path(&g, center(&g, 0, 0), center(&g, 5, 0), UnitDomain::Air).is_none());
    }

    #[test]
    fn test_sea_units_stay_on_water() {
        let g = grid(&[
            "~~~~", //
            "W..W", //
            "WWWW",
        ]);
        let path = find_path(&g, center(&g, 0, 1), center(&g, 3, 1), UnitDomain::Sea).unwrap();
        for p in &path {
            assert!(g.get(g.world_to_tile(*p)).is_some_and(TerrainType::is_water));
        }
    }

    #[test]
    fn test_diagonal_costs_sqrt2() {
        let g = grid(&["...", "...", "..."]);
        let start = center(&g, 0, 0);
        let path = find_path(&g, start, center(&g, 2, 2), UnitDomain::Ground).unwrap();
        // Two diagonal steps beat four cardinal ones.
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_no_corner_cutting() {
        let g = grid(&[".#", ".."]);
        let path = find_path(&g, center(&g, 0, 0), center(&g, 1, 1), UnitDomain::Ground).unwrap();
        assert_eq!(path, vec![center(&g, 0, 1), center(&g, 1, 1)]);
    }

    #[test]
    fn test_deterministic_paths() {
        let g = grid(&[
            "........", //
            "..##....", //
            "..##..#.", //
            "......#.",
        ]);
        let a = find_path(&g, center(&g, 0, 0), center(&g, 7, 3), UnitDomain::Ground);
        let b = find_path(&g, center(&g, 0, 0), center(&g, 7, 3), UnitDomain::Ground);
        assert_eq!(a, b);
    }

    #[test]
    fn test_weighted_path_prefers_ground() {
        let g = grid(&[
            ".....", //
            "WWWW.", //
            ".....",
        ]);
        let path = find_path_weighted(&g, TileCoord::new(0, 0), TileCoord::new(0, 2)).unwrap();
        assert_eq!(path.last().copied(), Some(TileCoord::new(0, 2)));
        // Detouring around the lake is cheaper than fording deep water.
        assert!(path
            .iter()
            .all(|t| g.get(*t) != Some(TerrainType::DeepWater)));
    }

    #[test]
    fn test_weighted_path_crosses_when_forced() {
        let g = grid(&["###", ".#.", "###"]);
        let path = find_path_weighted(&g, TileCoord::new(0, 1), TileCoord::new(2, 1)).unwrap();
        assert_eq!(path.last().copied(), Some(TileCoord::new(2, 1)));
    }
}
