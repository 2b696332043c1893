//! Uniform-grid spatial hash for proximity queries.
//!
//! Rebuilt from scratch once per tick from entity positions. Queries return
//! ids whose indexed position lies within the radius; callers re-check
//! against live positions if entities moved since the build.

use std::collections::HashMap;

use crate::entity::EntityId;
use crate::math::{Fixed, Vec2Fixed};
use crate::store::EntityStore;

/// Spatial hash over entity centers.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: Fixed,
    cells: HashMap<(i32, i32), Vec<(EntityId, Vec2Fixed)>>,
}

impl SpatialIndex {
    /// Empty index. Cells are at least one world unit wide.
    #[must_use]
    pub fn new(cell_size: Fixed) -> Self {
        Self {
            cell_size: cell_size.max(Fixed::ONE),
            cells: HashMap::new(),
        }
    }

    /// Index every entity in the store.
    #[must_use]
    pub fn build(store: &EntityStore, cell_size: Fixed) -> Self {
        let mut index = Self::new(cell_size);
        for entity in store.iter() {
            index.insert(entity.id, entity.position);
        }
        index
    }

    fn cell_of(&self, pos: Vec2Fixed) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor().to_num::<i32>(),
            (pos.y / self.cell_size).floor().to_num::<i32>(),
        )
    }

    /// Add an entry.
    pub fn insert(&mut self, id: EntityId, position: Vec2Fixed) {
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().push((id, position));
    }

    /// Ids within `radius` of `center` (inclusive), in ascending id order.
    #[must_use]
    pub fn query_radius(&self, center: Vec2Fixed, radius: Fixed) -> Vec<EntityId> {
        let radius = radius.max(Fixed::ZERO);
        let min = self.cell_of(Vec2Fixed::new(center.x - radius, center.y - radius));
        let max = self.cell_of(Vec2Fixed::new(center.x + radius, center.y + radius));
        let r2 = radius.saturating_mul(radius);

        let mut found = Vec::new();
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                found.extend(
                    bucket
                        .iter()
                        .filter(|(_, pos)| pos.distance_squared(center) <= r2)
                        .map(|(id, _)| *id),
                );
            }
        }
        found.sort_unstable();
        found
    }

    /// Number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
