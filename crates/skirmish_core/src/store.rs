//! Entity arena keyed by id.
//!
//! Entities refer to each other by [`EntityId`] only. A lookup that misses
//! means the referenced entity died; callers treat that as "target gone".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};
use crate::player::PlayerId;
use crate::rules::BuildingType;

/// Storage for all live entities.
///
/// Backed by a `BTreeMap` so iteration is always in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, Entity>,
    next_id: EntityId,
}

impl EntityStore {
    /// Create an empty store. Ids start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Insert an entity, assigning it a fresh id.
    pub fn insert(&mut self, mut entity: Entity) -> EntityId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        entity.id = id;
        self.entities.insert(id, entity);
        id
    }

    /// Remove an entity.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Look up an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Look up an entity mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether an entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// All ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Entities owned by `owner`.
    pub fn owned_by(&self, owner: PlayerId) -> impl Iterator<Item = &Entity> + '_ {
        self.iter().filter(move |e| e.owner == owner)
    }

    /// Completed buildings of a type owned by `owner`.
    pub fn completed(
        &self,
        owner: PlayerId,
        building_type: BuildingType,
    ) -> impl Iterator<Item = &Entity> + '_ {
        self.owned_by(owner)
            .filter(move |e| e.is_completed(building_type))
    }

    /// Whether `owner` has at least one completed building of the type.
    #[must_use]
    pub fn has_completed(&self, owner: PlayerId, building_type: BuildingType) -> bool {
        self.completed(owner, building_type).next().is_some()
    }

    /// Number of buildings (any state) owned by `owner`.
    #[must_use]
    pub fn building_count(&self, owner: PlayerId) -> usize {
        self.owned_by(owner).filter(|e| e.is_building()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2Fixed;
    use crate::rules::{Rules, UnitType};

    #[test]
    fn test_ids_are_sequential_and_sorted() {
        let rules = Rules::stock();
        let stats = rules.unit(UnitType::Rifleman).unwrap();
        let mut store = EntityStore::new();
        let a = store.insert(Entity::new_unit(PlayerId(1), UnitType::Rifleman, stats, Vec2Fixed::ZERO));
        let b = store.insert(Entity::new_unit(PlayerId(2), UnitType::Rifleman, stats, Vec2Fixed::ZERO));
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.get(b).map(|e| e.id), Some(2));

        store.remove(a);
        let c = store.insert(Entity::new_unit(PlayerId(1), UnitType::Rifleman, stats, Vec2Fixed::ZERO));
        assert_eq!(c, 3, "ids are never reused");
        assert_eq!(store.ids(), vec![2, 3]);
        assert_eq!(store.owned_by(PlayerId(1)).count(), 1);
    }

    #[test]
    fn test_completed_buildings() {
        let rules = Rules::stock();
        let stats = rules.building(BuildingType::Barracks).unwrap();
        let mut store = EntityStore::new();
        let id = store.insert(Entity::new_building(
            PlayerId(1),
            BuildingType::Barracks,
            stats,
            Vec2Fixed::ZERO,
            true,
        ));
        assert!(!store.has_completed(PlayerId(1), BuildingType::Barracks));
        assert_eq!(store.building_count(PlayerId(1)), 1);

        if let Some(b) = store.get_mut(id).and_then(|e| e.as_building_mut()) {
            b.construction = None;
        }
        assert!(store.has_completed(PlayerId(1), BuildingType::Barracks));
    }
}
