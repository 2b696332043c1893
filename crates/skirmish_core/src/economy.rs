//! Ore patches, refinery lookup and power accounting.
//!
//! The miner state machine itself lives in [`units`](crate::units); this
//! module owns the data it works on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::entity::EntityId;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::player::{PlayerId, PowerBalance};
use crate::rules::BuildingType;
use crate::state::GameState;

/// Identifier of a resource patch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ResourceId(pub u64);

/// A harvestable ore patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePatch {
    /// Identifier.
    pub id: ResourceId,
    /// Center in world units.
    pub position: Vec2Fixed,
    /// Ore left.
    pub amount: i32,
    /// Ore at creation.
    pub max_amount: i32,
    /// Drawn diameter.
    #[serde(with = "fixed_serde")]
    pub size: Fixed,
}

/// All patches on the map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceField {
    patches: BTreeMap<ResourceId, ResourcePatch>,
    next_id: u64,
}

impl ResourceField {
    /// Add a patch.
    pub fn insert(&mut self, position: Vec2Fixed, amount: i32, size: Fixed) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.patches.insert(
            id,
            ResourcePatch {
                id,
                position,
                amount,
                max_amount: amount,
                size,
            },
        );
        id
    }

    /// Look up a patch.
    #[must_use]
    pub fn get(&self, id: ResourceId) -> Option<&ResourcePatch> {
        self.patches.get(&id)
    }

    /// Iterate patches in id order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourcePatch> + '_ {
        self.patches.values()
    }

    /// Number of patches left.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Whether every patch is gone.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Total ore left on the map.
    #[must_use]
    pub fn total_amount(&self) -> i64 {
        self.patches.values().map(|p| i64::from(p.amount)).sum()
    }

    /// Take up to `amount` ore from a patch.
    ///
    /// Returns the ore taken and whether the patch was exhausted (and
    /// therefore removed). A missing patch yields `(0, false)`.
    pub fn extract(&mut self, id: ResourceId, amount: i32) -> (i32, bool) {
        let Some(patch) = self.patches.get_mut(&id) else {
            return (0, false);
        };
        let taken = amount.min(patch.amount).max(0);
        patch.amount -= taken;
        if patch.amount <= 0 {
            self.patches.remove(&id);
            return (taken, true);
        }
        (taken, false)
    }

    /// Patch closest to `position`, ties broken by id.
    #[must_use]
    pub fn nearest(&self, position: Vec2Fixed) -> Option<ResourceId> {
        self.patches
            .values()
            .min_by_key(|p| (p.position.distance_squared(position), p.id))
            .map(|p| p.id)
    }
}

/// Closest completed, powered refinery of `owner`.
#[must_use]
pub fn nearest_refinery(state: &GameState, owner: PlayerId, position: Vec2Fixed) -> Option<EntityId> {
    state
        .entities()
        .completed(owner, BuildingType::Refinery)
        .filter(|e| e.as_building().is_some_and(|b| b.powered))
        .min_by_key(|e| (e.position.distance_squared(position), e.id))
        .map(|e| e.id)
}

/// Recompute every player's power totals from completed buildings.
pub fn update_power(state: &mut GameState) {
    let mut totals: BTreeMap<PlayerId, PowerBalance> = BTreeMap::new();
    for entity in state.entities().iter() {
        let Some(building) = entity.as_building() else {
            continue;
        };
        if building.is_constructing() {
            continue;
        }
        let Some(stats) = state.rules().building(building.building_type) else {
            continue;
        };
        let power = totals.entry(entity.owner).or_default();
        power.produced += stats.power_produced;
        power.consumed += stats.power_consumed;
    }

    let changed: Vec<(PlayerId, PowerBalance)> = state
        .players()
        .keys()
        .map(|id| (*id, totals.get(id).copied().unwrap_or_default()))
        .filter(|(id, power)| state.player(*id).is_some_and(|p| p.power != *power))
        .collect();
    for (id, power) in changed {
        trace!(player = %id, produced = power.produced, consumed = power.consumed, "power changed");
        if let Some(player) = state.player_mut(id) {
            player.power = power;
        }
    }
}
