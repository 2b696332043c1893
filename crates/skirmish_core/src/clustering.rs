//! Visual grouping of nearby units for renderers.
//!
//! Nothing in the simulation reads these markers. A renderer calls
//! [`cluster_units`] on a snapshot and draws one marker per cluster instead
//! of every unit in it.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};
use crate::math::{Fixed, Vec2Fixed};
use crate::player::PlayerId;
use crate::terrain::UnitDomain;

/// Several units drawn as one marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCluster {
    /// Members, ascending.
    pub units: Vec<EntityId>,
    /// Owner shared by every member.
    pub owner: PlayerId,
    /// Domain shared by every member.
    pub domain: UnitDomain,
    /// Mean member position.
    pub position: Vec2Fixed,
    /// Summed hit points.
    pub hp: i32,
    /// Summed maximum hit points.
    pub max_hp: i32,
}

/// What a renderer should draw.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterView {
    /// Groups of two or more units.
    pub clusters: Vec<UnitCluster>,
    /// Buildings and units that are drawn on their own.
    pub singles: Vec<EntityId>,
}

/// Group units of the same owner and domain that are chained together by
/// gaps shorter than `distance`.
///
/// Membership is transitive: a unit joins a cluster if it is close to any
/// member, not necessarily to all of them. Input order only affects the
/// order of the output, which follows the lowest member id.
#[must_use]
pub fn cluster_units<'a, I>(entities: I, distance: Fixed) -> ClusterView
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut view = ClusterView::default();
    let mut units: Vec<&Entity> = Vec::new();
    for entity in entities {
        if entity.is_unit() {
            units.push(entity);
        } else {
            view.singles.push(entity.id);
        }
    }
    units.sort_by_key(|e| e.id);

    let limit = distance * distance;
    let mut visited = BTreeSet::new();
    for (start, seed) in units.iter().enumerate() {
        if !visited.insert(seed.id) {
            continue;
        }
        let mut members = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let here = units[current];
            for (index, other) in units.iter().enumerate() {
                if visited.contains(&other.id)
                    || other.owner != here.owner
                    || other.domain() != here.domain()
                    || here.position.distance_squared(other.position) >= limit
                {
                    continue;
                }
                visited.insert(other.id);
                members.push(index);
                queue.push_back(index);
            }
        }

        if members.len() == 1 {
            view.singles.push(seed.id);
            continue;
        }
        view.clusters.push(summarize(members.iter().map(|&i| units[i])));
    }

    view.singles.sort_unstable();
    view
}

fn summarize<'a>(members: impl Iterator<Item = &'a Entity>) -> UnitCluster {
    let mut ids = Vec::new();
    let mut sum = Vec2Fixed::ZERO;
    let mut hp = 0;
    let mut max_hp = 0;
    let mut owner = PlayerId::HUMAN;
    let mut domain = UnitDomain::Ground;
    for unit in members {
        if ids.is_empty() {
            owner = unit.owner;
            domain = unit.domain();
        }
        ids.push(unit.id);
        sum = sum + unit.position;
        hp += unit.hp;
        max_hp += unit.max_hp;
    }
    ids.sort_unstable();
    let count = Fixed::from_num(ids.len());
    UnitCluster {
        units: ids,
        owner,
        domain,
        position: Vec2Fixed::new(sum.x / count, sum.y / count),
        hp,
        max_hp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::player::Controller;
    use crate::rules::{BuildingType, Rules, UnitType};
    use crate::state::GameState;
    use crate::terrain::TerrainGrid;

    fn state() -> GameState {
        let mut s = GameState::new(
            SimConfig::default(),
            Rules::stock(),
            TerrainGrid::new(40, 40, Fixed::from_num(40)),
        );
        s.add_player(PlayerId(1), Controller::Human, 0);
        s.add_player(PlayerId(2), Controller::Human, 0);
        s
    }

    #[test]
    fn test_chained_units_form_one_cluster() {
        let mut s = state();
        let a = s.spawn_unit(PlayerId(1), UnitType::Rifleman, Vec2Fixed::from_ints(100, 100)).unwrap();
        let b = s.spawn_unit(PlayerId(1), UnitType::Rifleman, Vec2Fixed::from_ints(130, 100)).unwrap();
        // Too far from `a`, close to `b`.
        let c = s.spawn_unit(PlayerId(1), UnitType::Rifleman, Vec2Fixed::from_ints(160, 100)).unwrap();
        let view = cluster_units(s.entities().iter(), Fixed::from_num(40));
        assert_eq!(view.clusters.len(), 1);
        let cluster = &view.clusters[0];
        assert_eq!(cluster.units, vec![a, b, c]);
        assert_eq!(cluster.position, Vec2Fixed::from_ints(130, 100));
        assert_eq!(cluster.owner, PlayerId(1));
        assert!(view.singles.is_empty());
    }

    #[test]
    fn test_owner_and_domain_split_clusters() {
        let mut s = state();
        let mine = s.spawn_unit(PlayerId(1), UnitType::Rifleman, Vec2Fixed::from_ints(100, 100)).unwrap();
        let theirs = s.spawn_unit(PlayerId(2), UnitType::Rifleman, Vec2Fixed::from_ints(105, 100)).unwrap();
        let tank = s.spawn_unit(PlayerId(1), UnitType::Tank, Vec2Fixed::from_ints(110, 100)).unwrap();
        let view = cluster_units(s.entities().iter(), Fixed::from_num(40));
        // Rifleman and tank are both ground units of player 1.
        assert_eq!(view.clusters.len(), 1);
        assert_eq!(view.clusters[0].units, vec![mine, tank]);
        assert_eq!(view.singles, vec![theirs]);
    }

    #[test]
    fn test_buildings_pass_through_and_hp_sums() {
        let mut s = state();
        let hq = s
            .spawn_building(PlayerId(1), BuildingType::Headquarters, Vec2Fixed::from_ints(600, 600), false)
            .unwrap();
        let a = s.spawn_unit(PlayerId(1), UnitType::Rifleman, Vec2Fixed::from_ints(100, 100)).unwrap();
        s.spawn_unit(PlayerId(1), UnitType::Rifleman, Vec2Fixed::from_ints(110, 100)).unwrap();
        s.entity_mut(a).unwrap().hp -= 10;
        let max = s.entity(a).unwrap().max_hp;
        let view = cluster_units(s.entities().iter(), Fixed::from_num(40));
        assert_eq!(view.singles, vec![hq]);
        assert_eq!(view.clusters[0].max_hp, max * 2);
        assert_eq!(view.clusters[0].hp, max * 2 - 10);
    }
}
