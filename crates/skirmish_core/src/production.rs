//! Construction, production queues and building placement.

use tracing::{debug, trace};

use crate::entity::{Entity, EntityId, UnitStatus};
use crate::error::CommandError;
use crate::events::GameEvent;
use crate::math::{Fixed, Vec2Fixed};
use crate::player::PlayerId;
use crate::rules::{BuildingType, ItemType, PlacementRule, UnitType};
use crate::state::GameState;
use crate::terrain::{TerrainType, TileCoord, UnitDomain};
use crate::units::{head_to_ore, plan_route};

/// How far (in tiles) a producer searches for a free spawn tile.
const SPAWN_SEARCH_RADIUS: i32 = 3;

/// Ring distances (in tiles) searched around the headquarters for a site.
const SITE_MIN_RING: i32 = 4;
const SITE_MAX_RING: i32 = 14;

/// Advance every building under construction by one tick.
///
/// Hit points grow linearly from 1 so that the building is whole exactly
/// when its build time has elapsed. Damage taken meanwhile is not healed.
pub fn update_construction(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let tick_ms = state.config().tick_ms;
    let ids: Vec<EntityId> = state
        .entities()
        .iter()
        .filter(|e| e.as_building().is_some_and(|b| b.is_constructing()))
        .map(|e| e.id)
        .collect();

    for id in ids {
        let Some(entity) = state.entity_mut(id) else {
            continue;
        };
        let max_hp = i64::from(entity.max_hp);
        let Some(building) = entity.as_building_mut() else {
            continue;
        };
        let Some(construction) = building.construction.as_mut() else {
            continue;
        };
        let total = construction.total_ms.max(1);
        let before = construction.elapsed_ms.min(total);
        let after = (before + tick_ms).min(total);
        construction.elapsed_ms = after;
        let gain = max_hp * after as i64 / total as i64 - max_hp * before as i64 / total as i64;
        let done = after >= total;
        if done {
            building.construction = None;
            building.powered = true;
        }
        let building_type = building.building_type;
        entity.hp = (i64::from(entity.hp) + gain).min(max_hp) as i32;
        let owner = entity.owner;

        if done {
            complete_construction(state, id, owner, building_type, events);
        }
    }
}

fn complete_construction(
    state: &mut GameState,
    id: EntityId,
    owner: PlayerId,
    building_type: BuildingType,
    events: &mut Vec<GameEvent>,
) {
    debug!(building = id, player = %owner, ?building_type, "construction complete");
    if let Some(player) = state.player_mut(owner) {
        player.stats.buildings_built += 1;
    }
    events.push(GameEvent::ConstructionComplete {
        player: owner,
        building: id,
        building_type,
    });

    if building_type == BuildingType::Refinery {
        let Some(position) = state.entity(id).and_then(|b| spawn_point(state, b, UnitDomain::Ground)) else {
            return;
        };
        if let Ok(miner) = state.spawn_unit(owner, UnitType::ChronoMiner, position) {
            if let Some(player) = state.player_mut(owner) {
                player.stats.units_built += 1;
            }
            head_to_ore(state, miner);
            events.push(GameEvent::UnitReady {
                player: owner,
                unit: miner,
                unit_type: UnitType::ChronoMiner,
            });
        }
    }
}

/// Advance the head of every operational building's queue by one tick.
pub fn update_production(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let tick_ms = state.config().tick_ms;
    let ids: Vec<EntityId> = state
        .entities()
        .iter()
        .filter(|e| e.as_building().is_some_and(|b| b.is_operational() && !b.queue.is_empty()))
        .map(|e| e.id)
        .collect();

    for id in ids {
        let Some(item) = state
            .entity(id)
            .and_then(Entity::as_building)
            .and_then(|b| b.queue.front().copied())
        else {
            continue;
        };
        let total = state.rules().build_time_ms(item).unwrap_or(0);
        let Some(building) = state.entity_mut(id).and_then(Entity::as_building_mut) else {
            continue;
        };
        building.progress_ms += tick_ms;
        if building.progress_ms < total {
            continue;
        }
        building.progress_ms = 0;
        building.queue.pop_front();
        finish_item(state, id, item, events);
    }
}

fn finish_item(state: &mut GameState, producer: EntityId, item: ItemType, events: &mut Vec<GameEvent>) {
    let Some(building) = state.entity(producer) else {
        return;
    };
    let owner = building.owner;
    let rally = building.as_building().and_then(|b| b.rally_point);

    let spawn = match item {
        ItemType::Unit(unit_type) => state
            .rules()
            .unit(unit_type)
            .and_then(|stats| spawn_point(state, building, stats.domain))
            .map(|position| (unit_type, position)),
        ItemType::Building(_) => None,
    };
    let placed = spawn.and_then(|(unit_type, position)| {
        state
            .spawn_unit(owner, unit_type, position)
            .ok()
            .map(|unit| (unit, unit_type))
    });

    let Some((unit, unit_type)) = placed else {
        let refund = state.rules().cost(item).unwrap_or(0);
        debug!(building = producer, ?item, refund, "no room to spawn, refunded");
        if let Some(player) = state.player_mut(owner) {
            player.refund(refund);
        }
        events.push(GameEvent::ProductionBlocked {
            player: owner,
            building: producer,
            item,
        });
        return;
    };

    if let Some(player) = state.player_mut(owner) {
        player.stats.units_built += 1;
    }
    events.push(GameEvent::UnitReady {
        player: owner,
        unit,
        unit_type,
    });

    let route = rally.and_then(|r| plan_route(state, unit, r).map(|path| (r, path)));
    match route {
        Some((rally, path)) => {
            let armed = state.entity(unit).is_some_and(|e| e.attack.is_some());
            if let Some(u) = state.entity_mut(unit).and_then(Entity::as_unit_mut) {
                u.status = if armed { UnitStatus::AttackMoving } else { UnitStatus::Moving };
                u.destination = Some(rally);
                u.path = path.into();
            }
        }
        None => {
            if unit_type == UnitType::ChronoMiner {
                head_to_ore(state, unit);
            }
        }
    }
}

/// Where a unit of `domain` leaves `building`: just south of the footprint,
/// or the first tile within a few tiles of the building the domain can
/// occupy (this is how ships find water beside a naval yard).
#[must_use]
pub fn spawn_point(state: &GameState, building: &Entity, domain: UnitDomain) -> Option<Vec2Fixed> {
    let terrain = state.terrain();
    let half = Fixed::from_num(2);
    let preferred = Vec2Fixed::new(
        building.position.x,
        building.position.y + building.size / half + state.config().tile() / half,
    );
    if terrain.is_passable(terrain.world_to_tile(preferred), domain) {
        return Some(preferred);
    }

    let center = building.tile(terrain);
    for dy in -SPAWN_SEARCH_RADIUS..=SPAWN_SEARCH_RADIUS {
        for dx in -SPAWN_SEARCH_RADIUS..=SPAWN_SEARCH_RADIUS {
            if dx == 0 && dy == 0 {
                continue;
            }
            let tile = TileCoord::new(center.x + dx, center.y + dy);
            if terrain.is_passable(tile, domain) {
                return Some(terrain.tile_center(tile));
            }
        }
    }
    None
}

fn missing_requirements(state: &GameState, player: PlayerId, item: ItemType) -> Vec<BuildingType> {
    state
        .rules()
        .requirements(item)
        .iter()
        .filter(|req| !state.entities().has_completed(player, **req))
        .copied()
        .collect()
}

fn require_all(state: &GameState, player: PlayerId, item: ItemType) -> Result<(), CommandError> {
    let missing = missing_requirements(state, player, item);
    if missing.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = missing
        .iter()
        .map(|t| state.rules().building(*t).map_or_else(|| format!("{t:?}"), |s| s.name.clone()))
        .collect();
    Err(CommandError::MissingPrerequisites(names.join(", ")))
}

/// Append a unit to a building's production queue, charging its cost now.
pub fn queue_production(
    state: &mut GameState,
    player: PlayerId,
    building_id: EntityId,
    item: ItemType,
) -> Result<(), CommandError> {
    let producer = state.entity(building_id).ok_or(CommandError::StaleReference(building_id))?;
    if producer.owner != player {
        return Err(CommandError::NotPermitted("not your building".to_string()));
    }
    let building = producer
        .as_building()
        .ok_or_else(|| CommandError::NotPermitted("only buildings produce".to_string()))?;
    let ItemType::Unit(_) = item else {
        return Err(CommandError::NotPermitted("buildings are placed, not queued".to_string()));
    };
    if state.rules().producer(item) != Some(building.building_type) {
        return Err(CommandError::NotPermitted(format!(
            "{:?} cannot produce {item:?}",
            building.building_type
        )));
    }
    if !building.is_operational() {
        return Err(CommandError::NotReady("producer is not operational".to_string()));
    }
    if building.queue.len() >= state.config().queue_capacity {
        return Err(CommandError::QueueFull);
    }
    require_all(state, player, item)?;

    let cost = state
        .rules()
        .cost(item)
        .ok_or_else(|| CommandError::NotPermitted(format!("{item:?} is not in the catalog")))?;
    state
        .player_mut(player)
        .ok_or_else(|| CommandError::NotPermitted(format!("unknown player {player}")))?
        .spend(cost)?;
    if let Some(b) = state.entity_mut(building_id).and_then(Entity::as_building_mut) {
        b.queue.push_back(item);
    }
    trace!(player = %player, building = building_id, ?item, "queued");
    Ok(())
}

/// Check terrain and occupancy for a building of `building_type` at `position`.
pub fn check_placement(state: &GameState, building_type: BuildingType, position: Vec2Fixed) -> Result<(), CommandError> {
    let stats = state
        .rules()
        .building(building_type)
        .ok_or_else(|| CommandError::NotPermitted(format!("{building_type:?} is not in the catalog")))?;
    let terrain = state.terrain();
    let tile = terrain.world_to_tile(position);
    if terrain.get(tile) != Some(TerrainType::Ground) {
        return Err(CommandError::InvalidPlacement("cannot build on this terrain".to_string()));
    }
    if stats.placement == PlacementRule::Coastal && !terrain.is_coastal(tile) {
        return Err(CommandError::InvalidPlacement(format!("{} must be built on a coastline", stats.name)));
    }
    let half = Fixed::from_num(2);
    let size = Fixed::from_num(stats.size);
    let obstructed = state
        .entities()
        .iter()
        .any(|e| e.position.within(position, e.size / half + size / half));
    if obstructed {
        return Err(CommandError::InvalidPlacement("location is obstructed".to_string()));
    }
    Ok(())
}

/// Start construction of a building. The cost is charged up front and the
/// building appears at 1 hp, unpowered.
pub fn place_building(
    state: &mut GameState,
    player: PlayerId,
    building_type: BuildingType,
    position: Vec2Fixed,
) -> Result<EntityId, CommandError> {
    if building_type == BuildingType::Headquarters {
        return Err(CommandError::NotPermitted("headquarters cannot be built".to_string()));
    }
    let owner = state
        .player(player)
        .ok_or_else(|| CommandError::NotPermitted(format!("unknown player {player}")))?;
    if !owner.base.is_some_and(|hq| state.entities().contains(hq)) {
        return Err(CommandError::NotPermitted("no headquarters".to_string()));
    }
    require_all(state, player, building_type.into())?;
    let is_superweapon = state
        .rules()
        .building(building_type)
        .is_some_and(|s| s.superweapon.is_some());
    let already_owned = state
        .entities()
        .owned_by(player)
        .any(|e| e.building_type() == Some(building_type));
    if is_superweapon && already_owned {
        return Err(CommandError::NotPermitted("only one of each superweapon".to_string()));
    }
    check_placement(state, building_type, position)?;

    let cost = state.rules().cost(building_type.into()).unwrap_or(0);
    if let Some(p) = state.player_mut(player) {
        p.spend(cost)?;
    }
    let id = state
        .spawn_building(player, building_type, position, true)
        .map_err(|e| CommandError::NotPermitted(e.to_string()))?;
    debug!(player = %player, building = id, ?building_type, "construction started");

    // Zero build time buildings are complete on arrival.
    if state.entity(id).is_some_and(|e| e.is_completed(building_type)) {
        if let Some(p) = state.player_mut(player) {
            p.stats.buildings_built += 1;
        }
    }
    Ok(id)
}

/// Deterministic site search: walk square rings of growing radius around
/// the owner's headquarters and take the first tile that passes
/// [`check_placement`] with a one-tile buffer around existing entities.
#[must_use]
pub fn find_build_site(state: &GameState, player: PlayerId, building_type: BuildingType) -> Option<Vec2Fixed> {
    let hq = state.player(player)?.base.and_then(|id| state.entity(id))?;
    let size = Fixed::from_num(state.rules().building(building_type)?.size);
    let terrain = state.terrain();
    let center = hq.tile(terrain);
    let half = Fixed::from_num(2);
    let tile_size = state.config().tile();
    let max_x = terrain.width() as i32 - 4;
    let max_y = terrain.height() as i32 - 4;

    for ring in SITE_MIN_RING..=SITE_MAX_RING {
        for tile in ring_tiles(center, ring) {
            if tile.x < 2 || tile.y < 2 || tile.x > max_x || tile.y > max_y {
                continue;
            }
            let position = terrain.tile_center(tile);
            if check_placement(state, building_type, position).is_err() {
                continue;
            }
            let crowded = state
                .entities()
                .iter()
                .any(|e| e.position.within(position, e.size / half + size / half + tile_size));
            if !crowded {
                return Some(position);
            }
        }
    }
    None
}

fn ring_tiles(center: TileCoord, ring: i32) -> impl Iterator<Item = TileCoord> {
    (-ring..=ring).flat_map(move |dy| {
        (-ring..=ring)
            .filter(move |dx| dy.abs() == ring || dx.abs() == ring)
            .map(move |dx| TileCoord::new(center.x + dx, center.y + dy))
    })
}

/// Items `player` may order right now: units whose producer is complete and
/// buildings whose prerequisites are met, minus superweapons already owned.
#[must_use]
pub fn producible_items(state: &GameState, player: PlayerId) -> Vec<ItemType> {
    let rules = state.rules();
    let mut items: Vec<ItemType> = UnitType::ALL
        .iter()
        .filter(|t| {
            rules
                .unit(**t)
                .is_some_and(|s| state.entities().has_completed(player, s.produced_by))
        })
        .map(|t| ItemType::Unit(*t))
        .collect();

    let has_hq = state
        .player(player)
        .and_then(|p| p.base)
        .is_some_and(|hq| state.entities().contains(hq));
    if has_hq {
        items.extend(
            BuildingType::ALL
                .iter()
                .filter(|t| **t != BuildingType::Headquarters)
                .filter(|t| missing_requirements(state, player, ItemType::Building(**t)).is_empty())
                .filter(|t| {
                    let unique = rules.building(**t).is_some_and(|s| s.superweapon.is_some());
                    !unique || !state.entities().owned_by(player).any(|e| e.building_type() == Some(**t))
                })
                .map(|t| ItemType::Building(*t)),
        );
    }
    items
}
