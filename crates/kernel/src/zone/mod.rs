//! Zones: bounded regions owning actors, their grid cells and the interest
//! areas of connected heroes.

mod combat;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use glam::Vec3;
use gridrealm_common::protocol::{self, ActorUpdate, GateInfo, Notify, UpdateData, ZoneSnapshot};
use gridrealm_common::{BoundingBox, EntityId, MapData, MapGate, MapType, StaticData, ZoneId};
use gridrealm_grid::{CellCoord, Channel, Grid, ZoneCell};
use rand::RngCore;
use rand::rngs::StdRng;
use tracing::{debug, info, trace, warn};

use crate::actor::Actor;
use crate::config::SimConfig;
use crate::error::ZoneError;
use crate::interest::ClientInterestArea;
use crate::scheduler::{Scheduler, TimerHandle};
use crate::spawner::MonsterSpawner;

/// Borrowed world services handed to zone operations.
pub struct ZoneContext<'a> {
    pub scheduler: &'a mut Scheduler,
    pub data: &'a StaticData,
    pub config: &'a SimConfig,
    pub rng: &'a mut StdRng,
}

impl ZoneContext<'_> {
    /// Fresh entity id drawn from the world RNG.
    pub fn next_entity_id(&mut self) -> EntityId {
        EntityId::from_random_bytes(random_bytes(self.rng))
    }
}

pub(crate) fn random_bytes(rng: &mut StdRng) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Lifecycle flavour of a zone.
#[derive(Debug)]
pub enum ZoneKind {
    /// Lives as long as the world.
    Field,
    /// Deleted after staying empty of heroes for the grace period.
    Instance { destroy_timer: Option<TimerHandle> },
}

impl ZoneKind {
    pub fn instance() -> Self {
        Self::Instance {
            destroy_timer: None,
        }
    }
}

#[derive(Debug)]
pub struct Zone {
    id: ZoneId,
    map: MapData,
    grid: Grid<ZoneCell>,
    actors: BTreeMap<EntityId, Actor>,
    heroes: BTreeSet<EntityId>,
    gates: BTreeMap<i32, MapGate>,
    interests: BTreeMap<EntityId, ClientInterestArea>,
    /// Taken out while it runs.
    spawner: Option<MonsterSpawner>,
    kind: ZoneKind,
}

impl Zone {
    /// Build the zone grid over `[0, width] x [0, zone_height] x [0, height]`
    /// and copy the map's gates. Monsters are spawned by [`Zone::start`].
    pub fn new(
        id: ZoneId,
        map: MapData,
        kind: ZoneKind,
        data: &StaticData,
        config: &SimConfig,
    ) -> Result<Self, ZoneError> {
        let area = BoundingBox::new(
            Vec3::ZERO,
            Vec3::new(map.width as f32, config.zone_height, map.height as f32),
        );
        let grid = Grid::new(area, Vec3::splat(config.cell_size))?;
        let gates = data
            .gates_on(map.id)
            .map(|g| (g.uid, g.clone()))
            .collect();

        Ok(Self {
            id,
            map,
            grid,
            actors: BTreeMap::new(),
            heroes: BTreeSet::new(),
            gates,
            interests: BTreeMap::new(),
            spawner: Some(MonsterSpawner::new()),
            kind,
        })
    }

    /// Spawn the initial monsters.
    pub fn start(&mut self, ctx: &mut ZoneContext<'_>) {
        self.with_spawner(ctx, |spawner, zone, ctx| spawner.start(zone, ctx));
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn map_id(&self) -> i32 {
        self.map.id
    }

    pub fn map(&self) -> &MapData {
        &self.map
    }

    pub fn map_type(&self) -> MapType {
        self.map.map_type
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.kind, ZoneKind::Instance { .. })
    }

    pub fn grid(&self) -> &Grid<ZoneCell> {
        &self.grid
    }

    pub fn area(&self) -> &BoundingBox {
        self.grid.area()
    }

    /// Inclusive bounds test used by movement.
    pub fn contains(&self, position: Vec3) -> bool {
        self.grid.area().contains(position)
    }

    /// Clamp each axis into the zone volume.
    pub fn check_boundary(&self, position: Vec3) -> Vec3 {
        self.grid.area().clamp(position)
    }

    pub fn gate(&self, uid: i32) -> Option<&MapGate> {
        self.gates.get(&uid)
    }

    /// Gates of this map in uid order.
    pub fn gates(&self) -> impl Iterator<Item = &MapGate> {
        self.gates.values()
    }

    pub fn find_actor(&self, id: EntityId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn hero_count(&self) -> usize {
        self.heroes.len()
    }

    pub fn interest(&self, observer: EntityId) -> Option<&ClientInterestArea> {
        self.interests.get(&observer)
    }

    /// Monster currently alive for a spawn point.
    pub fn live_monster(&self, spawn_uid: i32) -> Option<EntityId> {
        self.spawner.as_ref()?.live_monster(spawn_uid)
    }

    pub fn destroy_timer(&self) -> Option<TimerHandle> {
        match self.kind {
            ZoneKind::Instance { destroy_timer } => destroy_timer,
            ZoneKind::Field => None,
        }
    }

    /// Cancel every timer this zone armed that would otherwise outlive it.
    pub fn cancel_timers(&mut self, scheduler: &mut Scheduler) {
        if let ZoneKind::Instance { destroy_timer } = &mut self.kind {
            if let Some(handle) = destroy_timer.take() {
                scheduler.cancel(handle);
            }
        }
        if let Some(spawner) = self.spawner.as_mut() {
            spawner.cancel_timers(scheduler);
        }
    }

    /// Whether `actor` could be registered here.
    pub fn can_enter(&self, actor: &Actor) -> Result<(), ZoneError> {
        if self.actors.contains_key(&actor.id) {
            return Err(ZoneError::AlreadyRegistered(actor.id));
        }
        if let Some(zone) = actor.zone {
            return Err(ZoneError::AlreadyInZone {
                actor: actor.id,
                zone,
            });
        }
        Ok(())
    }

    /// Register `actor` and spawn it at the clamped `position`.
    ///
    /// A connected hero gets a client interest area, which is filled before
    /// the hero's own arrival is broadcast.
    pub fn enter(
        &mut self,
        mut actor: Actor,
        position: Vec3,
        ctx: &mut ZoneContext<'_>,
    ) -> Result<EntityId, ZoneError> {
        self.can_enter(&actor)?;

        let id = actor.id;
        let position = self.check_boundary(position);
        actor.zone = Some(self.id);
        actor.current_cell = None;
        actor.position = position;

        let instance = self.is_instance();
        if let Some(hero) = actor.as_hero_mut() {
            hero.map_id = self.map.id;
            if instance {
                hero.instance_zone = Some((self.id, self.map.id));
            }
            if let Some(peer) = hero.peer() {
                let area = ClientInterestArea::new(
                    id,
                    Arc::clone(peer),
                    position,
                    ctx.config.view_distance,
                );
                self.interests.insert(id, area);
            }
            self.heroes.insert(id);
        }

        self.actors.insert(id, actor);
        info!(zone = %self.id, actor = %id, %position, "actor entered zone");
        self.refresh_interest(id);

        if let ZoneKind::Instance { destroy_timer } = &mut self.kind {
            if !self.heroes.is_empty() {
                if let Some(handle) = destroy_timer.take() {
                    ctx.scheduler.cancel(handle);
                    debug!(zone = %self.id, "instance deletion cancelled");
                }
            }
        }
        Ok(id)
    }

    /// Unregister an actor and hand it back. Absent ids are a no-op.
    ///
    /// Observers of the actor's last cell see it disappear. The actor's own
    /// interest area is released.
    pub fn exit(&mut self, id: EntityId, ctx: &mut ZoneContext<'_>) -> Option<Actor> {
        let previous = self.actors.get_mut(&id)?.current_cell.take();
        if let Some(cell) = previous {
            self.broadcast_cell_change(cell, previous, None, id);
        }
        if let Some(mut area) = self.interests.remove(&id) {
            area.release(&mut self.grid);
        }
        let mut actor = self.actors.remove(&id)?;
        actor.zone = None;
        self.heroes.remove(&id);
        info!(zone = %self.id, actor = %id, "actor left zone");

        if let ZoneKind::Instance { destroy_timer } = &mut self.kind {
            if self.heroes.is_empty() && destroy_timer.is_none() {
                let zone_id = self.id;
                let handle = ctx
                    .scheduler
                    .run_after(ctx.config.instance_grace(), move |world| {
                        world.delete_zone(zone_id);
                    });
                *destroy_timer = Some(handle);
                debug!(zone = %self.id, "instance empty, deletion armed");
            }
        }
        Some(actor)
    }

    /// Per-frame update of every actor, then the spawner.
    pub fn update(&mut self, dt: f32, ctx: &mut ZoneContext<'_>) {
        let ids: Vec<EntityId> = self.actors.keys().copied().collect();
        for id in ids {
            match self.actors.get(&id).map(Actor::is_hero) {
                Some(true) => self.regenerate_hero(id, ctx),
                Some(false) => self.drive_monster(id, gridrealm_ai::AiEvent::Tick(dt), ctx),
                None => {}
            }
        }
        self.with_spawner(ctx, |spawner, zone, ctx| spawner.update(zone, dt, ctx));
    }

    /// Respawn hook used by spawner timers.
    pub fn respawn(&mut self, spawn_uid: i32, ctx: &mut ZoneContext<'_>) -> Option<EntityId> {
        self.with_spawner(ctx, |spawner, zone, ctx| spawner.spawn(zone, spawn_uid, ctx))
            .flatten()
    }

    /// Zone description for a client that is about to enter.
    pub fn serialize(&self, data: &StaticData) -> ZoneSnapshot {
        let gates = self
            .gates
            .values()
            .map(|g| GateInfo {
                uid: g.uid,
                position: g.position,
                dest_map_type: data
                    .gate(g.dest_uid)
                    .and_then(|dest| data.map(dest.map_id))
                    .map(|m| m.map_type)
                    .unwrap_or_default(),
            })
            .collect();
        ZoneSnapshot {
            zone_id: self.id,
            map_id: self.map.id,
            map_type: self.map.map_type,
            gates,
        }
    }

    /// Broadcast a delta about `id` to everyone watching its cell.
    pub fn publish_actor_update(&self, id: EntityId, data: UpdateData) {
        let Some(coord) = self.actors.get(&id).and_then(|a| a.current_cell) else {
            return;
        };
        let Some(cell) = self.grid.cell(coord) else {
            return;
        };
        let listeners = cell.listeners(Channel::ActorUpdate);
        if listeners.is_empty() {
            return;
        }
        let message = Notify::Update(ActorUpdate {
            entity_id: id,
            data,
        });
        let bytes = match protocol::encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(actor = %id, error = %e, "dropping actor update");
                return;
            }
        };
        for observer in listeners {
            if let Some(area) = self.interests.get(&observer) {
                area.on_actor_update(&bytes);
            }
        }
    }

    /// Re-run interest bookkeeping after `id` moved.
    ///
    /// The mover's own area is refreshed first. If the mover changed cells,
    /// the transition goes out on the cell it left and then on the cell it
    /// entered.
    pub(crate) fn refresh_interest(&mut self, id: EntityId) {
        let Some(actor) = self.actors.get(&id) else {
            return;
        };
        let position = actor.position;
        let previous = actor.current_cell;

        if let Some(area) = self.interests.get_mut(&id) {
            area.update_interest(position, &mut self.grid, &self.actors);
        }

        let current = self.cell_coord(position);
        if current == previous {
            return;
        }
        if let Some(actor) = self.actors.get_mut(&id) {
            actor.current_cell = current;
        }
        trace!(actor = %id, ?previous, ?current, "actor changed cell");

        if let Some(cell) = previous {
            self.broadcast_cell_change(cell, previous, current, id);
        }
        if let Some(cell) = current {
            self.broadcast_cell_change(cell, previous, current, id);
        }
    }

    /// Cell holding `position`. A coordinate on the zone's max face, where
    /// clamped positions land, resolves to the last tile on that axis.
    fn cell_coord(&self, position: Vec3) -> Option<CellCoord> {
        let area = self.grid.area();
        let (x, y, z) = self.grid.counts();
        let last_tile = area.min
            + Vec3::new((x - 1) as f32, (y - 1) as f32, (z - 1) as f32) * self.grid.tile_size();
        let inner = Vec3::select(position.cmpeq(area.max), last_tile, position);
        self.grid.coord_at(inner)
    }

    fn broadcast_cell_change(
        &mut self,
        on: CellCoord,
        exiting: Option<CellCoord>,
        entering: Option<CellCoord>,
        actor: EntityId,
    ) {
        let Some(cell) = self.grid.cell_mut(on) else {
            return;
        };
        cell.on_actor_cell_change(exiting, entering, actor);
        for observer in cell.listeners(Channel::CellTransition) {
            if let Some(area) = self.interests.get(&observer) {
                area.on_actor_cell_change(exiting, entering, actor, &self.actors);
            }
        }
    }

    fn with_spawner<R>(
        &mut self,
        ctx: &mut ZoneContext<'_>,
        f: impl FnOnce(&mut MonsterSpawner, &mut Zone, &mut ZoneContext<'_>) -> R,
    ) -> Option<R> {
        let mut spawner = self.spawner.take()?;
        let result = f(&mut spawner, self, ctx);
        self.spawner = Some(spawner);
        Some(result)
    }
}
