use std::collections::BTreeMap;

use glam::Vec3;
use gridrealm_common::{EntityId, SpawnPoint};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::actor::{Actor, DeathSubscriber};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::zone::{Zone, ZoneContext};

/// Keeps at most one live monster per spawn point of a zone's map.
#[derive(Debug, Default)]
pub struct MonsterSpawner {
    live: BTreeMap<i32, Option<EntityId>>,
    respawns: BTreeMap<i32, TimerHandle>,
}

impl MonsterSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill every spawn point on the zone's map.
    pub fn start(&mut self, zone: &mut Zone, ctx: &mut ZoneContext<'_>) {
        let uids: Vec<i32> = ctx.data.spawns_on(zone.map_id()).map(|s| s.uid).collect();
        debug!(zone = %zone.id(), spawn_points = uids.len(), "spawner starting");
        for uid in uids {
            self.spawn(zone, uid, ctx);
        }
    }

    pub fn update(&mut self, _zone: &mut Zone, _dt: f32, _ctx: &mut ZoneContext<'_>) {}

    pub fn live_monster(&self, spawn_uid: i32) -> Option<EntityId> {
        self.live.get(&spawn_uid).copied().flatten()
    }

    pub fn live_count(&self) -> usize {
        self.live.values().filter(|m| m.is_some()).count()
    }

    /// Create the monster for `spawn_uid` unless one is already alive.
    pub fn spawn(&mut self, zone: &mut Zone, spawn_uid: i32, ctx: &mut ZoneContext<'_>) -> Option<EntityId> {
        self.respawns.remove(&spawn_uid);
        if self.live_monster(spawn_uid).is_some() {
            return None;
        }
        let data = ctx.data;
        let Some(point) = data.spawn(spawn_uid) else {
            warn!(spawn_uid, "unknown spawn point");
            return None;
        };
        let Some(template) = data.monster(point.monster_uid) else {
            warn!(spawn_uid, monster_uid = point.monster_uid, "unknown monster template");
            return None;
        };

        let mut actor = Actor::monster(ctx.next_entity_id(), template, ctx.config.ai.clone());
        if let Some(monster) = actor.as_monster_mut() {
            monster.spawn_id = Some(spawn_uid);
            monster.subscribe_death(DeathSubscriber::Spawner { spawn_id: spawn_uid });
        }
        let jitter = ctx.config.spawn_jitter;
        let offset = if jitter > 0.0 {
            Vec3::new(
                ctx.rng.gen_range(-jitter..=jitter),
                0.0,
                ctx.rng.gen_range(-jitter..=jitter),
            )
        } else {
            Vec3::ZERO
        };
        let position = Vec3::new(point.position.x, 0.0, point.position.z) + offset;

        let id = match zone.enter(actor, position, ctx) {
            Ok(id) => id,
            Err(e) => {
                warn!(spawn_uid, error = %e, "spawn rejected");
                return None;
            }
        };
        self.live.insert(spawn_uid, Some(id));
        zone.start_monster_ai(id, ctx);
        info!(zone = %zone.id(), spawn_uid, monster_uid = template.uid, monster = %id, "monster spawned");
        Some(id)
    }

    /// Free the slot, remove the corpse later and arm the respawn.
    pub fn on_death(&mut self, zone: &mut Zone, spawn_uid: i32, monster: EntityId, ctx: &mut ZoneContext<'_>) {
        if self.live_monster(spawn_uid) != Some(monster) {
            return;
        }
        self.live.insert(spawn_uid, None);

        let zone_id = zone.id();
        let corpse_delay = ctx.config.corpse_removal_delay();
        ctx.scheduler.run_after(corpse_delay, move |world| {
            world.with_zone(zone_id, |zone, ctx| {
                zone.exit(monster, ctx);
            });
        });

        let interval = ctx.data.spawn(spawn_uid).and_then(SpawnPoint::respawn_interval);
        if let Some(interval) = interval {
            let handle = ctx.scheduler.run_after(interval, move |world| {
                world.with_zone(zone_id, |zone, ctx| {
                    zone.respawn(spawn_uid, ctx);
                });
            });
            self.respawns.insert(spawn_uid, handle);
        }
        debug!(zone = %zone_id, spawn_uid, ?interval, "spawn slot freed");
    }

    pub(crate) fn cancel_timers(&mut self, scheduler: &mut Scheduler) {
        for (_, handle) in std::mem::take(&mut self.respawns) {
            scheduler.cancel(handle);
        }
    }
}
