use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use gridrealm_common::protocol::Notify;
use gridrealm_common::{EntityId, MapType, StaticData, ZoneId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, info_span, trace};

use crate::actor::{Actor, Hero, HeroRecord};
use crate::config::SimConfig;
use crate::error::WorldError;
use crate::peer::{RemotePeer, send_notify};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::zone::{Zone, ZoneContext, ZoneKind, random_bytes};

/// Registry of zones plus the single execution context they run on.
///
/// Every mutation happens on the caller's thread, either directly or from a
/// scheduler callback run by [`World::update`]. Zones are visited in id order,
/// and ids as well as every other random draw come from one seeded RNG, so a
/// run is reproducible from its seed and inputs.
#[derive(Debug)]
pub struct World {
    zones: BTreeMap<ZoneId, Zone>,
    by_map: BTreeMap<i32, BTreeSet<ZoneId>>,
    scheduler: Scheduler,
    data: StaticData,
    config: SimConfig,
    rng: StdRng,
    seed: u64,
    tick: u64,
}

impl World {
    /// Empty world with seed 0. Call [`World::start`] to create field zones.
    pub fn new(data: StaticData, config: SimConfig) -> Self {
        Self::with_seed(data, config, 0)
    }

    pub fn with_seed(data: StaticData, config: SimConfig, seed: u64) -> Self {
        Self {
            zones: BTreeMap::new(),
            by_map: BTreeMap::new(),
            scheduler: Scheduler::new(),
            data,
            config,
            rng: StdRng::seed_from_u64(seed),
            seed,
            tick: 0,
        }
    }

    /// Create one field zone per field map. Returns how many field maps
    /// were found.
    pub fn start(&mut self) -> Result<usize, WorldError> {
        let field_maps: Vec<i32> = self
            .data
            .maps
            .values()
            .filter(|m| m.map_type == MapType::Field)
            .map(|m| m.id)
            .collect();
        for &map_id in &field_maps {
            if self.find_field_zone(map_id).is_none() {
                self.create_zone(map_id, ZoneKind::Field)?;
            }
        }
        info!(zones = self.zones.len(), seed = self.seed, "world started");
        Ok(field_maps.len())
    }

    /// Fresh entity id drawn from the world RNG.
    pub fn next_entity_id(&mut self) -> EntityId {
        EntityId::from_random_bytes(random_bytes(&mut self.rng))
    }

    /// Hero actor whose id comes from the world RNG.
    pub fn new_hero(&mut self, record: &HeroRecord, peer: Option<Arc<dyn RemotePeer>>) -> Actor {
        let mut actor = Actor::hero(record, peer);
        actor.id = self.next_entity_id();
        actor
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Virtual time since the world was created.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn data(&self) -> &StaticData {
        &self.data
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(&id)
    }

    /// Zones in id order.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    /// Every zone currently open on `map_id`.
    pub fn zones_on(&self, map_id: i32) -> Vec<ZoneId> {
        self.by_map
            .get(&map_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn find_field_zone(&self, map_id: i32) -> Option<ZoneId> {
        self.by_map
            .get(&map_id)?
            .iter()
            .find(|id| self.zones.get(id).is_some_and(|z| !z.is_instance()))
            .copied()
    }

    pub fn find_instance_zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(&id).filter(|z| z.is_instance())
    }

    /// Open a fresh instance of a dungeon map.
    pub fn create_instance_zone(&mut self, map_id: i32) -> Result<ZoneId, WorldError> {
        let map = self.data.map(map_id).ok_or(WorldError::UnknownMap(map_id))?;
        if map.map_type != MapType::Dungeon {
            return Err(WorldError::NotADungeon(map_id));
        }
        self.create_zone(map_id, ZoneKind::instance())
    }

    /// Remove a zone and cancel the timers it armed. Actors still inside
    /// are dropped with it.
    pub fn delete_zone(&mut self, id: ZoneId) -> bool {
        let Some(mut zone) = self.zones.remove(&id) else {
            return false;
        };
        zone.cancel_timers(&mut self.scheduler);
        if let Some(ids) = self.by_map.get_mut(&zone.map_id()) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_map.remove(&zone.map_id());
            }
        }
        info!(zone = %id, map_id = zone.map_id(), actors = zone.actor_count(), "zone deleted");
        true
    }

    /// Run `f` against one zone with the world's services.
    pub fn with_zone<R>(
        &mut self,
        id: ZoneId,
        f: impl FnOnce(&mut Zone, &mut ZoneContext<'_>) -> R,
    ) -> Option<R> {
        let zone = self.zones.get_mut(&id)?;
        let mut ctx = ZoneContext {
            scheduler: &mut self.scheduler,
            data: &self.data,
            config: &self.config,
            rng: &mut self.rng,
        };
        Some(f(zone, &mut ctx))
    }

    /// Advance virtual time by `dt`: run dispatched work, fire due timers
    /// at their own deadlines, then update every zone.
    pub fn update(&mut self, dt: Duration) {
        self.tick += 1;
        let _span = info_span!("world_update", tick = self.tick).entered();
        let until = self.scheduler.now() + dt;

        self.run_dispatched();
        while let Some((deadline, callback)) = self.scheduler.pop_due(until) {
            self.scheduler.set_now(deadline);
            callback(self);
            self.run_dispatched();
        }
        self.scheduler.set_now(until);

        let secs = dt.as_secs_f32();
        let ids: Vec<ZoneId> = self.zones.keys().copied().collect();
        for id in ids {
            self.with_zone(id, |zone, ctx| zone.update(secs, ctx));
        }
        trace!(now = ?self.scheduler.now(), zones = self.zones.len(), "tick done");
    }

    /// Place an actor in the zone serving `map_id`.
    ///
    /// Dungeon maps resolve to the hero's remembered instance when it is
    /// still open, otherwise to a new instance entered at its first gate.
    /// A connected hero is sent `EnterSuccess` before it appears in the zone.
    pub fn enter_zone(&mut self, actor: Actor, map_id: i32, position: Vec3) -> Result<ZoneId, WorldError> {
        let remembered = actor.as_hero().and_then(Hero::instance_zone);
        let (zone_id, position) = self.resolve_destination(remembered, map_id, position)?;
        self.place(actor, zone_id, map_id, position)
    }

    /// Take an actor out of its zone.
    pub fn exit_zone(&mut self, zone_id: ZoneId, id: EntityId) -> Option<Actor> {
        self.with_zone(zone_id, |zone, ctx| zone.exit(id, ctx)).flatten()
    }

    /// Move a hero through a gate to the destination gate's map, arriving
    /// next to the destination gate. The destination zone is resolved before
    /// the hero leaves, so nothing changes when any step fails.
    pub fn enter_gate(&mut self, zone_id: ZoneId, hero: EntityId, gate_uid: i32) -> Result<ZoneId, WorldError> {
        let zone = self.zones.get(&zone_id).ok_or(WorldError::UnknownZone(zone_id))?;
        let remembered = zone
            .find_actor(hero)
            .and_then(Actor::as_hero)
            .ok_or(WorldError::NotAHero(hero))?
            .instance_zone();
        let gate = zone.gate(gate_uid).ok_or(WorldError::UnknownGate(gate_uid))?;
        let dest = self
            .data
            .gate(gate.dest_uid)
            .ok_or(WorldError::UnknownGate(gate.dest_uid))?;
        let (dest_map, dest_position) = (dest.map_id, dest.position);

        let arrival = dest_position + self.gate_offset();
        let (dest_zone, position) = self.resolve_destination(remembered, dest_map, arrival)?;
        let actor = self
            .exit_zone(zone_id, hero)
            .ok_or(WorldError::NotAHero(hero))?;
        debug!(%hero, gate_uid, dest_map, zone = %dest_zone, "hero entering gate");
        self.place(actor, dest_zone, dest_map, position)
    }

    pub fn run_after(&mut self, delay: Duration, callback: impl FnOnce(&mut World) + 'static) -> TimerHandle {
        self.scheduler.run_after(delay, callback)
    }

    /// Queue work for the start of the next update.
    pub fn dispatch(&mut self, callback: impl FnOnce(&mut World) + 'static) {
        self.scheduler.dispatch(callback);
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    fn create_zone(&mut self, map_id: i32, kind: ZoneKind) -> Result<ZoneId, WorldError> {
        let map = self
            .data
            .map(map_id)
            .cloned()
            .ok_or(WorldError::UnknownMap(map_id))?;
        let id = ZoneId::from_random_bytes(random_bytes(&mut self.rng));
        let mut zone = Zone::new(id, map, kind, &self.data, &self.config)?;
        let mut ctx = ZoneContext {
            scheduler: &mut self.scheduler,
            data: &self.data,
            config: &self.config,
            rng: &mut self.rng,
        };
        zone.start(&mut ctx);
        info!(zone = %id, map_id, instance = zone.is_instance(), "zone created");
        self.by_map.entry(map_id).or_default().insert(id);
        self.zones.insert(id, zone);
        Ok(id)
    }

    /// Zone and start position for an arrival on `map_id`. May open a new
    /// dungeon instance; never moves any actor.
    fn resolve_destination(
        &mut self,
        remembered: Option<(ZoneId, i32)>,
        map_id: i32,
        position: Vec3,
    ) -> Result<(ZoneId, Vec3), WorldError> {
        let map_type = self
            .data
            .map(map_id)
            .map(|m| m.map_type)
            .ok_or(WorldError::UnknownMap(map_id))?;
        if map_type != MapType::Dungeon {
            let zone = self
                .find_field_zone(map_id)
                .ok_or(WorldError::NoFieldZone(map_id))?;
            return Ok((zone, position));
        }

        let remembered = remembered
            .filter(|&(zone, map)| map == map_id && self.find_instance_zone(zone).is_some());
        if let Some((zone, _)) = remembered {
            return Ok((zone, position));
        }

        let zone_id = self.create_instance_zone(map_id)?;
        let first_gate = self
            .zones
            .get(&zone_id)
            .and_then(|z| z.gates().next())
            .map(|g| g.position);
        let start = match first_gate {
            Some(gate) => gate + self.gate_offset(),
            None => position,
        };
        Ok((zone_id, start))
    }

    /// Enter `actor` into an already resolved zone. Every check runs while
    /// the actor is still owned here.
    fn place(&mut self, mut actor: Actor, zone_id: ZoneId, map_id: i32, position: Vec3) -> Result<ZoneId, WorldError> {
        let zone = self.zones.get(&zone_id).ok_or(WorldError::UnknownZone(zone_id))?;
        zone.can_enter(&actor)?;
        if let Some(hero) = actor.as_hero_mut() {
            hero.map_id = map_id;
        }
        let peer = actor.as_hero().and_then(Hero::peer);
        if let (Some(peer), Some(mut hero)) = (peer, actor.hero_snapshot()) {
            hero.position = zone.check_boundary(position);
            let message = Notify::EnterSuccess {
                hero,
                zone: zone.serialize(&self.data),
            };
            send_notify(peer.as_ref(), &message);
        }

        self.with_zone(zone_id, |zone, ctx| zone.enter(actor, position, ctx))
            .ok_or(WorldError::UnknownZone(zone_id))??;
        Ok(zone_id)
    }

    /// Arrival offset next to a gate: a magnitude from the configured range
    /// with a random sign on each ground axis.
    fn gate_offset(&mut self) -> Vec3 {
        let [a, b] = self.config.gate_jitter;
        let (low, high) = (a.min(b), a.max(b));
        let mut axis = || {
            let magnitude = if high > low {
                self.rng.gen_range(low..=high)
            } else {
                low
            };
            if self.rng.gen_bool(0.5) { magnitude } else { -magnitude }
        };
        let x = axis();
        let z = axis();
        Vec3::new(x, 0.0, z)
    }

    fn run_dispatched(&mut self) {
        while let Some(callback) = self.scheduler.pop_dispatched() {
            callback(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZoneError;
    use gridrealm_common::{ClassType, MapData, MapGate, MonsterTemplate, SpawnPoint};
    use gridrealm_grid::GridError;

    fn record() -> HeroRecord {
        HeroRecord {
            uid: 9,
            name: "ranger".into(),
            class_type: ClassType::Archer,
            exp: 0,
            level: 3,
            max_hp: 120,
            hp: 120,
            max_mp: 30,
            mp: 30,
            att: 7,
            def: 3,
            map_id: 1,
            position: Vec3::ZERO,
            rotation: 0.0,
        }
    }

    fn data() -> StaticData {
        StaticData::new()
            .with_map(MapData {
                id: 1,
                name: "plains".into(),
                width: 100,
                height: 100,
                map_type: MapType::Field,
            })
            .with_map(MapData {
                id: 2,
                name: "crypt".into(),
                width: 40,
                height: 40,
                map_type: MapType::Dungeon,
            })
            .with_gate(MapGate {
                uid: 1,
                map_id: 1,
                position: Vec3::new(50.0, 0.0, 50.0),
                dest_uid: 2,
            })
            .with_gate(MapGate {
                uid: 2,
                map_id: 2,
                position: Vec3::new(10.0, 0.0, 10.0),
                dest_uid: 1,
            })
    }

    #[test]
    fn start_opens_one_field_zone_per_field_map() {
        let mut world = World::new(data(), SimConfig::default());
        assert_eq!(world.start().unwrap(), 1);
        assert_eq!(world.zone_count(), 1);
        assert!(world.find_field_zone(1).is_some());
        assert!(world.find_field_zone(2).is_none());

        // idempotent
        world.start().unwrap();
        assert_eq!(world.zone_count(), 1);
    }

    #[test]
    fn only_dungeons_get_instances() {
        let mut world = World::new(data(), SimConfig::default());
        assert!(matches!(world.create_instance_zone(1), Err(WorldError::NotADungeon(1))));
        assert!(matches!(world.create_instance_zone(9), Err(WorldError::UnknownMap(9))));
        let a = world.create_instance_zone(2).unwrap();
        let b = world.create_instance_zone(2).unwrap();
        assert_ne!(a, b);
        assert_eq!(world.zones_on(2).len(), 2);
        assert!(world.find_instance_zone(a).is_some());
    }

    #[test]
    fn delete_zone_forgets_it() {
        let mut world = World::new(data(), SimConfig::default());
        let id = world.create_instance_zone(2).unwrap();
        assert!(world.delete_zone(id));
        assert!(!world.delete_zone(id));
        assert!(world.zones_on(2).is_empty());
        assert!(world.zone(id).is_none());
    }

    #[test]
    fn timers_fire_at_their_deadline_inside_update() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut world = World::new(data(), SimConfig::default());
        let fired = Rc::new(Cell::new(None));
        let seen = Rc::clone(&fired);
        world.run_after(Duration::from_millis(250), move |w| seen.set(Some(w.now())));

        world.update(Duration::from_millis(100));
        assert_eq!(fired.get(), None);
        world.update(Duration::from_millis(200));
        assert_eq!(fired.get(), Some(Duration::from_millis(250)));
        assert_eq!(world.now(), Duration::from_millis(300));
        assert_eq!(world.tick(), 2);
    }

    #[test]
    fn dispatched_work_runs_on_next_update() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut world = World::new(data(), SimConfig::default());
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        world.dispatch(move |_| flag.set(true));
        assert!(!ran.get());
        world.update(Duration::ZERO);
        assert!(ran.get());
    }

    #[test]
    fn gate_offset_stays_within_jitter_range() {
        let mut world = World::with_seed(data(), SimConfig::default(), 3);
        for _ in 0..50 {
            let offset = world.gate_offset();
            assert_eq!(offset.y, 0.0);
            for v in [offset.x, offset.z] {
                assert!((2.0..=3.0).contains(&v.abs()), "{v}");
            }
        }
    }

    #[test]
    fn failed_gate_leaves_hero_where_it_was() {
        let data = data()
            .with_map(MapData {
                id: 3,
                name: "collapsed".into(),
                width: 0,
                height: 40,
                map_type: MapType::Dungeon,
            })
            .with_gate(MapGate {
                uid: 3,
                map_id: 1,
                position: Vec3::new(20.0, 0.0, 20.0),
                dest_uid: 4,
            })
            .with_gate(MapGate {
                uid: 4,
                map_id: 3,
                position: Vec3::ZERO,
                dest_uid: 3,
            });
        let mut world = World::with_seed(data, SimConfig::default(), 5);
        world.start().unwrap();
        let field = world.find_field_zone(1).unwrap();
        let hero = world.new_hero(&record(), None);
        let hero_id = hero.id;
        world.enter_zone(hero, 1, Vec3::new(21.0, 0.0, 20.0)).unwrap();

        let result = world.enter_gate(field, hero_id, 3);
        assert!(matches!(
            result,
            Err(WorldError::Zone(ZoneError::Grid(GridError::InvalidArea(_))))
        ));
        let zone = world.zone(field).unwrap();
        let actor = zone.find_actor(hero_id).unwrap();
        assert_eq!(actor.zone(), Some(field));
        assert_eq!(actor.position, Vec3::new(21.0, 0.0, 20.0));
        assert_eq!(zone.hero_count(), 1);
        assert!(world.zones_on(3).is_empty());
    }

    type Frame = Vec<(ZoneId, Vec<(EntityId, Vec3, bool)>)>;

    fn replay(seed: u64) -> Frame {
        let data = data()
            .with_monster(MonsterTemplate {
                uid: 1,
                type_id: 1,
                name: "rat".into(),
                level: 1,
                max_hp: 10,
                max_mp: 0,
                att: 2,
                def: 0,
            })
            .with_spawn(SpawnPoint {
                uid: 1,
                map_id: 1,
                monster_uid: 1,
                position: Vec3::new(30.0, 0.0, 30.0),
                respawn_secs: 10.0,
            })
            .with_spawn(SpawnPoint {
                uid: 2,
                map_id: 1,
                monster_uid: 1,
                position: Vec3::new(60.0, 0.0, 40.0),
                respawn_secs: 10.0,
            });
        let mut world = World::with_seed(data, SimConfig::default(), seed);
        world.start().unwrap();
        let hero = world.new_hero(&record(), None);
        world.enter_zone(hero, 1, Vec3::new(45.0, 0.0, 35.0)).unwrap();
        for _ in 0..300 {
            world.update(Duration::from_millis(100));
        }
        world
            .zones()
            .map(|z| {
                let actors = z.actors().map(|a| (a.id, a.position, a.is_dead())).collect();
                (z.id(), actors)
            })
            .collect()
    }

    #[test]
    fn same_seed_replays_the_same_run() {
        let first = replay(9);
        assert_eq!(first, replay(9));
        assert_eq!(first[0].1.len(), 3);
        assert_ne!(first, replay(10));
    }
}
