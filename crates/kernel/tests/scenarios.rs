use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use gridrealm_ai::StateId;
use gridrealm_common::protocol::Notify;
use gridrealm_common::{
    ClassType, MapData, MapGate, MapType, MonsterTemplate, SpawnPoint, StaticData, ZoneId,
};
use gridrealm_kernel::{Actor, HeroRecord, MemoryPeer, SimConfig, World};

const FRAME: Duration = Duration::from_millis(100);

fn data() -> StaticData {
    StaticData::new()
        .with_map(MapData {
            id: 1,
            name: "meadow".into(),
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
            position: Vec3::new(90.0, 0.0, 90.0),
            dest_uid: 2,
        })
        .with_gate(MapGate {
            uid: 2,
            map_id: 2,
            position: Vec3::new(10.0, 0.0, 10.0),
            dest_uid: 1,
        })
        .with_monster(MonsterTemplate {
            uid: 7,
            type_id: 1,
            name: "boar".into(),
            level: 1,
            max_hp: 30,
            max_mp: 0,
            att: 5,
            def: 0,
        })
        .with_spawn(SpawnPoint {
            uid: 100,
            map_id: 1,
            monster_uid: 7,
            position: Vec3::new(20.0, 0.0, 20.0),
            respawn_secs: 30.0,
        })
}

fn record(name: &str) -> HeroRecord {
    HeroRecord {
        uid: 1,
        name: name.into(),
        class_type: ClassType::Archer,
        exp: 0,
        level: 1,
        max_hp: 80,
        hp: 80,
        max_mp: 40,
        mp: 40,
        att: 8,
        def: 1,
        map_id: 1,
        position: Vec3::ZERO,
        rotation: 0.0,
    }
}

fn started_world() -> (World, ZoneId) {
    let mut world = World::with_seed(data(), SimConfig::default(), 11);
    world.start().unwrap();
    let field = world.find_field_zone(1).unwrap();
    (world, field)
}

fn run(world: &mut World, frames: usize) {
    for _ in 0..frames {
        world.update(FRAME);
    }
}

#[test]
fn corpse_is_removed_then_spawn_point_refills() {
    let (mut world, field) = started_world();
    let boar = world.zone(field).unwrap().live_monster(100).unwrap();

    let killed = world.with_zone(field, |zone, ctx| zone.kill(boar, ctx));
    assert_eq!(killed, Some(true));
    assert!(world.zone(field).unwrap().live_monster(100).is_none());

    run(&mut world, 49);
    assert!(world.zone(field).unwrap().find_actor(boar).is_some());
    run(&mut world, 1);
    assert!(world.zone(field).unwrap().find_actor(boar).is_none());

    run(&mut world, 249);
    assert!(world.zone(field).unwrap().live_monster(100).is_none());
    run(&mut world, 1);
    let respawned = world.zone(field).unwrap().live_monster(100).unwrap();
    assert_ne!(respawned, boar);
    assert_eq!(world.zone(field).unwrap().actor_count(), 1);
}

#[test]
fn empty_instance_is_deleted_after_grace() {
    let (mut world, _) = started_world();
    let hero = Actor::hero(&record("solo"), None);
    let hero_id = hero.id;
    let instance = world.enter_zone(hero, 2, Vec3::ZERO).unwrap();
    assert!(world.find_instance_zone(instance).is_some());
    assert_eq!(world.zone_count(), 2);

    world.exit_zone(instance, hero_id).unwrap();
    run(&mut world, 99);
    assert!(world.zone(instance).is_some());
    run(&mut world, 1);
    assert!(world.zone(instance).is_none());
    assert_eq!(world.zone_count(), 1);
    assert!(world.zones_on(2).is_empty());
}

#[test]
fn returning_before_grace_keeps_the_instance() {
    let (mut world, _) = started_world();
    let hero = Actor::hero(&record("solo"), None);
    let hero_id = hero.id;
    let instance = world.enter_zone(hero, 2, Vec3::ZERO).unwrap();

    let hero = world.exit_zone(instance, hero_id).unwrap();
    run(&mut world, 99);
    let again = world.enter_zone(hero, 2, Vec3::new(5.0, 0.0, 5.0)).unwrap();
    assert_eq!(again, instance);
    assert!(world.zone(instance).unwrap().destroy_timer().is_none());

    run(&mut world, 200);
    assert!(world.zone(instance).is_some());
    assert_eq!(world.zone(instance).unwrap().hero_count(), 1);
}

#[test]
fn new_instance_starts_hero_beside_first_gate() {
    let (mut world, _) = started_world();
    let hero = Actor::hero(&record("solo"), None);
    let hero_id = hero.id;
    let instance = world.enter_zone(hero, 2, Vec3::new(35.0, 0.0, 35.0)).unwrap();

    let position = world.zone(instance).unwrap().find_actor(hero_id).unwrap().position;
    for (axis, gate) in [(position.x, 10.0), (position.z, 10.0)] {
        let offset = (axis - gate).abs();
        assert!((2.0..=3.0).contains(&offset), "offset {offset}");
    }
}

#[test]
fn observer_sees_neighbours_come_and_go() {
    let (mut world, field) = started_world();
    let peer = Arc::new(MemoryPeer::new());
    let watcher = Actor::hero(&record("watcher"), Some(peer.clone()));
    let watcher_id = watcher.id;
    world.enter_zone(watcher, 1, Vec3::new(70.0, 0.0, 70.0)).unwrap();

    let received = peer.take();
    match received.first() {
        Some(Notify::EnterSuccess { hero, zone }) => {
            assert_eq!(hero.entity_id, watcher_id);
            assert_eq!(zone.zone_id, field);
            assert_eq!(zone.gates.len(), 1);
            assert_eq!(zone.gates[0].dest_map_type, MapType::Dungeon);
        }
        other => panic!("expected EnterSuccess first, got {other:?}"),
    }
    assert!(received.iter().any(
        |n| matches!(n, Notify::Appear(a) if a.entity_id() == watcher_id)
    ));

    let visitor = Actor::hero(&record("visitor"), None);
    let visitor_id = visitor.id;
    world.enter_zone(visitor, 1, Vec3::new(75.0, 0.0, 72.0)).unwrap();
    assert!(peer.take().iter().any(
        |n| matches!(n, Notify::Appear(a) if a.entity_id() == visitor_id)
    ));

    let moved = world.with_zone(field, |zone, _| {
        zone.hero_move(visitor_id, Vec3::new(5.0, 0.0, 95.0), 0.0, Vec3::ZERO)
    });
    assert_eq!(moved, Some(true));
    assert!(peer.take().contains(&Notify::Disappear {
        entity_id: visitor_id
    }));

    // out of view: no more updates about the visitor
    world.with_zone(field, |zone, _| {
        zone.hero_move(visitor_id, Vec3::new(6.0, 0.0, 95.0), 0.0, Vec3::ZERO)
    });
    assert!(peer.is_empty());
}

#[test]
fn monster_gives_up_when_target_dies() {
    let (mut world, field) = started_world();
    let hero = Actor::hero(&record("bait"), None);
    let hero_id = hero.id;
    world.enter_zone(hero, 1, Vec3::new(26.0, 0.0, 20.0)).unwrap();
    let boar = world.zone(field).unwrap().live_monster(100).unwrap();

    world.with_zone(field, |zone, ctx| zone.damage(boar, hero_id, 1, ctx));
    run(&mut world, 3);
    let ai_state = |world: &World| {
        world
            .zone(field)
            .and_then(|z| z.find_actor(boar))
            .and_then(|a| a.as_monster())
            .and_then(|m| m.ai())
            .map(|ai| ai.state())
    };
    assert!(matches!(ai_state(&world), Some(StateId::Chase | StateId::Attack)));

    world.with_zone(field, |zone, ctx| zone.kill(hero_id, ctx));
    run(&mut world, 1);
    assert_eq!(ai_state(&world), Some(StateId::Idle));
}

#[test]
fn gate_moves_hero_into_a_fresh_instance() {
    let (mut world, field) = started_world();
    let peer = Arc::new(MemoryPeer::new());
    let hero = Actor::hero(&record("traveller"), Some(peer.clone()));
    let hero_id = hero.id;
    world.enter_zone(hero, 1, Vec3::new(90.0, 0.0, 88.0)).unwrap();
    peer.take();

    let unknown = world.enter_gate(field, hero_id, 42);
    assert!(unknown.is_err());
    assert!(world.zone(field).unwrap().find_actor(hero_id).is_some());

    let instance = world.enter_gate(field, hero_id, 1).unwrap();
    assert_ne!(instance, field);
    assert!(world.zone(field).unwrap().find_actor(hero_id).is_none());

    let zone = world.zone(instance).unwrap();
    let hero = zone.find_actor(hero_id).unwrap();
    assert_eq!(hero.zone(), Some(instance));
    assert_eq!(hero.as_hero().unwrap().map_id, 2);
    assert_eq!(hero.as_hero().unwrap().instance_zone(), Some((instance, 2)));

    let received = peer.take();
    assert!(received.iter().any(|n| matches!(
        n,
        Notify::EnterSuccess { zone, .. } if zone.zone_id == instance && zone.map_type == MapType::Dungeon
    )));
}

#[test]
fn idle_monster_eventually_patrols() {
    let (mut world, field) = started_world();
    let boar = world.zone(field).unwrap().live_monster(100).unwrap();
    let start = world.zone(field).unwrap().find_actor(boar).unwrap().position;

    run(&mut world, 60);
    let zone = world.zone(field).unwrap();
    let actor = zone.find_actor(boar).unwrap();
    assert_ne!(actor.position, start);
    assert_eq!(actor.position.y, 0.0);
    assert!(zone.contains(actor.position));
}
