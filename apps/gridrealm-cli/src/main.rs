use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use gridrealm_common::protocol::Notify;
use gridrealm_common::{
    ClassType, MapData, MapGate, MapType, MonsterTemplate, Skill, SpawnPoint, StaticData,
};
use gridrealm_kernel::{HeroRecord, MemoryPeer, SimConfig, World};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridrealm-cli", about = "Headless driver for the gridrealm simulation")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, static data summary and default configuration
    Info {
        /// Static data JSON file (built-in sample when omitted)
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Run a seeded simulation with one headless observer hero
    Simulate {
        /// Number of world updates
        #[arg(short, long, default_value = "600")]
        ticks: u64,
        /// Virtual milliseconds per update
        #[arg(long, default_value = "100")]
        dt_ms: u64,
        /// RNG seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Static data JSON file (built-in sample when omitted)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Simulation config JSON file; missing fields keep their defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Send the observer through the first gate halfway through the run
        #[arg(long)]
        gate: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info { data } => {
            let data = load_data(data.as_deref())?;
            println!("gridrealm-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "data: maps={}, gates={}, monsters={}, spawns={}, skills={}",
                data.maps.len(),
                data.gates.len(),
                data.monsters.len(),
                data.spawns.len(),
                data.skills.len()
            );
            for map in data.maps.values() {
                println!(
                    "  map {} {:?} {}x{} ({:?}), spawns={}",
                    map.id,
                    map.name,
                    map.width,
                    map.height,
                    map.map_type,
                    data.spawns_on(map.id).count()
                );
            }
            println!("default config:");
            println!("{}", serde_json::to_string_pretty(&SimConfig::default())?);
        }
        Commands::Simulate {
            ticks,
            dt_ms,
            seed,
            data,
            config,
            gate,
        } => {
            let data = load_data(data.as_deref())?;
            let config = match config {
                Some(path) => load_json(&path)?,
                None => SimConfig::default(),
            };
            simulate(data, config, seed, ticks, Duration::from_millis(dt_ms), gate)?;
        }
    }

    Ok(())
}

fn simulate(
    data: StaticData,
    config: SimConfig,
    seed: u64,
    ticks: u64,
    dt: Duration,
    gate: bool,
) -> anyhow::Result<()> {
    let map = data
        .maps
        .values()
        .find(|m| m.map_type == MapType::Field)
        .cloned()
        .context("static data has no field map")?;

    let mut world = World::with_seed(data, config, seed);
    let fields = world.start()?;

    let centre = Vec3::new(map.width as f32 / 2.0, 0.0, map.height as f32 / 2.0);
    let radius = (map.width.min(map.height) as f32 / 4.0).max(1.0);
    let peer = Arc::new(MemoryPeer::new());
    let observer = world.new_hero(&observer_record(map.id, centre), Some(peer.clone()));
    let observer_id = observer.id;
    let mut zone_id = world.enter_zone(observer, map.id, centre)?;

    let mut tally = Tally::default();
    tally.record(peer.take());

    for tick in 0..ticks {
        let on_start_map = world.zone(zone_id).is_some_and(|z| z.map_id() == map.id);
        if gate && tick == ticks / 2 {
            let first_gate = world
                .zone(zone_id)
                .and_then(|z| z.gates().next())
                .map(|g| g.uid);
            if let Some(gate_uid) = first_gate {
                zone_id = world.enter_gate(zone_id, observer_id, gate_uid)?;
                info!(zone = %zone_id, gate_uid, "observer went through gate");
            }
        } else if on_start_map {
            // walk a circle around the map centre
            let angle = tick as f32 / ticks.max(1) as f32 * TAU;
            let target = centre + Vec3::new(angle.sin(), 0.0, angle.cos()) * radius;
            world.with_zone(zone_id, |zone, _| {
                zone.hero_move(observer_id, target, angle.to_degrees(), Vec3::ZERO)
            });
        }
        world.update(dt);
        tally.record(peer.take());
    }

    println!(
        "simulated {ticks} ticks of {} ms, seed {seed}, virtual time {:.1}s",
        dt.as_millis(),
        world.now().as_secs_f32()
    );
    println!("field maps: {fields}, zones open: {}", world.zone_count());
    for zone in world.zones() {
        let live_monsters = zone
            .actors()
            .filter(|a| !a.is_hero() && !a.is_dead())
            .count();
        println!(
            "  zone {} map {} ({:?}): actors={}, heroes={}, live monsters={}",
            zone.id(),
            zone.map_id(),
            zone.map_type(),
            zone.actor_count(),
            zone.hero_count(),
            live_monsters
        );
    }
    println!(
        "observer notifications: enter_success={}, appear={}, disappear={}, update={}",
        tally.enter_success, tally.appear, tally.disappear, tally.update
    );
    Ok(())
}

#[derive(Debug, Default)]
struct Tally {
    enter_success: usize,
    appear: usize,
    disappear: usize,
    update: usize,
}

impl Tally {
    fn record(&mut self, received: Vec<Notify>) {
        for message in received {
            match message {
                Notify::EnterSuccess { .. } => self.enter_success += 1,
                Notify::Appear(_) => self.appear += 1,
                Notify::Disappear { .. } => self.disappear += 1,
                Notify::Update(_) => self.update += 1,
            }
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_data(path: Option<&Path>) -> anyhow::Result<StaticData> {
    match path {
        Some(path) => load_json(path),
        None => Ok(sample_data()),
    }
}

fn observer_record(map_id: i32, position: Vec3) -> HeroRecord {
    HeroRecord {
        uid: 1,
        name: "observer".into(),
        class_type: ClassType::Knight,
        exp: 0,
        level: 10,
        max_hp: 500,
        hp: 500,
        max_mp: 100,
        mp: 100,
        att: 20,
        def: 10,
        map_id,
        position,
        rotation: 0.0,
    }
}

/// Small built-in world: one field map with a gate into a dungeon.
fn sample_data() -> StaticData {
    let mut data = StaticData::new()
        .with_map(MapData {
            id: 1,
            name: "Greenfields".into(),
            width: 200,
            height: 200,
            map_type: MapType::Field,
        })
        .with_map(MapData {
            id: 2,
            name: "Old Crypt".into(),
            width: 60,
            height: 60,
            map_type: MapType::Dungeon,
        })
        .with_gate(MapGate {
            uid: 1,
            map_id: 1,
            position: Vec3::new(180.0, 0.0, 180.0),
            dest_uid: 2,
        })
        .with_gate(MapGate {
            uid: 2,
            map_id: 2,
            position: Vec3::new(5.0, 0.0, 5.0),
            dest_uid: 1,
        })
        .with_monster(MonsterTemplate {
            uid: 1,
            type_id: 1,
            name: "boar".into(),
            level: 1,
            max_hp: 40,
            max_mp: 0,
            att: 6,
            def: 1,
        })
        .with_monster(MonsterTemplate {
            uid: 2,
            type_id: 2,
            name: "skeleton".into(),
            level: 4,
            max_hp: 90,
            max_mp: 0,
            att: 14,
            def: 4,
        })
        .with_skill(Skill {
            skill_id: 1,
            class_type: ClassType::Knight,
            damage: 12,
            cost: 5,
        })
        .with_skill(Skill {
            skill_id: 2,
            class_type: ClassType::Archer,
            damage: 9,
            cost: 3,
        })
        .with_skill(Skill {
            skill_id: 3,
            class_type: ClassType::Mage,
            damage: 20,
            cost: 12,
        });

    let field_spawns = [(60.0, 60.0), (100.0, 70.0), (140.0, 120.0), (80.0, 140.0), (120.0, 100.0)];
    for (i, (x, z)) in field_spawns.into_iter().enumerate() {
        data = data.with_spawn(SpawnPoint {
            uid: 100 + i as i32,
            map_id: 1,
            monster_uid: 1,
            position: Vec3::new(x, 0.0, z),
            respawn_secs: 30.0,
        });
    }
    for (i, (x, z)) in [(30.0, 30.0), (45.0, 20.0)].into_iter().enumerate() {
        data = data.with_spawn(SpawnPoint {
            uid: 200 + i as i32,
            map_id: 2,
            monster_uid: 2,
            position: Vec3::new(x, 0.0, z),
            respawn_secs: 0.0,
        });
    }
    data
}
