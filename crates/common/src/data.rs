//! Read-only static game data.
//!
//! Tables are loaded once by the host process and shared with every zone.
//! All lookups are by id and return `None` on a miss; callers decide whether
//! a miss aborts their action.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{ClassType, MapType};

/// Map definition. A zone covers `[0, width) x [0, height)` on the XZ plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub id: i32,
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub map_type: MapType,
}

/// A gate on a map, linked to a destination gate (usually on another map).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapGate {
    pub uid: i32,
    pub map_id: i32,
    pub position: Vec3,
    pub dest_uid: i32,
}

/// Monster stat template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub uid: i32,
    pub type_id: i32,
    pub name: String,
    pub level: i32,
    pub max_hp: i32,
    pub max_mp: i32,
    pub att: i32,
    pub def: i32,
}

/// Static spawn point. A zero respawn interval means "spawn once".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub uid: i32,
    pub map_id: i32,
    pub monster_uid: i32,
    pub position: Vec3,
    #[serde(default)]
    pub respawn_secs: f32,
}

impl SpawnPoint {
    pub fn respawn_interval(&self) -> Option<Duration> {
        (self.respawn_secs > 0.0).then(|| Duration::from_secs_f32(self.respawn_secs))
    }
}

/// Hero skill definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub skill_id: i32,
    pub class_type: ClassType,
    pub damage: i32,
    pub cost: i32,
}

/// All static tables, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticData {
    #[serde(default)]
    pub maps: BTreeMap<i32, MapData>,
    #[serde(default)]
    pub gates: BTreeMap<i32, MapGate>,
    #[serde(default)]
    pub monsters: BTreeMap<i32, MonsterTemplate>,
    #[serde(default)]
    pub spawns: BTreeMap<i32, SpawnPoint>,
    #[serde(default)]
    pub skills: BTreeMap<i32, Skill>,
}

impl StaticData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self, id: i32) -> Option<&MapData> {
        self.maps.get(&id)
    }

    pub fn gate(&self, uid: i32) -> Option<&MapGate> {
        self.gates.get(&uid)
    }

    pub fn monster(&self, uid: i32) -> Option<&MonsterTemplate> {
        self.monsters.get(&uid)
    }

    pub fn spawn(&self, uid: i32) -> Option<&SpawnPoint> {
        self.spawns.get(&uid)
    }

    pub fn skill(&self, id: i32) -> Option<&Skill> {
        self.skills.get(&id)
    }

    /// Gates located on `map_id`, in uid order.
    pub fn gates_on(&self, map_id: i32) -> impl Iterator<Item = &MapGate> {
        self.gates.values().filter(move |g| g.map_id == map_id)
    }

    /// Spawn points located on `map_id`, in uid order.
    pub fn spawns_on(&self, map_id: i32) -> impl Iterator<Item = &SpawnPoint> {
        self.spawns.values().filter(move |s| s.map_id == map_id)
    }

    // --- builders, used by hosts assembling tables in code ---

    pub fn with_map(mut self, map: MapData) -> Self {
        self.maps.insert(map.id, map);
        self
    }

    pub fn with_gate(mut self, gate: MapGate) -> Self {
        self.gates.insert(gate.uid, gate);
        self
    }

    pub fn with_monster(mut self, monster: MonsterTemplate) -> Self {
        self.monsters.insert(monster.uid, monster);
        self
    }

    pub fn with_spawn(mut self, spawn: SpawnPoint) -> Self {
        self.spawns.insert(spawn.uid, spawn);
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.insert(skill.skill_id, skill);
        self
    }
}
