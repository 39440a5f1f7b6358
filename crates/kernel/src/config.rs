use glam::Vec3;
use gridrealm_ai::AiTuning;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Simulation constants. Every field has a default so partial JSON
/// overrides are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Edge length of a grid cell on every axis.
    pub cell_size: f32,
    /// Vertical extent of every zone.
    pub zone_height: f32,
    /// Half-extent of a client's area of interest.
    pub view_distance: Vec3,
    /// How long an instance may stay without heroes before it is deleted.
    pub instance_grace_secs: f32,
    /// Delay between a monster's death and its removal from the zone.
    pub corpse_removal_secs: f32,
    /// Max offset of a spawned monster from its spawn point, per axis.
    pub spawn_jitter: f32,
    /// Arrival offset range around a gate, per axis, with random sign.
    pub gate_jitter: [f32; 2],
    pub hero_regen_secs: f32,
    pub hero_regen_amount: i32,
    pub ai: AiTuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cell_size: 10.0,
            zone_height: 10.0,
            view_distance: Vec3::new(20.0, 1.0, 20.0),
            instance_grace_secs: 10.0,
            corpse_removal_secs: 5.0,
            spawn_jitter: 1.0,
            gate_jitter: [2.0, 3.0],
            hero_regen_secs: 5.0,
            hero_regen_amount: 5,
            ai: AiTuning::default(),
        }
    }
}

fn secs(value: f32) -> Duration {
    Duration::from_secs_f32(value.max(0.0))
}

impl SimConfig {
    pub fn instance_grace(&self) -> Duration {
        secs(self.instance_grace_secs)
    }

    pub fn corpse_removal_delay(&self) -> Duration {
        secs(self.corpse_removal_secs)
    }

    pub fn hero_regen_interval(&self) -> Duration {
        secs(self.hero_regen_secs)
    }
}
