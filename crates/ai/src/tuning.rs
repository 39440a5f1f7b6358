use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay an idle monster waits before it starts a patrol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PatrolDelay {
    /// Same delay on every Idle entry.
    Fixed { secs: f32 },
    /// Drawn again on every Idle entry.
    Uniform { min_secs: f32, max_secs: f32 },
}

impl Default for PatrolDelay {
    fn default() -> Self {
        Self::Fixed { secs: 5.0 }
    }
}

/// Monster behavior constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    /// Units per second, for both patrol and chase.
    pub move_speed: f32,
    pub attack_range: f32,
    pub attack_cooldown_secs: f32,
    pub patrol_delay: PatrolDelay,
    /// Max horizontal offset of a patrol target from the current position.
    pub patrol_radius: f32,
    /// Squared distance at which a patrol target counts as reached.
    pub arrival_epsilon_sq: f32,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            move_speed: 2.0,
            attack_range: 1.5,
            attack_cooldown_secs: 3.0,
            patrol_delay: PatrolDelay::default(),
            patrol_radius: 5.0,
            arrival_epsilon_sq: 0.1,
        }
    }
}

impl AiTuning {
    pub fn attack_cooldown(&self) -> Duration {
        Duration::from_secs_f32(self.attack_cooldown_secs.max(0.0))
    }
}
