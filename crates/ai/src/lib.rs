//! Monster behavior: a hierarchical state machine over a narrow context trait.
//!
//! # Invariants
//! - Exactly one leaf state is active once started.
//! - A combat target is held only while inside Combat.
//! - Dead is terminal.

pub mod machine;
pub mod state;
pub mod tuning;

pub use machine::{MonsterAi, MonsterContext, TargetView, yaw_degrees};
pub use state::{AiEvent, StateId};
pub use tuning::{AiTuning, PatrolDelay};
