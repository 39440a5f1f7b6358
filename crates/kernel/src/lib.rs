//! Realm kernel: zones, actors, monster spawning, virtual-time timers and
//! per-client interest management.
//!
//! # Invariants
//! - All state is mutated on one execution context; deferred work goes
//!   through the [`Scheduler`] and runs inside [`World::update`].
//! - An actor belongs to at most one zone, and to exactly one cell of that
//!   zone's grid while inside it.
//! - A connected hero receives `Appear` for every actor that becomes
//!   visible and `Disappear` for every actor that stops being visible.

pub mod actor;
pub mod config;
pub mod error;
pub mod interest;
pub mod peer;
pub mod scheduler;
pub mod spawner;
pub mod world;
pub mod zone;

pub use actor::{Actor, ActorKind, DeathSubscriber, Hero, HeroRecord, Monster};
pub use config::SimConfig;
pub use error::{WorldError, ZoneError};
pub use interest::ClientInterestArea;
pub use peer::{MemoryPeer, RemotePeer};
pub use scheduler::{Scheduler, TimerHandle};
pub use spawner::MonsterSpawner;
pub use world::World;
pub use zone::{Zone, ZoneContext, ZoneKind};
