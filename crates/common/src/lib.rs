//! Shared types for the gridrealm simulation core: ids, geometry, static
//! data tables and the client notification format.

pub mod bounds;
pub mod data;
pub mod protocol;
pub mod types;

pub use bounds::BoundingBox;
pub use data::{MapData, MapGate, MonsterTemplate, Skill, SpawnPoint, StaticData};
pub use glam::Vec3;
pub use types::{ClassType, EntityId, MapType, ZoneId};
