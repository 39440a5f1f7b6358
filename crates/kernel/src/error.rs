use gridrealm_common::{EntityId, ZoneId};
use gridrealm_grid::GridError;

/// Errors from zone construction and membership changes.
#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    #[error("zone grid: {0}")]
    Grid(#[from] GridError),
    #[error("actor {0} is already registered in this zone")]
    AlreadyRegistered(EntityId),
    #[error("actor {actor} is still attached to zone {zone}")]
    AlreadyInZone { actor: EntityId, zone: ZoneId },
}

/// Errors from world-level operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("unknown map {0}")]
    UnknownMap(i32),
    #[error("map {0} is not a dungeon")]
    NotADungeon(i32),
    #[error("no field zone for map {0}")]
    NoFieldZone(i32),
    #[error("unknown zone {0}")]
    UnknownZone(ZoneId),
    #[error("unknown gate {0}")]
    UnknownGate(i32),
    #[error("actor {0} is not a hero in the given zone")]
    NotAHero(EntityId),
    #[error(transparent)]
    Zone(#[from] ZoneError),
}
