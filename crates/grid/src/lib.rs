//! Spatial partition of a zone: dense cell grid, per-cell membership and
//! listener registries, and incremental per-observer interest areas.

pub mod cell;
pub mod grid;
pub mod interest;

pub use cell::{Channel, Subscription, ZoneCell};
pub use grid::{BasicCell, CellCoord, Grid, GridCell, GridError, MAX_CELLS};
pub use interest::{InterestArea, InterestHooks};
