//! Core types for the ward region registry.
//!
//! A region is a named, axis-aligned protected volume in one level with a
//! creator, owners, members, and a set of permission flags. This crate holds
//! the entity and its leaf types; the spatial index lives in `ward-spatial`
//! and the authoritative registry in `ward-registry`.

mod flags;
mod math;
mod region;
mod user;

pub use flags::{FlagRecord, FlagSet, FlagValue, RegionFlag};
pub use math::{Aabb, ChunkPos, Vec3};
pub use region::{CellList, Region};
pub use user::normalize_user;
