//! Authoritative region registry.
//!
//! [`RegionManager`] owns the primary name -> region map and keeps the
//! spatial index (`ward-spatial`) and the owner/member reverse indices in
//! lockstep across every mutation. Persistence goes through the [`Provider`]
//! gateway trait; the registry itself never touches a backing store.

mod error;
mod manager;
mod provider;

pub use error::{RegionError, RegionResult};
pub use manager::RegionManager;
pub use provider::{MemoryProvider, Provider, RegionRecord};
