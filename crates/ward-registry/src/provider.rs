//! The persistence gateway contract and its raw record types.
//!
//! The registry itself never touches a backing store: it loads from and saves
//! to a [`Provider`], which hands records back and forth in the external
//! storage format. Owners and members travel as an encoded JSON string array
//! inside the record; decoding that array is the one per-record operation
//! that can fail recoverably during load.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ward_core::{Aabb, FlagRecord, Region, Vec3};

use crate::error::RegionResult;

/// Raw persisted form of one region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub name: String,
    pub creator: String,
    pub level: String,
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
    /// JSON-encoded string array of owner ids.
    pub owners: String,
    /// JSON-encoded string array of member ids.
    pub members: String,
}

impl RegionRecord {
    /// Snapshot a live region into its persisted form.
    #[must_use]
    pub fn from_region(region: &Region) -> Self {
        let bounds = region.bounds();
        Self {
            name: region.name().to_owned(),
            creator: region.creator(),
            level: region.level().to_owned(),
            min_x: bounds.min.x,
            min_y: bounds.min.y,
            min_z: bounds.min.z,
            max_x: bounds.max.x,
            max_y: bounds.max.y,
            max_z: bounds.max.z,
            owners: Self::encode_users(&region.owners()),
            members: Self::encode_users(&region.members()),
        }
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_corners(
            Vec3::new(self.min_x, self.min_y, self.min_z),
            Vec3::new(self.max_x, self.max_y, self.max_z),
        )
    }

    /// Encode a user list into the external string-array format.
    #[must_use]
    pub fn encode_users(users: &[String]) -> String {
        serde_json::to_string(users).unwrap_or_else(|_| "[]".to_owned())
    }

    /// Decode the external string-array format. A failure here is recovered
    /// per-record by the loader, not surfaced as a whole-load failure.
    pub fn decode_users(encoded: &str) -> Result<Vec<String>, serde_json::Error> {
        serde_json::from_str(encoded)
    }
}

/// Persistence gateway the registry loads from and saves to.
pub trait Provider: Send + Sync {
    /// All persisted region records.
    fn load_region_list(&self) -> RegionResult<Vec<RegionRecord>>;

    /// Persisted flag records for one region, in storage order. Unknown flag
    /// names must be returned as-is; the flag model preserves them.
    fn load_flags(&self, name: &str) -> RegionResult<Vec<(String, FlagRecord)>>;

    /// Persist the full current region set.
    fn save_region_list(&self, regions: &[Arc<Region>]) -> RegionResult<()>;

    /// Delete one region's persisted record.
    fn remove_region(&self, region: &Region) -> RegionResult<()>;
}

/// In-memory [`Provider`] for tests and ephemeral embedding.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    inner: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<RegionRecord>,
    flags: HashMap<String, Vec<(String, FlagRecord)>>,
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw records, as if a previous run had saved them.
    #[must_use]
    pub fn with_records(
        records: Vec<RegionRecord>,
        flags: impl IntoIterator<Item = (String, Vec<(String, FlagRecord)>)>,
    ) -> Self {
        Self {
            inner: Mutex::new(MemoryState {
                records,
                flags: flags.into_iter().collect(),
            }),
        }
    }

    /// Snapshot of the currently stored records.
    #[must_use]
    pub fn records(&self) -> Vec<RegionRecord> {
        self.inner.lock().records.clone()
    }
}

impl Provider for MemoryProvider {
    fn load_region_list(&self) -> RegionResult<Vec<RegionRecord>> {
        Ok(self.inner.lock().records.clone())
    }

    fn load_flags(&self, name: &str) -> RegionResult<Vec<(String, FlagRecord)>> {
        Ok(self.inner.lock().flags.get(name).cloned().unwrap_or_default())
    }

    fn save_region_list(&self, regions: &[Arc<Region>]) -> RegionResult<()> {
        let mut state = self.inner.lock();
        state.records = regions.iter().map(|r| RegionRecord::from_region(r)).collect();
        state.flags = regions
            .iter()
            .map(|r| (r.name().to_owned(), r.flags().to_records()))
            .collect();
        Ok(())
    }

    fn remove_region(&self, region: &Region) -> RegionResult<()> {
        let mut state = self.inner.lock();
        state.records.retain(|record| record.name != region.name());
        state.flags.remove(region.name());
        Ok(())
    }
}
