//! Flat-file JSON persistence for the region registry.
//!
//! One JSON document per region in a single directory: the raw record plus
//! its flag records. Region names double as file names, so embedders must
//! keep them free of path separators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ward_core::{FlagRecord, Region};
use ward_registry::{Provider, RegionError, RegionRecord, RegionResult};

/// Store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed region document.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk form of one region file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRegion {
    #[serde(flatten)]
    record: RegionRecord,
    flags: Vec<(String, FlagRecord)>,
}

/// [`Provider`] backed by a directory of per-region JSON files.
#[derive(Debug)]
pub struct JsonProvider {
    dir: PathBuf,
}

impl JsonProvider {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn region_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn read_stored(&self, path: &Path) -> Result<StoredRegion, StoreError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Provider for JsonProvider {
    fn load_region_list(&self) -> RegionResult<Vec<RegionRecord>> {
        let entries = std::fs::read_dir(&self.dir).map_err(RegionError::provider)?;
        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(RegionError::provider)?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match self.read_stored(&path) {
                Ok(stored) => records.push(stored.record),
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "unreadable region file, skipping");
                }
            }
        }
        Ok(records)
    }

    fn load_flags(&self, name: &str) -> RegionResult<Vec<(String, FlagRecord)>> {
        let path = self.region_path(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        self.read_stored(&path)
            .map(|stored| stored.flags)
            .map_err(RegionError::provider)
    }

    fn save_region_list(&self, regions: &[Arc<Region>]) -> RegionResult<()> {
        for region in regions {
            let stored = StoredRegion {
                record: RegionRecord::from_region(region),
                flags: region.flags().to_records(),
            };
            let text = serde_json::to_string_pretty(&stored).map_err(RegionError::provider)?;
            std::fs::write(self.region_path(region.name()), text).map_err(RegionError::provider)?;
        }
        tracing::debug!(count = regions.len(), dir = %self.dir.display(), "wrote region files");
        Ok(())
    }

    fn remove_region(&self, region: &Region) -> RegionResult<()> {
        match std::fs::remove_file(self.region_path(region.name())) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(RegionError::provider(err)),
        }
    }
}
