//! Chunk-bucketed spatial index for regions.
//!
//! The horizontal plane of each level is partitioned into fixed-size grid
//! cells; every cell holds the regions whose bounding box overlaps it. This
//! is a broad phase only: a query returns every region that shares a cell
//! with the query box, and callers run the exact AABB test themselves.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use ward_core::{Aabb, ChunkPos, Region};

/// One grid cell: the set of regions whose box overlaps it.
#[derive(Debug, Default)]
struct Chunk {
    regions: Vec<Arc<Region>>,
}

/// Per-level grid of lazily created cells.
///
/// Invariant: a region is present in exactly the cells its bounding box
/// overlaps. [`ChunkManager::insert`] records the covered cell set on the
/// region, and [`ChunkManager::remove`] consumes that record, so the two must
/// bracket every region's life in the index.
#[derive(Debug)]
pub struct ChunkManager {
    cell_edge: f64,
    levels: HashMap<String, HashMap<ChunkPos, Chunk>>,
}

impl ChunkManager {
    /// Cell edge length matching the world's chunk size.
    pub const DEFAULT_CELL_EDGE: f64 = 16.0;

    /// Create an index with the given cell edge length.
    ///
    /// # Panics
    /// Panics if `cell_edge` is not strictly positive; a degenerate grid
    /// would make every query span infinitely many cells.
    #[must_use]
    pub fn new(cell_edge: f64) -> Self {
        assert!(cell_edge > 0.0, "cell edge length must be positive");
        Self {
            cell_edge,
            levels: HashMap::new(),
        }
    }

    /// Every cell the box touches, even partially.
    pub fn cells_covering(&self, bounds: &Aabb) -> impl Iterator<Item = ChunkPos> + use<> {
        let min = ChunkPos::containing(bounds.min.x, bounds.min.z, self.cell_edge);
        let max = ChunkPos::containing(bounds.max.x, bounds.max.z, self.cell_edge);
        (min.x..=max.x).flat_map(move |x| (min.z..=max.z).map(move |z| ChunkPos::new(x, z)))
    }

    /// Add a region to every cell its box covers in its level and record that
    /// cell set on the region.
    pub fn insert(&mut self, region: &Arc<Region>) {
        let bounds = region.bounds();
        let covered: ward_core::CellList = self.cells_covering(&bounds).collect();
        let cells = self.levels.entry(region.level().to_owned()).or_default();
        for pos in &covered {
            cells
                .entry(*pos)
                .or_default()
                .regions
                .push(Arc::clone(region));
        }
        region.set_chunks(covered);
    }

    /// Remove a region from exactly its recorded cells, evicting cells that
    /// become empty.
    ///
    /// Returns `false` if any recorded cell was missing or did not hold the
    /// region; that means the index and the region's record have diverged.
    pub fn remove(&mut self, region: &Region) -> bool {
        let Some(cells) = self.levels.get_mut(region.level()) else {
            return region.take_chunks().is_empty();
        };

        let mut consistent = true;
        for pos in region.take_chunks() {
            match cells.get_mut(&pos) {
                Some(chunk) => {
                    let before = chunk.regions.len();
                    chunk.regions.retain(|r| r.name() != region.name());
                    if chunk.regions.len() == before {
                        consistent = false;
                    }
                    if chunk.regions.is_empty() {
                        cells.remove(&pos);
                    }
                }
                None => consistent = false,
            }
        }
        if cells.is_empty() {
            self.levels.remove(region.level());
        }
        consistent
    }

    /// Broad-phase query: the de-duplicated union of region sets across every
    /// cell the query box covers in `level`.
    #[must_use]
    pub fn query(&self, bounds: &Aabb, level: &str) -> Vec<Arc<Region>> {
        let Some(cells) = self.levels.get(level) else {
            return Vec::new();
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for pos in self.cells_covering(bounds) {
            let Some(chunk) = cells.get(&pos) else {
                continue;
            };
            for region in &chunk.regions {
                if seen.insert(region.name()) {
                    out.push(Arc::clone(region));
                }
            }
        }
        out
    }

    /// Number of live cells in a level. Empty cells are evicted eagerly, so
    /// this tracks actual occupancy.
    #[must_use]
    pub fn cell_count(&self, level: &str) -> usize {
        self.levels.get(level).map_or(0, HashMap::len)
    }
}

impl Default for ChunkManager {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CELL_EDGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ward_core::{FlagSet, Vec3};

    fn region(name: &str, level: &str, min: (f64, f64, f64), max: (f64, f64, f64)) -> Arc<Region> {
        Arc::new(Region::new(
            name.to_owned(),
            "steve".to_owned(),
            level.to_owned(),
            Aabb::from_corners(
                Vec3::new(min.0, min.1, min.2),
                Vec3::new(max.0, max.1, max.2),
            ),
            Vec::new(),
            Vec::new(),
            FlagSet::new(),
        ))
    }

    #[test]
    #[should_panic(expected = "cell edge length must be positive")]
    fn test_zero_cell_edge_is_rejected() {
        let _ = ChunkManager::new(0.0);
    }

    #[test]
    fn test_cells_covering_includes_partial_cells() {
        let index = ChunkManager::default();
        let bounds = Aabb::from_corners(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(16.0, 5.0, 15.9));
        let cells: Vec<ChunkPos> = index.cells_covering(&bounds).collect();
        // x spans cells -1, 0, 1; z spans cell 0 only.
        assert_eq!(
            cells,
            vec![ChunkPos::new(-1, 0), ChunkPos::new(0, 0), ChunkPos::new(1, 0)]
        );
    }

    #[test]
    fn test_query_dedups_regions_spanning_cells() {
        let mut index = ChunkManager::default();
        let big = region("big", "world", (0.0, 0.0, 0.0), (40.0, 10.0, 40.0));
        index.insert(&big);
        assert_eq!(big.chunks().len(), 9);

        let query = Aabb::from_corners(Vec3::new(0.0, 0.0, 0.0), Vec3::new(40.0, 10.0, 40.0));
        let hits = index.query(&query, "world");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name(), "big");
    }

    #[test]
    fn test_levels_are_isolated() {
        let mut index = ChunkManager::default();
        let overworld = region("a", "world", (0.0, 0.0, 0.0), (8.0, 8.0, 8.0));
        let nether = region("b", "nether", (0.0, 0.0, 0.0), (8.0, 8.0, 8.0));
        index.insert(&overworld);
        index.insert(&nether);

        let query = Aabb::from_corners(Vec3::new(0.0, 0.0, 0.0), Vec3::new(8.0, 8.0, 8.0));
        let hits = index.query(&query, "world");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name(), "a");
        assert!(index.query(&query, "the_end").is_empty());
    }

    #[test]
    fn test_remove_evicts_empty_cells_and_clears_record() {
        let mut index = ChunkManager::default();
        let a = region("a", "world", (0.0, 0.0, 0.0), (20.0, 5.0, 5.0));
        let b = region("b", "world", (0.0, 0.0, 0.0), (5.0, 5.0, 5.0));
        index.insert(&a);
        index.insert(&b);
        assert_eq!(index.cell_count("world"), 2);

        assert!(index.remove(&a));
        assert!(a.chunks().is_empty());
        // Cell (1, 0) held only `a`; cell (0, 0) still holds `b`.
        assert_eq!(index.cell_count("world"), 1);

        assert!(index.remove(&b));
        assert_eq!(index.cell_count("world"), 0);
    }

    #[test]
    fn test_double_remove_reports_divergence() {
        let mut index = ChunkManager::default();
        let a = region("a", "world", (0.0, 0.0, 0.0), (5.0, 5.0, 5.0));
        index.insert(&a);
        assert!(index.remove(&a));
        // Second removal finds an empty record, which is consistent.
        assert!(index.remove(&a));

        // A forged record pointing at cells the index never saw is not.
        a.set_chunks(std::iter::once(ChunkPos::new(7, 7)).collect());
        assert!(!index.remove(&a));
    }
}
