//! The authoritative region registry.
//!
//! Three views of the same entity set are kept in lockstep: the primary
//! name -> region map, the chunk-bucketed spatial index, and the owner/member
//! reverse indices. The reverse indices are derived state; every mutation
//! goes through the attach/detach helpers here so both sides of each
//! relationship are updated together and no view ever holds an orphan.
//!
//! Mutating operations take `&mut self`, read operations `&self`. An embedder
//! that shares the manager across tasks wraps it in a `parking_lot::RwLock`
//! and holds the write guard for the duration of one mutating call; that is
//! the whole concurrency contract. Provider I/O only happens in the batch
//! paths (`init`, `save`) and on region removal.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use ward_core::{Aabb, FlagSet, Region, Vec3, normalize_user};
use ward_spatial::ChunkManager;

use crate::error::{RegionError, RegionResult};
use crate::provider::{Provider, RegionRecord};

type UserIndex = HashMap<String, Vec<Arc<Region>>>;

/// Authoritative registry of protected regions.
pub struct RegionManager {
    provider: Arc<dyn Provider>,
    chunks: ChunkManager,
    regions: HashMap<String, Arc<Region>>,
    owners: UserIndex,
    members: UserIndex,
}

impl RegionManager {
    /// Create an empty registry backed by the given persistence gateway,
    /// using the default grid granularity.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::with_cell_edge(provider, ChunkManager::DEFAULT_CELL_EDGE)
    }

    /// Create an empty registry with an explicit grid cell edge length.
    ///
    /// # Panics
    /// Panics if `cell_edge` is not strictly positive.
    #[must_use]
    pub fn with_cell_edge(provider: Arc<dyn Provider>, cell_edge: f64) -> Self {
        Self {
            provider,
            chunks: ChunkManager::new(cell_edge),
            regions: HashMap::new(),
            owners: UserIndex::new(),
            members: UserIndex::new(),
        }
    }

    /// Load every persisted region and populate all three views.
    ///
    /// A record whose owners/members encoding fails to decode is skipped with
    /// a warning; the rest of the load proceeds. Must run on a fresh manager
    /// before any other operation.
    pub fn init(&mut self) -> RegionResult<()> {
        let records = self.provider.load_region_list()?;
        let mut skipped = 0_usize;

        for record in records {
            let (owners, members) = match Self::decode_record_users(&record) {
                Ok(users) => users,
                Err(err) => {
                    tracing::warn!(region = %record.name, error = %err, "cannot load region, skipping");
                    skipped += 1;
                    continue;
                }
            };
            if self.regions.contains_key(&record.name) {
                tracing::warn!(region = %record.name, "duplicate record name, skipping");
                skipped += 1;
                continue;
            }

            let flags = FlagSet::from_records(self.provider.load_flags(&record.name)?);
            let region = Arc::new(Region::new(
                record.name.clone(),
                normalize_user(&record.creator),
                record.level.clone(),
                record.bounds(),
                owners,
                members,
                flags,
            ));

            self.index_region(&region);
        }

        tracing::info!(count = self.regions.len(), skipped, "loaded regions");
        Ok(())
    }

    /// Create a new region spanning the box between two corners.
    ///
    /// Fails with [`RegionError::DuplicateName`] if the name is taken; the
    /// registry is left unchanged in that case. Callers wanting to reject
    /// overlapping claims run [`Self::check_overlap`] first.
    pub fn create_region(
        &mut self,
        name: &str,
        creator: &str,
        pos1: Vec3,
        pos2: Vec3,
        level: &str,
    ) -> RegionResult<Arc<Region>> {
        if self.regions.contains_key(name) {
            return Err(RegionError::DuplicateName {
                name: name.to_owned(),
            });
        }

        let region = Arc::new(Region::new(
            name.to_owned(),
            normalize_user(creator),
            level.to_owned(),
            Aabb::from_corners(pos1, pos2),
            Vec::new(),
            Vec::new(),
            FlagSet::new(),
        ));
        self.index_region(&region);
        Ok(region)
    }

    /// Remove a region from every view, then delete its persisted record.
    pub fn remove_region(&mut self, region: &Arc<Region>) -> RegionResult<()> {
        self.detach_all_users(region)?;
        if !self.chunks.remove(region) {
            return Err(RegionError::invariant(format!(
                "region '{}' missing from recorded spatial cells",
                region.name()
            )));
        }
        if self.regions.remove(region.name()).is_none() {
            return Err(RegionError::invariant(format!(
                "region '{}' indexed but absent from the primary map",
                region.name()
            )));
        }
        self.provider.remove_region(region)
    }

    /// Transfer a region to a new owner.
    ///
    /// Every current owner and member loses the region, the creator becomes
    /// `new_owner`, and any pending sale is cancelled.
    pub fn change_region_owner(
        &mut self,
        region: &Arc<Region>,
        new_owner: &str,
    ) -> RegionResult<()> {
        self.detach_all_users(region)?;
        region.clear_users();

        let new_owner = normalize_user(new_owner);
        region.set_creator(&new_owner);
        attach(&mut self.owners, &new_owner, region);
        region.update_flags(FlagSet::reset_sell);
        Ok(())
    }

    /// Does any existing region overlap the box between two corners in
    /// `level`? Broad phase through the spatial index, then the exact test.
    #[must_use]
    pub fn check_overlap(&self, pos1: Vec3, pos2: Vec3, level: &str) -> bool {
        let bounds = Aabb::from_corners(pos1, pos2);
        self.chunks
            .query(&bounds, level)
            .iter()
            .any(|region| region.intersects(&bounds))
    }

    /// Add `user` to the region's owners and index the region under them.
    pub fn add_owner(&mut self, region: &Arc<Region>, user: &str) {
        let user = normalize_user(user);
        if region.add_owner(&user) {
            attach(&mut self.owners, &user, region);
        }
    }

    /// Remove `user` from the region's owners. A user who is not an owner is
    /// a no-op; the creator stays indexed even when their explicit owner
    /// listing is removed.
    pub fn remove_owner(&mut self, region: &Arc<Region>, user: &str) {
        let user = normalize_user(user);
        if region.remove_owner(&user) && !region.is_creator(&user) {
            detach(&mut self.owners, &user, region.name());
        }
    }

    /// Add `user` to the region's members and index the region under them.
    pub fn add_member(&mut self, region: &Arc<Region>, user: &str) {
        let user = normalize_user(user);
        if region.add_member(&user) {
            attach(&mut self.members, &user, region);
        }
    }

    /// Remove `user` from the region's members. Not a member is a no-op.
    pub fn remove_member(&mut self, region: &Arc<Region>, user: &str) {
        let user = normalize_user(user);
        if region.remove_member(&user) {
            detach(&mut self.members, &user, region.name());
        }
    }

    /// Regions the user owns. With `creator_only`, just those they created.
    #[must_use]
    pub fn owning_regions(&self, user: &str, creator_only: bool) -> Vec<Arc<Region>> {
        let user = normalize_user(user);
        let Some(bucket) = self.owners.get(&user) else {
            return Vec::new();
        };
        bucket
            .iter()
            .filter(|region| !creator_only || region.is_creator(&user))
            .cloned()
            .collect()
    }

    /// Number of regions the user owns, with the same filter semantics as
    /// [`Self::owning_regions`].
    #[must_use]
    pub fn owned_region_count(&self, user: &str, creator_only: bool) -> usize {
        let user = normalize_user(user);
        let Some(bucket) = self.owners.get(&user) else {
            return 0;
        };
        if creator_only {
            bucket.iter().filter(|r| r.is_creator(&user)).count()
        } else {
            bucket.len()
        }
    }

    /// Regions the user is a member of.
    #[must_use]
    pub fn member_regions(&self, user: &str) -> Vec<Arc<Region>> {
        self.members
            .get(&normalize_user(user))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn region(&self, name: &str) -> Option<Arc<Region>> {
        self.regions.get(name).cloned()
    }

    #[must_use]
    pub fn region_exists(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Hand the full current region set to the persistence gateway.
    pub fn save(&self) -> RegionResult<()> {
        let regions: Vec<Arc<Region>> = self.regions.values().cloned().collect();
        self.provider.save_region_list(&regions)?;
        tracing::info!(count = regions.len(), "saved regions");
        Ok(())
    }

    /// Insert a fully built region into all three views.
    fn index_region(&mut self, region: &Arc<Region>) {
        self.chunks.insert(region);
        for user in region.owners() {
            attach(&mut self.owners, &user, region);
        }
        attach(&mut self.owners, &region.creator(), region);
        for user in region.members() {
            attach(&mut self.members, &user, region);
        }
        self.regions
            .insert(region.name().to_owned(), Arc::clone(region));
    }

    /// Remove the region from every reverse-index bucket it belongs to.
    ///
    /// A bucket that does not hold the region while the region still lists
    /// the user means the derived indices have diverged; that aborts the
    /// operation.
    fn detach_all_users(&mut self, region: &Arc<Region>) -> RegionResult<()> {
        let name = region.name();

        for user in region.members() {
            if !detach(&mut self.members, &user, name) {
                return Err(RegionError::invariant(format!(
                    "member '{user}' of region '{name}' missing from member index"
                )));
            }
        }

        // The creator may also be explicitly listed as an owner, but the
        // bucket holds the region once.
        let mut owner_set: HashSet<String> = region.owners().into_iter().collect();
        owner_set.insert(region.creator());
        for user in &owner_set {
            if !detach(&mut self.owners, user, name) {
                return Err(RegionError::invariant(format!(
                    "owner '{user}' of region '{name}' missing from owner index"
                )));
            }
        }
        Ok(())
    }

    fn decode_record_users(record: &RegionRecord) -> RegionResult<(Vec<String>, Vec<String>)> {
        let owners = RegionRecord::decode_users(&record.owners)?
            .iter()
            .map(|user| normalize_user(user))
            .collect();
        let members = RegionRecord::decode_users(&record.members)?
            .iter()
            .map(|user| normalize_user(user))
            .collect();
        Ok((owners, members))
    }
}

/// Index a region under a user, keeping the bucket duplicate-free.
fn attach(index: &mut UserIndex, user: &str, region: &Arc<Region>) {
    let bucket = index.entry_ref(user).or_default();
    if !bucket.iter().any(|r| r.name() == region.name()) {
        bucket.push(Arc::clone(region));
    }
}

/// Drop a region from a user's bucket, deleting the bucket when it empties.
/// Returns `false` if the bucket or the region was not there.
fn detach(index: &mut UserIndex, user: &str, region_name: &str) -> bool {
    let Some(bucket) = index.get_mut(user) else {
        return false;
    };
    let before = bucket.len();
    bucket.retain(|r| r.name() != region_name);
    let removed = bucket.len() != before;
    if bucket.is_empty() {
        index.remove(user);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;

    fn manager() -> RegionManager {
        RegionManager::new(Arc::new(MemoryProvider::new()))
    }

    fn create(manager: &mut RegionManager, name: &str, creator: &str) -> Arc<Region> {
        manager
            .create_region(
                name,
                creator,
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 10.0, 10.0),
                "world",
            )
            .unwrap()
    }

    /// Every reverse-index entry must point at a live region that still lists
    /// the user, and every broad-phase hit must be in the primary map.
    fn assert_consistent(manager: &RegionManager) {
        for (user, bucket) in &manager.owners {
            assert!(!bucket.is_empty(), "empty owner bucket for '{user}'");
            for region in bucket {
                assert!(manager.regions.contains_key(region.name()));
                assert!(
                    region.is_creator(user) || region.owners().contains(user),
                    "owner index holds '{user}' for '{}' without ownership",
                    region.name()
                );
            }
        }
        for (user, bucket) in &manager.members {
            assert!(!bucket.is_empty(), "empty member bucket for '{user}'");
            for region in bucket {
                assert!(manager.regions.contains_key(region.name()));
                assert!(region.members().contains(user));
            }
        }
        for region in manager.regions.values() {
            for hit in manager.chunks.query(&region.bounds(), region.level()) {
                assert!(manager.regions.contains_key(hit.name()));
            }
        }
    }

    #[test]
    fn test_duplicate_name_rejected_without_side_effects() {
        let mut manager = manager();
        create(&mut manager, "spawn", "steve");
        let err = manager
            .create_region(
                "spawn",
                "alex",
                Vec3::new(50.0, 0.0, 50.0),
                Vec3::new(60.0, 10.0, 60.0),
                "world",
            )
            .unwrap_err();
        assert!(matches!(err, RegionError::DuplicateName { .. }));

        assert_eq!(manager.region_count(), 1);
        assert!(manager.owning_regions("alex", false).is_empty());
        assert_consistent(&manager);
    }

    #[test]
    fn test_last_region_removal_deletes_bucket_key() {
        let mut manager = manager();
        let region = create(&mut manager, "spawn", "steve");
        manager.add_owner(&region, "alex");
        manager.add_member(&region, "bob");
        assert!(manager.owners.contains_key("alex"));
        assert!(manager.members.contains_key("bob"));

        manager.remove_owner(&region, "alex");
        manager.remove_member(&region, "bob");
        // Absent key, not an empty-but-present bucket.
        assert!(!manager.owners.contains_key("alex"));
        assert!(!manager.members.contains_key("bob"));
        assert_consistent(&manager);
    }

    #[test]
    fn test_creator_stays_indexed_after_explicit_owner_removal() {
        let mut manager = manager();
        let region = create(&mut manager, "spawn", "steve");
        manager.add_owner(&region, "steve");
        assert_eq!(region.owners(), vec!["steve".to_owned()]);

        manager.remove_owner(&region, "steve");
        assert!(region.owners().is_empty());
        assert_eq!(manager.owning_regions("steve", false).len(), 1);
        assert_consistent(&manager);
    }

    #[test]
    fn test_removing_unregistered_user_is_a_noop() {
        let mut manager = manager();
        let region = create(&mut manager, "spawn", "steve");
        manager.remove_owner(&region, "nobody");
        manager.remove_member(&region, "nobody");
        assert_eq!(manager.region_count(), 1);
        assert_consistent(&manager);
    }

    #[test]
    fn test_mutation_sequence_leaves_no_orphans() {
        let mut manager = manager();
        let spawn = create(&mut manager, "spawn", "steve");
        let mine = manager
            .create_region(
                "mine",
                "alex",
                Vec3::new(100.0, 0.0, 100.0),
                Vec3::new(140.0, 30.0, 140.0),
                "world",
            )
            .unwrap();
        manager.add_owner(&spawn, "alex");
        manager.add_member(&spawn, "bob");
        manager.add_member(&mine, "bob");
        assert_consistent(&manager);

        manager.change_region_owner(&spawn, "bob").unwrap();
        assert_consistent(&manager);

        manager.remove_region(&mine).unwrap();
        assert_consistent(&manager);
        assert!(manager.owning_regions("alex", false).is_empty());
        assert!(manager.member_regions("bob").is_empty());

        manager.remove_region(&spawn).unwrap();
        assert_eq!(manager.region_count(), 0);
        assert!(manager.owners.is_empty());
        assert!(manager.members.is_empty());
        assert_eq!(manager.chunks.cell_count("world"), 0);
    }

    #[test]
    fn test_corrupted_index_aborts_removal() {
        let mut manager = manager();
        let region = create(&mut manager, "spawn", "steve");
        manager.owners.remove("steve");

        let err = manager.remove_region(&region).unwrap_err();
        assert!(matches!(err, RegionError::InvariantViolation { .. }));
    }
}
