//! The region entity.

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::flags::FlagSet;
use crate::math::{Aabb, ChunkPos};

/// Inline capacity for the occupied-cell back-reference; most regions span a
/// handful of cells.
pub type CellList = SmallVec<[ChunkPos; 8]>;

/// A named, axis-aligned protected volume in one level.
///
/// Identity (`name`), `level`, and geometry are immutable after construction;
/// membership, flags, and the occupied-cell list mutate in place behind
/// `RwLock`s so the entity can be shared (`Arc<Region>`) between the primary
/// registry, the spatial index, and the reverse ownership indices.
///
/// All user identifiers stored here are expected in normalized (lower-case)
/// form; normalization happens at the registry entry points, not here.
#[derive(Debug)]
pub struct Region {
    name: String,
    level: String,
    bounds: Aabb,
    creator: RwLock<String>,
    owners: RwLock<Vec<String>>,
    members: RwLock<Vec<String>>,
    flags: RwLock<FlagSet>,
    /// Cells currently holding this region. Owned by the spatial index; kept
    /// here only so removal can target exactly the occupied cells.
    chunks: RwLock<CellList>,
}

impl Region {
    #[must_use]
    pub fn new(
        name: String,
        creator: String,
        level: String,
        bounds: Aabb,
        owners: Vec<String>,
        members: Vec<String>,
        flags: FlagSet,
    ) -> Self {
        Self {
            name,
            level,
            bounds,
            creator: RwLock::new(creator),
            owners: RwLock::new(dedup(owners)),
            members: RwLock::new(dedup(members)),
            flags: RwLock::new(flags),
            chunks: RwLock::new(CellList::new()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }

    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Exact overlap test against a query box (inclusive on every axis).
    #[must_use]
    pub fn intersects(&self, query: &Aabb) -> bool {
        self.bounds.intersects(query)
    }

    #[must_use]
    pub fn creator(&self) -> String {
        self.creator.read().clone()
    }

    #[must_use]
    pub fn is_creator(&self, user: &str) -> bool {
        *self.creator.read() == user
    }

    pub fn set_creator(&self, user: &str) {
        *self.creator.write() = user.to_owned();
    }

    #[must_use]
    pub fn owners(&self) -> Vec<String> {
        self.owners.read().clone()
    }

    #[must_use]
    pub fn members(&self) -> Vec<String> {
        self.members.read().clone()
    }

    /// Add to the owners set. Returns `false` if the user was already listed.
    pub fn add_owner(&self, user: &str) -> bool {
        push_unique(&mut self.owners.write(), user)
    }

    /// Remove from the owners set. Returns `false` if the user was not listed.
    pub fn remove_owner(&self, user: &str) -> bool {
        remove_user(&mut self.owners.write(), user)
    }

    /// Add to the members set. Returns `false` if the user was already listed.
    pub fn add_member(&self, user: &str) -> bool {
        push_unique(&mut self.members.write(), user)
    }

    /// Remove from the members set. Returns `false` if the user was not listed.
    pub fn remove_member(&self, user: &str) -> bool {
        remove_user(&mut self.members.write(), user)
    }

    /// Empty both the owners and members sets. Used by ownership transfer;
    /// flags are untouched.
    pub fn clear_users(&self) {
        self.owners.write().clear();
        self.members.write().clear();
    }

    /// Snapshot of the current flag values.
    #[must_use]
    pub fn flags(&self) -> FlagSet {
        self.flags.read().clone()
    }

    /// Mutate the flag set in place.
    pub fn update_flags<R>(&self, f: impl FnOnce(&mut FlagSet) -> R) -> R {
        f(&mut self.flags.write())
    }

    /// Cells currently recorded as holding this region.
    #[must_use]
    pub fn chunks(&self) -> CellList {
        self.chunks.read().clone()
    }

    /// Record the cell set the spatial index just placed this region into.
    pub fn set_chunks(&self, cells: CellList) {
        *self.chunks.write() = cells;
    }

    /// Clear and return the recorded cell set; drives spatial removal.
    pub fn take_chunks(&self) -> CellList {
        std::mem::take(&mut self.chunks.write())
    }
}

fn dedup(users: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(users.len());
    for user in users {
        if !out.contains(&user) {
            out.push(user);
        }
    }
    out
}

fn push_unique(users: &mut Vec<String>, user: &str) -> bool {
    if users.iter().any(|u| u == user) {
        return false;
    }
    users.push(user.to_owned());
    true
}

fn remove_user(users: &mut Vec<String>, user: &str) -> bool {
    let before = users.len();
    users.retain(|u| u != user);
    users.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    fn region() -> Region {
        Region::new(
            "spawn".to_owned(),
            "steve".to_owned(),
            "world".to_owned(),
            Aabb::from_corners(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 10.0, 10.0)),
            Vec::new(),
            Vec::new(),
            FlagSet::new(),
        )
    }

    #[test]
    fn test_owner_membership_is_duplicate_free() {
        let region = region();
        assert!(region.add_owner("alex"));
        assert!(!region.add_owner("alex"));
        assert_eq!(region.owners(), vec!["alex".to_owned()]);

        assert!(region.remove_owner("alex"));
        assert!(!region.remove_owner("alex"));
        assert!(region.owners().is_empty());
    }

    #[test]
    fn test_construction_dedups_loaded_users() {
        let region = Region::new(
            "mine".to_owned(),
            "steve".to_owned(),
            "world".to_owned(),
            Aabb::from_corners(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)),
            vec!["alex".to_owned(), "alex".to_owned(), "bob".to_owned()],
            vec!["carol".to_owned(), "carol".to_owned()],
            FlagSet::new(),
        );
        assert_eq!(region.owners(), vec!["alex".to_owned(), "bob".to_owned()]);
        assert_eq!(region.members(), vec!["carol".to_owned()]);
    }

    #[test]
    fn test_clear_users_keeps_flags() {
        let region = region();
        region.add_owner("alex");
        region.add_member("bob");
        region.update_flags(|flags| flags.set_state(crate::RegionFlag::Pvp, true));

        region.clear_users();
        assert!(region.owners().is_empty());
        assert!(region.members().is_empty());
        assert!(region.flags().get(crate::RegionFlag::Pvp).state);
    }

    #[test]
    fn test_is_creator_tracks_transfer() {
        let region = region();
        assert!(region.is_creator("steve"));
        region.set_creator("alex");
        assert!(region.is_creator("alex"));
        assert!(!region.is_creator("steve"));
    }
}
