//! World-space geometry: points, inclusive bounding boxes, grid cells.

/// A point in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// An axis-aligned bounding box with inclusive bounds on every axis.
///
/// `min <= max` holds componentwise; [`Aabb::from_corners`] enforces it by
/// taking the per-axis min/max of its two inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Build a normalized box from any two opposite corners.
    #[must_use]
    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Inclusive overlap test: boxes that merely touch on a face, edge, or
    /// corner still count as intersecting.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Horizontal grid cell coordinates.
///
/// Cells partition the horizontal plane only; vertical bounds are stored on
/// regions but never grid-indexed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The cell containing the given horizontal world coordinates for a grid
    /// with the given cell edge length.
    #[must_use]
    pub fn containing(x: f64, z: f64, cell_edge: f64) -> Self {
        Self {
            x: (x / cell_edge).floor() as i32,
            z: (z / cell_edge).floor() as i32,
        }
    }
}
