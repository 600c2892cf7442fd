//! Small math helpers: bounding boxes and epsilon comparisons.

use glam::{Vec2, Vec3, Vec4};

/// Default tolerance for vertex attribute comparisons.
///
/// Repeated transforms leave floating-point noise on UVs, normals and
/// tangents; welding equality tolerates differences up to this value per
/// component.
pub const VERTEX_EPSILON: f32 = 1.0e-6;

/// Compare two scalars within `eps`.
pub fn almost_eq(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

/// Compare two 2D vectors component-wise within `eps`.
pub fn almost_eq_v2(a: Vec2, b: Vec2, eps: f32) -> bool {
    almost_eq(a.x, b.x, eps) && almost_eq(a.y, b.y, eps)
}

/// Compare two 3D vectors component-wise within `eps`.
pub fn almost_eq_v3(a: Vec3, b: Vec3, eps: f32) -> bool {
    almost_eq(a.x, b.x, eps) && almost_eq(a.y, b.y, eps) && almost_eq(a.z, b.z, eps)
}

/// Compare two 4D vectors component-wise within `eps`.
pub fn almost_eq_v4(a: Vec4, b: Vec4, eps: f32) -> bool {
    almost_eq(a.x, b.x, eps)
        && almost_eq(a.y, b.y, eps)
        && almost_eq(a.z, b.z, eps)
        && almost_eq(a.w, b.w, eps)
}

/// Axis-aligned bounding box.
///
/// Used by deformers to track the extent of simulated geometry in the owning
/// object's local space. An empty box (`min > max`) is the identity for
/// [`grow`](Aabb::grow) and [`union`](Aabb::union).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from explicit corners.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an empty box that any point will expand.
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    /// Check whether the box contains at least one point.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Expand the box to contain `point`.
    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Center of the box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Per-axis extent of the box.
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check whether `point` lies inside the box (inclusive).
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_invalid() {
        let aabb = Aabb::empty();
        assert!(!aabb.is_valid());
    }

    #[test]
    fn test_grow_from_empty() {
        let mut aabb = Aabb::empty();
        aabb.grow(Vec3::new(1.0, -2.0, 3.0));
        assert!(aabb.is_valid());
        assert_eq!(aabb.min, Vec3::new(1.0, -2.0, 3.0));
        assert_eq!(aabb.max, Vec3::new(1.0, -2.0, 3.0));

        aabb.grow(Vec3::new(-1.0, 4.0, 0.0));
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 3.0));
    }

    #[test]
    fn test_union_and_contains() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        let u = a.union(&b);

        assert_eq!(u.min, Vec3::ZERO);
        assert_eq!(u.max, Vec3::splat(3.0));
        assert!(u.contains_point(Vec3::splat(1.5)));
        assert!(!a.contains_point(Vec3::splat(1.5)));
    }

    #[test]
    fn test_center_size() {
        let aabb = Aabb::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, 2.0, 4.0));
        assert_eq!(aabb.center(), Vec3::new(1.0, 1.0, 3.0));
        assert_eq!(aabb.size(), Vec3::new(4.0, 2.0, 2.0));
    }

    #[test]
    fn test_almost_eq() {
        assert!(almost_eq(1.0, 1.0 + 1.0e-7, VERTEX_EPSILON));
        assert!(!almost_eq(1.0, 1.01, VERTEX_EPSILON));
        assert!(almost_eq_v3(
            Vec3::splat(0.5),
            Vec3::splat(0.5 + 1.0e-8),
            VERTEX_EPSILON
        ));
    }
}
