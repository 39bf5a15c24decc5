use glam::Vec3;

use super::Primitive;
use crate::{interval::Interval, ray::Ray};

/// Axis aligned box. Starts out empty (`min > max`) so that growing it is a
/// plain min/max fold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for AABB {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl AABB {
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    #[inline]
    pub fn new(p0: Vec3, p1: Vec3) -> Self {
        AABB {
            min: p0.min(p1),
            max: p0.max(p1),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::EMPTY;
        for point in points {
            aabb.grow_to_include(point);
        }
        aabb
    }

    #[inline(always)]
    pub fn grow_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Folds in the primitive's precomputed corners.
    #[inline(always)]
    pub fn grow_to_include_primitive<P: Primitive>(&mut self, primitive: &P) {
        self.grow_bb_mut(&primitive.aabb());
    }

    #[inline(always)]
    pub fn grow_bb_mut(&mut self, aabb: &Self) {
        *self = Self::combine(self, aabb)
    }

    #[inline(always)]
    pub fn combine(box0: &AABB, box1: &AABB) -> AABB {
        AABB {
            min: box0.min.min(box1.min),
            max: box0.max.max(box1.max),
        }
    }

    /// True until the first growth call.
    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn surface_area(&self) -> f32 {
        2.0 * self.half_area()
    }

    pub fn half_area(&self) -> f32 {
        let d = self.size();
        d.x * d.y + d.x * d.z + d.y * d.z
    }

    /// Axis of the largest extent, ties going to the lower axis.
    pub fn largest_axis(&self) -> usize {
        let d = self.size();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    pub fn contains_point(&self, point: Vec3, epsilon: f32) -> bool {
        let eps = Vec3::splat(epsilon);
        point.cmpge(self.min - eps).all() && point.cmple(self.max + eps).all()
    }

    /// Slab test. Flat boxes (zero extent on one axis) still count as hit.
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> bool {
        let mut t_min = ray_t.min;
        let mut t_max = ray_t.max;
        let origin = ray.origin();
        let direction = ray.direction();
        for a in 0..3 {
            let inv_d = 1.0 / direction[a];
            let t0 = (self.min[a] - origin[a]) * inv_d;
            let t1 = (self.max[a] - origin[a]) * inv_d;
            let (t0, t1) = if inv_d < 0.0 { (t1, t0) } else { (t0, t1) };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max < t_min {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Triangle;

    #[test]
    fn test_empty_box() {
        let aabb = AABB::default();
        assert!(aabb.is_empty());
        assert_eq!(aabb, AABB::EMPTY);
    }

    #[test]
    fn test_grow_to_include_point() {
        let mut aabb = AABB::EMPTY;
        aabb.grow_to_include(Vec3::new(1.0, -2.0, 3.0));
        assert!(!aabb.is_empty());
        assert_eq!(aabb.min, Vec3::new(1.0, -2.0, 3.0));
        assert_eq!(aabb.max, Vec3::new(1.0, -2.0, 3.0));

        aabb.grow_to_include(Vec3::new(-1.0, 0.0, 5.0));
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 3.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 0.0, 5.0));
    }

    #[test]
    fn test_fold_order_does_not_matter() {
        let points = [
            Vec3::new(0.5, 2.0, -1.0),
            Vec3::new(-3.0, 0.0, 4.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, -7.0, 0.25),
        ];
        let forward = AABB::from_points(points);
        let backward = AABB::from_points(points.iter().rev().copied());

        let mut twice = forward;
        for point in points {
            twice.grow_to_include(point);
        }

        assert_eq!(forward, backward);
        assert_eq!(forward, twice);
    }

    #[test]
    fn test_grow_to_include_triangle() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(2.0, 1.0, -1.0);
        let c = Vec3::new(1.0, 3.0, 0.0);

        let mut by_triangle = AABB::EMPTY;
        by_triangle.grow_to_include_primitive(&Triangle::new(a, b, c));

        assert_eq!(by_triangle, AABB::from_points([a, b, c]));
    }

    #[test]
    fn test_center_size_and_area() {
        let aabb = AABB::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.center(), Vec3::new(0.5, 1.0, 1.5));
        assert_eq!(aabb.size(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.half_area(), 11.0);
        assert_eq!(aabb.surface_area(), 22.0);
        assert_eq!(aabb.largest_axis(), 2);
    }

    #[test]
    fn test_largest_axis_ties_pick_lowest() {
        let cube = AABB::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(cube.largest_axis(), 0);

        let slab = AABB::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 2.0));
        assert_eq!(slab.largest_axis(), 1);
    }

    #[test]
    fn test_non_overlapping_boxes() {
        let box0 = AABB::new(Vec3::ZERO, Vec3::ONE);
        let box1 = AABB::new(Vec3::splat(2.0), Vec3::splat(3.0));
        let combined = AABB::combine(&box0, &box1);

        assert_eq!(combined.min, Vec3::ZERO);
        assert_eq!(combined.max, Vec3::splat(3.0));
    }

    #[test]
    fn test_hit() {
        let aabb = AABB::new(Vec3::ZERO, Vec3::ONE);
        let towards = Ray::new(Vec3::new(0.5, 0.5, -1.0), Vec3::Z);
        let away = Ray::new(Vec3::new(0.5, 0.5, -1.0), Vec3::NEG_Z);
        let beside = Ray::new(Vec3::new(2.0, 0.5, -1.0), Vec3::Z);

        assert!(aabb.hit(&towards, Interval::forward()));
        assert!(!aabb.hit(&away, Interval::forward()));
        assert!(!aabb.hit(&beside, Interval::forward()));
        assert!(!aabb.hit(&towards, Interval::new(0.0, 0.5)));
    }

    #[test]
    fn test_hit_flat_box() {
        let flat = AABB::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0));
        let ray = Ray::new(Vec3::new(0.25, 0.25, -1.0), Vec3::Z);
        assert!(flat.hit(&ray, Interval::forward()));
    }

    #[test]
    fn test_empty_box_is_never_hit() {
        let ray = Ray::new(Vec3::new(0.25, 0.25, -1.0), Vec3::new(0.1, 0.2, 1.0));
        assert!(!AABB::EMPTY.hit(&ray, Interval::forward()));
    }
}
