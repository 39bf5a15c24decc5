use glam::Vec3;

use crate::accelerators::{Primitive, aabb::AABB};

/// A triangle of the shared build buffer. Bounds and centroid are computed once
/// here, so the builder only ever folds the precomputed corners.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Triangle {
    vertices: [Vec3; 3],
    min: Vec3,
    max: Vec3,
    centroid: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            vertices: [a, b, c],
            min: a.min(b).min(c),
            max: a.max(b).max(c),
            centroid: (a + b + c) / 3.0,
        }
    }

    pub fn vertices(&self) -> &[Vec3; 3] {
        &self.vertices
    }

    pub fn min_bound(&self) -> Vec3 {
        self.min
    }

    pub fn max_bound(&self) -> Vec3 {
        self.max
    }
}

impl Primitive for Triangle {
    fn centroid(&self) -> Vec3 {
        self.centroid
    }

    fn aabb(&self) -> AABB {
        AABB {
            min: self.min,
            max: self.max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_values() {
        let tri = Triangle::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(3.0, -1.0, 0.0),
            Vec3::new(0.0, 4.0, 2.0),
        );
        assert_eq!(tri.centroid(), Vec3::new(1.0, 1.0, 2.0 / 3.0));
        assert_eq!(tri.min_bound(), Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(tri.max_bound(), Vec3::new(3.0, 4.0, 2.0));
        assert_eq!(tri.aabb().min, tri.min_bound());
        assert_eq!(tri.aabb().max, tri.max_bound());
    }
}
