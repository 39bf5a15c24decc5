use aabb::AABB;
use glam::Vec3;

pub mod aabb;
pub mod bvh;
pub mod flatten;
pub mod traverse;

pub trait Primitive: Send + Sync {
    fn centroid(&self) -> Vec3;

    fn aabb(&self) -> AABB;
}
