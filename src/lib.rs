pub mod accelerators;
pub mod buffer_builder;
pub mod config;
pub mod error;
pub mod interval;
pub mod ray;
pub mod scene;
pub mod types;

pub use accelerators::Primitive;
pub use accelerators::aabb::AABB;
pub use accelerators::bvh::{BuildStats, Bvh, BvhBuilder, BvhNode};
pub use accelerators::flatten::{FlatBvh, GpuBvhNode, GpuTriangle};
pub use accelerators::traverse::Hit;
pub use config::{BvhConfig, SplitPolicy};
pub use error::{BvhError, Result};
pub use scene::cache::{SceneCache, SceneSnapshot};
pub use scene::{Scene, SceneBuffers, SceneObject};
pub use types::*;
