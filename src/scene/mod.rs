use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::accelerators::bvh::{BuildStats, Bvh};
use crate::accelerators::flatten::{GpuBvhNode, GpuTriangle};
use crate::accelerators::traverse::{Hit, intersect_nodes};
use crate::buffer_builder::BufferBuilder;
use crate::error::checked_u32;
use crate::interval::Interval;
use crate::ray::Ray;
use crate::{BvhConfig, BvhError, Result};

pub mod cache;
pub mod loader;

/// One ray traceable mesh, kept in object space.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub name: String,
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub transform: Mat4,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, vertices: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            transform: Mat4::IDENTITY,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn build_bvh(&self, config: &BvhConfig) -> Result<Bvh> {
        Bvh::build(&self.vertices, &self.indices, *config).map_err(|source| BvhError::InObject {
            name: self.name.clone(),
            source: Box::new(source),
        })
    }
}

/// Per-object record uploaded next to the node and triangle buffers. Node and
/// triangle offsets locate the object's block; offsets inside a block are
/// relative to it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct GpuMeshInfo {
    pub local_to_world: [[f32; 4]; 4],
    pub world_to_local: [[f32; 4]; 4],
    pub node_offset: u32,
    pub node_count: u32,
    pub triangle_offset: u32,
    pub triangle_count: u32,
}

const _: () = assert!(std::mem::size_of::<GpuMeshInfo>() == 144);

impl GpuMeshInfo {
    pub fn world_to_local(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world_to_local)
    }

    pub fn local_to_world(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.local_to_world)
    }
}

/// Byte offsets of each section inside a packed upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionOffsets {
    pub nodes: usize,
    pub triangles: usize,
    pub objects: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub object: u32,
    pub hit: Hit,
}

/// Everything the compute stage needs for one scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneBuffers {
    pub nodes: Vec<GpuBvhNode>,
    pub triangles: Vec<GpuTriangle>,
    pub objects: Vec<GpuMeshInfo>,
    #[serde(skip)]
    pub stats: Vec<BuildStats>,
}

fn padded_to_16(len: usize) -> usize {
    len.div_ceil(16) * 16
}

impl SceneBuffers {
    /// Size in bytes of what [`SceneBuffers::pack_into`] produces.
    pub fn upload_size(&self) -> usize {
        padded_to_16(std::mem::size_of_val(self.nodes.as_slice()))
            + padded_to_16(std::mem::size_of_val(self.triangles.as_slice()))
            + padded_to_16(std::mem::size_of_val(self.objects.as_slice()))
    }

    /// Packs nodes, triangles and object records into `builder`, each section
    /// starting on a 16 byte boundary. The builder is cleared first.
    pub fn pack_into(&self, builder: &mut BufferBuilder) -> SectionOffsets {
        builder.clear();

        let nodes = builder.get_offset();
        builder.append_slice(&self.nodes);
        builder.align_to_16();

        let triangles = builder.get_offset();
        builder.append_slice(&self.triangles);
        builder.align_to_16();

        let objects = builder.get_offset();
        builder.append_slice(&self.objects);
        builder.align_to_16();

        SectionOffsets {
            nodes,
            triangles,
            objects,
        }
    }

    pub fn object_nodes(&self, object: usize) -> &[GpuBvhNode] {
        let info = &self.objects[object];
        let start = info.node_offset as usize;
        &self.nodes[start..start + info.node_count as usize]
    }

    pub fn object_triangles(&self, object: usize) -> &[GpuTriangle] {
        let info = &self.objects[object];
        let start = info.triangle_offset as usize;
        &self.triangles[start..start + info.triangle_count as usize]
    }

    /// Closest hit over all objects. The ray is moved into each object's
    /// space, so `t` stays in world ray units.
    pub fn intersect(&self, ray: &Ray, mut ray_t: Interval) -> Option<SceneHit> {
        let mut closest = None;
        for (object, info) in self.objects.iter().enumerate() {
            let local = ray.transformed(&info.world_to_local());
            let nodes = self.object_nodes(object);
            let triangles = self.object_triangles(object);
            if let Some(hit) = intersect_nodes(nodes, triangles, &local, ray_t) {
                ray_t.max = hit.t;
                closest = Some(SceneHit {
                    object: object as u32,
                    hit,
                });
            }
        }
        closest
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }
}

/// Caller-owned list of ray traceable objects.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub config: BvhConfig,
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new(config: BvhConfig) -> Self {
        Self {
            config,
            objects: Vec::new(),
        }
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    /// Removes the first object called `name`.
    pub fn remove_object(&mut self, name: &str) -> Option<SceneObject> {
        let index = self.objects.iter().position(|object| object.name == name)?;
        Some(self.objects.remove(index))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Builds every object's hierarchy and concatenates the flattened buffers
    /// in object order.
    pub fn build(&self) -> Result<SceneBuffers> {
        self.config.validate()?;
        if let Some(object) = self
            .objects
            .iter()
            .find(|object| object.transform.determinant() == 0.0)
        {
            return Err(BvhError::SingularTransform(object.name.clone()));
        }
        checked_u32(self.objects.len(), "objects")?;
        let start = Instant::now();

        let bvhs = self
            .objects
            .par_iter()
            .map(|object| object.build_bvh(&self.config))
            .collect::<Result<Vec<_>>>()?;

        let mut buffers = SceneBuffers {
            nodes: Vec::with_capacity(bvhs.iter().map(|bvh| bvh.nodes().len()).sum()),
            triangles: Vec::with_capacity(bvhs.iter().map(|bvh| bvh.triangles().len()).sum()),
            objects: Vec::with_capacity(bvhs.len()),
            stats: Vec::with_capacity(bvhs.len()),
        };

        for (object, bvh) in self.objects.iter().zip(&bvhs) {
            let info = GpuMeshInfo {
                local_to_world: object.transform.to_cols_array_2d(),
                world_to_local: object.transform.inverse().to_cols_array_2d(),
                node_offset: checked_u32(buffers.nodes.len(), "scene nodes")?,
                node_count: checked_u32(bvh.nodes().len(), "object nodes")?,
                triangle_offset: checked_u32(buffers.triangles.len(), "scene triangles")?,
                triangle_count: checked_u32(bvh.triangles().len(), "object triangles")?,
            };
            debug!(
                "Object {:?}: {} triangles, {} nodes at node offset {}",
                object.name, info.triangle_count, info.node_count, info.node_offset
            );

            bvh.write_nodes(&mut buffers.nodes);
            bvh.write_triangles(&mut buffers.triangles);
            buffers.objects.push(info);
            buffers.stats.push(*bvh.stats());
        }
        checked_u32(buffers.nodes.len(), "scene nodes")?;
        checked_u32(buffers.triangles.len(), "scene triangles")?;

        info!(
            "Built scene: {} objects, {} nodes, {} triangles in {:.3} ms",
            buffers.objects.len(),
            buffers.nodes.len(),
            buffers.triangles.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(buffers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(name: &str, z: f32) -> SceneObject {
        let vertices = vec![
            Vec3::new(0.0, 0.0, z),
            Vec3::new(1.0, 0.0, z),
            Vec3::new(1.0, 1.0, z),
            Vec3::new(0.0, 1.0, z),
        ];
        SceneObject::new(name, vertices, vec![0, 1, 2, 0, 2, 3])
    }

    fn tetrahedra(count: usize) -> SceneObject {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for i in 0..count {
            let o = Vec3::new(i as f32 * 2.0, 0.0, 0.0);
            let base = vertices.len() as u32;
            vertices.push(o);
            vertices.push(o + Vec3::X);
            vertices.push(o + Vec3::Y);
            vertices.push(o + Vec3::Z);
            indices.extend_from_slice(&[
                base,
                base + 1,
                base + 2,
                base,
                base + 1,
                base + 3,
                base,
                base + 2,
                base + 3,
                base + 1,
                base + 2,
                base + 3,
            ]);
        }
        SceneObject::new("tetrahedra", vertices, indices)
    }

    #[test]
    fn test_add_and_remove_objects() {
        let mut scene = Scene::default();
        assert!(scene.is_empty());

        scene.add_object(quad("a", 0.0));
        scene.add_object(quad("b", 1.0));
        assert_eq!(scene.len(), 2);

        let removed = scene.remove_object("a").unwrap();
        assert_eq!(removed.name, "a");
        assert_eq!(scene.len(), 1);
        assert!(scene.remove_object("a").is_none());
    }

    #[test]
    fn test_build_concatenates_blocks() {
        let mut scene = Scene::default();
        scene.add_object(tetrahedra(8));
        scene.add_object(quad("floor", -1.0));
        scene.add_object(SceneObject::new("empty", Vec::new(), Vec::new()));

        let buffers = scene.build().unwrap();
        assert_eq!(buffers.objects.len(), 3);
        assert_eq!(buffers.stats.len(), 3);

        let mut node_offset = 0;
        let mut triangle_offset = 0;
        for (info, stats) in buffers.objects.iter().zip(&buffers.stats) {
            assert_eq!(info.node_offset, node_offset);
            assert_eq!(info.triangle_offset, triangle_offset);
            assert_eq!(info.node_count as usize, stats.node_count);
            assert_eq!(info.triangle_count as usize, stats.triangle_count);
            node_offset += info.node_count;
            triangle_offset += info.triangle_count;
        }
        assert_eq!(node_offset as usize, buffers.nodes.len());
        assert_eq!(triangle_offset as usize, buffers.triangles.len());

        // The empty object still has its root leaf.
        let empty = &buffers.objects[2];
        assert_eq!(empty.node_count, 1);
        assert_eq!(empty.triangle_count, 0);
        assert!(buffers.object_nodes(2)[0].is_leaf());
    }

    #[test]
    fn test_blocks_match_standalone_flatten() {
        let object = tetrahedra(5);
        let mut scene = Scene::default();
        scene.add_object(quad("first", 0.0));
        scene.add_object(object.clone());

        let buffers = scene.build().unwrap();
        let standalone = Bvh::build(&object.vertices, &object.indices, scene.config)
            .unwrap()
            .flatten();

        assert_eq!(buffers.object_nodes(1), standalone.nodes.as_slice());
        assert_eq!(buffers.object_triangles(1), standalone.triangles.as_slice());
    }

    #[test]
    fn test_build_error_names_object() {
        let mut scene = Scene::default();
        scene.add_object(quad("fine", 0.0));
        scene.add_object(SceneObject::new("broken", vec![Vec3::ZERO], vec![0, 0, 1]));

        match scene.build() {
            Err(BvhError::InObject { name, source }) => {
                assert_eq!(name, "broken");
                assert!(matches!(*source, BvhError::IndexOutOfBounds { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_singular_transform_is_rejected() {
        let mut scene = Scene::default();
        scene.add_object(quad("flat", 0.0).with_transform(Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0))));
        assert!(matches!(scene.build(), Err(BvhError::SingularTransform(_))));
    }

    #[test]
    fn test_intersect_uses_object_transforms() {
        let mut scene = Scene::default();
        scene.add_object(quad("near", 0.0).with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0))));
        scene.add_object(
            quad("far", 0.0)
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 6.0)) * Mat4::from_scale(Vec3::splat(2.0))),
        );
        let buffers = scene.build().unwrap();

        // Only the scaled quad covers (1.5, 1.5).
        let ray = Ray::new(Vec3::new(1.5, 1.5, 0.0), Vec3::Z);
        let hit = buffers.intersect(&ray, Interval::forward()).unwrap();
        assert_eq!(hit.object, 1);
        assert!((hit.hit.t - 6.0).abs() < 1e-5);

        let ray = Ray::new(Vec3::new(0.5, 0.5, 0.0), Vec3::Z);
        let hit = buffers.intersect(&ray, Interval::forward()).unwrap();
        assert_eq!(hit.object, 0);
        assert!((hit.hit.t - 2.0).abs() < 1e-5);

        let ray = Ray::new(Vec3::new(0.5, 0.5, 0.0), Vec3::NEG_Z);
        assert!(buffers.intersect(&ray, Interval::forward()).is_none());
    }

    #[test]
    fn test_pack_into_aligns_sections() {
        let mut scene = Scene::default();
        scene.add_object(tetrahedra(3));
        scene.add_object(quad("floor", 0.0));
        let buffers = scene.build().unwrap();

        let mut builder = BufferBuilder::new();
        let offsets = buffers.pack_into(&mut builder);

        assert_eq!(offsets.nodes, 0);
        assert_eq!(offsets.triangles % 16, 0);
        assert_eq!(offsets.objects % 16, 0);
        assert!(offsets.triangles >= buffers.nodes.len() * 36);
        assert_eq!(builder.get_offset(), buffers.upload_size());

        let node_bytes: &[u8] = bytemuck::cast_slice(&buffers.nodes);
        assert_eq!(&builder.as_bytes()[..node_bytes.len()], node_bytes);

        // Packing again into the same builder reuses it.
        let capacity = builder.capacity();
        assert_eq!(buffers.pack_into(&mut builder), offsets);
        assert_eq!(builder.capacity(), capacity);
    }

    #[test]
    fn test_save_and_load() {
        let mut scene = Scene::default();
        scene.add_object(tetrahedra(4).with_transform(Mat4::from_translation(Vec3::Y)));
        let buffers = scene.build().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.bin");
        buffers.save(&path).unwrap();
        let loaded = SceneBuffers::load(&path).unwrap();

        assert_eq!(loaded.nodes, buffers.nodes);
        assert_eq!(loaded.triangles, buffers.triangles);
        assert_eq!(loaded.objects, buffers.objects);
        assert!(loaded.stats.is_empty());
    }
}
