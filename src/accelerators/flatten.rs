use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::bvh::{Bvh, BvhNode};
use crate::Triangle;

/// 36 bytes, tightly packed:
/// bounds min, bounds max, triangle offset, triangle count, child offset.
/// `child_offset == 0` marks a leaf.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct GpuBvhNode {
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    pub triangle_offset: u32,
    pub triangle_count: u32,
    pub child_offset: u32,
}

/// 36 bytes, tightly packed: the three vertex positions.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct GpuTriangle {
    pub a: [f32; 3],
    pub b: [f32; 3],
    pub c: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<GpuBvhNode>() == 36);
const _: () = assert!(std::mem::size_of::<GpuTriangle>() == 36);

impl GpuBvhNode {
    pub fn is_leaf(&self) -> bool {
        self.child_offset == 0
    }
}

impl From<&BvhNode> for GpuBvhNode {
    fn from(node: &BvhNode) -> Self {
        Self {
            bounds_min: node.bounds.min.to_array(),
            bounds_max: node.bounds.max.to_array(),
            triangle_offset: node.triangle_index,
            triangle_count: node.triangle_count,
            child_offset: node.child_index,
        }
    }
}

impl From<&Triangle> for GpuTriangle {
    fn from(triangle: &Triangle) -> Self {
        let [a, b, c] = triangle.vertices();
        Self {
            a: a.to_array(),
            b: b.to_array(),
            c: c.to_array(),
        }
    }
}

/// Node and triangle buffers of one hierarchy, in the index order of the
/// live nodes and triangles, so offsets are used as-is.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatBvh {
    pub nodes: Vec<GpuBvhNode>,
    pub triangles: Vec<GpuTriangle>,
}

impl FlatBvh {
    pub fn nodes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    pub fn triangles_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.triangles)
    }
}

impl From<&Bvh> for FlatBvh {
    fn from(bvh: &Bvh) -> Self {
        let mut flat = FlatBvh::default();
        bvh.flatten_into(&mut flat);
        flat
    }
}

impl Bvh {
    pub fn flatten(&self) -> FlatBvh {
        FlatBvh::from(self)
    }

    /// Overwrites `out`, reusing its allocations. Same-sized hierarchies never
    /// reallocate.
    pub fn flatten_into(&self, out: &mut FlatBvh) {
        out.nodes.clear();
        out.triangles.clear();
        self.write_nodes(&mut out.nodes);
        self.write_triangles(&mut out.triangles);
    }

    /// Appends one record per node, in node order.
    pub fn write_nodes(&self, out: &mut Vec<GpuBvhNode>) {
        out.extend(self.nodes().iter().map(GpuBvhNode::from));
    }

    /// Appends one record per triangle, in build order.
    pub fn write_triangles(&self, out: &mut Vec<GpuTriangle>) {
        out.extend(self.triangles().iter().map(GpuTriangle::from));
    }
}
