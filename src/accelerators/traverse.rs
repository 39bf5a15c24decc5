use glam::Vec3;

use super::aabb::AABB;
use super::flatten::{FlatBvh, GpuBvhNode, GpuTriangle};
use crate::{interval::Interval, ray::Ray};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
    /// Index into the triangle buffer the hierarchy was traversed with.
    pub triangle: u32,
}

// NOTE: Blender cycles intersect
//
// https://github.com/blender/cycles/blob/main/src/util/math_intersect.h#L160
pub fn intersect_triangle(
    ray: &Ray,
    ray_t: Interval,
    tri_a: Vec3,
    tri_b: Vec3,
    tri_c: Vec3,
) -> Option<TriangleHit> {
    let ray_p = ray.origin();
    let ray_d = ray.direction();

    // Vertices relative to ray origin.
    let v0 = tri_a - ray_p;
    let v1 = tri_b - ray_p;
    let v2 = tri_c - ray_p;

    // Triangle edges.
    let e0 = v2 - v0;
    let e1 = v0 - v1;
    let e2 = v1 - v2;

    // Edge tests.
    let u = e0.cross(v2 + v0).dot(ray_d);
    let v = e1.cross(v0 + v1).dot(ray_d);
    let w = e2.cross(v1 + v2).dot(ray_d);

    let uvw = u + v + w;
    let eps = f32::EPSILON * uvw.abs();
    let min_uvw = u.min(v.min(w));
    let max_uvw = u.max(v.max(w));

    if !(min_uvw >= -eps || max_uvw <= eps) {
        return None;
    }

    // Geometry normal and denominator.
    let ng1 = e1.cross(e0);
    let ng = ng1 + ng1;
    let den = ng.dot(ray_d);
    if den == 0.0 {
        return None;
    }

    // Depth test.
    let t = v0.dot(ng) / den;
    if !ray_t.contains(t) {
        return None;
    }

    let rcp_uvw = if uvw.abs() < 1e-18 { 0.0 } else { 1.0 / uvw };

    Some(TriangleHit {
        u: 1.0f32.min(u * rcp_uvw),
        v: 1.0f32.min(v * rcp_uvw),
        t,
    })
}

impl GpuBvhNode {
    pub fn bounds(&self) -> AABB {
        AABB {
            min: Vec3::from_array(self.bounds_min),
            max: Vec3::from_array(self.bounds_max),
        }
    }
}

impl GpuTriangle {
    pub fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<TriangleHit> {
        intersect_triangle(
            ray,
            ray_t,
            Vec3::from_array(self.a),
            Vec3::from_array(self.b),
            Vec3::from_array(self.c),
        )
    }
}

/// Closest hit within `ray_t`. `nodes` is one hierarchy whose root is
/// `nodes[0]`; its offsets are relative to `nodes` and `triangles`.
pub fn intersect_nodes(
    nodes: &[GpuBvhNode],
    triangles: &[GpuTriangle],
    ray: &Ray,
    mut ray_t: Interval,
) -> Option<Hit> {
    if nodes.is_empty() {
        return None;
    }

    let mut closest = None;
    let mut stack = vec![0u32];
    while let Some(idx) = stack.pop() {
        let node = &nodes[idx as usize];
        if !node.bounds().hit(ray, ray_t) {
            continue;
        }

        if node.is_leaf() {
            let start = node.triangle_offset;
            for triangle in start..start + node.triangle_count {
                if let Some(hit) = triangles[triangle as usize].intersect(ray, ray_t) {
                    ray_t.max = hit.t;
                    closest = Some(Hit {
                        t: hit.t,
                        u: hit.u,
                        v: hit.v,
                        triangle,
                    });
                }
            }
        } else {
            stack.push(node.child_offset + 1);
            stack.push(node.child_offset);
        }
    }
    closest
}

impl FlatBvh {
    pub fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Hit> {
        intersect_nodes(&self.nodes, &self.triangles, ray, ray_t)
    }
}
