use std::ops::Range;
use std::time::{Duration, Instant};

use glam::Vec3;
use log::{debug, info, trace, warn};

use super::{Primitive, aabb::AABB};
use crate::{BvhConfig, BvhError, Result, SplitPolicy, Triangle};

/// Child index carried by leaves. The root is node 0 and is never a child, so
/// 0 is free to mean "no children".
pub const LEAF_SENTINEL: u32 = 0;

/// Largest mesh accepted. A full build can hold up to twice as many nodes as
/// triangles, and node indices must fit the 32-bit child offset.
pub const MAX_TRIANGLES: usize = (u32::MAX / 2) as usize;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BvhNode {
    pub bounds: AABB,
    /// First of the two children, the second is at `child_index + 1`.
    pub child_index: u32,
    pub triangle_index: u32,
    pub triangle_count: u32,
    pub depth: u32,
}

impl BvhNode {
    fn new(bounds: AABB, triangle_index: usize, triangle_count: usize, depth: u32) -> Self {
        Self {
            bounds,
            child_index: LEAF_SENTINEL,
            triangle_index: triangle_index as u32,
            triangle_count: triangle_count as u32,
            depth,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.child_index == LEAF_SENTINEL
    }

    pub fn triangle_range(&self) -> Range<usize> {
        let start = self.triangle_index as usize;
        start..start + self.triangle_count as usize
    }

    pub fn children(&self) -> Option<(usize, usize)> {
        if self.is_leaf() {
            None
        } else {
            let first = self.child_index as usize;
            Some((first, first + 1))
        }
    }

    /// Cost of keeping this node as a leaf.
    pub fn cost(&self) -> f32 {
        node_cost(&self.bounds, self.triangle_count as usize)
    }
}

/// Expected intersection cost of a node: half its surface area per triangle.
/// A side without triangles costs nothing, whatever its (empty) bounds say.
pub fn node_cost(bounds: &AABB, triangle_count: usize) -> f32 {
    if triangle_count == 0 {
        return 0.0;
    }
    bounds.half_area() * triangle_count as f32
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitCandidate {
    pub axis: usize,
    pub position: f32,
    pub cost: f32,
}

/// One side of a partition: where it starts in the triangle buffer, how many
/// triangles it has taken so far and their tight bounds.
#[derive(Clone, Copy, Debug)]
struct ChildRange {
    start: usize,
    count: usize,
    bounds: AABB,
}

impl ChildRange {
    fn starting_at(start: usize) -> Self {
        Self {
            start,
            count: 0,
            bounds: AABB::EMPTY,
        }
    }

    fn push(&mut self, triangle: &Triangle) {
        self.bounds.grow_to_include_primitive(triangle);
        self.count += 1;
    }

    fn cost(&self) -> f32 {
        node_cost(&self.bounds, self.count)
    }
}

/// Cost of cutting `triangles` with the plane `axis = position`. Triangles go
/// left when their centroid lies strictly below the plane.
pub fn evaluate_split(triangles: &[Triangle], axis: usize, position: f32) -> f32 {
    let mut left = ChildRange::starting_at(0);
    let mut right = ChildRange::starting_at(0);
    for triangle in triangles {
        if triangle.centroid()[axis] < position {
            left.push(triangle);
        } else {
            right.push(triangle);
        }
    }
    left.cost() + right.cost()
}

/// Samples `samples` planes per axis, evenly spaced strictly inside `bounds`,
/// and returns the cheapest. Axes are scanned in order and only a strictly
/// lower cost replaces the current best.
pub fn find_best_split(
    triangles: &[Triangle],
    bounds: &AABB,
    samples: u32,
) -> Option<SplitCandidate> {
    let mut best: Option<SplitCandidate> = None;
    for axis in 0..3 {
        let bound_start = bounds.min[axis];
        let bound_end = bounds.max[axis];
        for attempt in 0..samples {
            let fraction = (attempt + 1) as f32 / (samples + 1) as f32;
            let position = bound_start + (bound_end - bound_start) * fraction;
            let cost = evaluate_split(triangles, axis, position);
            if best.is_none_or(|b| cost < b.cost) {
                best = Some(SplitCandidate {
                    axis,
                    position,
                    cost,
                });
            }
        }
    }
    best
}

/// Longest axis of `bounds`, cut at its centre.
pub fn median_split(triangles: &[Triangle], bounds: &AABB) -> SplitCandidate {
    let axis = bounds.largest_axis();
    let position = bounds.center()[axis];
    SplitCandidate {
        axis,
        position,
        cost: evaluate_split(triangles, axis, position),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BuildStats {
    pub triangle_count: usize,
    pub node_count: usize,
    pub leaf_count: usize,
    pub max_leaf_triangles: u32,
    pub max_depth_reached: u32,
    pub build_time: Duration,
}

impl BuildStats {
    fn collect(nodes: &[BvhNode], triangle_count: usize, build_time: Duration) -> Self {
        let mut stats = BuildStats {
            triangle_count,
            node_count: nodes.len(),
            build_time,
            ..Default::default()
        };
        for node in nodes {
            stats.max_depth_reached = stats.max_depth_reached.max(node.depth);
            if node.is_leaf() {
                stats.leaf_count += 1;
                stats.max_leaf_triangles = stats.max_leaf_triangles.max(node.triangle_count);
            }
        }
        stats
    }
}

/// A finished hierarchy. Read-only; geometry changes mean building a new one.
///
/// Nodes reference contiguous ranges of one shared triangle buffer, and the
/// two children of a node are stored next to each other.
#[derive(Clone, Debug)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    triangles: Vec<Triangle>,
    config: BvhConfig,
    stats: BuildStats,
}

impl Bvh {
    pub fn build(vertices: &[Vec3], indices: &[u32], config: BvhConfig) -> Result<Self> {
        Ok(BvhBuilder::new(vertices, indices, config)?.build())
    }

    pub fn root(&self) -> &BvhNode {
        &self.nodes[0]
    }

    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Triangles in build order. Leaf ranges index into this slice.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn config(&self) -> &BvhConfig {
        &self.config
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    pub fn leaves(&self) -> impl Iterator<Item = &BvhNode> {
        self.nodes.iter().filter(|node| node.is_leaf())
    }

    pub fn node_triangles(&self, node: &BvhNode) -> &[Triangle] {
        &self.triangles[node.triangle_range()]
    }
}

pub struct BvhBuilder {
    nodes: Vec<BvhNode>,
    triangles: Vec<Triangle>,
    config: BvhConfig,
}

fn check_triangle_count(count: usize) -> Result<()> {
    if count > MAX_TRIANGLES {
        return Err(BvhError::TooLarge {
            what: "triangles",
            count,
            max: MAX_TRIANGLES,
        });
    }
    Ok(())
}

impl BvhBuilder {
    /// Validates the mesh and lays out the root node. `indices` holds one
    /// vertex triple per triangle.
    pub fn new(vertices: &[Vec3], indices: &[u32], config: BvhConfig) -> Result<Self> {
        config.validate()?;
        if indices.len() % 3 != 0 {
            return Err(BvhError::IndexCountNotMultipleOfThree { len: indices.len() });
        }
        check_triangle_count(indices.len() / 3)?;

        let triangles = indices
            .chunks_exact(3)
            .enumerate()
            .map(|(triangle, idx)| {
                let vertex = |index: u32| {
                    vertices
                        .get(index as usize)
                        .copied()
                        .ok_or_else(|| BvhError::IndexOutOfBounds {
                            triangle,
                            index,
                            vertex_count: vertices.len(),
                        })
                };
                Ok(Triangle::new(vertex(idx[0])?, vertex(idx[1])?, vertex(idx[2])?))
            })
            .collect::<Result<Vec<_>>>()?;

        if triangles.is_empty() {
            warn!("Building a BVH without triangles, the root stays an empty leaf");
        }

        // The root bounds every vertex, not only the referenced ones.
        let root_bounds = AABB::from_points(vertices.iter().copied());

        let mut nodes = Vec::with_capacity(2 * triangles.len().max(1));
        nodes.push(BvhNode::new(root_bounds, 0, triangles.len(), 0));

        Ok(Self {
            nodes,
            triangles,
            config,
        })
    }

    pub fn build(mut self) -> Bvh {
        let start = Instant::now();

        // Depth first, first child before second, like the recursive form.
        let mut stack = vec![0usize];
        while let Some(node_idx) = stack.pop() {
            if let Some((first, second)) = self.split(node_idx) {
                stack.push(second);
                stack.push(first);
            }
        }

        let build_time = start.elapsed();
        let stats = BuildStats::collect(&self.nodes, self.triangles.len(), build_time);
        info!(
            "Built BVH: {} triangles, {} nodes, max triangles in leaf {}, in {:.3} ms",
            stats.triangle_count,
            stats.node_count,
            stats.max_leaf_triangles,
            build_time.as_secs_f64() * 1000.0
        );
        debug!(
            "BVH leaves: {}, deepest node: {}",
            stats.leaf_count, stats.max_depth_reached
        );

        Bvh {
            nodes: self.nodes,
            triangles: self.triangles,
            config: self.config,
            stats,
        }
    }

    fn choose_split(&self, node: &BvhNode) -> Option<SplitCandidate> {
        let triangles = &self.triangles[node.triangle_range()];
        match self.config.policy {
            SplitPolicy::Sah => {
                let candidate = find_best_split(triangles, &node.bounds, self.config.split_samples)?;
                (candidate.cost < node.cost()).then_some(candidate)
            }
            SplitPolicy::Median => {
                (node.triangle_count > 1).then(|| median_split(triangles, &node.bounds))
            }
        }
    }

    /// Splits `node_idx` in place and appends its two children. Returns their
    /// indices, or `None` when the node stays a leaf.
    fn split(&mut self, node_idx: usize) -> Option<(usize, usize)> {
        let node = self.nodes[node_idx];
        if node.depth >= self.config.max_depth || node.triangle_count == 0 {
            return None;
        }

        if self.nodes.len() + 2 > u32::MAX as usize {
            warn!("Node limit reached, node {node_idx} stays a leaf");
            return None;
        }

        let candidate = self.choose_split(&node)?;
        let (left, right) = self.partition(&node, candidate.axis, candidate.position);
        trace!(
            "Split node {} (depth {}) on axis {} at {}: {} | {} triangles, cost {} -> {}",
            node_idx,
            node.depth,
            candidate.axis,
            candidate.position,
            left.count,
            right.count,
            node.cost(),
            candidate.cost
        );

        let first = self.nodes.len();
        self.nodes[node_idx].child_index = first as u32;
        self.nodes.push(BvhNode::new(left.bounds, left.start, left.count, node.depth + 1));
        self.nodes.push(BvhNode::new(right.bounds, right.start, right.count, node.depth + 1));
        Some((first, first + 1))
    }

    /// Single pass over the node's range: triangles below the plane are swapped
    /// to the front, each side accumulating its count and tight bounds as it goes.
    fn partition(&mut self, node: &BvhNode, axis: usize, position: f32) -> (ChildRange, ChildRange) {
        let range = node.triangle_range();
        let mut left = ChildRange::starting_at(range.start);
        let mut right = ChildRange::starting_at(range.start);

        for i in range {
            let triangle = self.triangles[i];
            if triangle.centroid()[axis] < position {
                self.triangles.swap(i, left.start + left.count);
                left.push(&triangle);
            } else {
                right.push(&triangle);
            }
        }

        right.start = left.start + left.count;
        (left, right)
    }
}
