//! Ray casting against triangulated scene geometry.
//!
//! The [`Bvh`] is rebuilt from a snapshot of the context whenever a model's
//! geometry is updated; it is immutable afterwards and shared across `rayon`
//! worker threads during ray casting.

use super::{BoundingBox, Vec3, orthonormal_basis};
use crate::core::context::Uuid;
use std::cell::Cell;
use std::f32::consts::PI;

const LEAF_SIZE: usize = 4;
const INTERSECTION_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize(1e-12).unwrap_or_else(Vec3::z),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// A triangle tagged with the UUID of the primitive it was generated from.
#[derive(Debug, Clone, Copy)]
pub struct SceneTriangle {
    pub vertices: [Vec3; 3],
    pub uuid: Uuid,
}

impl SceneTriangle {
    pub fn new(vertices: [Vec3; 3], uuid: Uuid) -> Self {
        Self { vertices, uuid }
    }

    fn centroid(&self) -> Vec3 {
        (self.vertices[0] + self.vertices[1] + self.vertices[2]) / 3.0
    }

    fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter())
    }

    /// Two-sided Möller-Trumbore intersection, returning the hit distance.
    fn intersect(&self, ray: &Ray) -> Option<f32> {
        let [v0, v1, v2] = self.vertices;
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let p = ray.direction.cross(&e2);
        let det = e1.dot(&p);
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = ray.origin - v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(&e1);
        let v = ray.direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(&q) * inv_det;
        (t > INTERSECTION_EPSILON).then_some(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub uuid: Uuid,
    pub distance: f32,
}

#[derive(Debug, Clone)]
struct BvhNode {
    bounds: BoundingBox,
    start: usize,
    /// Number of triangles for a leaf; zero marks an interior node whose left
    /// child immediately follows it.
    count: usize,
    right: usize,
}

/// Bounding volume hierarchy over scene triangles.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    triangles: Vec<SceneTriangle>,
    nodes: Vec<BvhNode>,
}

impl Bvh {
    pub fn build(triangles: Vec<SceneTriangle>) -> Self {
        let mut bvh = Self {
            triangles,
            nodes: Vec::new(),
        };
        if !bvh.triangles.is_empty() {
            let len = bvh.triangles.len();
            bvh.nodes.reserve(2 * len / LEAF_SIZE + 1);
            bvh.build_node(0, len);
        }
        bvh
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn bounds(&self) -> BoundingBox {
        self.nodes
            .first()
            .map(|n| n.bounds)
            .unwrap_or_else(BoundingBox::empty)
    }

    fn build_node(&mut self, start: usize, end: usize) -> usize {
        let bounds = self.triangles[start..end]
            .iter()
            .fold(BoundingBox::empty(), |acc, t| acc.union(&t.bounds()));
        let index = self.nodes.len();
        self.nodes.push(BvhNode {
            bounds,
            start,
            count: end - start,
            right: 0,
        });

        if end - start <= LEAF_SIZE {
            return index;
        }

        let mut centroid_bounds = BoundingBox::empty();
        for tri in &self.triangles[start..end] {
            centroid_bounds.include(&tri.centroid());
        }
        let axis = centroid_bounds.longest_axis();
        if centroid_bounds.extent()[axis] <= f32::EPSILON {
            return index;
        }

        self.triangles[start..end]
            .sort_unstable_by(|a, b| a.centroid()[axis].total_cmp(&b.centroid()[axis]));
        let mid = start + (end - start) / 2;

        self.build_node(start, mid);
        let right = self.build_node(mid, end);
        let node = &mut self.nodes[index];
        node.count = 0;
        node.right = right;
        index
    }

    /// Closest intersection within `max_distance`, skipping triangles of `ignore`.
    pub fn closest_hit(&self, ray: &Ray, max_distance: f32, ignore: Option<Uuid>) -> Option<Hit> {
        let limit = Cell::new(max_distance);
        let mut best: Option<Hit> = None;
        self.traverse(ray, &limit, |tri| {
            if Some(tri.uuid) == ignore {
                return false;
            }
            if let Some(t) = tri.intersect(ray) {
                if t < limit.get() {
                    limit.set(t);
                    best = Some(Hit {
                        uuid: tri.uuid,
                        distance: t,
                    });
                }
            }
            false
        });
        best
    }

    /// Whether any triangle (other than those of `ignore`) blocks the ray within `max_distance`.
    pub fn is_occluded(&self, ray: &Ray, max_distance: f32, ignore: Option<Uuid>) -> bool {
        let limit = Cell::new(max_distance);
        let mut occluded = false;
        self.traverse(ray, &limit, |tri| {
            if Some(tri.uuid) == ignore {
                return false;
            }
            if tri.intersect(ray).is_some_and(|t| t < max_distance) {
                occluded = true;
                return true;
            }
            false
        });
        occluded
    }

    /// Visits candidate triangles whose node bounds intersect the ray within
    /// `limit` until `visit` returns `true`.
    fn traverse<F>(&self, ray: &Ray, limit: &Cell<f32>, mut visit: F)
    where
        F: FnMut(&SceneTriangle) -> bool,
    {
        if self.nodes.is_empty() {
            return;
        }
        let inv_dir = Vec3::new(
            1.0 / ray.direction.x,
            1.0 / ray.direction.y,
            1.0 / ray.direction.z,
        );
        let mut stack = Vec::with_capacity(64);
        stack.push(0usize);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !slab_test(ray, &inv_dir, &node.bounds, limit.get()) {
                continue;
            }
            if node.count > 0 {
                for tri in &self.triangles[node.start..node.start + node.count] {
                    if visit(tri) {
                        return;
                    }
                }
            } else {
                stack.push(node.right);
                stack.push(index + 1);
            }
        }
    }
}

fn slab_test(ray: &Ray, inv_dir: &Vec3, bounds: &BoundingBox, max_distance: f32) -> bool {
    let mut t_min = 0.0f32;
    let mut t_max = max_distance;
    for axis in 0..3 {
        let t0 = (bounds.min[axis] - ray.origin[axis]) * inv_dir[axis];
        let t1 = (bounds.max[axis] - ray.origin[axis]) * inv_dir[axis];
        let (near, far) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        // NaN arises for a zero direction component with the origin on a slab plane.
        if !near.is_nan() {
            t_min = t_min.max(near);
        }
        if !far.is_nan() {
            t_max = t_max.min(far);
        }
        if t_min > t_max + INTERSECTION_EPSILON {
            return false;
        }
    }
    true
}

/// Cosine-weighted direction in the hemisphere around `normal` from two uniform samples.
pub fn cosine_weighted_direction(normal: &Vec3, u1: f32, u2: f32) -> Vec3 {
    let (u, v) = orthonormal_basis(normal);
    let r = u1.sqrt();
    let phi = 2.0 * PI * u2;
    let local_z = (1.0 - u1).max(0.0).sqrt();
    (u * (r * phi.cos()) + v * (r * phi.sin()) + normal.normalize() * local_z).normalize()
}

/// Stratified sample coordinates in the unit square: `n` jittered cells in a
/// near-square grid, with `jitter` supplying values in `[0, 1)`.
pub fn stratified_samples(n: usize, mut jitter: impl FnMut() -> f32) -> Vec<(f32, f32)> {
    if n == 0 {
        return Vec::new();
    }
    let nx = (n as f32).sqrt().ceil() as usize;
    let ny = n.div_ceil(nx);
    let mut samples = Vec::with_capacity(n);
    'outer: for j in 0..ny {
        for i in 0..nx {
            if samples.len() == n {
                break 'outer;
            }
            let s = (i as f32 + jitter()) / nx as f32;
            let t = (j as f32 + jitter()) / ny as f32;
            samples.push((s, t));
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(z: f32, half: f32, uuid: Uuid) -> Vec<SceneTriangle> {
        let a = Vec3::new(-half, -half, z);
        let b = Vec3::new(half, -half, z);
        let c = Vec3::new(half, half, z);
        let d = Vec3::new(-half, half, z);
        vec![
            SceneTriangle::new([a, b, c], uuid),
            SceneTriangle::new([a, c, d], uuid),
        ]
    }

    #[test]
    fn empty_bvh_never_hits() {
        let bvh = Bvh::build(Vec::new());
        let ray = Ray::new(Vec3::zeros(), Vec3::z());
        assert!(bvh.closest_hit(&ray, f32::INFINITY, None).is_none());
        assert!(!bvh.is_occluded(&ray, f32::INFINITY, None));
    }

    #[test]
    fn closest_hit_selects_nearest_of_stacked_squares() {
        let mut tris = square(1.0, 0.5, 1);
        tris.extend(square(2.0, 0.5, 2));
        tris.extend(square(3.0, 0.5, 3));
        let bvh = Bvh::build(tris);
        let ray = Ray::new(Vec3::new(0.1, 0.1, 0.0), Vec3::z());
        let hit = bvh.closest_hit(&ray, f32::INFINITY, None).unwrap();
        assert_eq!(hit.uuid, 1);
        assert!((hit.distance - 1.0).abs() < 1e-5);

        let hit = bvh.closest_hit(&ray, f32::INFINITY, Some(1)).unwrap();
        assert_eq!(hit.uuid, 2);
    }

    #[test]
    fn occlusion_respects_max_distance_and_misses() {
        let bvh = Bvh::build(square(5.0, 0.5, 7));
        let up = Ray::new(Vec3::zeros(), Vec3::z());
        assert!(bvh.is_occluded(&up, 10.0, None));
        assert!(!bvh.is_occluded(&up, 4.0, None));
        let aside = Ray::new(Vec3::new(2.0, 0.0, 0.0), Vec3::z());
        assert!(!bvh.is_occluded(&aside, 10.0, None));
        let down = Ray::new(Vec3::zeros(), -Vec3::z());
        assert!(!bvh.is_occluded(&down, 10.0, None));
    }

    #[test]
    fn large_scene_builds_interior_nodes() {
        let mut tris = Vec::new();
        for i in 0..50 {
            let mut layer = square(i as f32 + 1.0, 0.5, i as Uuid);
            for t in &mut layer {
                for v in &mut t.vertices {
                    v.x += i as f32 * 2.0;
                }
            }
            tris.extend(layer);
        }
        let bvh = Bvh::build(tris);
        assert_eq!(bvh.len(), 100);
        let ray = Ray::new(Vec3::new(20.0, 0.0, 0.0), Vec3::z());
        let hit = bvh.closest_hit(&ray, f32::INFINITY, None).unwrap();
        assert_eq!(hit.uuid, 10);
    }

    #[test]
    fn cosine_weighted_directions_stay_in_hemisphere() {
        let n = Vec3::new(0.0, 1.0, 1.0).normalize();
        for (u1, u2) in stratified_samples(64, || 0.5) {
            let d = cosine_weighted_direction(&n, u1, u2);
            assert!(d.dot(&n) >= -1e-6);
            assert!((d.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn stratified_samples_returns_requested_count() {
        assert_eq!(stratified_samples(10, || 0.0).len(), 10);
        assert!(stratified_samples(0, || 0.0).is_empty());
    }
}
