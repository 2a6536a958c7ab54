use super::{Context, ContextError, ObjectId, ObjectType, Result, Shape, Uuid};
use crate::core::geometry::{
    RgbaColor, SphericalCoord, Transform, Vec2, Vec3, orientation_from_spherical,
    orthonormal_basis, transform_point, triangle_normal,
};
use itertools::Itertools;
use nalgebra::Matrix4;
use std::f32::consts::PI;
use tracing::debug;

type Shapes = Vec<(Shape, RgbaColor)>;

fn ensure_positive(what: &str, values: &[f32]) -> Result<()> {
    if values.iter().all(|v| *v > 0.0 && v.is_finite()) {
        Ok(())
    } else {
        Err(ContextError::invalid(format!("{what} must be positive")))
    }
}

fn ensure_divisions(what: &str, n: u32, min: u32) -> Result<()> {
    if n >= min {
        Ok(())
    } else {
        Err(ContextError::invalid(format!(
            "{what} must be at least {min}, got {n}"
        )))
    }
}

/// Empty shape list with room for `count` shapes. An overflowing count or a
/// failed reservation is reported instead of aborting on allocation.
fn shape_buffer(count: Option<usize>) -> Result<Shapes> {
    let count = count.ok_or(ContextError::Allocation(usize::MAX))?;
    let mut shapes = Shapes::new();
    shapes
        .try_reserve_exact(count)
        .map_err(|_| ContextError::Allocation(count))?;
    Ok(shapes)
}

/// Triangle oriented so that its normal points away from `inside`.
fn outward_triangle(mut v: [Vec3; 3], inside: &Vec3, color: RgbaColor) -> (Shape, RgbaColor) {
    let centroid = (v[0] + v[1] + v[2]) / 3.0;
    if triangle_normal(&v[0], &v[1], &v[2]).dot(&(centroid - inside)) < 0.0 {
        v.swap(1, 2);
    }
    (Shape::Triangle { vertices: v }, color)
}

/// Patch spanning `u_edge` by `v_edge` around `center`; front face along `u × v`.
fn patch_from_edges(center: &Vec3, u_edge: &Vec3, v_edge: &Vec3) -> Shape {
    let n = u_edge.cross(v_edge).normalize();
    #[rustfmt::skip]
    let transform = Matrix4::new(
        u_edge.x, v_edge.x, n.x, center.x,
        u_edge.y, v_edge.y, n.y, center.y,
        u_edge.z, v_edge.z, n.z, center.z,
        0.0,      0.0,      0.0, 1.0,
    );
    Shape::Patch { transform }
}

pub(crate) fn tile(
    center: &Vec3,
    size: &Vec2,
    rotation: &SphericalCoord,
    subdivisions: (u32, u32),
    color: RgbaColor,
) -> Result<Shapes> {
    ensure_positive("tile size", &[size.x, size.y])?;
    ensure_divisions("tile subdivisions", subdivisions.0.min(subdivisions.1), 1)?;
    let (nx, ny) = subdivisions;
    let (dx, dy) = (size.x / nx as f32, size.y / ny as f32);
    let frame = Transform::new_translation(center) * orientation_from_spherical(rotation);
    let mut shapes = shape_buffer((nx as usize).checked_mul(ny as usize))?;
    shapes.extend((0..ny).cartesian_product(0..nx).map(|(j, i)| {
        let local = Vec3::new(
            -0.5 * size.x + (i as f32 + 0.5) * dx,
            -0.5 * size.y + (j as f32 + 0.5) * dy,
            0.0,
        );
        let transform = frame
            * Transform::new_translation(&local)
            * Transform::new_nonuniform_scaling(&Vec3::new(dx, dy, 1.0));
        (Shape::Patch { transform }, color)
    }));
    Ok(shapes)
}

pub(crate) fn sphere(divisions: u32, center: &Vec3, radius: f32, color: RgbaColor) -> Result<Shapes> {
    ensure_divisions("sphere divisions", divisions, 3)?;
    ensure_positive("sphere radius", &[radius])?;
    let n = divisions as usize;
    let point = |stack: usize, slice: usize| {
        let theta = PI * stack as f32 / n as f32;
        let phi = 2.0 * PI * (slice % n) as f32 / n as f32;
        center + radius * Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos())
    };
    let mut shapes = shape_buffer(n.checked_mul(n - 1).and_then(|c| c.checked_mul(2)))?;
    for stack in 0..n {
        for slice in 0..n {
            let (a, b) = (point(stack, slice), point(stack, slice + 1));
            let (c, d) = (point(stack + 1, slice), point(stack + 1, slice + 1));
            if stack == 0 {
                shapes.push(outward_triangle([a, c, d], center, color));
            } else if stack == n - 1 {
                shapes.push(outward_triangle([a, c, b], center, color));
            } else {
                shapes.push(outward_triangle([a, c, d], center, color));
                shapes.push(outward_triangle([a, d, b], center, color));
            }
        }
    }
    Ok(shapes)
}

/// Rings of `divisions` points around each node with frames propagated along the
/// centerline so consecutive rings do not twist.
fn tube_rings(nodes: &[Vec3], radii: &[f32], divisions: usize) -> Vec<Vec<Vec3>> {
    let count = nodes.len();
    let tangent = |i: usize| {
        let d = if i == 0 {
            nodes[1] - nodes[0]
        } else if i == count - 1 {
            nodes[i] - nodes[i - 1]
        } else {
            nodes[i + 1] - nodes[i - 1]
        };
        d.try_normalize(1e-12).unwrap_or_else(Vec3::z)
    };
    let mut u = orthonormal_basis(&tangent(0)).0;
    let mut rings = Vec::with_capacity(count);
    for (i, node) in nodes.iter().enumerate() {
        let t = tangent(i);
        u = (u - t * t.dot(&u))
            .try_normalize(1e-6)
            .unwrap_or_else(|| orthonormal_basis(&t).0);
        let v = t.cross(&u);
        rings.push(
            (0..divisions)
                .map(|k| {
                    let a = 2.0 * PI * k as f32 / divisions as f32;
                    node + radii[i] * (a.cos() * u + a.sin() * v)
                })
                .collect(),
        );
    }
    rings
}

pub(crate) fn tube(
    divisions: u32,
    nodes: &[Vec3],
    radii: &[f32],
    colors: &[RgbaColor],
) -> Result<Shapes> {
    ensure_divisions("tube divisions", divisions, 3)?;
    if nodes.len() < 2 {
        return Err(ContextError::invalid("a tube needs at least two nodes"));
    }
    if radii.len() != nodes.len() || (colors.len() != nodes.len() && colors.len() != 1) {
        return Err(ContextError::invalid(format!(
            "tube has {} nodes but {} radii and {} colors",
            nodes.len(),
            radii.len(),
            colors.len()
        )));
    }
    if radii.iter().any(|r| *r < 0.0 || !r.is_finite()) || radii.iter().all(|r| *r == 0.0) {
        return Err(ContextError::invalid("tube radii must be non-negative and not all zero"));
    }
    let n = divisions as usize;
    let mut shapes = shape_buffer(n.checked_mul(nodes.len() - 1).and_then(|c| c.checked_mul(2)))?;
    let rings = tube_rings(nodes, radii, n);
    for (i, (lower, upper)) in rings.iter().tuple_windows().enumerate() {
        let color = colors[i.min(colors.len() - 1)];
        let axis_mid = (nodes[i] + nodes[i + 1]) * 0.5;
        for k in 0..n {
            let k1 = (k + 1) % n;
            shapes.push(outward_triangle([lower[k], upper[k], upper[k1]], &axis_mid, color));
            shapes.push(outward_triangle([lower[k], upper[k1], lower[k1]], &axis_mid, color));
        }
    }
    Ok(shapes)
}

pub(crate) fn cuboid(
    center: &Vec3,
    size: &Vec3,
    subdivisions: (u32, u32, u32),
    color: RgbaColor,
) -> Result<Shapes> {
    ensure_positive("box size", &[size.x, size.y, size.z])?;
    let (nx, ny, nz) = subdivisions;
    ensure_divisions("box subdivisions", nx.min(ny).min(nz), 1)?;
    let divs = [nx, ny, nz];
    let axes = [Vec3::x(), Vec3::y(), Vec3::z()];
    // (normal axis, sign, u axis, v axis) with u × v pointing outward.
    const FACES: [(usize, f32, usize, usize); 6] = [
        (2, 1.0, 0, 1),
        (2, -1.0, 1, 0),
        (0, 1.0, 1, 2),
        (0, -1.0, 2, 1),
        (1, 1.0, 2, 0),
        (1, -1.0, 0, 2),
    ];
    let (x, y, z) = (nx as usize, ny as usize, nz as usize);
    let count = x
        .checked_mul(y)
        .zip(y.checked_mul(z))
        .zip(x.checked_mul(z))
        .and_then(|((xy, yz), xz)| xy.checked_add(yz)?.checked_add(xz)?.checked_mul(2));
    let mut shapes = shape_buffer(count)?;
    for (normal_axis, sign, ua, va) in FACES {
        let (nu, nv) = (divs[ua], divs[va]);
        let (du, dv) = (size[ua] / nu as f32, size[va] / nv as f32);
        let face_center = center + axes[normal_axis] * (sign * 0.5 * size[normal_axis]);
        for (j, i) in (0..nv).cartesian_product(0..nu) {
            let offset = axes[ua] * (-0.5 * size[ua] + (i as f32 + 0.5) * du)
                + axes[va] * (-0.5 * size[va] + (j as f32 + 0.5) * dv);
            let shape = patch_from_edges(&(face_center + offset), &(axes[ua] * du), &(axes[va] * dv));
            shapes.push((shape, color));
        }
    }
    Ok(shapes)
}

pub(crate) fn disk(
    center: &Vec3,
    size: &Vec2,
    rotation: &SphericalCoord,
    divisions: u32,
    color: RgbaColor,
) -> Result<Shapes> {
    ensure_divisions("disk divisions", divisions, 3)?;
    ensure_positive("disk size", &[size.x, size.y])?;
    let frame = Transform::new_translation(center) * orientation_from_spherical(rotation);
    let rim = |k: u32| {
        let a = 2.0 * PI * (k % divisions) as f32 / divisions as f32;
        transform_point(&frame, &Vec3::new(size.x * a.cos(), size.y * a.sin(), 0.0))
    };
    let mut shapes = shape_buffer(Some(divisions as usize))?;
    shapes.extend((0..divisions).map(|k| {
        (
            Shape::Triangle {
                vertices: [*center, rim(k), rim(k + 1)],
            },
            color,
        )
    }));
    Ok(shapes)
}

pub(crate) fn cone(
    divisions: u32,
    base: &Vec3,
    apex: &Vec3,
    radii: (f32, f32),
    color: RgbaColor,
) -> Result<Shapes> {
    if (apex - base).norm() == 0.0 {
        return Err(ContextError::invalid("cone end points must differ"));
    }
    tube(divisions, &[*base, *apex], &[radii.0, radii.1], &[color])
}

impl Context {
    fn add_shapes(&mut self, kind: ObjectType, shapes: Shapes) -> Result<Vec<Uuid>> {
        debug!(?kind, primitives = shapes.len(), "Adding compound geometry.");
        self.insert_primitives(shapes)
    }

    fn add_shapes_object(&mut self, kind: ObjectType, shapes: Shapes) -> Result<ObjectId> {
        let uuids = self.add_shapes(kind, shapes)?;
        Ok(self.create_object(kind, uuids))
    }

    /// Rectangle subdivided into `nx × ny` patches.
    pub fn add_tile(
        &mut self,
        center: Vec3,
        size: Vec2,
        rotation: SphericalCoord,
        subdivisions: (u32, u32),
        color: RgbaColor,
    ) -> Result<Vec<Uuid>> {
        let shapes = tile(&center, &size, &rotation, subdivisions, color)?;
        self.add_shapes(ObjectType::Tile, shapes)
    }

    /// Latitude/longitude sphere of `2 n (n - 1)` outward-facing triangles.
    pub fn add_sphere(
        &mut self,
        divisions: u32,
        center: Vec3,
        radius: f32,
        color: RgbaColor,
    ) -> Result<Vec<Uuid>> {
        let shapes = sphere(divisions, &center, radius, color)?;
        self.add_shapes(ObjectType::Sphere, shapes)
    }

    /// Tube through `nodes`; `colors` holds one color per node or a single color.
    pub fn add_tube(
        &mut self,
        divisions: u32,
        nodes: &[Vec3],
        radii: &[f32],
        colors: &[RgbaColor],
    ) -> Result<Vec<Uuid>> {
        let shapes = tube(divisions, nodes, radii, colors)?;
        self.add_shapes(ObjectType::Tube, shapes)
    }

    /// Closed box of outward-facing patches.
    pub fn add_box(
        &mut self,
        center: Vec3,
        size: Vec3,
        subdivisions: (u32, u32, u32),
        color: RgbaColor,
    ) -> Result<Vec<Uuid>> {
        let shapes = cuboid(&center, &size, subdivisions, color)?;
        self.add_shapes(ObjectType::Box, shapes)
    }

    /// Elliptical disk with semi-axes `size`, as a fan of `divisions` triangles.
    pub fn add_disk(
        &mut self,
        center: Vec3,
        size: Vec2,
        rotation: SphericalCoord,
        divisions: u32,
        color: RgbaColor,
    ) -> Result<Vec<Uuid>> {
        let shapes = disk(&center, &size, &rotation, divisions, color)?;
        self.add_shapes(ObjectType::Disk, shapes)
    }

    /// Open truncated cone between two end points.
    pub fn add_cone(
        &mut self,
        divisions: u32,
        base: Vec3,
        apex: Vec3,
        radii: (f32, f32),
        color: RgbaColor,
    ) -> Result<Vec<Uuid>> {
        let shapes = cone(divisions, &base, &apex, radii, color)?;
        self.add_shapes(ObjectType::Cone, shapes)
    }

    pub fn add_tile_object(
        &mut self,
        center: Vec3,
        size: Vec2,
        rotation: SphericalCoord,
        subdivisions: (u32, u32),
        color: RgbaColor,
    ) -> Result<ObjectId> {
        let shapes = tile(&center, &size, &rotation, subdivisions, color)?;
        self.add_shapes_object(ObjectType::Tile, shapes)
    }

    pub fn add_sphere_object(
        &mut self,
        divisions: u32,
        center: Vec3,
        radius: f32,
        color: RgbaColor,
    ) -> Result<ObjectId> {
        let shapes = sphere(divisions, &center, radius, color)?;
        self.add_shapes_object(ObjectType::Sphere, shapes)
    }

    pub fn add_tube_object(
        &mut self,
        divisions: u32,
        nodes: &[Vec3],
        radii: &[f32],
        colors: &[RgbaColor],
    ) -> Result<ObjectId> {
        let shapes = tube(divisions, nodes, radii, colors)?;
        self.add_shapes_object(ObjectType::Tube, shapes)
    }

    pub fn add_box_object(
        &mut self,
        center: Vec3,
        size: Vec3,
        subdivisions: (u32, u32, u32),
        color: RgbaColor,
    ) -> Result<ObjectId> {
        let shapes = cuboid(&center, &size, subdivisions, color)?;
        self.add_shapes_object(ObjectType::Box, shapes)
    }

    pub fn add_disk_object(
        &mut self,
        center: Vec3,
        size: Vec2,
        rotation: SphericalCoord,
        divisions: u32,
        color: RgbaColor,
    ) -> Result<ObjectId> {
        let shapes = disk(&center, &size, &rotation, divisions, color)?;
        self.add_shapes_object(ObjectType::Disk, shapes)
    }

    pub fn add_cone_object(
        &mut self,
        divisions: u32,
        base: Vec3,
        apex: Vec3,
        radii: (f32, f32),
        color: RgbaColor,
    ) -> Result<ObjectId> {
        let shapes = cone(divisions, &base, &apex, radii, color)?;
        self.add_shapes_object(ObjectType::Cone, shapes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::PrimitiveType;
    use crate::core::geometry::RgbColor;

    fn green() -> RgbaColor {
        RgbColor::GREEN.into()
    }

    fn f32_approx_equal(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn tile_has_nx_times_ny_patches_covering_the_area() {
        let mut ctx = Context::new();
        let uuids = ctx
            .add_tile(Vec3::zeros(), Vec2::new(2.0, 3.0), SphericalCoord::default(), (4, 3), green())
            .unwrap();
        assert_eq!(uuids.len(), 12);
        let total: f32 = uuids.iter().map(|u| ctx.primitive_area(*u).unwrap()).sum();
        assert!(f32_approx_equal(total, 6.0, 1e-4));
        assert!(uuids.iter().all(|u| ctx.primitive_type(*u).unwrap() == PrimitiveType::Patch));
        assert_eq!(ctx.primitive_color(uuids[0]).unwrap(), green());
    }

    #[test]
    fn sphere_triangle_count_and_outward_normals() {
        let mut ctx = Context::new();
        let center = Vec3::new(1.0, 2.0, 3.0);
        let uuids = ctx.add_sphere(6, center, 0.5, green()).unwrap();
        assert_eq!(uuids.len(), 2 * 6 * 5);
        for uuid in &uuids {
            let p = ctx.primitive(*uuid).unwrap();
            assert!(p.normal().dot(&(p.centroid() - center)) > 0.0);
        }
    }

    #[test]
    fn tube_triangle_count_and_outward_normals() {
        let mut ctx = Context::new();
        let nodes = [Vec3::zeros(), Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.5, 0.0, 2.0)];
        let uuids = ctx
            .add_tube(8, &nodes, &[0.2, 0.15, 0.1], &[green()])
            .unwrap();
        assert_eq!(uuids.len(), 2 * 8 * 2);
        let p = ctx.primitive(uuids[0]).unwrap();
        assert!(p.normal().dot(&(p.centroid() - Vec3::new(0.0, 0.0, 0.5))) > 0.0);
    }

    #[test]
    fn oversized_compounds_fail_to_allocate_without_touching_the_context() {
        let mut ctx = Context::new();
        let tile = ctx.add_tile(
            Vec3::zeros(),
            Vec2::new(1.0, 1.0),
            SphericalCoord::default(),
            (u32::MAX, u32::MAX),
            green(),
        );
        assert!(matches!(tile, Err(ContextError::Allocation(_))));
        let sphere = ctx.add_sphere(u32::MAX, Vec3::zeros(), 1.0, green());
        assert!(matches!(sphere, Err(ContextError::Allocation(usize::MAX))));
        let boxed = ctx.add_box(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), (u32::MAX, u32::MAX, 2), green());
        assert!(matches!(boxed, Err(ContextError::Allocation(_))));
        assert_eq!(ctx.primitive_count(), 0);
    }

    #[test]
    fn tube_rejects_mismatched_lengths() {
        let mut ctx = Context::new();
        let result = ctx.add_tube(8, &[Vec3::zeros(), Vec3::z()], &[0.1], &[green()]);
        assert!(matches!(result, Err(ContextError::InvalidArgument(_))));
        assert_eq!(ctx.primitive_count(), 0);
    }

    #[test]
    fn box_patch_count_area_and_outward_faces() {
        let mut ctx = Context::new();
        let center = Vec3::new(0.0, 0.0, 1.0);
        let uuids = ctx
            .add_box(center, Vec3::new(1.0, 2.0, 3.0), (1, 2, 3), green())
            .unwrap();
        assert_eq!(uuids.len(), 2 * (2 + 6 + 3));
        let total: f32 = uuids.iter().map(|u| ctx.primitive_area(*u).unwrap()).sum();
        assert!(f32_approx_equal(total, 22.0, 1e-3));
        for uuid in &uuids {
            let p = ctx.primitive(*uuid).unwrap();
            assert!(p.normal().dot(&(p.centroid() - center)) > 0.0);
        }
    }

    #[test]
    fn disk_and_cone_counts() {
        let mut ctx = Context::new();
        let disk = ctx
            .add_disk(Vec3::zeros(), Vec2::new(1.0, 1.0), SphericalCoord::default(), 32, green())
            .unwrap();
        assert_eq!(disk.len(), 32);
        let area: f32 = disk.iter().map(|u| ctx.primitive_area(*u).unwrap()).sum();
        assert!(f32_approx_equal(area, PI, 0.03));
        let cone = ctx
            .add_cone(10, Vec3::zeros(), Vec3::z(), (0.5, 0.0), green())
            .unwrap();
        assert_eq!(cone.len(), 20);
    }

    #[test]
    fn objects_own_their_primitives() {
        let mut ctx = Context::new();
        let id = ctx
            .add_box_object(Vec3::zeros(), Vec3::repeat(1.0), (1, 1, 1), green())
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(ctx.object_type(id).unwrap(), ObjectType::Box);
        let uuids = ctx.object_primitive_uuids(id).unwrap();
        assert_eq!(uuids.len(), 6);
        assert!(uuids.iter().all(|u| ctx.primitive_parent_object(*u).unwrap() == id));
        assert!(f32_approx_equal(ctx.object_area(id).unwrap(), 6.0, 1e-4));

        let copy = ctx.copy_object(id).unwrap();
        ctx.translate_object(copy, Vec3::new(5.0, 0.0, 0.0)).unwrap();
        assert_eq!(ctx.primitive_count(), 12);

        ctx.delete_object(id).unwrap();
        assert_eq!(ctx.primitive_count(), 6);
        assert!(!ctx.does_object_exist(id));
        assert_eq!(ctx.all_object_ids(), vec![copy]);
    }

    #[test]
    fn deleting_the_last_member_removes_the_object() {
        let mut ctx = Context::new();
        let id = ctx
            .add_tile_object(Vec3::zeros(), Vec2::new(1.0, 1.0), SphericalCoord::default(), (1, 1), green())
            .unwrap();
        let uuid = ctx.object_primitive_uuids(id).unwrap()[0];
        ctx.delete_primitive(uuid).unwrap();
        assert!(!ctx.does_object_exist(id));
    }
}
