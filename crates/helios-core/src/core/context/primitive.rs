use super::ObjectId;
use super::data::DataStore;
use crate::core::geometry::{
    RgbaColor, Transform, Vec2, Vec3, transform_point, triangle_area, triangle_normal,
};

/// Kind of a primitive. Discriminants are part of the native contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PrimitiveType {
    Patch = 0,
    Triangle = 1,
    Voxel = 2,
}

const UNIT_SQUARE: [[f32; 2]; 4] = [[-0.5, -0.5], [0.5, -0.5], [0.5, 0.5], [-0.5, 0.5]];

/// Geometric definition of a primitive.
///
/// Patches and voxels are unit shapes (the square `[-0.5, 0.5]²` at `z = 0` and the
/// cube `[-0.5, 0.5]³`) mapped into the scene by an affine transform; triangles store
/// their vertices directly.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Patch { transform: Transform },
    Triangle { vertices: [Vec3; 3] },
    Voxel { transform: Transform },
}

impl Shape {
    /// Point on the surface for unit-square coordinates `(s, t)`. Triangles fold the
    /// upper half of the square back onto the triangle; voxels use their mid-plane.
    pub fn sample_point(&self, s: f32, t: f32) -> Vec3 {
        match self {
            Shape::Patch { transform } | Shape::Voxel { transform } => {
                transform_point(transform, &Vec3::new(s - 0.5, t - 0.5, 0.0))
            }
            Shape::Triangle { vertices } => {
                let (s, t) = if s + t > 1.0 { (1.0 - s, 1.0 - t) } else { (s, t) };
                vertices[0] + (vertices[1] - vertices[0]) * s + (vertices[2] - vertices[0]) * t
            }
        }
    }
}

/// A single geometric element of the scene.
#[derive(Debug, Clone)]
pub struct Primitive {
    pub(crate) shape: Shape,
    pub(crate) color: RgbaColor,
    pub(crate) parent_object: ObjectId,
    pub(crate) data: DataStore,
}

impl Primitive {
    pub fn new(shape: Shape, color: RgbaColor) -> Self {
        Self {
            shape,
            color,
            parent_object: 0,
            data: DataStore::new(),
        }
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        match self.shape {
            Shape::Patch { .. } => PrimitiveType::Patch,
            Shape::Triangle { .. } => PrimitiveType::Triangle,
            Shape::Voxel { .. } => PrimitiveType::Voxel,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn color(&self) -> RgbaColor {
        self.color
    }

    /// Identifier of the compound object owning this primitive, or 0.
    pub fn parent_object(&self) -> ObjectId {
        self.parent_object
    }

    pub fn data(&self) -> &DataStore {
        &self.data
    }

    /// Vertices in scene coordinates: 4 for a patch (counter-clockwise), 3 for a
    /// triangle, 8 for a voxel.
    pub fn vertices(&self) -> Vec<Vec3> {
        match &self.shape {
            Shape::Patch { transform } => UNIT_SQUARE
                .iter()
                .map(|[x, y]| transform_point(transform, &Vec3::new(*x, *y, 0.0)))
                .collect(),
            Shape::Triangle { vertices } => vertices.to_vec(),
            Shape::Voxel { transform } => {
                let mut out = Vec::with_capacity(8);
                for z in [-0.5, 0.5] {
                    for [x, y] in UNIT_SQUARE {
                        out.push(transform_point(transform, &Vec3::new(x, y, z)));
                    }
                }
                out
            }
        }
    }

    /// One-sided surface area (total surface area for voxels).
    pub fn area(&self) -> f32 {
        match &self.shape {
            Shape::Patch { .. } => {
                let v = self.vertices();
                (v[1] - v[0]).cross(&(v[3] - v[0])).norm()
            }
            Shape::Triangle { vertices } => triangle_area(&vertices[0], &vertices[1], &vertices[2]),
            Shape::Voxel { transform } => {
                let origin = transform_point(transform, &Vec3::zeros());
                let ex = transform_point(transform, &Vec3::x()) - origin;
                let ey = transform_point(transform, &Vec3::y()) - origin;
                let ez = transform_point(transform, &Vec3::z()) - origin;
                2.0 * (ex.cross(&ey).norm() + ey.cross(&ez).norm() + ex.cross(&ez).norm())
            }
        }
    }

    /// Unit normal of the front face. Voxels report `+z`.
    pub fn normal(&self) -> Vec3 {
        match &self.shape {
            Shape::Patch { .. } => {
                let v = self.vertices();
                triangle_normal(&v[0], &v[1], &v[2])
            }
            Shape::Triangle { vertices } => {
                triangle_normal(&vertices[0], &vertices[1], &vertices[2])
            }
            Shape::Voxel { .. } => Vec3::z(),
        }
    }

    pub fn centroid(&self) -> Vec3 {
        match &self.shape {
            Shape::Patch { transform } | Shape::Voxel { transform } => {
                transform_point(transform, &Vec3::zeros())
            }
            Shape::Triangle { vertices } => (vertices[0] + vertices[1] + vertices[2]) / 3.0,
        }
    }

    /// Edge lengths `(x, y)` of a patch; `None` for other shapes.
    pub fn patch_size(&self) -> Option<Vec2> {
        match &self.shape {
            Shape::Patch { .. } => {
                let v = self.vertices();
                Some(Vec2::new((v[1] - v[0]).norm(), (v[3] - v[0]).norm()))
            }
            _ => None,
        }
    }

    pub fn sample_point(&self, s: f32, t: f32) -> Vec3 {
        self.shape.sample_point(s, t)
    }

    /// Triangulation used for ray casting and rendering.
    pub fn triangles(&self) -> Vec<[Vec3; 3]> {
        let v = self.vertices();
        match self.shape {
            Shape::Patch { .. } => vec![[v[0], v[1], v[2]], [v[0], v[2], v[3]]],
            Shape::Triangle { .. } => vec![[v[0], v[1], v[2]]],
            Shape::Voxel { .. } => {
                const FACES: [[usize; 4]; 6] = [
                    [0, 3, 2, 1],
                    [4, 5, 6, 7],
                    [0, 1, 5, 4],
                    [1, 2, 6, 5],
                    [2, 3, 7, 6],
                    [3, 0, 4, 7],
                ];
                FACES
                    .iter()
                    .flat_map(|[a, b, c, d]| [[v[*a], v[*b], v[*c]], [v[*a], v[*c], v[*d]]])
                    .collect()
            }
        }
    }

    pub(crate) fn apply_transform(&mut self, m: &Transform) {
        match &mut self.shape {
            Shape::Patch { transform } | Shape::Voxel { transform } => {
                *transform = m * *transform;
            }
            Shape::Triangle { vertices } => {
                for v in vertices.iter_mut() {
                    *v = transform_point(m, v);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{RgbColor, SphericalCoord, patch_transform};

    fn unit_patch() -> Primitive {
        let t = patch_transform(&Vec3::zeros(), &Vec2::new(1.0, 1.0), &SphericalCoord::default());
        Primitive::new(Shape::Patch { transform: t }, RgbColor::RED.into())
    }

    #[test]
    fn unit_patch_has_unit_area_and_upward_normal() {
        let p = unit_patch();
        assert_eq!(p.primitive_type(), PrimitiveType::Patch);
        assert!((p.area() - 1.0).abs() < 1e-6);
        assert!((p.normal() - Vec3::z()).norm() < 1e-6);
        assert_eq!(p.vertices().len(), 4);
        assert_eq!(p.triangles().len(), 2);
    }

    #[test]
    fn voxel_area_is_total_surface() {
        let t = Transform::new_nonuniform_scaling(&Vec3::new(1.0, 2.0, 3.0));
        let v = Primitive::new(Shape::Voxel { transform: t }, RgbColor::RED.into());
        assert!((v.area() - 22.0).abs() < 1e-5);
        assert_eq!(v.vertices().len(), 8);
        assert_eq!(v.triangles().len(), 12);
    }

    #[test]
    fn transform_moves_triangle_vertices() {
        let mut tri = Primitive::new(
            Shape::Triangle {
                vertices: [Vec3::zeros(), Vec3::x(), Vec3::y()],
            },
            RgbColor::GREEN.into(),
        );
        tri.apply_transform(&Transform::new_translation(&Vec3::new(0.0, 0.0, 2.0)));
        assert!((tri.centroid().z - 2.0).abs() < 1e-6);
        assert!((tri.area() - 0.5).abs() < 1e-6);
        assert!(tri.patch_size().is_none());
    }

    #[test]
    fn sample_points_stay_on_the_surface() {
        let tri = Primitive::new(
            Shape::Triangle {
                vertices: [Vec3::zeros(), Vec3::x(), Vec3::y()],
            },
            RgbColor::GREEN.into(),
        );
        let p = tri.sample_point(0.9, 0.8);
        assert!(p.x + p.y <= 1.0 + 1e-6);
        let corner = unit_patch().sample_point(1.0, 1.0);
        assert!((corner - Vec3::new(0.5, 0.5, 0.0)).norm() < 1e-6);
    }
}
