//! Geometric value types shared by the context and the plugin models.
//!
//! All geometry is single precision, matching the precision of the primitive
//! vertex data exchanged across the native boundary.

pub mod color;
pub mod raytrace;
pub mod spherical;

use nalgebra::{Matrix4, Point3, Unit, Vector2, Vector3, Vector4};
use std::f32::consts::PI;
use std::str::FromStr;
use thiserror::Error;

pub use color::{RgbColor, RgbaColor};
pub use spherical::SphericalCoord;

pub type Vec2 = Vector2<f32>;
pub type Vec3 = Vector3<f32>;
pub type Vec4 = Vector4<f32>;
pub type Int2 = Vector2<i32>;
pub type Int3 = Vector3<i32>;
pub type Int4 = Vector4<i32>;

/// Homogeneous 4x4 affine transform.
pub type Transform = Matrix4<f32>;

/// A principal rotation axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit_vector(self) -> Vec3 {
        match self {
            Axis::X => Vec3::x(),
            Axis::Y => Vec3::y(),
            Axis::Z => Vec3::z(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid rotation axis '{0}'; expected one of 'x', 'y', or 'z'")]
pub struct AxisParseError(pub String);

impl FromStr for Axis {
    type Err = AxisParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            other => Err(AxisParseError(other.to_string())),
        }
    }
}

/// Applies an affine transform to a point.
pub fn transform_point(m: &Transform, p: &Vec3) -> Vec3 {
    m.transform_point(&Point3::from(*p)).coords
}

/// Rotation of `angle` radians about an arbitrary axis through the origin.
pub fn rotation_about_axis(axis: &Vec3, angle: f32) -> Transform {
    match Unit::try_new(*axis, 1e-12) {
        Some(unit) => Matrix4::from_axis_angle(&unit, angle),
        None => Transform::identity(),
    }
}

/// Rotation of `angle` radians about one of the principal axes.
pub fn rotation_about(axis: Axis, angle: f32) -> Transform {
    rotation_about_axis(&axis.unit_vector(), angle)
}

/// Orientation transform applied to planar shapes from a spherical rotation:
/// tilt about x by the elevation, then spin about z by the azimuth.
pub fn orientation_from_spherical(rotation: &SphericalCoord) -> Transform {
    let mut m = Transform::identity();
    if rotation.elevation != 0.0 {
        m = rotation_about(Axis::X, -rotation.elevation) * m;
    }
    if rotation.azimuth != 0.0 {
        m = rotation_about(Axis::Z, -rotation.azimuth) * m;
    }
    m
}

/// Full transform mapping the unit square `[-0.5, 0.5]²` onto a patch.
pub fn patch_transform(center: &Vec3, size: &Vec2, rotation: &SphericalCoord) -> Transform {
    Transform::new_translation(center)
        * orientation_from_spherical(rotation)
        * Transform::new_nonuniform_scaling(&Vec3::new(size.x, size.y, 1.0))
}

/// Returns two unit vectors completing `normal` to a right-handed orthonormal basis.
pub fn orthonormal_basis(normal: &Vec3) -> (Vec3, Vec3) {
    let n = normal.try_normalize(1e-12).unwrap_or_else(Vec3::z);
    let helper = if n.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    let u = (helper - n * n.dot(&helper)).normalize();
    let v = n.cross(&u);
    (u, v)
}

pub fn triangle_area(v0: &Vec3, v1: &Vec3, v2: &Vec3) -> f32 {
    0.5 * (v1 - v0).cross(&(v2 - v0)).norm()
}

/// Unit normal following the counter-clockwise winding `v0 -> v1 -> v2`.
/// Degenerate triangles report `+z`.
pub fn triangle_normal(v0: &Vec3, v1: &Vec3, v2: &Vec3) -> Vec3 {
    (v1 - v0)
        .cross(&(v2 - v0))
        .try_normalize(1e-12)
        .unwrap_or_else(Vec3::z)
}

/// Wraps an angle in radians to `[0, 2π)`.
pub fn wrap_two_pi(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    if wrapped >= 2.0 * PI { 0.0 } else { wrapped }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.include(p);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn include(&mut self, p: &Vec3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::zeros()
        } else {
            self.max - self.min
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Index (0, 1, 2) of the longest axis.
    pub fn longest_axis(&self) -> usize {
        self.extent().imax()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn vec_approx_equal(a: &Vec3, b: &Vec3) -> bool {
        (a - b).norm() < 1e-5
    }

    #[test]
    fn axis_parses_case_insensitively_and_rejects_other_strings() {
        assert_eq!("x".parse::<Axis>().unwrap(), Axis::X);
        assert_eq!("Z".parse::<Axis>().unwrap(), Axis::Z);
        assert!("w".parse::<Axis>().is_err());
    }

    #[test]
    fn patch_transform_without_rotation_scales_and_translates() {
        let m = patch_transform(
            &Vec3::new(1.0, 2.0, 3.0),
            &Vec2::new(2.0, 4.0),
            &SphericalCoord::default(),
        );
        let corner = transform_point(&m, &Vec3::new(0.5, 0.5, 0.0));
        assert!(vec_approx_equal(&corner, &Vec3::new(2.0, 4.0, 3.0)));
    }

    #[test]
    fn rotation_about_z_maps_x_to_y() {
        let m = rotation_about(Axis::Z, FRAC_PI_2);
        let p = transform_point(&m, &Vec3::x());
        assert!(vec_approx_equal(&p, &Vec3::y()));
    }

    #[test]
    fn orthonormal_basis_is_orthogonal() {
        let n = Vec3::new(0.3, -0.2, 0.9).normalize();
        let (u, v) = orthonormal_basis(&n);
        assert!(u.dot(&n).abs() < 1e-6);
        assert!(v.dot(&n).abs() < 1e-6);
        assert!(u.dot(&v).abs() < 1e-6);
        assert!((u.cross(&v) - n).norm() < 1e-5);
    }

    #[test]
    fn bounding_box_accumulates_points() {
        let points = [Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, -2.0, 0.0)];
        let bb = BoundingBox::from_points(points.iter());
        assert_eq!(bb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(bb.max, Vec3::new(3.0, 0.0, 2.0));
        assert_eq!(bb.longest_axis(), 0);
        assert!(BoundingBox::empty().is_empty());
    }

    #[test]
    fn triangle_area_and_normal_follow_winding() {
        let (a, b, c) = (Vec3::zeros(), Vec3::x(), Vec3::y());
        assert!((triangle_area(&a, &b, &c) - 0.5).abs() < 1e-6);
        assert!(vec_approx_equal(&triangle_normal(&a, &b, &c), &Vec3::z()));
        assert!(vec_approx_equal(&triangle_normal(&a, &c, &b), &-Vec3::z()));
    }
}
