//! Model and data exchange with files.
//!
//! Geometry is exchanged through an intermediate polygon [`Mesh`]: the context
//! exports its primitives as polygons (patches as quads, voxels as six quads,
//! triangles as triangles) and imports polygons as triangles, fan-triangulating
//! any face with more than three vertices. The [`MeshFormat`] trait is implemented
//! for ASCII Wavefront OBJ ([`obj::ObjFile`]) and ASCII PLY ([`ply::PlyFile`]).
//! Tabular weather records are loaded into context timeseries by [`timeseries`].

pub mod obj;
pub mod ply;
pub mod timeseries;
pub mod traits;

use crate::core::context::{Context, ContextError, Uuid};
use crate::core::geometry::{
    BoundingBox, RgbColor, RgbaColor, SphericalCoord, Transform, Vec3, orientation_from_spherical,
    transform_point,
};
use std::io;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

pub use traits::MeshFormat;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// A polygon with optional face color.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFace {
    pub indices: Vec<usize>,
    pub color: Option<RgbColor>,
}

/// Indexed polygon mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub vertex_colors: Vec<Option<RgbColor>>,
    pub faces: Vec<MeshFace>,
}

impl Mesh {
    /// Appends a polygon given by its corner positions, all sharing `color`.
    pub fn push_polygon(&mut self, corners: &[Vec3], color: RgbColor) {
        let start = self.vertices.len();
        self.vertices.extend_from_slice(corners);
        self.vertex_colors
            .extend(std::iter::repeat_n(Some(color), corners.len()));
        self.faces.push(MeshFace {
            indices: (start..start + corners.len()).collect(),
            color: Some(color),
        });
    }

    /// Number of triangles produced by fan triangulation.
    pub fn triangle_count(&self) -> usize {
        self.faces
            .iter()
            .map(|f| f.indices.len().saturating_sub(2))
            .sum()
    }
}

/// Vertical axis convention of a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpAxis {
    YUp,
    #[default]
    ZUp,
}

impl FromStr for UpAxis {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YUP" => Ok(UpAxis::YUp),
            "ZUP" => Ok(UpAxis::ZUp),
            other => Err(ContextError::invalid(format!(
                "up axis must be 'YUP' or 'ZUP', got '{other}'"
            ))),
        }
    }
}

/// Placement applied to loaded geometry: the model is converted to z-up, scaled
/// uniformly so its height equals `height` (unless `height` is zero), rotated and
/// then translated to `origin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    pub origin: Vec3,
    pub height: f32,
    pub rotation: SphericalCoord,
    pub color: RgbColor,
    pub up_axis: UpAxis,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            origin: Vec3::zeros(),
            height: 0.0,
            rotation: SphericalCoord::default(),
            color: RgbColor::GREEN,
            up_axis: UpAxis::ZUp,
        }
    }
}

impl LoadOptions {
    fn transform_for(&self, vertices: &[Vec3]) -> Transform {
        #[rustfmt::skip]
        let y_up = Transform::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, -1.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let up = match self.up_axis {
            UpAxis::ZUp => Transform::identity(),
            UpAxis::YUp => y_up,
        };
        let upright: Vec<Vec3> = vertices.iter().map(|v| transform_point(&up, v)).collect();
        let height = BoundingBox::from_points(upright.iter()).extent().z;
        let scale = if self.height > 0.0 && height > 0.0 {
            self.height / height
        } else {
            1.0
        };
        Transform::new_translation(&self.origin)
            * orientation_from_spherical(&self.rotation)
            * Transform::new_scaling(scale)
            * up
    }
}

fn file_error(path: &Path, error: MeshError) -> ContextError {
    let path = path.display().to_string();
    match error {
        MeshError::Io(source) => ContextError::Io { path, source },
        MeshError::Parse { line, message } => ContextError::Parse {
            path,
            line,
            message,
        },
    }
}

impl Context {
    /// Collects primitives (all of them when `uuids` is `None`) into a polygon mesh.
    pub fn export_mesh(&self, uuids: Option<&[Uuid]>) -> Result<Mesh, ContextError> {
        let selected = match uuids {
            Some(uuids) => {
                self.validate_uuids(uuids)?;
                uuids.to_vec()
            }
            None => self.all_uuids(),
        };
        let mut mesh = Mesh::default();
        for uuid in selected {
            let primitive = self.primitive(uuid)?;
            let color = primitive.color().rgb();
            let v = primitive.vertices();
            match v.len() {
                8 => {
                    for face in [[0, 3, 2, 1], [4, 5, 6, 7], [0, 1, 5, 4], [1, 2, 6, 5], [2, 3, 7, 6], [3, 0, 4, 7]] {
                        let corners: Vec<Vec3> = face.iter().map(|i| v[*i]).collect();
                        mesh.push_polygon(&corners, color);
                    }
                }
                _ => mesh.push_polygon(&v, color),
            }
        }
        Ok(mesh)
    }

    /// Adds the triangles of `mesh` to the context as one polymesh object.
    pub fn import_mesh(&mut self, mesh: &Mesh, options: &LoadOptions) -> Result<Vec<Uuid>, ContextError> {
        let transform = options.transform_for(&mesh.vertices);
        let placed: Vec<Vec3> = mesh
            .vertices
            .iter()
            .map(|v| transform_point(&transform, v))
            .collect();
        let mut uuids = Vec::with_capacity(mesh.triangle_count());
        for face in &mesh.faces {
            if let Some(bad) = face.indices.iter().find(|i| **i >= placed.len()) {
                return Err(ContextError::invalid(format!(
                    "face references vertex {bad} but the mesh has {} vertices",
                    placed.len()
                )));
            }
            let color: RgbaColor = face
                .color
                .or_else(|| face.indices.first().and_then(|i| mesh.vertex_colors.get(*i).copied().flatten()))
                .unwrap_or(options.color)
                .into();
            for k in 1..face.indices.len().saturating_sub(1) {
                let (a, b, c) = (face.indices[0], face.indices[k], face.indices[k + 1]);
                uuids.push(self.add_triangle(placed[a], placed[b], placed[c], color)?);
            }
        }
        if !uuids.is_empty() {
            self.add_polymesh_object(&uuids)?;
        }
        Ok(uuids)
    }

    pub fn write_obj(&self, path: impl AsRef<Path>, uuids: Option<&[Uuid]>) -> Result<(), ContextError> {
        let path = path.as_ref();
        let mesh = self.export_mesh(uuids)?;
        obj::ObjFile::write_to_path(&mesh, path).map_err(|e| file_error(path, e))?;
        info!(path = %path.display(), faces = mesh.faces.len(), "Wrote OBJ model.");
        Ok(())
    }

    pub fn load_obj(&mut self, path: impl AsRef<Path>, options: &LoadOptions) -> Result<Vec<Uuid>, ContextError> {
        let path = path.as_ref();
        let mesh = obj::ObjFile::read_from_path(path).map_err(|e| file_error(path, e))?;
        let uuids = self.import_mesh(&mesh, options)?;
        info!(path = %path.display(), primitives = uuids.len(), "Loaded OBJ model.");
        Ok(uuids)
    }

    pub fn write_ply(&self, path: impl AsRef<Path>, uuids: Option<&[Uuid]>) -> Result<(), ContextError> {
        let path = path.as_ref();
        let mesh = self.export_mesh(uuids)?;
        ply::PlyFile::write_to_path(&mesh, path).map_err(|e| file_error(path, e))?;
        info!(path = %path.display(), faces = mesh.faces.len(), "Wrote PLY model.");
        Ok(())
    }

    pub fn load_ply(&mut self, path: impl AsRef<Path>, options: &LoadOptions) -> Result<Vec<Uuid>, ContextError> {
        let path = path.as_ref();
        let mesh = ply::PlyFile::read_from_path(path).map_err(|e| file_error(path, e))?;
        let uuids = self.import_mesh(&mesh, options)?;
        info!(path = %path.display(), primitives = uuids.len(), "Loaded PLY model.");
        Ok(uuids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::ObjectType;
    use crate::core::geometry::Vec2;
    use tempfile::tempdir;

    fn scene() -> Context {
        let mut ctx = Context::new();
        ctx.add_patch(Vec3::zeros(), Vec2::new(1.0, 1.0), SphericalCoord::default(), RgbColor::RED.into())
            .unwrap();
        ctx.add_triangle(Vec3::zeros(), Vec3::x(), Vec3::z(), RgbColor::BLUE.into())
            .unwrap();
        ctx
    }

    #[test]
    fn obj_round_trip_preserves_triangle_count_and_colors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scene.obj");
        let source = scene();
        source.write_obj(&path, None).unwrap();

        let mut target = Context::new();
        let uuids = target.load_obj(&path, &LoadOptions::default()).unwrap();
        assert_eq!(uuids.len(), 3);
        assert_eq!(target.primitive_color(uuids[0]).unwrap().rgb(), RgbColor::RED);
        assert_eq!(target.primitive_color(uuids[2]).unwrap().rgb(), RgbColor::BLUE);
        let object = target.primitive_parent_object(uuids[0]).unwrap();
        assert_eq!(target.object_type(object).unwrap(), ObjectType::Polymesh);
    }

    #[test]
    fn ply_round_trip_preserves_area() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scene.ply");
        scene().write_ply(&path, None).unwrap();
        let mut target = Context::new();
        let uuids = target.load_ply(&path, &LoadOptions::default()).unwrap();
        let area: f32 = uuids.iter().map(|u| target.primitive_area(*u).unwrap()).sum();
        assert!((area - 1.5).abs() < 1e-4);
    }

    #[test]
    fn load_options_scale_rotate_and_translate() {
        let mut mesh = Mesh::default();
        mesh.push_polygon(&[Vec3::zeros(), Vec3::x(), Vec3::new(0.0, 2.0, 0.0)], RgbColor::WHITE);
        let options = LoadOptions {
            origin: Vec3::new(0.0, 0.0, 1.0),
            height: 1.0,
            up_axis: UpAxis::YUp,
            ..LoadOptions::default()
        };
        let mut ctx = Context::new();
        let uuids = ctx.import_mesh(&mesh, &options).unwrap();
        let vertices = ctx.primitive_vertices(uuids[0]).unwrap();
        assert!((vertices[2] - Vec3::new(0.0, 0.0, 2.0)).norm() < 1e-5);
        assert!((vertices[1] - Vec3::new(0.5, 0.0, 1.0)).norm() < 1e-5);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut ctx = Context::new();
        let result = ctx.load_obj("/nonexistent/model.obj", &LoadOptions::default());
        assert!(matches!(result, Err(ContextError::Io { .. })));
    }

    #[test]
    fn up_axis_parses_keywords() {
        assert_eq!("yup".parse::<UpAxis>().unwrap(), UpAxis::YUp);
        assert!("XUP".parse::<UpAxis>().is_err());
    }
}
