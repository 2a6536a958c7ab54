use crate::core::context::Uuid;
use crate::core::geometry::raytrace::{Bvh, Ray, SceneTriangle};
use super::{Result, VisualizerError};
use crate::core::geometry::{BoundingBox, RgbColor, Vec3};
use nalgebra::{Matrix4, Perspective3, Point3, Vector4};
use rayon::prelude::*;

const AMBIENT: f32 = 0.35;
const DIFFUSE: f32 = 0.65;
const SHADOW_OFFSET: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightingModel {
    /// Primitive colors unshaded.
    #[default]
    None,
    /// Ambient plus two-sided diffuse shading.
    Phong,
    /// As `Phong`, with cast shadows toward the light.
    PhongShadowed,
}

impl LightingModel {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(LightingModel::None),
            1 => Some(LightingModel::Phong),
            2 => Some(LightingModel::PhongShadowed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DrawTriangle {
    pub vertices: [Vec3; 3],
    pub normal: Vec3,
    pub color: RgbColor,
    pub uuid: Uuid,
}

/// `len` copies of `value`; a failed reservation is an error rather than an abort.
pub(crate) fn filled<T: Clone>(value: T, len: usize) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| VisualizerError::Allocation(len))?;
    buffer.resize(len, value);
    Ok(buffer)
}

pub(crate) fn scene_bounds(triangles: &[DrawTriangle]) -> BoundingBox {
    BoundingBox::from_points(triangles.iter().flat_map(|t| t.vertices.iter()))
}

/// Perspective camera for a framebuffer of `width × height` pixels.
pub(crate) struct Camera {
    eye: Vec3,
    view_projection: Matrix4<f32>,
    inverse: Matrix4<f32>,
    width: u32,
    height: u32,
}

impl Camera {
    pub fn new(eye: Vec3, target: Vec3, fov_degrees: f32, width: u32, height: u32, scene: &BoundingBox) -> Self {
        let forward = target - eye;
        let up = if forward.cross(&Vec3::z()).norm() <= 1e-6 * forward.norm() {
            Vec3::y()
        } else {
            Vec3::z()
        };
        let view = Matrix4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up);
        let (near, far) = clip_planes(&eye, scene);
        let projection = Perspective3::new(width as f32 / height as f32, fov_degrees.to_radians(), near, far);
        let view_projection = projection.to_homogeneous() * view;
        Self {
            eye,
            view_projection,
            inverse: view_projection.try_inverse().unwrap_or_else(Matrix4::identity),
            width,
            height,
        }
    }

    /// Screen position (pixels, y down) and NDC depth of a world point in front of the camera.
    pub fn project(&self, p: &Vec3) -> Option<(f32, f32, f32)> {
        let clip = self.view_projection * Vector4::new(p.x, p.y, p.z, 1.0);
        if clip.w <= 1e-6 {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        Some((
            (ndc.x + 1.0) * 0.5 * self.width as f32,
            (1.0 - ndc.y) * 0.5 * self.height as f32,
            ndc.z,
        ))
    }

    fn unproject(&self, x: f32, y: f32, z: f32) -> Vec3 {
        let p = self.inverse * Vector4::new(x, y, z, 1.0);
        p.xyz() / p.w
    }

    /// Ray from the eye through the centre of pixel `(px, py)`.
    fn pixel_ray(&self, px: usize, py: usize) -> Ray {
        let x = 2.0 * (px as f32 + 0.5) / self.width as f32 - 1.0;
        let y = 1.0 - 2.0 * (py as f32 + 0.5) / self.height as f32;
        let far = self.unproject(x, y, 1.0);
        Ray::new(self.eye, far - self.eye)
    }
}

fn clip_planes(eye: &Vec3, scene: &BoundingBox) -> (f32, f32) {
    if scene.is_empty() {
        return (0.01, 1000.0);
    }
    let radius = 0.5 * scene.extent().norm();
    let far = (scene.center() - eye).norm() + radius + 1.0;
    (far * 1e-5, far)
}

fn edge(a: (f32, f32, f32), b: (f32, f32, f32), x: f32, y: f32) -> f32 {
    (b.0 - a.0) * (y - a.1) - (b.1 - a.1) * (x - a.0)
}

/// Z-buffered visibility: the index of the nearest triangle covering each pixel centre.
pub(crate) fn rasterize(camera: &Camera, triangles: &[DrawTriangle]) -> Result<Vec<Option<usize>>> {
    let (w, h) = (camera.width as usize, camera.height as usize);
    let samples = w.checked_mul(h).ok_or(VisualizerError::Allocation(usize::MAX))?;
    let mut depth = filled(f32::INFINITY, samples)?;
    let mut visible = filled(None, samples)?;
    for (index, triangle) in triangles.iter().enumerate() {
        let projected: Option<Vec<_>> = triangle.vertices.iter().map(|v| camera.project(v)).collect();
        let Some(p) = projected else {
            continue;
        };
        let area = edge(p[0], p[1], p[2].0, p[2].1);
        if area.abs() < 1e-12 {
            continue;
        }
        let xs = p.iter().map(|q| q.0);
        let ys = p.iter().map(|q| q.1);
        let min_x = xs.clone().fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
        let max_x = xs.fold(f32::NEG_INFINITY, f32::max).ceil().min(w as f32) as usize;
        let min_y = ys.clone().fold(f32::INFINITY, f32::min).floor().max(0.0) as usize;
        let max_y = ys.fold(f32::NEG_INFINITY, f32::max).ceil().min(h as f32) as usize;
        for y in min_y..max_y {
            for x in min_x..max_x {
                let (sx, sy) = (x as f32 + 0.5, y as f32 + 0.5);
                let b0 = edge(p[1], p[2], sx, sy) / area;
                let b1 = edge(p[2], p[0], sx, sy) / area;
                let b2 = 1.0 - b0 - b1;
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }
                let z = b0 * p[0].2 + b1 * p[1].2 + b2 * p[2].2;
                let i = y * w + x;
                if (-1.0..=1.0).contains(&z) && z < depth[i] {
                    depth[i] = z;
                    visible[i] = Some(index);
                }
            }
        }
    }
    Ok(visible)
}

pub(crate) struct Lighting<'a> {
    pub model: LightingModel,
    /// Unit vector pointing toward the light.
    pub direction: Vec3,
    pub background: RgbColor,
    pub shadows: Option<&'a Bvh>,
}

pub(crate) fn shadow_bvh(triangles: &[DrawTriangle]) -> Bvh {
    Bvh::build(
        triangles
            .iter()
            .map(|t| SceneTriangle::new(t.vertices, t.uuid))
            .collect(),
    )
}

fn surface_point(ray: &Ray, triangle: &DrawTriangle) -> Vec3 {
    let denom = ray.direction.dot(&triangle.normal);
    if denom.abs() < 1e-9 {
        return (triangle.vertices[0] + triangle.vertices[1] + triangle.vertices[2]) / 3.0;
    }
    let t = (triangle.vertices[0] - ray.origin).dot(&triangle.normal) / denom;
    ray.at(t)
}

/// Colors every pixel of a visibility buffer.
pub(crate) fn shade(
    camera: &Camera,
    triangles: &[DrawTriangle],
    visible: &[Option<usize>],
    lighting: &Lighting,
) -> Result<Vec<RgbColor>> {
    let width = camera.width as usize;
    let mut colors = Vec::new();
    colors
        .try_reserve_exact(visible.len())
        .map_err(|_| VisualizerError::Allocation(visible.len()))?;
    colors.par_extend(visible.par_iter()
        .enumerate()
        .map(|(i, hit)| {
            let Some(triangle) = hit.map(|t| &triangles[t]) else {
                return lighting.background;
            };
            let cosine = triangle.normal.dot(&lighting.direction).abs();
            let lit = triangle.color.scaled(AMBIENT + DIFFUSE * cosine);
            match (lighting.model, lighting.shadows) {
                (LightingModel::None, _) => triangle.color,
                (LightingModel::PhongShadowed, Some(bvh)) => {
                    let point = surface_point(&camera.pixel_ray(i % width, i / width), triangle);
                    let side = if triangle.normal.dot(&lighting.direction) >= 0.0 {
                        triangle.normal
                    } else {
                        -triangle.normal
                    };
                    let origin = point + side * SHADOW_OFFSET;
                    if bvh.is_occluded(&Ray::new(origin, lighting.direction), f32::MAX, Some(triangle.uuid)) {
                        triangle.color.scaled(AMBIENT)
                    } else {
                        lit
                    }
                }
                _ => lit,
            }
        }));
    Ok(colors)
}

/// Box-filters a supersampled image down by `factor` and packs it as RGB bytes.
pub(crate) fn downsample(colors: &[RgbColor], width: usize, height: usize, factor: usize) -> Result<Vec<u8>> {
    let hi_width = width * factor;
    let weight = 1.0 / (factor * factor) as f32;
    let bytes = width * height * 3;
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(bytes)
        .map_err(|_| VisualizerError::Allocation(bytes))?;
    for y in 0..height {
        for x in 0..width {
            let mut sum = [0.0f32; 3];
            for sy in 0..factor {
                for sx in 0..factor {
                    let c = colors[(y * factor + sy) * hi_width + x * factor + sx];
                    sum[0] += c.r;
                    sum[1] += c.g;
                    sum[2] += c.b;
                }
            }
            pixels.extend(sum.iter().map(|s| (s * weight * 255.0).round().clamp(0.0, 255.0) as u8));
        }
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(z: f32, half: f32, color: RgbColor, uuid: Uuid) -> Vec<DrawTriangle> {
        let v = [
            Vec3::new(-half, -half, z),
            Vec3::new(half, -half, z),
            Vec3::new(half, half, z),
            Vec3::new(-half, half, z),
        ];
        [[v[0], v[1], v[2]], [v[0], v[2], v[3]]]
            .into_iter()
            .map(|vertices| DrawTriangle {
                vertices,
                normal: Vec3::z(),
                color,
                uuid,
            })
            .collect()
    }

    fn top_camera(triangles: &[DrawTriangle], size: u32) -> Camera {
        Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), 60.0, size, size, &scene_bounds(triangles))
    }

    #[test]
    fn nearer_triangles_win_the_depth_test() {
        let mut triangles = square(0.0, 1.0, RgbColor::RED, 0);
        triangles.extend(square(1.0, 0.2, RgbColor::BLUE, 1));
        let camera = top_camera(&triangles, 32);
        let visible = rasterize(&camera, &triangles).unwrap();
        let centre = visible[16 * 32 + 16].unwrap();
        assert_eq!(triangles[centre].uuid, 1);
        let corner = visible[0];
        assert!(corner.is_none());
    }

    #[test]
    fn projection_maps_world_x_to_screen_right() {
        let triangles = square(0.0, 1.0, RgbColor::RED, 0);
        let camera = top_camera(&triangles, 64);
        let (cx, cy, _) = camera.project(&Vec3::zeros()).unwrap();
        assert!((cx - 32.0).abs() < 1e-3 && (cy - 32.0).abs() < 1e-3);
        let (rx, _, _) = camera.project(&Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(rx > cx);
        assert!(camera.project(&Vec3::new(0.0, 0.0, 10.0)).is_none());
    }

    #[test]
    fn downsampling_averages_blocks() {
        let colors = vec![RgbColor::WHITE, RgbColor::BLACK, RgbColor::BLACK, RgbColor::WHITE];
        assert_eq!(downsample(&colors, 1, 1, 2).unwrap(), vec![128, 128, 128]);
    }
}
