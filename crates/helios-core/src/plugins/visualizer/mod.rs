//! # Visualizer
//!
//! Headless software renderer for context geometry. Primitives are triangulated
//! and drawn with a z-buffer rasterizer into an off-screen framebuffer, optionally
//! supersampled for antialiasing, shaded with a diffuse light and ray-cast shadows,
//! and written to image files through the `image` crate.
//!
//! There is no window system: requesting a non-headless visualizer fails with
//! [`VisualizerError::NoDisplay`].

mod colormap;
mod render;

pub use colormap::{COLORMAP_NAMES, Colormap};
pub use render::LightingModel;

use crate::core::context::{Context, ContextError, Uuid};
use crate::core::geometry::{RgbColor, SphericalCoord, Vec3, triangle_normal};
use render::{Camera, DrawTriangle, Lighting};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

const DEFAULT_FIELD_OF_VIEW: f32 = 45.0;

#[derive(Debug, Error)]
pub enum VisualizerError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid visualizer parameter: {0}")]
    InvalidParameter(String),
    #[error("No display device is available; only headless visualizers can be created")]
    NoDisplay,
    #[error("Unknown colormap '{0}'")]
    UnknownColormap(String),
    #[error("Image writing error for '{path}': {source}")]
    Image {
        path: String,
        source: image::ImageError,
    },
    #[error("Unable to allocate render buffers for {0} samples")]
    Allocation(usize),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, VisualizerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualizerConfig {
    pub width: u32,
    pub height: u32,
    /// Samples per pixel; values above 1 supersample on a square grid.
    pub antialiasing_samples: u32,
    pub headless: bool,
}

impl VisualizerConfig {
    fn supersampling_factor(&self) -> u32 {
        (self.antialiasing_samples.max(1) as f32).sqrt().ceil() as u32
    }

    /// Supersampled render size and its sample count, if representable.
    fn render_size(&self) -> Option<(u32, u32, usize)> {
        let factor = self.supersampling_factor();
        let width = self.width.checked_mul(factor)?;
        let height = self.height.checked_mul(factor)?;
        let samples = (width as usize).checked_mul(height as usize)?;
        Some((width, height, samples))
    }
}

#[derive(Debug, Default)]
pub struct VisualizerConfigBuilder {
    width: Option<u32>,
    height: Option<u32>,
    antialiasing_samples: Option<u32>,
    headless: Option<bool>,
}

impl VisualizerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }
    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }
    pub fn antialiasing_samples(mut self, samples: u32) -> Self {
        self.antialiasing_samples = Some(samples);
        self
    }
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    pub fn build(self) -> Result<VisualizerConfig> {
        let width = self.width.ok_or(VisualizerError::MissingParameter("width"))?;
        let height = self.height.ok_or(VisualizerError::MissingParameter("height"))?;
        if width == 0 || height == 0 {
            return Err(VisualizerError::InvalidParameter(format!(
                "window size {width}x{height} must be positive"
            )));
        }
        let config = VisualizerConfig {
            width,
            height,
            antialiasing_samples: self.antialiasing_samples.unwrap_or(1),
            headless: self.headless.unwrap_or(true),
        };
        config.render_size().ok_or(VisualizerError::Allocation(usize::MAX))?;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
struct DataColoring {
    label: String,
    uuids: Option<HashSet<Uuid>>,
}

#[derive(Debug)]
pub struct Visualizer {
    config: VisualizerConfig,
    camera: Option<(Vec3, Vec3)>,
    field_of_view: f32,
    background: RgbColor,
    light_direction: Vec3,
    lighting: LightingModel,
    colormap: Colormap,
    colorbar_range: Option<(f32, f32)>,
    coloring: Option<DataColoring>,
    triangles: Vec<DrawTriangle>,
    framebuffer: Vec<u8>,
}

impl Visualizer {
    pub fn new(config: VisualizerConfig) -> Result<Self> {
        if !config.headless {
            return Err(VisualizerError::NoDisplay);
        }
        let background = RgbColor::WHITE;
        let mut visualizer = Self {
            config,
            camera: None,
            field_of_view: DEFAULT_FIELD_OF_VIEW,
            background,
            light_direction: Vec3::new(1.0, 1.0, 1.0).normalize(),
            lighting: LightingModel::default(),
            colormap: Colormap::default(),
            colorbar_range: None,
            coloring: None,
            triangles: Vec::new(),
            framebuffer: Vec::new(),
        };
        visualizer.clear_framebuffer()?;
        Ok(visualizer)
    }

    fn clear_framebuffer(&mut self) -> Result<()> {
        let background = self.background.to_array().map(|c| (c * 255.0).round() as u8);
        let pixels = (self.config.width as usize).checked_mul(self.config.height as usize);
        let bytes = pixels.and_then(|p| p.checked_mul(3)).ok_or(VisualizerError::Allocation(usize::MAX))?;
        let mut framebuffer = render::filled(0u8, bytes)?;
        framebuffer
            .chunks_exact_mut(3)
            .for_each(|pixel| pixel.copy_from_slice(&background));
        self.framebuffer = framebuffer;
        Ok(())
    }

    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    pub fn framebuffer_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn set_camera_position(&mut self, position: Vec3, look_at: Vec3) -> Result<()> {
        if (position - look_at).norm() < 1e-6 {
            return Err(VisualizerError::InvalidParameter(
                "camera position and look-at point coincide".to_string(),
            ));
        }
        self.camera = Some((position, look_at));
        Ok(())
    }

    /// Places the camera at `look_at` offset by the spherical coordinate `position`.
    pub fn set_camera_position_spherical(&mut self, position: SphericalCoord, look_at: Vec3) -> Result<()> {
        self.set_camera_position(look_at + position.to_cartesian(), look_at)
    }

    pub fn set_camera_field_of_view(&mut self, degrees: f32) -> Result<()> {
        if !(degrees > 0.0 && degrees < 180.0) {
            return Err(VisualizerError::InvalidParameter(format!(
                "field of view {degrees} must be in (0, 180) degrees"
            )));
        }
        self.field_of_view = degrees;
        Ok(())
    }

    pub fn set_background_color(&mut self, color: RgbColor) {
        self.background = color;
    }

    /// `direction` points from the scene toward the light.
    pub fn set_light_direction(&mut self, direction: Vec3) -> Result<()> {
        self.light_direction = direction.try_normalize(1e-12).ok_or_else(|| {
            VisualizerError::InvalidParameter("light direction must be non-zero".to_string())
        })?;
        Ok(())
    }

    pub fn set_lighting_model(&mut self, model: LightingModel) {
        self.lighting = model;
    }

    pub fn set_colormap(&mut self, colormap: Colormap) {
        self.colormap = colormap;
    }

    pub fn colormap(&self) -> Colormap {
        self.colormap
    }

    pub fn set_colorbar_range(&mut self, min: f32, max: f32) -> Result<()> {
        if !(max > min) {
            return Err(VisualizerError::InvalidParameter(format!(
                "colorbar range [{min}, {max}] is empty"
            )));
        }
        self.colorbar_range = Some((min, max));
        Ok(())
    }

    /// Colors primitives by the scalar primitive data `label` at the next geometry build.
    pub fn color_context_primitives_by_data(&mut self, label: &str) {
        self.coloring = Some(DataColoring {
            label: label.to_string(),
            uuids: None,
        });
    }

    pub fn color_context_primitives_by_data_for_uuids(&mut self, label: &str, uuids: &[Uuid]) {
        self.coloring = Some(DataColoring {
            label: label.to_string(),
            uuids: Some(uuids.iter().copied().collect()),
        });
    }

    /// Returns to drawing primitives in their own colors.
    pub fn clear_color(&mut self) {
        self.coloring = None;
        self.colorbar_range = None;
    }

    pub fn build_context_geometry(&mut self, context: &Context) -> Result<()> {
        let uuids = context.all_uuids();
        self.build_context_geometry_uuids(context, &uuids)
    }

    /// Replaces the drawn geometry with the given primitives.
    #[instrument(skip_all, name = "visualizer_build_geometry")]
    pub fn build_context_geometry_uuids(&mut self, context: &Context, uuids: &[Uuid]) -> Result<()> {
        context.validate_uuids(uuids)?;
        let data_colors = self.data_colors(context, uuids);
        let mut triangles = Vec::new();
        for (i, &uuid) in uuids.iter().enumerate() {
            let primitive = context.primitive(uuid)?;
            let color = data_colors[i].unwrap_or_else(|| primitive.color().rgb());
            triangles.extend(primitive.triangles().into_iter().map(|vertices| DrawTriangle {
                normal: triangle_normal(&vertices[0], &vertices[1], &vertices[2]),
                vertices,
                color,
                uuid,
            }));
        }
        debug!(primitives = uuids.len(), triangles = triangles.len(), "Visualizer geometry built.");
        self.triangles = triangles;
        Ok(())
    }

    fn data_colors(&self, context: &Context, uuids: &[Uuid]) -> Vec<Option<RgbColor>> {
        let Some(coloring) = &self.coloring else {
            return vec![None; uuids.len()];
        };
        let values: Vec<Option<f32>> = uuids
            .iter()
            .map(|&uuid| {
                let selected = coloring.uuids.as_ref().is_none_or(|set| set.contains(&uuid));
                if selected {
                    context.primitive_scalar(uuid, &coloring.label)
                } else {
                    None
                }
            })
            .collect();
        let (min, max) = self.colorbar_range.unwrap_or_else(|| {
            values
                .iter()
                .flatten()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
        });
        values
            .into_iter()
            .map(|value| {
                value.map(|v| {
                    let t = if max > min { (v - min) / (max - min) } else { 0.5 };
                    self.colormap.sample(t)
                })
            })
            .collect()
    }

    fn camera_pose(&self) -> (Vec3, Vec3) {
        if let Some(pose) = self.camera {
            return pose;
        }
        let bounds = render::scene_bounds(&self.triangles);
        if bounds.is_empty() {
            return (Vec3::new(2.0, -2.0, 2.0), Vec3::zeros());
        }
        let center = bounds.center();
        let radius = (0.5 * bounds.extent().norm()).max(0.5);
        let distance = 1.2 * radius / (0.5 * self.field_of_view.to_radians()).tan();
        (center + Vec3::new(1.0, -1.0, 1.0).normalize() * distance, center)
    }

    fn camera(&self, width: u32, height: u32) -> Camera {
        let (eye, target) = self.camera_pose();
        let bounds = render::scene_bounds(&self.triangles);
        Camera::new(eye, target, self.field_of_view, width, height, &bounds)
    }

    /// Renders the current geometry into the framebuffer.
    #[instrument(skip_all, name = "visualizer_plot_update")]
    pub fn plot_update(&mut self) -> Result<()> {
        let factor = self.config.supersampling_factor();
        let (width, height, _) = self
            .config
            .render_size()
            .ok_or(VisualizerError::Allocation(usize::MAX))?;
        let camera = self.camera(width, height);
        let visible = render::rasterize(&camera, &self.triangles)?;
        let bvh = match self.lighting {
            LightingModel::PhongShadowed => Some(render::shadow_bvh(&self.triangles)),
            _ => None,
        };
        let lighting = Lighting {
            model: self.lighting,
            direction: self.light_direction,
            background: self.background,
            shadows: bvh.as_ref(),
        };
        let colors = render::shade(&camera, &self.triangles, &visible, &lighting)?;
        self.framebuffer = render::downsample(
            &colors,
            self.config.width as usize,
            self.config.height as usize,
            factor as usize,
        )?;
        debug!(width, height, triangles = self.triangles.len(), "Frame rendered.");
        Ok(())
    }

    /// Packed RGB bytes of the framebuffer, top row first.
    pub fn window_pixels_rgb(&self) -> &[u8] {
        &self.framebuffer
    }

    /// Renders a frame and writes it to `path`; the format follows the extension.
    pub fn print_window(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.plot_update()?;
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();
        let image = image::RgbImage::from_raw(self.config.width, self.config.height, self.framebuffer.clone())
            .ok_or_else(|| VisualizerError::InvalidParameter("framebuffer size mismatch".to_string()))?;
        image.save(path).map_err(|e| VisualizerError::Image {
            path: path_str.clone(),
            source: e,
        })?;
        info!(path = %path_str, "Window printed to file.");
        Ok(())
    }

    /// Screen pixel of a world point in the output framebuffer, if in front of the camera.
    pub fn project(&self, point: &Vec3) -> Option<(u32, u32)> {
        let (x, y, _) = self.camera(self.config.width, self.config.height).project(point)?;
        let inside = x >= 0.0 && y >= 0.0 && x < self.config.width as f32 && y < self.config.height as f32;
        inside.then_some((x as u32, y as u32))
    }
}
