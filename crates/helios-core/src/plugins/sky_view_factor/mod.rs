//! # Sky View Factor
//!
//! Fraction of the sky hemisphere visible from a point or primitive, estimated
//! with cosine-weighted rays about the upward-facing normal. A ray counts as sky
//! when it points above the horizon and hits nothing within the maximum ray
//! length. Per-primitive results are written to `sky_view_factor`.

use crate::core::context::{Context, ContextError, Uuid};
use crate::core::geometry::Vec3;
use crate::core::geometry::raytrace::{Bvh, Ray, cosine_weighted_direction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};

const RAY_OFFSET: f32 = 1e-4;
const DEFAULT_SEED: u64 = 0x5C7_F1E1D;

#[derive(Debug, Error)]
pub enum SkyViewFactorError {
    #[error("Invalid sky view factor parameter: {0}")]
    InvalidParameter(String),
    #[error("No sky view factors have been calculated")]
    NoResults,
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV writing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, SkyViewFactorError>;

#[derive(Debug)]
pub struct SkyViewFactorModel {
    ray_count: u32,
    max_ray_length: f32,
    messages: bool,
    results: Vec<(Uuid, f32)>,
}

impl Default for SkyViewFactorModel {
    fn default() -> Self {
        Self::new()
    }
}

fn upward(normal: Vec3) -> Vec3 {
    if normal.z < 0.0 { -normal } else { normal }
}

fn trace_fraction(
    bvh: &Bvh,
    origin: &Vec3,
    normal: &Vec3,
    rays: u32,
    max_length: f32,
    ignore: Option<Uuid>,
    rng: &mut StdRng,
) -> f32 {
    let start = origin + normal * RAY_OFFSET;
    let visible = (0..rays)
        .filter(|_| {
            let direction = cosine_weighted_direction(normal, rng.random(), rng.random());
            direction.z > 0.0 && !bvh.is_occluded(&Ray::new(start, direction), max_length, ignore)
        })
        .count();
    visible as f32 / rays as f32
}

impl SkyViewFactorModel {
    pub fn new() -> Self {
        Self {
            ray_count: 1000,
            max_ray_length: 1000.0,
            messages: false,
            results: Vec::new(),
        }
    }

    pub fn enable_messages(&mut self) {
        self.messages = true;
    }

    pub fn disable_messages(&mut self) {
        self.messages = false;
    }

    pub fn set_ray_count(&mut self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(SkyViewFactorError::InvalidParameter(
                "ray count must be positive".to_string(),
            ));
        }
        self.ray_count = count;
        Ok(())
    }

    pub fn ray_count(&self) -> u32 {
        self.ray_count
    }

    pub fn set_max_ray_length(&mut self, length: f32) -> Result<()> {
        if !(length > 0.0) {
            return Err(SkyViewFactorError::InvalidParameter(format!(
                "maximum ray length {length} must be positive"
            )));
        }
        self.max_ray_length = length;
        Ok(())
    }

    pub fn max_ray_length(&self) -> f32 {
        self.max_ray_length
    }

    /// Sky view factor of an arbitrary point, looking straight up.
    pub fn calculate_sky_view_factor(&self, context: &Context, point: &Vec3) -> Result<f32> {
        let bvh = context.scene_bvh(None)?;
        let mut rng = StdRng::seed_from_u64(DEFAULT_SEED);
        Ok(trace_fraction(&bvh, point, &Vec3::z(), self.ray_count, self.max_ray_length, None, &mut rng))
    }

    pub fn calculate_sky_view_factors(&mut self, context: &mut Context) -> Result<Vec<f32>> {
        let uuids = context.all_uuids();
        self.calculate_sky_view_factors_for_uuids(context, &uuids)
    }

    /// Computes and stores the factor of each primitive from its centroid.
    #[instrument(skip_all, name = "sky_view_factor_calculate")]
    pub fn calculate_sky_view_factors_for_uuids(&mut self, context: &mut Context, uuids: &[Uuid]) -> Result<Vec<f32>> {
        context.validate_uuids(uuids)?;
        let bvh = context.scene_bvh(None)?;
        let origins = uuids
            .iter()
            .map(|&uuid| {
                let p = context.primitive(uuid)?;
                Ok((uuid, p.centroid(), upward(p.normal())))
            })
            .collect::<Result<Vec<_>>>()?;

        let (rays, max_length) = (self.ray_count, self.max_ray_length);
        let factors: Vec<f32> = origins
            .par_iter()
            .map(|(uuid, centroid, normal)| {
                let mut rng = StdRng::seed_from_u64(DEFAULT_SEED ^ u64::from(*uuid));
                trace_fraction(&bvh, centroid, normal, rays, max_length, Some(*uuid), &mut rng)
            })
            .collect();

        for (uuid, f) in uuids.iter().zip(&factors) {
            context.set_primitive_data(*uuid, "sky_view_factor", *f)?;
        }
        self.results = uuids.iter().copied().zip(factors.iter().copied()).collect();
        if self.messages {
            info!(primitives = factors.len(), rays, "Sky view factors calculated.");
        }
        Ok(factors)
    }

    pub fn sky_view_factors(&self) -> Vec<f32> {
        self.results.iter().map(|(_, f)| *f).collect()
    }

    /// Human-readable summary of the last calculation.
    pub fn statistics(&self) -> Result<String> {
        if self.results.is_empty() {
            return Err(SkyViewFactorError::NoResults);
        }
        let n = self.results.len() as f32;
        let values = self.results.iter().map(|(_, f)| *f);
        let mean = values.clone().sum::<f32>() / n;
        let min = values.clone().fold(f32::INFINITY, f32::min);
        let max = values.clone().fold(f32::NEG_INFINITY, f32::max);
        let std_dev = (values.map(|f| (f - mean).powi(2)).sum::<f32>() / n).sqrt();
        Ok(format!(
            "Sky view factor statistics: count={} mean={mean:.4} min={min:.4} max={max:.4} std={std_dev:.4}",
            self.results.len()
        ))
    }

    /// Writes `uuid,sky_view_factor` rows for the last calculation.
    pub fn export_sky_view_factors(&self, path: impl AsRef<Path>) -> Result<()> {
        if self.results.is_empty() {
            return Err(SkyViewFactorError::NoResults);
        }
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();
        let csv_error = |source: csv::Error| SkyViewFactorError::Csv {
            path: path_str.clone(),
            source,
        };
        let file = std::fs::File::create(path).map_err(|e| SkyViewFactorError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(["uuid", "sky_view_factor"]).map_err(csv_error)?;
        for (uuid, f) in &self.results {
            writer
                .write_record([uuid.to_string(), f.to_string()])
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|e| SkyViewFactorError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        info!(path = %path_str, rows = self.results.len(), "Exported sky view factors.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{RgbColor, SphericalCoord, Vec2};
    use tempfile::tempdir;

    fn patch(ctx: &mut Context, z: f32, size: f32) -> Uuid {
        ctx.add_patch(Vec3::new(0.0, 0.0, z), Vec2::new(size, size), SphericalCoord::default(), RgbColor::GREEN.into())
            .unwrap()
    }

    fn model(rays: u32) -> SkyViewFactorModel {
        let mut m = SkyViewFactorModel::new();
        m.set_ray_count(rays).unwrap();
        m
    }

    #[test]
    fn isolated_horizontal_patch_sees_the_whole_sky() {
        let mut ctx = Context::new();
        let uuid = patch(&mut ctx, 0.0, 1.0);
        let mut m = model(200);
        let factors = m.calculate_sky_view_factors(&mut ctx).unwrap();
        assert_eq!(factors, vec![1.0]);
        let stored: f32 = ctx.get_primitive_data(uuid, "sky_view_factor").unwrap();
        assert_eq!(stored, 1.0);
    }

    #[test]
    fn covered_point_sees_little_sky() {
        let mut ctx = Context::new();
        patch(&mut ctx, 0.5, 20.0);
        let m = model(500);
        let svf = m.calculate_sky_view_factor(&ctx, &Vec3::zeros()).unwrap();
        assert!(svf < 0.05, "svf {svf}");

        let mut short = model(500);
        short.set_max_ray_length(0.1).unwrap();
        assert_eq!(short.calculate_sky_view_factor(&ctx, &Vec3::zeros()).unwrap(), 1.0);
    }

    #[test]
    fn statistics_and_export_require_results() {
        let mut ctx = Context::new();
        patch(&mut ctx, 0.0, 1.0);
        patch(&mut ctx, 2.0, 1.0);
        let mut m = model(64);
        assert!(matches!(m.statistics(), Err(SkyViewFactorError::NoResults)));
        m.calculate_sky_view_factors(&mut ctx).unwrap();
        assert!(m.statistics().unwrap().contains("count=2"));

        let dir = tempdir().unwrap();
        let path = dir.path().join("svf.csv");
        m.export_sky_view_factors(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("uuid,sky_view_factor"));
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut m = SkyViewFactorModel::new();
        assert!(m.set_ray_count(0).is_err());
        assert!(m.set_max_ray_length(-1.0).is_err());
        assert_eq!(m.ray_count(), 1000);
    }
}
