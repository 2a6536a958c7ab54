//! # Radiation Transport
//!
//! A CPU ray-casting radiation model operating on a snapshot of the context
//! geometry.
//!
//! ## Workflow
//!
//! 1. Register bands ([`RadiationModel::add_band`]) and sources, and set source fluxes.
//! 2. Call [`RadiationModel::update_geometry`] to snapshot the scene into a BVH.
//! 3. Run one or more bands ([`RadiationModel::run_band`]); each run writes
//!    `radiation_flux_<band>` (absorbed W m⁻² per unit one-sided area) to every
//!    primitive in the snapshot.
//!
//! ## Model
//!
//! Primitives are two-sided. Direct flux is estimated from stratified sample
//! points cast toward each source; unoccluded samples receive `flux · |cos θ|`.
//! Diffuse flux uses cosine-weighted hemisphere rays from both faces: rays escaping
//! upward see the sky and receive the band's diffuse flux, while rays hitting
//! another primitive record the view toward it. In emission bands that primitive
//! contributes `ε σ T⁴`. Scattering passes redistribute the non-absorbed fraction
//! of incident energy along the recorded views. Optical properties come from the
//! primitive data `reflectivity_<band>`, `transmissivity_<band>`,
//! `emissivity_<band>` and `temperature`.

pub mod band;
mod solver;
pub mod source;

use crate::core::context::{Context, ContextError, Uuid};
use crate::core::geometry::{SphericalCoord, Vec3};
use solver::{Optics, Scene, Surface};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, instrument};

pub use band::BandParameters;
pub use source::{RadiationSource, SourceGeometry};

pub type SourceId = u32;

const DEFAULT_SEED: u64 = 0x5EED_0F_5A;

#[derive(Debug, Error)]
pub enum RadiationError {
    #[error("Radiation band '{0}' does not exist")]
    BandNotFound(String),
    #[error("Radiation band '{0}' already exists")]
    BandExists(String),
    #[error("Radiation source {0} does not exist")]
    SourceNotFound(SourceId),
    #[error("Geometry has not been updated; call updateGeometry before running a band")]
    GeometryNotUpdated,
    #[error("Invalid radiation parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, RadiationError>;

#[derive(Debug)]
pub struct RadiationModel {
    bands: BTreeMap<String, BandParameters>,
    sources: Vec<RadiationSource>,
    scene: Option<Scene>,
    absorbed: BTreeMap<String, Vec<f32>>,
    messages: bool,
    seed: u64,
}

impl Default for RadiationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl RadiationModel {
    pub fn new() -> Self {
        Self {
            bands: BTreeMap::new(),
            sources: Vec::new(),
            scene: None,
            absorbed: BTreeMap::new(),
            messages: false,
            seed: DEFAULT_SEED,
        }
    }

    pub fn enable_messages(&mut self) {
        self.messages = true;
    }

    pub fn disable_messages(&mut self) {
        self.messages = false;
    }

    // ------------------------------------------------------------------
    // Bands
    // ------------------------------------------------------------------

    pub fn add_band(&mut self, label: &str) -> Result<()> {
        self.insert_band(label, BandParameters::default())
    }

    pub fn add_band_with_wavelengths(&mut self, label: &str, min_nm: f32, max_nm: f32) -> Result<()> {
        self.insert_band(label, BandParameters::with_wavelengths(min_nm, max_nm)?)
    }

    fn insert_band(&mut self, label: &str, params: BandParameters) -> Result<()> {
        if label.is_empty() {
            return Err(RadiationError::InvalidParameter(
                "band label must not be empty".to_string(),
            ));
        }
        if self.bands.contains_key(label) {
            return Err(RadiationError::BandExists(label.to_string()));
        }
        self.bands.insert(label.to_string(), params);
        Ok(())
    }

    /// Copies a band's parameters and source fluxes under a new label.
    pub fn copy_band(&mut self, old: &str, new: &str) -> Result<()> {
        let params = self.band(old)?.clone();
        self.insert_band(new, params)?;
        for source in &mut self.sources {
            if let Some(flux) = source.fluxes.get(old).copied() {
                source.fluxes.insert(new.to_string(), flux);
            }
        }
        Ok(())
    }

    pub fn does_band_exist(&self, label: &str) -> bool {
        self.bands.contains_key(label)
    }

    pub fn band(&self, label: &str) -> Result<&BandParameters> {
        self.bands
            .get(label)
            .ok_or_else(|| RadiationError::BandNotFound(label.to_string()))
    }

    fn band_mut(&mut self, label: &str) -> Result<&mut BandParameters> {
        self.bands
            .get_mut(label)
            .ok_or_else(|| RadiationError::BandNotFound(label.to_string()))
    }

    pub fn band_labels(&self) -> Vec<String> {
        self.bands.keys().cloned().collect()
    }

    pub fn set_diffuse_flux(&mut self, band: &str, flux: f32) -> Result<()> {
        if flux < 0.0 {
            return Err(RadiationError::InvalidParameter(format!(
                "diffuse flux {flux} must be non-negative"
            )));
        }
        self.band_mut(band)?.diffuse_flux = flux;
        Ok(())
    }

    pub fn set_direct_ray_count(&mut self, band: &str, count: u32) -> Result<()> {
        if count == 0 {
            return Err(RadiationError::InvalidParameter(
                "direct ray count must be positive".to_string(),
            ));
        }
        self.band_mut(band)?.direct_ray_count = count;
        Ok(())
    }

    pub fn set_diffuse_ray_count(&mut self, band: &str, count: u32) -> Result<()> {
        if count == 0 {
            return Err(RadiationError::InvalidParameter(
                "diffuse ray count must be positive".to_string(),
            ));
        }
        self.band_mut(band)?.diffuse_ray_count = count;
        Ok(())
    }

    pub fn set_scattering_depth(&mut self, band: &str, depth: u32) -> Result<()> {
        self.band_mut(band)?.scattering_depth = depth;
        Ok(())
    }

    pub fn set_min_scatter_energy(&mut self, band: &str, energy: f32) -> Result<()> {
        if energy < 0.0 {
            return Err(RadiationError::InvalidParameter(format!(
                "minimum scatter energy {energy} must be non-negative"
            )));
        }
        self.band_mut(band)?.min_scatter_energy = energy;
        Ok(())
    }

    pub fn enable_emission(&mut self, band: &str) -> Result<()> {
        self.band_mut(band)?.emission = true;
        Ok(())
    }

    pub fn disable_emission(&mut self, band: &str) -> Result<()> {
        self.band_mut(band)?.emission = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    fn push_source(&mut self, source: RadiationSource) -> SourceId {
        self.sources.push(source);
        (self.sources.len() - 1) as SourceId
    }

    /// Collimated source shining straight down.
    pub fn add_collimated_source(&mut self) -> Result<SourceId> {
        Ok(self.push_source(RadiationSource::collimated(&Vec3::z())?))
    }

    pub fn add_collimated_source_toward(&mut self, direction: &Vec3) -> Result<SourceId> {
        Ok(self.push_source(RadiationSource::collimated(direction)?))
    }

    pub fn add_collimated_source_spherical(&mut self, direction: &SphericalCoord) -> Result<SourceId> {
        Ok(self.push_source(RadiationSource::collimated_spherical(direction)?))
    }

    pub fn add_sphere_source(&mut self, position: Vec3, radius: f32) -> Result<SourceId> {
        Ok(self.push_source(RadiationSource::sphere(position, radius)?))
    }

    pub fn add_sun_sphere_source(&mut self, direction: &SphericalCoord) -> Result<SourceId> {
        Ok(self.push_source(RadiationSource::sun_sphere(direction)?))
    }

    pub fn source(&self, id: SourceId) -> Result<&RadiationSource> {
        self.sources
            .get(id as usize)
            .ok_or(RadiationError::SourceNotFound(id))
    }

    fn source_mut(&mut self, id: SourceId) -> Result<&mut RadiationSource> {
        self.sources
            .get_mut(id as usize)
            .ok_or(RadiationError::SourceNotFound(id))
    }

    pub fn set_source_flux(&mut self, id: SourceId, band: &str, flux: f32) -> Result<()> {
        self.band(band)?;
        if flux < 0.0 {
            return Err(RadiationError::InvalidParameter(format!(
                "source flux {flux} must be non-negative"
            )));
        }
        self.source_mut(id)?.fluxes.insert(band.to_string(), flux);
        Ok(())
    }

    pub fn set_source_flux_multiple(&mut self, ids: &[SourceId], band: &str, flux: f32) -> Result<()> {
        for id in ids {
            self.source(*id)?;
        }
        for id in ids {
            self.set_source_flux(*id, band, flux)?;
        }
        Ok(())
    }

    pub fn source_flux(&self, id: SourceId, band: &str) -> Result<f32> {
        self.band(band)?;
        Ok(self.source(id)?.flux(band))
    }

    pub fn set_source_position(&mut self, id: SourceId, position: &Vec3) -> Result<()> {
        self.source_mut(id)?.set_position(position)
    }

    // ------------------------------------------------------------------
    // Geometry and execution
    // ------------------------------------------------------------------

    /// Snapshots every primitive in the context.
    pub fn update_geometry(&mut self, context: &Context) -> Result<()> {
        self.snapshot(context, None)
    }

    /// Snapshots only `uuids`; other primitives neither block nor receive radiation.
    pub fn update_geometry_uuids(&mut self, context: &Context, uuids: &[Uuid]) -> Result<()> {
        if uuids.is_empty() {
            return Err(RadiationError::InvalidParameter(
                "at least one UUID is required".to_string(),
            ));
        }
        self.snapshot(context, Some(uuids))
    }

    #[instrument(skip_all, name = "radiation_update_geometry")]
    fn snapshot(&mut self, context: &Context, uuids: Option<&[Uuid]>) -> Result<()> {
        let selected = match uuids {
            Some(uuids) => {
                context.validate_uuids(uuids)?;
                uuids.to_vec()
            }
            None => context.all_uuids(),
        };
        let bvh = context.scene_bvh(Some(&selected))?;
        let mut surfaces = Vec::with_capacity(selected.len());
        for uuid in selected {
            let primitive = context.primitive(uuid)?;
            surfaces.push(Surface {
                uuid,
                shape: primitive.shape().clone(),
                normal: primitive.normal(),
                kind: primitive.primitive_type(),
            });
        }
        if self.messages {
            info!(primitives = surfaces.len(), "Radiation geometry updated.");
        }
        self.scene = Some(Scene::new(bvh, surfaces));
        self.absorbed.clear();
        Ok(())
    }

    /// UUIDs of the current geometry snapshot, in the order used by
    /// [`total_absorbed_flux`](Self::total_absorbed_flux).
    pub fn scene_uuids(&self) -> Vec<Uuid> {
        self.scene
            .as_ref()
            .map(|s| s.surfaces.iter().map(|x| x.uuid).collect())
            .unwrap_or_default()
    }

    #[instrument(skip_all, name = "radiation_run_band", fields(band = band_label))]
    pub fn run_band(&mut self, context: &mut Context, band_label: &str) -> Result<()> {
        let band = self.band(band_label)?.clone();
        let scene = self.scene.as_ref().ok_or(RadiationError::GeometryNotUpdated)?;

        let optics: Vec<Optics> = scene
            .surfaces
            .iter()
            .map(|s| Optics {
                reflectivity: context.primitive_float_or(s.uuid, &format!("reflectivity_{band_label}"), 0.0),
                transmissivity: context.primitive_float_or(s.uuid, &format!("transmissivity_{band_label}"), 0.0),
                emissivity: context.primitive_float_or(s.uuid, &format!("emissivity_{band_label}"), 1.0),
                temperature: context.primitive_float_or(s.uuid, "temperature", 300.0),
            })
            .collect();

        if self.messages {
            info!(
                band = band_label,
                primitives = scene.surfaces.len(),
                sources = self.sources.len(),
                "Running radiation band."
            );
        }
        let absorbed = solver::solve_band(scene, band_label, &band, &self.sources, &optics, self.seed);

        let label = format!("radiation_flux_{band_label}");
        for (surface, flux) in scene.surfaces.iter().zip(&absorbed) {
            context.set_primitive_data(surface.uuid, &label, *flux)?;
        }
        debug!(band = band_label, "Radiation band finished.");
        self.absorbed.insert(band_label.to_string(), absorbed);
        Ok(())
    }

    pub fn run_bands(&mut self, context: &mut Context, bands: &[&str]) -> Result<()> {
        for band in bands {
            self.band(band)?;
        }
        for band in bands {
            self.run_band(context, band)?;
        }
        Ok(())
    }

    /// Absorbed flux summed over every band run since the last geometry update,
    /// one value per snapshot primitive.
    pub fn total_absorbed_flux(&self) -> Result<Vec<f32>> {
        let scene = self.scene.as_ref().ok_or(RadiationError::GeometryNotUpdated)?;
        let mut total = vec![0.0f32; scene.surfaces.len()];
        for fluxes in self.absorbed.values() {
            for (t, f) in total.iter_mut().zip(fluxes) {
                *t += f;
            }
        }
        Ok(total)
    }
}
