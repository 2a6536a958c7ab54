use super::RadiationError;

/// Ray-tracing parameters of one radiation band.
#[derive(Debug, Clone, PartialEq)]
pub struct BandParameters {
    /// Wavelength interval in nanometres, when known.
    pub wavelength_range: Option<(f32, f32)>,
    /// Diffuse (sky) flux on a horizontal surface, W m⁻².
    pub diffuse_flux: f32,
    /// Sample points per primitive for each direct source.
    pub direct_ray_count: u32,
    /// Hemisphere rays per primitive face.
    pub diffuse_ray_count: u32,
    /// Maximum number of scattering passes.
    pub scattering_depth: u32,
    /// Scattering stops once no primitive receives more than this flux.
    pub min_scatter_energy: f32,
    /// Whether primitives emit thermal radiation in this band.
    pub emission: bool,
}

impl Default for BandParameters {
    fn default() -> Self {
        Self {
            wavelength_range: None,
            diffuse_flux: 0.0,
            direct_ray_count: 100,
            diffuse_ray_count: 256,
            scattering_depth: 0,
            min_scatter_energy: 0.1,
            emission: false,
        }
    }
}

impl BandParameters {
    pub fn with_wavelengths(min_nm: f32, max_nm: f32) -> Result<Self, RadiationError> {
        if !(min_nm > 0.0 && max_nm > min_nm) {
            return Err(RadiationError::InvalidParameter(format!(
                "wavelength range [{min_nm}, {max_nm}] must be positive and increasing"
            )));
        }
        Ok(Self {
            wavelength_range: Some((min_nm, max_nm)),
            ..Self::default()
        })
    }
}
