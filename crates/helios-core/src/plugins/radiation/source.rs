use super::RadiationError;
use crate::core::geometry::{SphericalCoord, Vec3, orthonormal_basis};
use std::collections::HashMap;

/// Angular radius of the solar disk, radians.
const SUN_ANGULAR_RADIUS: f32 = 0.004_65;

#[derive(Debug, Clone, PartialEq)]
pub enum SourceGeometry {
    /// Parallel rays arriving from `direction` (unit vector pointing toward the source).
    Collimated { direction: Vec3 },
    /// Isotropic sphere at a finite distance.
    Sphere { position: Vec3, radius: f32 },
    /// Distant sun of finite angular size in `direction`.
    SunSphere { direction: Vec3 },
}

/// A direct radiation source with per-band flux (W m⁻² normal to the rays).
#[derive(Debug, Clone, PartialEq)]
pub struct RadiationSource {
    pub geometry: SourceGeometry,
    pub(crate) fluxes: HashMap<String, f32>,
}

fn unit_direction(direction: &Vec3) -> Result<Vec3, RadiationError> {
    direction.try_normalize(1e-12).ok_or_else(|| {
        RadiationError::InvalidParameter("source direction must be non-zero".to_string())
    })
}

impl RadiationSource {
    pub fn collimated(direction: &Vec3) -> Result<Self, RadiationError> {
        Ok(Self::from_geometry(SourceGeometry::Collimated {
            direction: unit_direction(direction)?,
        }))
    }

    pub fn collimated_spherical(direction: &SphericalCoord) -> Result<Self, RadiationError> {
        Self::collimated(&direction.to_cartesian())
    }

    pub fn sphere(position: Vec3, radius: f32) -> Result<Self, RadiationError> {
        if !(radius > 0.0) {
            return Err(RadiationError::InvalidParameter(format!(
                "sphere source radius {radius} must be positive"
            )));
        }
        Ok(Self::from_geometry(SourceGeometry::Sphere { position, radius }))
    }

    pub fn sun_sphere(direction: &SphericalCoord) -> Result<Self, RadiationError> {
        Ok(Self::from_geometry(SourceGeometry::SunSphere {
            direction: unit_direction(&direction.to_cartesian())?,
        }))
    }

    fn from_geometry(geometry: SourceGeometry) -> Self {
        Self {
            geometry,
            fluxes: HashMap::new(),
        }
    }

    /// Flux in `band`; zero when never set.
    pub fn flux(&self, band: &str) -> f32 {
        self.fluxes.get(band).copied().unwrap_or(0.0)
    }

    /// Moves the source. Directional sources take `position` as their direction.
    pub fn set_position(&mut self, position: &Vec3) -> Result<(), RadiationError> {
        match &mut self.geometry {
            SourceGeometry::Collimated { direction } | SourceGeometry::SunSphere { direction } => {
                *direction = unit_direction(position)?;
            }
            SourceGeometry::Sphere { position: p, .. } => *p = *position,
        }
        Ok(())
    }

    /// Unit direction from `point` toward the source and the distance within which
    /// geometry can block it. `(u1, u2)` pick a point on extended sources.
    pub(crate) fn ray_toward(&self, point: &Vec3, u1: f32, u2: f32) -> (Vec3, f32) {
        match &self.geometry {
            SourceGeometry::Collimated { direction } => (*direction, f32::INFINITY),
            SourceGeometry::SunSphere { direction } => {
                let (u, v) = orthonormal_basis(direction);
                let r = SUN_ANGULAR_RADIUS * u1.sqrt();
                let phi = 2.0 * std::f32::consts::PI * u2;
                let jittered = direction + u * (r * phi.cos()) + v * (r * phi.sin());
                (jittered.normalize(), f32::INFINITY)
            }
            SourceGeometry::Sphere { position, radius } => {
                let offset = position - point;
                let distance = offset.norm();
                match offset.try_normalize(1e-12) {
                    Some(direction) => (direction, (distance - radius).max(0.0)),
                    None => (Vec3::z(), 0.0),
                }
            }
        }
    }
}
