use super::{Vec3, wrap_two_pi};
use std::f32::consts::FRAC_PI_2;

/// A direction or position in spherical coordinates.
///
/// Elevation is measured up from the horizontal plane and azimuth clockwise from
/// the +y axis (north) toward +x (east), both in radians. The zenith angle is kept
/// in sync with the elevation (`zenith = π/2 - elevation`).
///
/// Every rotation triple `(radius, elevation, azimuth)` received across the
/// native boundary is converted through [`SphericalCoord::new`], so all entry
/// points interpret rotations identically.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalCoord {
    pub radius: f32,
    pub elevation: f32,
    pub zenith: f32,
    pub azimuth: f32,
}

impl Default for SphericalCoord {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl SphericalCoord {
    pub fn new(radius: f32, elevation: f32, azimuth: f32) -> Self {
        Self {
            radius,
            elevation,
            zenith: FRAC_PI_2 - elevation,
            azimuth,
        }
    }

    pub fn from_zenith(radius: f32, zenith: f32, azimuth: f32) -> Self {
        Self::new(radius, FRAC_PI_2 - zenith, azimuth)
    }

    /// Builds a coordinate from a packed `[radius, elevation, azimuth]` triple.
    pub fn from_array(values: [f32; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    pub fn to_cartesian(&self) -> Vec3 {
        let (sin_e, cos_e) = self.elevation.sin_cos();
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        Vec3::new(
            self.radius * cos_e * sin_a,
            self.radius * cos_e * cos_a,
            self.radius * sin_e,
        )
    }

    pub fn from_cartesian(v: &Vec3) -> Self {
        let radius = v.norm();
        if radius == 0.0 {
            return Self::default();
        }
        let elevation = (v.z / radius).clamp(-1.0, 1.0).asin();
        let azimuth = wrap_two_pi(v.x.atan2(v.y));
        Self::new(radius, elevation, azimuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn zenith_tracks_elevation() {
        let s = SphericalCoord::new(1.0, 0.25 * PI, 0.0);
        assert!((s.zenith - 0.25 * PI).abs() < 1e-6);
        let z = SphericalCoord::from_zenith(1.0, 0.0, 0.0);
        assert!((z.elevation - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn cartesian_conversion_uses_north_referenced_azimuth() {
        let east = SphericalCoord::new(2.0, 0.0, FRAC_PI_2).to_cartesian();
        assert!((east - Vec3::new(2.0, 0.0, 0.0)).norm() < 1e-5);
        let up = SphericalCoord::new(1.0, FRAC_PI_2, 0.0).to_cartesian();
        assert!((up - Vec3::z()).norm() < 1e-5);
    }

    #[test]
    fn cartesian_round_trip_recovers_angles() {
        let original = SphericalCoord::new(3.0, 0.4, 2.5);
        let back = SphericalCoord::from_cartesian(&original.to_cartesian());
        assert!((back.radius - 3.0).abs() < 1e-5);
        assert!((back.elevation - 0.4).abs() < 1e-5);
        assert!((back.azimuth - 2.5).abs() < 1e-5);
    }
}
