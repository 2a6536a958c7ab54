//! # Solar Position and Clear-Sky Fluxes
//!
//! Sun angles follow Spencer (1971) for the declination and equation of time;
//! the hour angle is computed from local standard time, longitude (east
//! positive) and UTC offset. Azimuth is measured clockwise from north.
//!
//! Shortwave fluxes come from a broadband clear-sky model in the spirit of Bird &
//! Hulstrom (1981): Rayleigh, water-vapour and aerosol transmittances applied
//! to the extraterrestrial flux along the Kasten–Young air mass. Incoming
//! longwave radiation uses the Prata (1996) clear-sky emissivity.

use crate::core::constants::{SOLAR_CONSTANT, STANDARD_PRESSURE, STEFAN_BOLTZMANN, saturation_vapor_pressure};
use crate::core::context::{Context, ContextError, Date, Location, Time};
use crate::core::geometry::{SphericalCoord, Vec3};
use std::f32::consts::PI;
use thiserror::Error;
use tracing::debug;

const PAR_FRACTION: f32 = 0.46;

#[derive(Debug, Error)]
pub enum SolarPositionError {
    #[error("Invalid atmospheric condition: {0}")]
    InvalidParameter(String),
    #[error("The sun does not rise or set on {date} at latitude {latitude}°")]
    NoSunrise { date: Date, latitude: f32 },
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, SolarPositionError>;

/// Clear-sky atmosphere used by the flux calculations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphericConditions {
    /// Pa.
    pub pressure: f32,
    /// K.
    pub temperature: f32,
    /// Relative humidity, 0–1.
    pub humidity: f32,
    /// Broadband aerosol optical depth.
    pub turbidity: f32,
}

impl Default for AtmosphericConditions {
    fn default() -> Self {
        Self {
            pressure: STANDARD_PRESSURE,
            temperature: 300.0,
            humidity: 0.5,
            turbidity: 0.05,
        }
    }
}

impl AtmosphericConditions {
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(SolarPositionError::InvalidParameter(message));
        if !(self.pressure > 0.0) {
            return invalid(format!("pressure {} Pa must be positive", self.pressure));
        }
        if !(self.temperature > 0.0) {
            return invalid(format!("temperature {} K must be positive", self.temperature));
        }
        if !(0.0..=1.0).contains(&self.humidity) {
            return invalid(format!("relative humidity {} must be in [0, 1]", self.humidity));
        }
        if self.turbidity < 0.0 {
            return invalid(format!("turbidity {} must be non-negative", self.turbidity));
        }
        Ok(())
    }

    /// Precipitable water (cm), Leckner (1978).
    fn precipitable_water(&self) -> f32 {
        0.493 * self.humidity * saturation_vapor_pressure(self.temperature) / self.temperature
    }
}

/// Sun angles at one instant, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunAngles {
    pub elevation: f32,
    pub azimuth: f32,
}

impl SunAngles {
    pub fn zenith(&self) -> f32 {
        90.0 - self.elevation
    }

    pub fn direction(&self) -> Vec3 {
        self.spherical().to_cartesian()
    }

    pub fn spherical(&self) -> SphericalCoord {
        SphericalCoord::new(1.0, self.elevation.to_radians(), self.azimuth.to_radians())
    }
}

/// Broadband clear-sky shortwave components on a horizontal surface, W m⁻².
#[derive(Debug, Clone, Copy, PartialEq)]
struct ShortwaveComponents {
    beam_normal: f32,
    diffuse_horizontal: f32,
    cos_zenith: f32,
}

impl ShortwaveComponents {
    fn global_horizontal(&self) -> f32 {
        self.beam_normal * self.cos_zenith + self.diffuse_horizontal
    }
}

fn day_angle(date: &Date, hour: f32) -> f32 {
    2.0 * PI / 365.0 * (date.julian_day() as f32 - 1.0 + (hour - 12.0) / 24.0)
}

fn declination(g: f32) -> f32 {
    0.006_918 - 0.399_912 * g.cos() + 0.070_257 * g.sin() - 0.006_758 * (2.0 * g).cos()
        + 0.000_907 * (2.0 * g).sin()
        - 0.002_697 * (3.0 * g).cos()
        + 0.001_48 * (3.0 * g).sin()
}

/// Equation of time in minutes.
fn equation_of_time(g: f32) -> f32 {
    229.18
        * (0.000_075 + 0.001_868 * g.cos()
            - 0.032_077 * g.sin()
            - 0.014_615 * (2.0 * g).cos()
            - 0.040_849 * (2.0 * g).sin())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    location: Location,
}

impl SolarPosition {
    pub fn new(location: Location) -> Self {
        Self { location }
    }

    /// Uses the location currently stored in the context.
    pub fn from_context(context: &Context) -> Self {
        Self::new(context.location())
    }

    /// Validates and uses explicit coordinates (degrees, longitude east positive).
    pub fn with_coordinates(utc_offset: f32, latitude_deg: f32, longitude_deg: f32) -> Result<Self> {
        Ok(Self::new(Location::new(latitude_deg, longitude_deg, utc_offset)?))
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Offset (hours) from local standard time to apparent solar time.
    fn solar_time_correction(&self, g: f32) -> f32 {
        (4.0 * (self.location.longitude_deg - 15.0 * self.location.utc_offset) + equation_of_time(g)) / 60.0
    }

    pub fn angles_at(&self, date: &Date, time: &Time) -> SunAngles {
        let hour = time.decimal_hour();
        let g = day_angle(date, hour);
        let delta = declination(g);
        let phi = self.location.latitude_deg.to_radians();
        let solar_hour = hour + self.solar_time_correction(g);
        let hour_angle = (15.0 * (solar_hour - 12.0)).to_radians();

        let sin_e = (phi.sin() * delta.sin() + phi.cos() * delta.cos() * hour_angle.cos()).clamp(-1.0, 1.0);
        let elevation = sin_e.asin();
        let denominator = elevation.cos() * phi.cos();
        let azimuth = if denominator.abs() < 1e-6 {
            0.0
        } else {
            let cos_a = ((delta.sin() - sin_e * phi.sin()) / denominator).clamp(-1.0, 1.0);
            let a = cos_a.acos().to_degrees();
            if hour_angle > 0.0 { 360.0 - a } else { a }
        };
        SunAngles {
            elevation: elevation.to_degrees(),
            azimuth,
        }
    }

    /// Sun angles at the context's current date and time.
    pub fn angles(&self, context: &Context) -> SunAngles {
        self.angles_at(&context.date(), &context.time())
    }

    pub fn sun_elevation(&self, context: &Context) -> f32 {
        self.angles(context).elevation
    }

    pub fn sun_zenith(&self, context: &Context) -> f32 {
        self.angles(context).zenith()
    }

    pub fn sun_azimuth(&self, context: &Context) -> f32 {
        self.angles(context).azimuth
    }

    pub fn sun_direction_vector(&self, context: &Context) -> Vec3 {
        self.angles(context).direction()
    }

    pub fn sun_direction_spherical(&self, context: &Context) -> SphericalCoord {
        self.angles(context).spherical()
    }

    fn shortwave(&self, context: &Context, atmosphere: &AtmosphericConditions) -> Result<ShortwaveComponents> {
        atmosphere.validate()?;
        let angles = self.angles(context);
        let cos_zenith = angles.zenith().to_radians().cos();
        if angles.elevation <= 0.0 {
            return Ok(ShortwaveComponents {
                beam_normal: 0.0,
                diffuse_horizontal: 0.0,
                cos_zenith: 0.0,
            });
        }
        let zenith_deg = angles.zenith();
        let air_mass = 1.0 / (cos_zenith + 0.505_72 * (96.079_95 - zenith_deg).powf(-1.6364));
        let m = air_mass * atmosphere.pressure / STANDARD_PRESSURE;

        let tau_rayleigh = (-0.0903 * m.powf(0.84) * (1.0 + m - m.powf(1.01))).exp();
        let wm = atmosphere.precipitable_water() * air_mass;
        let absorbed_water = 2.4959 * wm / ((1.0 + 79.034 * wm).powf(0.6828) + 6.385 * wm);
        let tau_water = 1.0 - absorbed_water;
        let t = atmosphere.turbidity;
        let tau_aerosol = (-(t.powf(0.873)) * (1.0 + t - t.powf(0.7088)) * air_mass.powf(0.9108)).exp();

        let doy = context.date().julian_day() as f32;
        let extraterrestrial = SOLAR_CONSTANT * (1.0 + 0.033 * (2.0 * PI * doy / 365.0).cos());
        let beam_normal = extraterrestrial * 0.9662 * tau_rayleigh * tau_water * tau_aerosol;
        let diffuse_horizontal = extraterrestrial * cos_zenith * 0.79 * tau_water
            * (0.5 * (1.0 - tau_rayleigh) + 0.84 * (1.0 - tau_aerosol))
            / (1.0 - air_mass + air_mass.powf(1.02));
        debug!(beam_normal, diffuse_horizontal, "Computed clear-sky shortwave flux.");
        Ok(ShortwaveComponents {
            beam_normal: beam_normal.max(0.0),
            diffuse_horizontal: diffuse_horizontal.max(0.0),
            cos_zenith,
        })
    }

    /// Global horizontal shortwave flux (W m⁻²): the direct beam projected onto a
    /// horizontal surface plus diffuse sky radiation.
    pub fn solar_flux(&self, context: &Context, atmosphere: &AtmosphericConditions) -> Result<f32> {
        Ok(self.shortwave(context, atmosphere)?.global_horizontal())
    }

    pub fn solar_flux_par(&self, context: &Context, atmosphere: &AtmosphericConditions) -> Result<f32> {
        Ok(self.solar_flux(context, atmosphere)? * PAR_FRACTION)
    }

    pub fn solar_flux_nir(&self, context: &Context, atmosphere: &AtmosphericConditions) -> Result<f32> {
        Ok(self.solar_flux(context, atmosphere)? * (1.0 - PAR_FRACTION))
    }

    /// Diffuse share of global horizontal irradiance; 1 when the sun is down.
    pub fn diffuse_fraction(&self, context: &Context, atmosphere: &AtmosphericConditions) -> Result<f32> {
        let sw = self.shortwave(context, atmosphere)?;
        let global = sw.global_horizontal();
        if global <= 0.0 {
            return Ok(1.0);
        }
        Ok((sw.diffuse_horizontal / global).clamp(0.0, 1.0))
    }

    /// Incoming clear-sky longwave flux (W m⁻²) for air temperature (K) and relative humidity.
    pub fn ambient_longwave_flux(&self, temperature: f32, humidity: f32) -> Result<f32> {
        AtmosphericConditions {
            temperature,
            humidity,
            ..AtmosphericConditions::default()
        }
        .validate()?;
        let vapor_hpa = humidity * saturation_vapor_pressure(temperature) / 100.0;
        let w = 46.5 * vapor_hpa / temperature;
        let emissivity = 1.0 - (1.0 + w) * (-(1.2 + 3.0 * w).sqrt()).exp();
        Ok(emissivity * STEFAN_BOLTZMANN * temperature.powi(4))
    }

    fn horizon_crossing(&self, date: &Date, rising: bool) -> Result<Time> {
        let g = day_angle(date, 12.0);
        let delta = declination(g);
        let phi = self.location.latitude_deg.to_radians();
        let cos_h0 = -phi.tan() * delta.tan();
        if !(-1.0..=1.0).contains(&cos_h0) {
            return Err(SolarPositionError::NoSunrise {
                date: *date,
                latitude: self.location.latitude_deg,
            });
        }
        let h0 = cos_h0.acos().to_degrees() / 15.0;
        let solar_hour = if rising { 12.0 - h0 } else { 12.0 + h0 };
        let local = (solar_hour - self.solar_time_correction(g)).rem_euclid(24.0);
        let total_minutes = (local * 60.0).round() as u32 % (24 * 60);
        Ok(Time::new(total_minutes / 60, total_minutes % 60, 0)?)
    }

    pub fn sunrise_time(&self, context: &Context) -> Result<Time> {
        self.horizon_crossing(&context.date(), true)
    }

    pub fn sunset_time(&self, context: &Context) -> Result<Time> {
        self.horizon_crossing(&context.date(), false)
    }
}
