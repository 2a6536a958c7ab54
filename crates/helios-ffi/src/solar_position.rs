//! Sun position and clear-sky fluxes. The date and time are read from the
//! context at each call; the location is fixed when the handle is created.

use helios::core::context::Context;
use std::ptr;

#[cfg(feature = "solarposition")]
use {
    crate::buffer::out_array,
    crate::error::FfiError,
    crate::handle::{PluginHandle, destroy, handle_ref},
    helios::core::context::Time,
    helios::plugins::solar_position::{AtmosphericConditions, SolarPosition},
};

plugin_handle!("solarposition", SolarPositionHandle = PluginHandle<SolarPosition>);

#[cfg(feature = "solarposition")]
fn solar<'a>(handle: *const SolarPositionHandle) -> Result<&'a SolarPositionHandle, FfiError> {
    handle_ref(handle, "SolarPosition")
}

#[cfg(feature = "solarposition")]
fn atmosphere(pressure: f32, temperature: f32, humidity: f32, turbidity: f32) -> AtmosphericConditions {
    AtmosphericConditions {
        pressure,
        temperature,
        humidity,
        turbidity,
    }
}

#[cfg(feature = "solarposition")]
fn write_time(time: Time, out: *mut u32) -> Result<(), FfiError> {
    *out_array::<3, u32>(out, "time")? = [time.hour, time.minute, time.second];
    Ok(())
}

plugin_exports! { "solarposition";
    /// Uses the location stored in the context.
    fn createSolarPosition(context: *mut Context) -> *mut SolarPositionHandle = ptr::null_mut() => {
        let location = crate::handle::context_ref(context)?.location();
        PluginHandle::create(context, SolarPosition::new(location))
    }

    /// Explicit location: UTC offset in hours, latitude and longitude in degrees.
    fn createSolarPositionWithCoordinates(
        context: *mut Context,
        utc_offset: f32,
        latitude: f32,
        longitude: f32,
    ) -> *mut SolarPositionHandle = ptr::null_mut() => {
        let position = SolarPosition::with_coordinates(utc_offset, latitude, longitude)?;
        PluginHandle::create(context, position)
    }

    fn destroySolarPosition(position: *mut SolarPositionHandle) -> () = () => {
        destroy(position);
        Ok(())
    }

    /// Degrees above the horizon.
    fn getSunElevation(position: *const SolarPositionHandle) -> f32 = 0.0 => {
        let handle = solar(position)?;
        Ok(handle.model_ref().sun_elevation(handle.context()))
    }

    fn getSunZenith(position: *const SolarPositionHandle) -> f32 = 0.0 => {
        let handle = solar(position)?;
        Ok(handle.model_ref().sun_zenith(handle.context()))
    }

    /// Degrees clockwise from north.
    fn getSunAzimuth(position: *const SolarPositionHandle) -> f32 = 0.0 => {
        let handle = solar(position)?;
        Ok(handle.model_ref().sun_azimuth(handle.context()))
    }

    /// Writes the unit vector pointing toward the sun.
    fn getSunDirectionVector(position: *const SolarPositionHandle, direction: *mut f32) -> () = () => {
        let out = out_array::<3, f32>(direction, "direction")?;
        let handle = solar(position)?;
        let v = handle.model_ref().sun_direction_vector(handle.context());
        *out = [v.x, v.y, v.z];
        Ok(())
    }

    /// Writes `[radius, elevation, azimuth]` (radians) of the sun direction.
    fn getSunDirectionSpherical(position: *const SolarPositionHandle, direction: *mut f32) -> () = () => {
        let out = out_array::<3, f32>(direction, "direction")?;
        let handle = solar(position)?;
        let s = handle.model_ref().sun_direction_spherical(handle.context());
        *out = [s.radius, s.elevation, s.azimuth];
        Ok(())
    }

    /// Global horizontal clear-sky shortwave flux, W m⁻². Pressure in Pa,
    /// temperature in K, relative humidity 0-1.
    fn getSolarFlux(
        position: *const SolarPositionHandle,
        pressure: f32,
        temperature: f32,
        humidity: f32,
        turbidity: f32,
    ) -> f32 = 0.0 => {
        let handle = solar(position)?;
        let conditions = atmosphere(pressure, temperature, humidity, turbidity);
        Ok(handle.model_ref().solar_flux(handle.context(), &conditions)?)
    }

    fn getSolarFluxPAR(
        position: *const SolarPositionHandle,
        pressure: f32,
        temperature: f32,
        humidity: f32,
        turbidity: f32,
    ) -> f32 = 0.0 => {
        let handle = solar(position)?;
        let conditions = atmosphere(pressure, temperature, humidity, turbidity);
        Ok(handle.model_ref().solar_flux_par(handle.context(), &conditions)?)
    }

    fn getSolarFluxNIR(
        position: *const SolarPositionHandle,
        pressure: f32,
        temperature: f32,
        humidity: f32,
        turbidity: f32,
    ) -> f32 = 0.0 => {
        let handle = solar(position)?;
        let conditions = atmosphere(pressure, temperature, humidity, turbidity);
        Ok(handle.model_ref().solar_flux_nir(handle.context(), &conditions)?)
    }

    fn getDiffuseFraction(
        position: *const SolarPositionHandle,
        pressure: f32,
        temperature: f32,
        humidity: f32,
        turbidity: f32,
    ) -> f32 = 0.0 => {
        let handle = solar(position)?;
        let conditions = atmosphere(pressure, temperature, humidity, turbidity);
        Ok(handle.model_ref().diffuse_fraction(handle.context(), &conditions)?)
    }

    fn getAmbientLongwaveFlux(position: *const SolarPositionHandle, temperature: f32, humidity: f32) -> f32 = 0.0 => {
        Ok(solar(position)?.model_ref().ambient_longwave_flux(temperature, humidity)?)
    }

    /// Writes `[hour, minute, second]` of sunrise in local standard time.
    fn getSunriseTime(position: *const SolarPositionHandle, time: *mut u32) -> () = () => {
        let handle = solar(position)?;
        write_time(handle.model_ref().sunrise_time(handle.context())?, time)
    }

    fn getSunsetTime(position: *const SolarPositionHandle, time: *mut u32) -> () = () => {
        let handle = solar(position)?;
        write_time(handle.model_ref().sunset_time(handle.context())?, time)
    }
}

#[cfg(all(test, feature = "solarposition"))]
mod tests {
    use super::*;
    use crate::context::fixtures::*;
    use crate::context::time::{setDate, setTime};

    struct TestPosition(*mut SolarPositionHandle);

    impl Drop for TestPosition {
        fn drop(&mut self) {
            destroySolarPosition(self.0);
        }
    }

    #[test]
    fn sun_is_overhead_at_equinox_noon_on_the_equator() {
        let ctx = TestContext::new();
        setDate(ctx.0, 20, 3, 2023);
        setTime(ctx.0, 12, 7, 0);
        let sun = TestPosition(createSolarPositionWithCoordinates(ctx.0, 0.0, 0.0, 0.0));
        assert_eq!(last_code(), 0);

        let elevation = getSunElevation(sun.0);
        assert!(elevation > 87.0, "elevation {elevation}");
        assert!((getSunZenith(sun.0) - (90.0 - elevation)).abs() < 1e-4);

        let mut direction = [0.0f32; 3];
        getSunDirectionVector(sun.0, direction.as_mut_ptr());
        assert!(direction[2] > 0.99);
    }

    #[test]
    fn fluxes_follow_the_clock_of_the_context() {
        let ctx = TestContext::new();
        setDate(ctx.0, 21, 6, 2023);
        setTime(ctx.0, 13, 0, 0);
        let sun = TestPosition(createSolarPosition(ctx.0));
        let noon = getSolarFlux(sun.0, 101_325.0, 300.0, 0.5, 0.05);
        let par = getSolarFluxPAR(sun.0, 101_325.0, 300.0, 0.5, 0.05);
        let nir = getSolarFluxNIR(sun.0, 101_325.0, 300.0, 0.5, 0.05);
        assert!(noon > 700.0);
        assert!((par + nir - noon).abs() < 1e-2);

        setTime(ctx.0, 1, 0, 0);
        assert_eq!(getSolarFlux(sun.0, 101_325.0, 300.0, 0.5, 0.05), 0.0);
        assert_eq!(getDiffuseFraction(sun.0, 101_325.0, 300.0, 0.5, 0.05), 1.0);

        getSolarFlux(sun.0, 101_325.0, 300.0, 1.5, 0.05);
        assert_eq!(last_code(), 1);
    }

    #[test]
    fn flux_falls_with_the_cosine_of_a_low_sun() {
        let ctx = TestContext::new();
        setDate(ctx.0, 21, 6, 2023);
        let sun = TestPosition(createSolarPosition(ctx.0));
        setTime(ctx.0, 13, 0, 0);
        let noon = getSolarFlux(sun.0, 101_325.0, 300.0, 0.5, 0.05);
        setTime(ctx.0, 6, 0, 0);
        let low = getSolarFlux(sun.0, 101_325.0, 300.0, 0.5, 0.05);
        let fd = getDiffuseFraction(sun.0, 101_325.0, 300.0, 0.5, 0.05);
        let cos_zenith = getSunZenith(sun.0).to_radians().cos();
        assert!(cos_zenith < 0.4);
        assert!(low > 0.0 && low < 0.4 * noon, "low {low}, noon {noon}");
        let beam_normal = low * (1.0 - fd) / cos_zenith;
        assert!(beam_normal > low);
    }

    #[test]
    fn sunrise_precedes_sunset() {
        let ctx = TestContext::new();
        setDate(ctx.0, 21, 6, 2023);
        let sun = TestPosition(createSolarPosition(ctx.0));
        let (mut rise, mut set) = ([0u32; 3], [0u32; 3]);
        getSunriseTime(sun.0, rise.as_mut_ptr());
        getSunsetTime(sun.0, set.as_mut_ptr());
        assert_eq!(last_code(), 0);
        assert!(rise[0] * 60 + rise[1] < set[0] * 60 + set[1]);

        let lw = getAmbientLongwaveFlux(sun.0, 293.0, 0.6);
        assert!(lw > 0.0);
    }

    #[test]
    fn coordinates_are_range_checked() {
        let ctx = TestContext::new();
        assert!(createSolarPositionWithCoordinates(ctx.0, 0.0, 91.0, 0.0).is_null());
        assert_eq!(last_code(), 1);
        assert!(createSolarPositionWithCoordinates(ctx.0, 20.0, 0.0, 0.0).is_null());
        assert_eq!(last_code(), 1);
        assert_eq!(getSunElevation(ptr::null()), 0.0);
        assert_eq!(last_code(), 1);
    }
}

#[cfg(all(test, not(feature = "solarposition")))]
mod tests {
    use super::*;

    #[test]
    fn compiled_out_group_reports_unavailable() {
        assert!(createSolarPosition(ptr::null_mut()).is_null());
        assert_eq!(crate::error::getLastErrorCode(), 6);
    }
}
