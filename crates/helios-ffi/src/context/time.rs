use crate::buffer::{c_str, out_array};
use crate::error::FfiError;
use crate::handle::{context_mut, context_ref};
use helios::core::context::{Context, Date, Location, Time};
use std::ffi::c_char;

fn date_time(day: u32, month: u32, year: i32, hour: u32, minute: u32, second: u32) -> Result<(Date, Time), FfiError> {
    Ok((Date::new(day, month, year)?, Time::new(hour, minute, second)?))
}

exports! {
    fn setDate(context: *mut Context, day: u32, month: u32, year: i32) -> () = () => {
        let date = Date::new(day, month, year)?;
        context_mut(context)?.set_date(date);
        Ok(())
    }

    /// Writes `[day, month, year]`.
    fn getDate(context: *const Context, date: *mut i32) -> () = () => {
        let out = out_array::<3, i32>(date, "date")?;
        let current = context_ref(context)?.date();
        *out = [current.day as i32, current.month as i32, current.year];
        Ok(())
    }

    fn setTime(context: *mut Context, hour: u32, minute: u32, second: u32) -> () = () => {
        let time = Time::new(hour, minute, second)?;
        context_mut(context)?.set_time(time);
        Ok(())
    }

    /// Writes `[hour, minute, second]`.
    fn getTime(context: *const Context, time: *mut u32) -> () = () => {
        let out = out_array::<3, u32>(time, "time")?;
        let current = context_ref(context)?.time();
        *out = [current.hour, current.minute, current.second];
        Ok(())
    }

    fn getJulianDay(context: *const Context) -> u32 = 0 => {
        Ok(context_ref(context)?.julian_day())
    }

    /// Latitude and longitude in degrees (longitude positive east), UTC
    /// offset in hours within [-12, 14].
    fn setLocation(context: *mut Context, latitude: f32, longitude: f32, utc_offset: f32) -> () = () => {
        let location = Location::new(latitude, longitude, utc_offset)?;
        context_mut(context)?.set_location(location);
        Ok(())
    }

    /// Writes `[latitude, longitude, utc_offset]`.
    fn getLocation(context: *const Context, location: *mut f32) -> () = () => {
        let out = out_array::<3, f32>(location, "location")?;
        let current = context_ref(context)?.location();
        *out = [current.latitude_deg, current.longitude_deg, current.utc_offset];
        Ok(())
    }

    fn addTimeseriesData(
        context: *mut Context,
        label: *const c_char,
        value: f32,
        day: u32,
        month: u32,
        year: i32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> () = () => {
        let context = context_mut(context)?;
        let label = c_str(label, "label")?;
        let (date, time) = date_time(day, month, year, hour, minute, second)?;
        context.add_timeseries_data(label, value, date, time);
        Ok(())
    }

    /// Value of `label` at the given instant, interpolated linearly between the
    /// bracketing points and clamped to the first and last points.
    fn queryTimeseriesData(
        context: *const Context,
        label: *const c_char,
        day: u32,
        month: u32,
        year: i32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> f32 = 0.0 => {
        let context = context_ref(context)?;
        let label = c_str(label, "label")?;
        let (date, time) = date_time(day, month, year, hour, minute, second)?;
        Ok(context.query_timeseries_data(label, &date, &time)?)
    }

    fn queryTimeseriesDataCurrent(context: *const Context, label: *const c_char) -> f32 = 0.0 => {
        let context = context_ref(context)?;
        Ok(context.query_timeseries_data_current(c_str(label, "label")?)?)
    }

    fn getTimeseriesLength(context: *const Context, label: *const c_char) -> usize = 0 => {
        let context = context_ref(context)?;
        Ok(context.timeseries_length(c_str(label, "label")?)?)
    }

    fn doesTimeseriesVariableExist(context: *const Context, label: *const c_char) -> bool = false => {
        let context = context_ref(context)?;
        Ok(context.does_timeseries_variable_exist(c_str(label, "label")?))
    }

    /// Moves the context date and time to the `index`-th point of `label`.
    fn setCurrentTimeseriesPoint(context: *mut Context, label: *const c_char, index: usize) -> () = () => {
        let context = context_mut(context)?;
        context.set_current_timeseries_point(c_str(label, "label")?, index)?;
        Ok(())
    }

    fn seedRandomGenerator(context: *mut Context, seed: u64) -> () = () => {
        context_mut(context)?.seed_random_generator(seed);
        Ok(())
    }

    /// Uniform sample in `[0, 1)` from the context generator.
    fn randu(context: *mut Context) -> f32 = 0.0 => {
        Ok(context_mut(context)?.randu())
    }

    fn randuRange(context: *mut Context, min: f32, max: f32) -> f32 = 0.0 => {
        Ok(context_mut(context)?.randu_range(min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    #[test]
    fn date_time_and_location_round_trip() {
        let ctx = TestContext::new();
        setDate(ctx.0, 15, 6, 2023);
        let mut date = [0; 3];
        getDate(ctx.0, date.as_mut_ptr());
        assert_eq!(date, [15, 6, 2023]);
        assert_eq!(getJulianDay(ctx.0), 166);

        setTime(ctx.0, 13, 30, 5);
        let mut time = [0; 3];
        getTime(ctx.0, time.as_mut_ptr());
        assert_eq!(time, [13, 30, 5]);

        setLocation(ctx.0, 40.0, -105.0, -7.0);
        let mut location = [0.0; 3];
        getLocation(ctx.0, location.as_mut_ptr());
        assert_eq!(location, [40.0, -105.0, -7.0]);
        assert_eq!(last_code(), 0);
    }

    #[test]
    fn invalid_calendar_values_are_rejected() {
        let ctx = TestContext::new();
        setDate(ctx.0, 30, 2, 2023);
        assert_eq!(last_code(), 1);
        setTime(ctx.0, 24, 0, 0);
        assert_eq!(last_code(), 1);
        setLocation(ctx.0, 10.0, 10.0, 15.0);
        assert_eq!(last_code(), 1);
        setLocation(ctx.0, 95.0, 10.0, 0.0);
        assert_eq!(last_code(), 1);
        getDate(ctx.0, ptr::null_mut());
        assert_eq!(last_code(), 1);
    }

    #[test]
    fn timeseries_interpolates_and_clamps() {
        let ctx = TestContext::new();
        let label = CString::new("air_temperature").unwrap();
        addTimeseriesData(ctx.0, label.as_ptr(), 10.0, 1, 7, 2024, 12, 0, 0);
        addTimeseriesData(ctx.0, label.as_ptr(), 20.0, 1, 7, 2024, 14, 0, 0);

        assert!(doesTimeseriesVariableExist(ctx.0, label.as_ptr()));
        assert_eq!(getTimeseriesLength(ctx.0, label.as_ptr()), 2);
        let mid = queryTimeseriesData(ctx.0, label.as_ptr(), 1, 7, 2024, 13, 0, 0);
        assert!((mid - 15.0).abs() < 1e-4);
        assert_eq!(queryTimeseriesData(ctx.0, label.as_ptr(), 1, 7, 2024, 8, 0, 0), 10.0);
        assert_eq!(queryTimeseriesData(ctx.0, label.as_ptr(), 2, 7, 2024, 8, 0, 0), 20.0);

        setCurrentTimeseriesPoint(ctx.0, label.as_ptr(), 1);
        let mut time = [0; 3];
        getTime(ctx.0, time.as_mut_ptr());
        assert_eq!(time, [14, 0, 0]);
        assert_eq!(queryTimeseriesDataCurrent(ctx.0, label.as_ptr()), 20.0);

        setCurrentTimeseriesPoint(ctx.0, label.as_ptr(), 5);
        assert_eq!(last_code(), 1);
    }

    #[test]
    fn missing_timeseries_is_a_runtime_error() {
        let ctx = TestContext::new();
        let label = CString::new("wind_speed").unwrap();
        assert!(!doesTimeseriesVariableExist(ctx.0, label.as_ptr()));
        assert_eq!(getTimeseriesLength(ctx.0, label.as_ptr()), 0);
        assert_eq!(last_code(), 7);
        assert!(last_message().contains("wind_speed"));
    }

    #[test]
    fn seeded_generator_repeats() {
        let ctx = TestContext::new();
        seedRandomGenerator(ctx.0, 42);
        let first: Vec<f32> = (0..4).map(|_| randu(ctx.0)).collect();
        seedRandomGenerator(ctx.0, 42);
        let second: Vec<f32> = (0..4).map(|_| randu(ctx.0)).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|v| (0.0..1.0).contains(v)));

        let ranged = randuRange(ctx.0, 5.0, 6.0);
        assert!((5.0..6.0).contains(&ranged));
    }
}
