use super::error::{ContextError, Result};
use std::fmt;

/// Calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl Date {
    pub fn new(day: u32, month: u32, year: i32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ContextError::invalid(format!(
                "month {month} is out of range [1, 12]"
            )));
        }
        if year < 1 {
            return Err(ContextError::invalid(format!("year {year} must be positive")));
        }
        let max_day = days_in_month(year, month);
        if day == 0 || day > max_day {
            return Err(ContextError::invalid(format!(
                "day {day} is out of range [1, {max_day}] for {year}-{month:02}"
            )));
        }
        Ok(Self { year, month, day })
    }

    /// Builds a date from a day of year (1-based).
    pub fn from_day_of_year(day_of_year: u32, year: i32) -> Result<Self> {
        let length = if is_leap_year(year) { 366 } else { 365 };
        if day_of_year == 0 || day_of_year > length {
            return Err(ContextError::invalid(format!(
                "day of year {day_of_year} is out of range [1, {length}]"
            )));
        }
        let mut remaining = day_of_year;
        for month in 1..=12 {
            let days = days_in_month(year, month);
            if remaining <= days {
                return Date::new(remaining, month, year);
            }
            remaining -= days;
        }
        Err(ContextError::invalid("day of year conversion failed"))
    }

    /// Day of year, 1 for January 1st.
    pub fn julian_day(&self) -> u32 {
        (1..self.month)
            .map(|m| days_in_month(self.year, m))
            .sum::<u32>()
            + self.day
    }

    /// Days since 1970-01-01 in the proleptic Gregorian calendar.
    pub(crate) fn days_since_epoch(&self) -> i64 {
        let y = i64::from(self.year) - i64::from(self.month <= 2);
        let era = y.div_euclid(400);
        let yoe = y - era * 400;
        let m = i64::from(self.month);
        let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(self.day) - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        era * 146_097 + doe - 719_468
    }
}

impl Default for Date {
    fn default() -> Self {
        Self {
            year: 2000,
            month: 1,
            day: 1,
        }
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Local standard time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Time {
    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(ContextError::invalid(format!(
                "time {hour:02}:{minute:02}:{second:02} is not a valid time of day"
            )));
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    pub fn seconds_of_day(&self) -> u32 {
        self.hour * 3600 + self.minute * 60 + self.second
    }

    /// Fractional hour of day.
    pub fn decimal_hour(&self) -> f32 {
        self.seconds_of_day() as f32 / 3600.0
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Geographic location of the scene. Longitude is positive east of Greenwich;
/// the UTC offset is in hours (negative west).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude_deg: f32,
    pub longitude_deg: f32,
    pub utc_offset: f32,
}

impl Location {
    pub fn new(latitude_deg: f32, longitude_deg: f32, utc_offset: f32) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude_deg) {
            return Err(ContextError::invalid(format!(
                "latitude {latitude_deg} is out of range [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude_deg) {
            return Err(ContextError::invalid(format!(
                "longitude {longitude_deg} is out of range [-180, 180]"
            )));
        }
        if !(-12.0..=14.0).contains(&utc_offset) {
            return Err(ContextError::invalid(format!(
                "UTC offset {utc_offset} is out of range [-12, 14]"
            )));
        }
        Ok(Self {
            latitude_deg,
            longitude_deg,
            utc_offset,
        })
    }
}

impl Default for Location {
    /// Davis, California.
    fn default() -> Self {
        Self {
            latitude_deg: 38.55,
            longitude_deg: -121.76,
            utc_offset: -8.0,
        }
    }
}

/// Seconds since the epoch for a date/time pair; the ordering key of timeseries points.
pub(crate) fn timestamp(date: &Date, time: &Time) -> f64 {
    date.days_since_epoch() as f64 * 86_400.0 + f64::from(time.seconds_of_day())
}

/// A time-ordered sequence of scalar observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeseries {
    points: Vec<(Date, Time, f32)>,
}

impl Timeseries {
    /// Inserts a point, keeping the series sorted. A point at an existing
    /// timestamp replaces the previous value.
    pub fn insert(&mut self, date: Date, time: Time, value: f32) {
        let key = timestamp(&date, &time);
        match self
            .points
            .binary_search_by(|(d, t, _)| timestamp(d, t).total_cmp(&key))
        {
            Ok(index) => self.points[index].2 = value,
            Err(index) => self.points.insert(index, (date, time, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<(Date, Time, f32)> {
        self.points.get(index).copied()
    }

    /// Linearly interpolated value at `date`/`time`, clamped to the first and
    /// last points outside the recorded range.
    pub fn query(&self, date: &Date, time: &Time) -> Option<f32> {
        let (first, last) = (self.points.first()?, self.points.last()?);
        let key = timestamp(date, time);
        let t0 = timestamp(&first.0, &first.1);
        if key <= t0 {
            return Some(first.2);
        }
        if key >= timestamp(&last.0, &last.1) {
            return Some(last.2);
        }
        let upper = self
            .points
            .partition_point(|(d, t, _)| timestamp(d, t) <= key);
        let (d0, tm0, v0) = self.points[upper - 1];
        let (d1, tm1, v1) = self.points[upper];
        let (a, b) = (timestamp(&d0, &tm0), timestamp(&d1, &tm1));
        let w = ((key - a) / (b - a)) as f32;
        Some(v0 + (v1 - v0) * w)
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_approx_equal(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn julian_day_accounts_for_leap_years() {
        assert_eq!(Date::new(1, 3, 2020).unwrap().julian_day(), 61);
        assert_eq!(Date::new(1, 3, 2021).unwrap().julian_day(), 60);
        assert_eq!(Date::new(31, 12, 2021).unwrap().julian_day(), 365);
        assert_eq!(Date::from_day_of_year(61, 2020).unwrap(), Date::new(1, 3, 2020).unwrap());
    }

    #[test]
    fn invalid_dates_and_times_are_rejected() {
        assert!(Date::new(29, 2, 2021).is_err());
        assert!(Date::new(1, 13, 2021).is_err());
        assert!(Time::new(24, 0, 0).is_err());
        assert!(Location::new(91.0, 0.0, 0.0).is_err());
        assert!(Location::new(0.0, 0.0, 15.0).is_err());
    }

    #[test]
    fn epoch_day_count_matches_known_values() {
        assert_eq!(Date::new(1, 1, 1970).unwrap().days_since_epoch(), 0);
        assert_eq!(Date::new(1, 1, 2000).unwrap().days_since_epoch(), 10_957);
    }

    mod timeseries {
        use super::*;

        fn series() -> Timeseries {
            let date = Date::new(1, 6, 2021).unwrap();
            let mut ts = Timeseries::default();
            ts.insert(date, Time::new(12, 0, 0).unwrap(), 20.0);
            ts.insert(date, Time::new(10, 0, 0).unwrap(), 10.0);
            ts
        }

        #[test]
        fn points_are_kept_in_time_order() {
            let ts = series();
            assert_eq!(ts.len(), 2);
            assert_eq!(ts.point(0).unwrap().2, 10.0);
        }

        #[test]
        fn query_interpolates_between_points() {
            let ts = series();
            let date = Date::new(1, 6, 2021).unwrap();
            let v = ts.query(&date, &Time::new(11, 0, 0).unwrap()).unwrap();
            assert!(f32_approx_equal(v, 15.0));
        }

        #[test]
        fn query_clamps_outside_the_range() {
            let ts = series();
            let date = Date::new(1, 6, 2021).unwrap();
            assert_eq!(ts.query(&date, &Time::new(6, 0, 0).unwrap()), Some(10.0));
            assert_eq!(ts.query(&date, &Time::new(18, 0, 0).unwrap()), Some(20.0));
            assert_eq!(Timeseries::default().query(&date, &Time::default()), None);
        }

        #[test]
        fn inserting_an_existing_timestamp_replaces_the_value() {
            let mut ts = series();
            let date = Date::new(1, 6, 2021).unwrap();
            ts.insert(date, Time::new(10, 0, 0).unwrap(), 12.0);
            assert_eq!(ts.len(), 2);
            assert_eq!(ts.point(0).unwrap().2, 12.0);
        }
    }
}
