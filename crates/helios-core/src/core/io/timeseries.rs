//! Loading of delimited weather records into context timeseries.
//!
//! Each column is described by a label. The keywords `year`, `month`, `day`,
//! `DOY` (day of year), `hour`, `minute`, `second`, `date` and `time` describe
//! the timestamp of a row, `NULL` skips a column, and any other label names a
//! timeseries variable that receives the column's values.

use crate::core::context::{Context, ContextError, Date, Time};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Field order of a combined `date` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFormat {
    #[default]
    YearMonthDay,
    YearDayMonth,
    DayMonthYear,
    MonthDayYear,
}

impl FromStr for DateFormat {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "YYYYMMDD" => Ok(DateFormat::YearMonthDay),
            "YYYYDDMM" => Ok(DateFormat::YearDayMonth),
            "DDMMYYYY" => Ok(DateFormat::DayMonthYear),
            "MMDDYYYY" => Ok(DateFormat::MonthDayYear),
            other => Err(ContextError::invalid(format!(
                "unknown date format '{other}'; expected YYYYMMDD, YYYYDDMM, DDMMYYYY or MMDDYYYY"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Column {
    Year,
    Month,
    Day,
    DayOfYear,
    Hour,
    Minute,
    Second,
    Date,
    Time,
    Skip,
    Variable(String),
}

impl Column {
    fn from_label(label: &str) -> Self {
        match label {
            "year" => Column::Year,
            "month" => Column::Month,
            "day" => Column::Day,
            "DOY" => Column::DayOfYear,
            "hour" => Column::Hour,
            "minute" => Column::Minute,
            "second" => Column::Second,
            "date" => Column::Date,
            "time" => Column::Time,
            "NULL" => Column::Skip,
            other => Column::Variable(other.to_string()),
        }
    }
}

/// Options of [`Context::load_tabular_timeseries`].
#[derive(Debug, Clone, PartialEq)]
pub struct TabularOptions {
    pub labels: Vec<String>,
    pub delimiter: u8,
    pub date_format: DateFormat,
    pub header_lines: usize,
}

#[derive(Debug, Default)]
struct RowStamp {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    day_of_year: Option<u32>,
    hour: u32,
    minute: u32,
    second: u32,
}

fn split_digits(field: &str) -> Vec<&str> {
    field
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number<T: FromStr>(field: &str, what: &str) -> Result<T, String> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|v| format!("{}", v.trunc()).parse().ok())
        .ok_or_else(|| format!("invalid {what} '{field}'"))
}

impl RowStamp {
    fn apply_date(&mut self, field: &str, format: DateFormat) -> Result<(), String> {
        let parts = split_digits(field);
        let [a, b, c] = parts.as_slice() else {
            return Err(format!("date '{field}' must have three numeric fields"));
        };
        let (y, m, d) = match format {
            DateFormat::YearMonthDay => (a, b, c),
            DateFormat::YearDayMonth => (a, c, b),
            DateFormat::DayMonthYear => (c, b, a),
            DateFormat::MonthDayYear => (c, a, b),
        };
        self.year = Some(parse_number(y, "year")?);
        self.month = Some(parse_number(m, "month")?);
        self.day = Some(parse_number(d, "day")?);
        Ok(())
    }

    fn apply_time(&mut self, field: &str) -> Result<(), String> {
        let parts = split_digits(field);
        match parts.as_slice() {
            [hhmm] if hhmm.len() >= 3 => {
                let value: u32 = parse_number(hhmm, "time")?;
                self.hour = value / 100;
                self.minute = value % 100;
            }
            [h] => self.hour = parse_number(h, "hour")?,
            [h, m] => {
                self.hour = parse_number(h, "hour")?;
                self.minute = parse_number(m, "minute")?;
            }
            [h, m, s, ..] => {
                self.hour = parse_number(h, "hour")?;
                self.minute = parse_number(m, "minute")?;
                self.second = parse_number(s, "second")?;
            }
            [] => return Err(format!("invalid time '{field}'")),
        }
        Ok(())
    }

    fn resolve(&self) -> Result<(Date, Time), String> {
        let year = self.year.ok_or("row has no year")?;
        let date = match (self.month, self.day, self.day_of_year) {
            (Some(month), Some(day), _) => Date::new(day, month, year),
            (_, _, Some(doy)) => Date::from_day_of_year(doy, year),
            _ => return Err("row needs month and day, or a day of year".to_string()),
        }
        .map_err(|e| e.to_string())?;
        let time = Time::new(self.hour, self.minute, self.second).map_err(|e| e.to_string())?;
        Ok((date, time))
    }
}

impl Context {
    /// Reads a delimited text file and appends every variable column to the
    /// timeseries of the same label. Returns the number of rows loaded.
    pub fn load_tabular_timeseries(
        &mut self,
        path: impl AsRef<Path>,
        options: &TabularOptions,
    ) -> Result<usize, ContextError> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();
        if options.labels.is_empty() {
            return Err(ContextError::invalid("at least one column label is required"));
        }
        let columns: Vec<Column> = options.labels.iter().map(|l| Column::from_label(l)).collect();
        if !columns.iter().any(|c| matches!(c, Column::Variable(_))) {
            return Err(ContextError::invalid("no data columns were labelled"));
        }

        let file = std::fs::File::open(path).map_err(|e| ContextError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let mut rows = Vec::new();
        for result in reader.records().skip(options.header_lines) {
            let record = result.map_err(|e| ContextError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            let parse_error = |message: String| ContextError::Parse {
                path: path_str.clone(),
                line,
                message,
            };
            if record.iter().all(str::is_empty) {
                continue;
            }
            if record.len() < columns.len() {
                return Err(parse_error(format!(
                    "expected {} columns, found {}",
                    columns.len(),
                    record.len()
                )));
            }

            let mut stamp = RowStamp::default();
            let mut values = Vec::new();
            for (column, field) in columns.iter().zip(record.iter()) {
                let parsed: Result<(), String> = match column {
                    Column::Year => parse_number(field, "year").map(|v| stamp.year = Some(v)),
                    Column::Month => parse_number(field, "month").map(|v| stamp.month = Some(v)),
                    Column::Day => parse_number(field, "day").map(|v| stamp.day = Some(v)),
                    Column::DayOfYear => {
                        parse_number(field, "day of year").map(|v| stamp.day_of_year = Some(v))
                    }
                    Column::Hour => parse_number(field, "hour").map(|v| stamp.hour = v),
                    Column::Minute => parse_number(field, "minute").map(|v| stamp.minute = v),
                    Column::Second => parse_number(field, "second").map(|v| stamp.second = v),
                    Column::Date => stamp.apply_date(field, options.date_format),
                    Column::Time => stamp.apply_time(field),
                    Column::Skip => Ok(()),
                    Column::Variable(label) => field
                        .parse::<f32>()
                        .map(|v| values.push((label.as_str(), v)))
                        .map_err(|_| format!("invalid value '{field}' for '{label}'")),
                };
                parsed.map_err(parse_error)?;
            }
            let (date, time) = stamp.resolve().map_err(parse_error)?;
            rows.push((date, time, values));
        }

        for (date, time, values) in &rows {
            for (label, value) in values {
                self.add_timeseries_data(label, *value, *date, *time);
            }
        }
        info!(path = %path_str, rows = rows.len(), "Loaded tabular timeseries data.");
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn options(labels: &[&str], delimiter: u8, header_lines: usize) -> TabularOptions {
        TabularOptions {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            delimiter,
            date_format: DateFormat::YearMonthDay,
            header_lines,
        }
    }

    #[test]
    fn loads_date_and_time_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weather.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "date,time,Tair,ignored,RH").unwrap();
        writeln!(file, "2021-06-01,10:00,20.5,x,0.5").unwrap();
        writeln!(file, "2021-06-01,12:00,24.5,y,0.4").unwrap();

        let mut ctx = Context::new();
        let rows = ctx
            .load_tabular_timeseries(&path, &options(&["date", "time", "Tair", "NULL", "RH"], b',', 1))
            .unwrap();
        assert_eq!(rows, 2);
        assert_eq!(ctx.timeseries_length("Tair").unwrap(), 2);
        let date = Date::new(1, 6, 2021).unwrap();
        let mid = ctx
            .query_timeseries_data("Tair", &date, &Time::new(11, 0, 0).unwrap())
            .unwrap();
        assert!((mid - 22.5).abs() < 1e-4);
        assert!(!ctx.does_timeseries_variable_exist("NULL"));
    }

    #[test]
    fn loads_day_of_year_and_hhmm_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weather.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "2020 61 1330 3.2").unwrap();

        let mut ctx = Context::new();
        ctx.load_tabular_timeseries(&path, &options(&["year", "DOY", "time", "wind_speed"], b' ', 0))
            .unwrap();
        ctx.set_current_timeseries_point("wind_speed", 0).unwrap();
        assert_eq!(ctx.date(), Date::new(1, 3, 2020).unwrap());
        assert_eq!(ctx.time(), Time::new(13, 30, 0).unwrap());
    }

    #[test]
    fn bad_value_reports_file_and_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("weather.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "2021,6,1,12,abc").unwrap();

        let mut ctx = Context::new();
        let err = ctx
            .load_tabular_timeseries(&path, &options(&["year", "month", "day", "hour", "T"], b',', 0))
            .unwrap_err();
        assert!(matches!(err, ContextError::Parse { line: 1, .. }));
        assert!(!ctx.does_timeseries_variable_exist("T"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut ctx = Context::new();
        let err = ctx
            .load_tabular_timeseries("/nonexistent/weather.csv", &options(&["date", "T"], b',', 0))
            .unwrap_err();
        assert!(matches!(err, ContextError::Io { .. }));
    }

    #[test]
    fn date_format_keywords_parse() {
        assert_eq!("DDMMYYYY".parse::<DateFormat>().unwrap(), DateFormat::DayMonthYear);
        assert!("YYMMDD".parse::<DateFormat>().is_err());
    }
}
