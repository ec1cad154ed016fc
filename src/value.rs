//! Cell values and calendar-date normalisation.
//!
//! Spreadsheet exports mix representations inside one column: real dates,
//! timestamps, day-number serials and free text. Every loaded cell becomes a
//! [`CellValue`], and [`CellValue::to_date`] is the one place that decides
//! whether a cell denotes a calendar date.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use polars::prelude::{AnyValue, TimeUnit};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Days between 0001-01-01 (CE) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Largest spreadsheet serial that still maps to a four-digit year (9999-12-31).
const MAX_SPREADSHEET_SERIAL: f64 = 2_958_465.0;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

/// A single dataset cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Convert a polars cell into a `CellValue`.
    pub fn from_any_value(value: &AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => CellValue::Null,
            AnyValue::Boolean(b) => CellValue::Boolean(*b),
            AnyValue::String(s) => CellValue::Text((*s).to_string()),
            AnyValue::StringOwned(s) => CellValue::Text(s.to_string()),
            AnyValue::Int32(v) => CellValue::Integer(i64::from(*v)),
            AnyValue::Int64(v) => CellValue::Integer(*v),
            AnyValue::UInt32(v) => CellValue::Integer(i64::from(*v)),
            AnyValue::UInt64(v) => match i64::try_from(*v) {
                Ok(v) => CellValue::Integer(v),
                Err(_) => CellValue::Text(v.to_string()),
            },
            AnyValue::Float32(v) => CellValue::Float(f64::from(*v)),
            AnyValue::Float64(v) => CellValue::Float(*v),
            AnyValue::Date(days) => days
                .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .map(CellValue::Date)
                .unwrap_or(CellValue::Null),
            AnyValue::Datetime(v, unit, tz) => datetime_from_epoch(*v, *unit, tz.as_deref())
                .map(CellValue::DateTime)
                .unwrap_or(CellValue::Null),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Normalise the cell to a calendar date, ignoring any time of day.
    ///
    /// Returns `None` when the cell does not denote a date; callers treat
    /// that as "this row cannot match" rather than as an error.
    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::DateTime(dt) => Some(dt.date()),
            CellValue::Integer(serial) => date_from_serial(*serial as f64),
            CellValue::Float(serial) => date_from_serial(*serial),
            CellValue::Text(s) => parse_date_text(s),
            CellValue::Null | CellValue::Boolean(_) => None,
        }
    }

    /// String form used for identifier and category comparison.
    ///
    /// Text is returned verbatim (no trimming, no case folding). Integral
    /// floats lose their fractional part so `12345.0` compares as `12345`.
    pub fn as_key(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Integer(v) => Some(v.to_string()),
            CellValue::Float(v) => Some(format_float(*v)),
            CellValue::Boolean(b) => Some(b.to_string()),
            CellValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            CellValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    /// Text shown to the user; nulls render as an empty string.
    pub fn display(&self) -> String {
        self.as_key().unwrap_or_default()
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}

fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Wall-clock time of an epoch timestamp in the column's zone (UTC when the
/// column has none), matching how offset-carrying text is read.
fn datetime_from_epoch(value: i64, unit: TimeUnit, zone: Option<&str>) -> Option<NaiveDateTime> {
    let per_second: i64 = match unit {
        TimeUnit::Nanoseconds => 1_000_000_000,
        TimeUnit::Microseconds => 1_000_000,
        TimeUnit::Milliseconds => 1_000,
    };
    let secs = value.div_euclid(per_second);
    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
    let instant = DateTime::from_timestamp(secs, nanos as u32)?;
    Some(local_wall_clock(instant, zone))
}

fn local_wall_clock(instant: DateTime<Utc>, zone: Option<&str>) -> NaiveDateTime {
    let Some(zone) = zone else {
        return instant.naive_utc();
    };
    if let Ok(tz) = zone.parse::<Tz>() {
        return instant.with_timezone(&tz).naive_local();
    }
    if let Ok(offset) = zone.parse::<FixedOffset>() {
        return instant.with_timezone(&offset).naive_local();
    }
    debug!(zone, "Unknown time zone on datetime column, reading it as UTC");
    instant.naive_utc()
}

/// Spreadsheet day serial: day 0 is 1899-12-30, fractions are time of day.
fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 || serial > MAX_SPREADSHEET_SERIAL {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_days(Days::new(serial.floor() as u64))
}

fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }

    // Offsets are kept as written: the calendar date is the one in the source's own zone.
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.naive_local().date())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_text_dates_in_supported_layouts() {
        let expected = ymd(2022, 3, 15);
        for raw in [
            "2022-03-15",
            "15/03/2022",
            "2022/03/15",
            "2022-03-15 08:30:00",
            "2022-03-15T08:30:00",
            "2022-03-15 08:30:00.250",
            "15/03/2022 08:30",
            "2022-03-15T23:30:00-03:00",
            "  2022-03-15  ",
        ] {
            assert_eq!(CellValue::text(raw).to_date(), Some(expected), "input {:?}", raw);
        }
    }

    #[test]
    fn test_unparseable_text_is_not_a_date() {
        for raw in ["", "   ", "n/a", "15-03-2022", "31/02/2022", "março 2022"] {
            assert_eq!(CellValue::text(raw).to_date(), None, "input {:?}", raw);
        }
    }

    #[test]
    fn test_datetime_ignores_time_of_day() {
        let dt = ymd(2022, 3, 15).and_hms_opt(23, 59, 59).unwrap();
        assert_eq!(CellValue::DateTime(dt).to_date(), Some(ymd(2022, 3, 15)));
    }

    #[test]
    fn test_spreadsheet_serials() {
        // 44635 is 2022-03-15 in spreadsheet day numbering
        assert_eq!(CellValue::Integer(44635).to_date(), Some(ymd(2022, 3, 15)));
        assert_eq!(CellValue::Float(44635.75).to_date(), Some(ymd(2022, 3, 15)));
        assert_eq!(CellValue::Integer(-1).to_date(), None);
        assert_eq!(CellValue::Float(f64::NAN).to_date(), None);
        assert_eq!(CellValue::Float(1e12).to_date(), None);
    }

    #[test]
    fn test_null_and_boolean_are_not_dates() {
        assert_eq!(CellValue::Null.to_date(), None);
        assert_eq!(CellValue::Boolean(true).to_date(), None);
    }

    #[test]
    fn test_keys_keep_text_verbatim() {
        assert_eq!(CellValue::text("00123").as_key().as_deref(), Some("00123"));
        assert_eq!(CellValue::text(" 123").as_key().as_deref(), Some(" 123"));
        assert_eq!(CellValue::Integer(12345).as_key().as_deref(), Some("12345"));
        assert_eq!(CellValue::Float(12345.0).as_key().as_deref(), Some("12345"));
        assert_eq!(CellValue::Float(1.5).as_key().as_deref(), Some("1.5"));
        assert_eq!(CellValue::Null.as_key(), None);
        assert_eq!(CellValue::Null.display(), "");
    }

    #[test]
    fn test_from_any_value() {
        assert_eq!(CellValue::from_any_value(&AnyValue::Null), CellValue::Null);
        assert_eq!(
            CellValue::from_any_value(&AnyValue::String("RE-01")),
            CellValue::text("RE-01")
        );
        assert_eq!(CellValue::from_any_value(&AnyValue::Int64(7)), CellValue::Integer(7));
        // 19066 days after the epoch
        assert_eq!(
            CellValue::from_any_value(&AnyValue::Date(19066)),
            CellValue::Date(ymd(2022, 3, 15))
        );
        let millis = ymd(2022, 3, 15)
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        let tz = None;
        assert_eq!(
            CellValue::from_any_value(&AnyValue::Datetime(millis, TimeUnit::Milliseconds, &tz))
                .to_date(),
            Some(ymd(2022, 3, 15))
        );
    }

    #[test]
    fn test_zoned_datetime_keeps_local_date() {
        // 2022-03-15 23:30 in Sao Paulo (-03:00) is 2022-03-16 02:30 UTC.
        let millis = ymd(2022, 3, 16)
            .and_hms_opt(2, 30, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        let zoned = |zone: Option<&str>| {
            let tz = zone.map(str::to_string);
            CellValue::from_any_value(&AnyValue::Datetime(millis, TimeUnit::Milliseconds, &tz))
        };

        assert_eq!(zoned(Some("America/Sao_Paulo")).to_date(), Some(ymd(2022, 3, 15)));
        assert_eq!(
            zoned(Some("America/Sao_Paulo")).to_date(),
            CellValue::text("2022-03-15T23:30:00-03:00").to_date()
        );
        assert_eq!(zoned(Some("-03:00")).to_date(), Some(ymd(2022, 3, 15)));
        assert_eq!(zoned(Some("UTC")).to_date(), Some(ymd(2022, 3, 16)));
        assert_eq!(zoned(None).to_date(), Some(ymd(2022, 3, 16)));
        assert_eq!(zoned(Some("Not/AZone")).to_date(), Some(ymd(2022, 3, 16)));
    }
}
