use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{CodableError, Result};
use crate::handler::{TypeHandler, TypeOptions};
use crate::value::Value;

/// A point in time with millisecond precision. May be invalid.
#[derive(Debug, Clone, Copy)]
pub struct Date {
    millis: f64,
}

/// Largest distance from the epoch a date may have, in milliseconds.
const MAX_MILLIS: f64 = 8.64e15;

impl Date {
    pub fn from_millis(millis: f64) -> Self {
        let valid = millis.is_finite() && millis.abs() <= MAX_MILLIS;
        Date {
            millis: if valid { millis.trunc() } else { f64::NAN },
        }
    }

    pub fn now() -> Self {
        Utc::now().into()
    }

    pub fn invalid() -> Self {
        Date { millis: f64::NAN }
    }

    /// Parses an RFC 3339 timestamp or the six-digit signed year form
    /// (`+010000-01-01T00:00:00.000Z`). Anything else yields an invalid date.
    pub fn parse(s: &str) -> Self {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Date::from_millis(dt.timestamp_millis() as f64);
        }
        parse_expanded_year(s)
            .map(|dt| Date::from_millis(dt.timestamp_millis() as f64))
            .unwrap_or_else(Date::invalid)
    }

    pub fn is_valid(&self) -> bool {
        self.to_datetime().is_some()
    }

    /// Milliseconds since the Unix epoch, `NaN` when invalid.
    pub fn timestamp_millis(&self) -> f64 {
        self.millis
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if !self.millis.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis(self.millis as i64)
    }

    /// `2025-01-01T00:00:00.000Z` form, `None` when invalid. Years outside
    /// 0000-9999 are written with a sign and six digits.
    pub fn to_iso_string(&self) -> Option<String> {
        let dt = self.to_datetime()?;
        let year = dt.year();
        if (0..=9999).contains(&year) {
            return Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        let sign = if year < 0 { '-' } else { '+' };
        Some(format!(
            "{sign}{:06}{}",
            year.unsigned_abs(),
            dt.format("-%m-%dT%H:%M:%S%.3fZ")
        ))
    }
}

/// `±YYYYYY-MM-DDTHH:MM:SS.sssZ`. The month and time are parsed against a
/// leap year so February 29 survives until the real year is applied.
fn parse_expanded_year(s: &str) -> Option<DateTime<Utc>> {
    let sign = match s.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits = s.get(1..7)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = sign * digits.parse::<i32>().ok()?;
    if year == 0 && sign < 0 {
        return None;
    }
    let rest = s.get(7..)?;
    let naive =
        NaiveDateTime::parse_from_str(&format!("2000{rest}"), "%Y-%m-%dT%H:%M:%S%.fZ").ok()?;
    Some(naive.with_year(year)?.and_utc())
}

impl PartialEq for Date {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_valid(), other.is_valid()) {
            (true, true) => self.millis == other.millis,
            (false, false) => true,
            _ => false,
        }
    }
}

impl From<DateTime<Utc>> for Date {
    fn from(dt: DateTime<Utc>) -> Self {
        Date::from_millis(dt.timestamp_millis() as f64)
    }
}

pub(super) fn handler() -> TypeHandler {
    TypeHandler::new(
        "Date",
        |value| value.downcast_ref::<Date>().is_some(),
        |value, _| {
            Ok(value
                .downcast_ref::<Date>()
                .and_then(Date::to_iso_string)
                .map_or(Value::Null, Value::String))
        },
        |payload, _| match payload {
            Value::Null => Ok(Value::instance(Date::invalid())),
            Value::String(s) => Ok(Value::instance(Date::parse(&s))),
            other => Err(CodableError::invalid_payload(
                "Date",
                format!("expected an ISO string or null, got {}", other.kind()),
            )),
        },
        TypeOptions::new().flat().class::<Date>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_round_trip() {
        let date = Date::parse("2025-01-01T00:00:00.000Z");
        assert!(date.is_valid());
        assert_eq!(date.timestamp_millis(), 1_735_689_600_000.0);
        assert_eq!(date.to_iso_string().as_deref(), Some("2025-01-01T00:00:00.000Z"));
    }

    #[test]
    fn offsets_normalize_to_utc() {
        let date = Date::parse("2025-01-01T02:00:00.250+02:00");
        assert_eq!(date.to_iso_string().as_deref(), Some("2025-01-01T00:00:00.250Z"));
    }

    #[test]
    fn invalid_dates_are_equal() {
        assert_eq!(Date::parse("not a date"), Date::invalid());
        assert_eq!(Date::invalid().to_iso_string(), None);
        assert_ne!(Date::invalid(), Date::from_millis(0.0));
    }

    #[test]
    fn years_past_9999_use_signed_six_digits() {
        let date = Date::from_millis(253_402_300_800_000.0);
        let iso = date.to_iso_string().unwrap();
        assert_eq!(iso, "+010000-01-01T00:00:00.000Z");
        assert_eq!(Date::parse(&iso), date);
    }

    #[test]
    fn negative_years_use_signed_six_digits() {
        let dt = NaiveDateTime::parse_from_str("2000-01-01T00:00:00", "%Y-%m-%dT%H:%M:%S")
            .unwrap()
            .with_year(-1)
            .unwrap()
            .and_utc();
        let date = Date::from(dt);
        let iso = date.to_iso_string().unwrap();
        assert_eq!(iso, "-000001-01-01T00:00:00.000Z");
        let back = Date::parse(&iso);
        assert!(back.is_valid());
        assert_eq!(back, date);
    }

    #[test]
    fn four_digit_years_keep_the_short_form() {
        let year_zero = Date::parse("0000-06-15T12:30:00.500Z");
        assert!(year_zero.is_valid());
        assert_eq!(year_zero.to_iso_string().as_deref(), Some("0000-06-15T12:30:00.500Z"));
        assert_eq!(Date::parse("+002025-01-01T00:00:00.000Z"), Date::parse("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn malformed_expanded_years_are_invalid() {
        assert!(!Date::parse("-000000-01-01T00:00:00.000Z").is_valid());
        assert!(!Date::parse("+01000-01-01T00:00:00.000Z").is_valid());
        assert!(!Date::parse("+010001-02-29T00:00:00.000Z").is_valid());
    }
}
