//! Decoding of epoch-offset coordinate values (`units = "days since 1970-01-01"`).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::BaldError;

static UNITS_SINCE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^([a-z]+) since ([0-9T:\. -]+)"));

/// Splits a `"<quantity> since <origin>"` units string.
pub fn parse_units(units: &str) -> Result<Option<(String, String)>, BaldError> {
    let pattern = UNITS_SINCE.as_ref().map_err(Clone::clone)?;
    Ok(pattern
        .captures(units)
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string())))
}

/// Turns an offset from an origin into an ISO-8601 date-time string.
pub trait TemporalDecoder: Send + Sync {
    /// `None` when the quantity or origin cannot be interpreted, in which case the raw value
    /// is kept.
    fn decode(&self, value: f64, quantity: &str, origin: &str) -> Option<String>;
}

/// Proleptic Gregorian decoding on `chrono`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GregorianDecoder;

impl GregorianDecoder {
    fn unit_millis(quantity: &str) -> Option<f64> {
        let unit = quantity.strip_suffix('s').unwrap_or(quantity);
        match unit {
            "millisecond" | "msec" => Some(1.0),
            "second" | "sec" => Some(1_000.0),
            "minute" | "min" => Some(60_000.0),
            "hour" | "hr" => Some(3_600_000.0),
            "day" => Some(86_400_000.0),
            "week" => Some(604_800_000.0),
            _ => None,
        }
    }

    /// Parses origins such as `1970-01-01`, `1970-1-1 0:0:0` or `2017-05-01T12:30:00.5`.
    pub fn parse_origin(origin: &str) -> Option<NaiveDateTime> {
        let origin = origin.trim().trim_end_matches(['-', ' ']);
        let (date, time) = match origin.split_once(['T', ' ']) {
            Some((date, time)) => (date, time.trim()),
            None => (origin, ""),
        };
        let mut ymd = date.split('-').map(|p| p.parse::<i64>().ok());
        let (year, month, day) = (ymd.next()??, ymd.next()??, ymd.next()??);
        if ymd.next().is_some() {
            return None;
        }
        let date = NaiveDate::from_ymd_opt(
            i32::try_from(year).ok()?,
            u32::try_from(month).ok()?,
            u32::try_from(day).ok()?,
        )?;

        let time = if time.is_empty() {
            NaiveTime::MIN
        } else {
            let mut hms = time.split(':');
            let hour: u32 = hms.next()?.parse().ok()?;
            let minute: u32 = hms.next().map(str::parse).unwrap_or(Ok(0)).ok()?;
            let seconds: f64 = hms.next().map(str::parse).unwrap_or(Ok(0.0)).ok()?;
            let whole = seconds.trunc();
            let nanos = ((seconds - whole) * 1e9).round() as u32;
            NaiveTime::from_hms_nano_opt(hour, minute, whole as u32, nanos)?
        };
        Some(NaiveDateTime::new(date, time))
    }
}

impl TemporalDecoder for GregorianDecoder {
    fn decode(&self, value: f64, quantity: &str, origin: &str) -> Option<String> {
        if !value.is_finite() {
            return None;
        }
        let millis = value * Self::unit_millis(quantity)?;
        let offset = TimeDelta::try_milliseconds(millis.round() as i64)?;
        let instant = Self::parse_origin(origin)?.checked_add_signed(offset)?;
        Some(instant.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(
            parse_units("days since 1970-01-01 00:00:00").unwrap(),
            Some(("days".to_string(), "1970-01-01 00:00:00".to_string()))
        );
        assert_eq!(parse_units("m s-1").unwrap(), None);
        assert_eq!(parse_units("Days since 1970-01-01").unwrap(), None);
    }

    #[test]
    fn test_decode_offsets() {
        let decoder = GregorianDecoder;
        assert_eq!(
            decoder.decode(1.0, "days", "1970-01-01").as_deref(),
            Some("1970-01-02T00:00:00")
        );
        assert_eq!(
            decoder.decode(36.5, "hours", "2017-05-01T00:00:00").as_deref(),
            Some("2017-05-02T12:30:00")
        );
        assert_eq!(
            decoder.decode(1500.0, "milliseconds", "2000-1-1 0:0:0").as_deref(),
            Some("2000-01-01T00:00:01.500")
        );
        assert_eq!(
            decoder.decode(2.0, "weeks", "1999-12-31").as_deref(),
            Some("2000-01-14T00:00:00")
        );
    }

    #[test]
    fn test_undecodable_inputs() {
        let decoder = GregorianDecoder;
        assert_eq!(decoder.decode(1.0, "fortnights", "1970-01-01"), None);
        assert_eq!(decoder.decode(1.0, "days", "1970-13-01"), None);
        assert_eq!(decoder.decode(f64::NAN, "days", "1970-01-01"), None);
    }
}
