//! Datetime parsing, formatting and step arithmetic
//!
//! Formats are chrono strftime strings plus two epoch pseudo-formats:
//! `%s` (seconds) and `%ms` (milliseconds).

use crate::error::{Error, Result};
use crate::types::JsonValue;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

const EPOCH_SECONDS: &str = "%s";
const EPOCH_MILLIS: &str = "%ms";

/// Formats tried after the configured ones
const FALLBACK_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d",
    "%Y/%m/%d",
];

/// ISO 8601 duration: `P1Y2M3W4DT5H6M7.5S`
static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("duration regex is valid")
});

/// Check that a format can be used for output
pub fn validate_format(format: &str) -> Result<()> {
    if format == EPOCH_SECONDS || format == EPOCH_MILLIS {
        return Ok(());
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::invalid_value(
            "datetime_format",
            format!("'{format}' is not a valid strftime format"),
        ));
    }
    Ok(())
}

/// Format a datetime; `format` must have passed [`validate_format`]
pub fn format_datetime(dt: DateTime<Utc>, format: &str) -> String {
    match format {
        EPOCH_SECONDS => dt.timestamp().to_string(),
        EPOCH_MILLIS => dt.timestamp_millis().to_string(),
        _ => dt.format(format).to_string(),
    }
}

/// Parse a datetime string, trying `formats` first and then common fallbacks
pub fn parse_datetime(s: &str, formats: &[String]) -> Option<DateTime<Utc>> {
    let s = s.trim();
    for format in formats {
        if let Some(dt) = parse_with_format(s, format) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|format| parse_with_format(s, format))
}

/// Parse a datetime from a JSON value (strings, or numbers for epoch formats)
pub fn parse_datetime_value(value: &JsonValue, formats: &[String]) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => parse_datetime(s, formats),
        JsonValue::Number(n) => {
            let raw = n.as_i64()?;
            if formats.iter().any(|f| f == EPOCH_MILLIS) {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}

fn parse_with_format(s: &str, format: &str) -> Option<DateTime<Utc>> {
    match format {
        EPOCH_SECONDS => {
            let secs = s.parse::<i64>().ok()?;
            Utc.timestamp_opt(secs, 0).single()
        }
        EPOCH_MILLIS => {
            let millis = s.parse::<i64>().ok()?;
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => {
            if let Ok(dt) = DateTime::parse_from_str(s, format) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
                return Some(Utc.from_utc_datetime(&ndt));
            }
            NaiveDate::parse_from_str(s, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| Utc.from_utc_datetime(&ndt))
        }
    }
}

/// A slicing step: calendar months plus a fixed duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Calendar months (years count as 12)
    pub months: u32,
    /// Fixed part
    pub duration: Duration,
}

impl Step {
    /// Parse an ISO 8601 duration (`P1D`, `PT1H`, `P1M`) or a shorthand
    /// (`1d`, `2h`, `30m`, `10s`, `1w`)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(caps) = ISO_DURATION.captures(s) {
            let int = |i: usize| -> Result<i64> {
                caps.get(i)
                    .map_or(Ok(0), |m| m.as_str().parse::<i64>())
                    .map_err(|_| Error::invalid_value("duration", format!("'{s}' is out of range")))
            };

            let months = int(1)? * 12 + int(2)?;
            let mut duration = Duration::weeks(int(3)?)
                + Duration::days(int(4)?)
                + Duration::hours(int(5)?)
                + Duration::minutes(int(6)?);
            if let Some(secs) = caps.get(7) {
                let secs: f64 = secs
                    .as_str()
                    .parse()
                    .map_err(|_| Error::invalid_value("duration", format!("'{s}' is invalid")))?;
                duration += Duration::nanoseconds((secs * 1_000_000_000.0).round() as i64);
            }

            let step = Self {
                months: u32::try_from(months)
                    .map_err(|_| Error::invalid_value("duration", format!("'{s}' is out of range")))?,
                duration,
            };
            if step.is_zero() {
                return Err(Error::invalid_value("duration", format!("'{s}' is zero")));
            }
            return Ok(step);
        }

        let duration = parse_duration(s)?;
        if duration <= Duration::zero() {
            return Err(Error::invalid_value("duration", format!("'{s}' must be positive")));
        }
        Ok(Self {
            months: 0,
            duration,
        })
    }

    /// Whether the step has no extent
    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.duration <= Duration::zero()
    }

    /// Smallest span this step can cover (months count as 28 days)
    pub fn shortest(&self) -> Duration {
        Duration::days(28 * i64::from(self.months)) + self.duration
    }

    /// Advance a datetime by this step; `None` on overflow
    pub fn add_to(&self, dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let shifted = if self.months > 0 {
            dt.checked_add_months(Months::new(self.months))?
        } else {
            dt
        };
        shifted.checked_add_signed(self.duration)
    }
}

/// Parse a fixed duration: ISO 8601 without months/years, or a shorthand
/// like `1d`, `2h`, `30m`, `10s`, `1w` (bare numbers are days)
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if s.starts_with('P') {
        let step = Step::parse(s)?;
        if step.months > 0 {
            return Err(Error::invalid_value(
                "duration",
                format!("'{s}' uses calendar months, which have no fixed length"),
            ));
        }
        return Ok(step.duration);
    }

    let (num_str, suffix) = if let Some(stripped) = s.strip_suffix('d') {
        (stripped, 'd')
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, 'h')
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 'm')
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 's')
    } else if let Some(stripped) = s.strip_suffix('w') {
        (stripped, 'w')
    } else {
        (s, 'd')
    };

    let num: i64 = num_str
        .parse()
        .map_err(|_| Error::invalid_value("duration", format!("Invalid duration number: {num_str}")))?;

    let duration = match suffix {
        'w' => Duration::weeks(num),
        'd' => Duration::days(num),
        'h' => Duration::hours(num),
        'm' => Duration::minutes(num),
        _ => Duration::seconds(num),
    };
    Ok(duration)
}
