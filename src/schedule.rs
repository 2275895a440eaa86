//! Schedule resolution for filed flights.
//!
//! Converts an operator-local calendar date, wall-clock departure time, and
//! elapsed-time estimate into absolute UTC instants. The UTC offset is the one
//! the named civil timezone observes on the flight date itself, so a flight
//! filed across a daylight-saving transition resolves correctly even when
//! "today" is on the other side of the shift.
//!
//! Every function here is pure and total: malformed input produces an
//! unresolved (`None`) component, never an error. Callers must treat an
//! unresolved instant as its own state, distinct from any valid time.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Resolved departure and arrival instants for a filed flight.
///
/// Either component may be unresolved when its inputs were missing or
/// unparsable. `used_fallback_offset` marks reduced-accuracy results computed
/// with a fixed offset because the timezone name could not be resolved; such
/// results ignore daylight saving and must not be treated as authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchedule {
    /// Departure instant, if date and local time both resolved.
    pub departure: Option<DateTime<Utc>>,
    /// Arrival instant (departure + elapsed), if departure and elapsed time
    /// both resolved.
    pub arrival: Option<DateTime<Utc>>,
    /// True when the fixed fallback offset stood in for the named timezone.
    pub used_fallback_offset: bool,
}

impl ResolvedSchedule {
    /// A schedule with neither instant resolved.
    #[must_use]
    pub fn unresolved() -> Self {
        Self {
            departure: None,
            arrival: None,
            used_fallback_offset: false,
        }
    }
}

/// Parse a lenient 4-digit local wall-clock time.
///
/// Strips every non-digit character, left-pads the remainder to four digits,
/// and reads `HHMM`. Returns `None` for empty input or out-of-range fields.
#[must_use]
pub fn parse_local_time(raw: &str) -> Option<NaiveTime> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    let padded = format!("{digits:0>4}");
    let hour: u32 = padded[..2].parse().ok()?;
    let minute: u32 = padded[2..4].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parse an elapsed-time estimate into a positive duration.
///
/// Accepts three shapes:
/// - `H:MM` (e.g. `"1:30"`)
/// - decimal hours (e.g. `"1.5"`)
/// - a bare integer read as `HMM`, minutes in the low two digits
///   (e.g. `"130"` is one hour thirty minutes)
///
/// Returns `None` for zero, negative, or unparsable input.
#[must_use]
pub fn parse_elapsed(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let minutes = if let Some((h, m)) = raw.split_once(':') {
        let hours: i64 = h.parse().ok()?;
        let mins: i64 = m.parse().ok()?;
        if hours < 0 || mins < 0 {
            return None;
        }
        hours * 60 + mins
    } else if raw.contains('.') {
        let hours: f64 = raw.parse().ok()?;
        if !hours.is_finite() || hours < 0.0 {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            (hours * 60.0).round() as i64
        }
    } else {
        let value: i64 = raw.parse().ok()?;
        if value < 0 {
            return None;
        }
        (value / 100) * 60 + value % 100
    };

    if minutes <= 0 {
        None
    } else {
        Some(Duration::minutes(minutes))
    }
}

/// Resolve a filed schedule into UTC instants.
///
/// `timezone` is an IANA zone name; the offset applied is the one that zone
/// observes on `date`. When the name does not resolve, `fallback` is applied
/// instead and the result is marked `used_fallback_offset`.
///
/// An ambiguous wall time (the repeated hour at a daylight-saving fall-back)
/// resolves to the earlier instant. A nonexistent wall time (the skipped hour
/// at spring-forward) leaves departure unresolved.
#[must_use]
pub fn resolve(
    date: Option<NaiveDate>,
    local_time: &str,
    elapsed: &str,
    timezone: &str,
    fallback: FixedOffset,
) -> ResolvedSchedule {
    let (Some(date), Some(time)) = (date, parse_local_time(local_time)) else {
        return ResolvedSchedule::unresolved();
    };
    let naive = date.and_time(time);

    let (departure, used_fallback_offset) = match timezone.parse::<Tz>() {
        Ok(tz) => (
            tz.from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            false,
        ),
        Err(_) => (
            fallback
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            true,
        ),
    };

    let arrival = match (departure, parse_elapsed(elapsed)) {
        (Some(dep), Some(dur)) => dep.checked_add_signed(dur),
        _ => None,
    };

    ResolvedSchedule {
        departure,
        arrival,
        used_fallback_offset,
    }
}
