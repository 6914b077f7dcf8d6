//! Date parsing for temporal dimensions and nearest-date lookups.
//!
//! Dates are timezone-less (`NaiveDateTime`); the cube backend publishes
//! calendar dates, not instants.

use chrono::{NaiveDate, NaiveDateTime};

/// Formats tried, in order, when a temporal component declares no format
const FALLBACK_FORMATS: [&str; 4] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d", "%Y-%m", "%Y"];

/// Parse `raw` with a strftime-style `format`.
///
/// Formats that do not carry a day (`%Y-%m`) or a month (`%Y`) resolve to the
/// first day of the period.
pub fn parse_date(raw: &str, format: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
        return Some(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
        return d.and_hms_opt(0, 0, 0);
    }

    let has_day = ["%d", "%e", "%j", "%F"].iter().any(|t| format.contains(t));
    let has_month = ["%m", "%b", "%B", "%h", "%F"].iter().any(|t| format.contains(t));

    let padded = match (has_month, has_day) {
        (true, false) => Some((format!("{}-01", raw), format!("{}-%d", format))),
        (false, false) => Some((format!("{}-01-01", raw), format!("{}-%m-%d", format))),
        _ => None,
    };

    padded
        .and_then(|(value, fmt)| NaiveDate::parse_from_str(&value, &fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse with the declared format, or with the common ISO shapes when there is none
pub fn parse_date_with(raw: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    match format {
        Some(fmt) => parse_date(raw, fmt),
        None => FALLBACK_FORMATS.iter().find_map(|fmt| parse_date(raw, fmt)),
    }
}

/// Milliseconds since the epoch, used for equality and interpolation
pub fn timestamp_millis(date: &NaiveDateTime) -> i64 {
    date.and_utc().timestamp_millis()
}

/// Index of the date in `dates` (sorted ascending) closest to `target`.
///
/// Bisects for the insertion point and compares the neighbour before it with
/// the one at it; on a tie the earlier index wins.
pub fn nearest_index(dates: &[NaiveDateTime], target: NaiveDateTime) -> Option<usize> {
    if dates.is_empty() {
        return None;
    }
    let i = dates.partition_point(|d| *d < target);
    if i == 0 {
        return Some(0);
    }
    if i == dates.len() {
        return Some(dates.len() - 1);
    }
    let before = target - dates[i - 1];
    let after = dates[i] - target;
    if after < before {
        Some(i)
    } else {
        Some(i - 1)
    }
}

pub fn nearest_date(dates: &[NaiveDateTime], target: NaiveDateTime) -> Option<NaiveDateTime> {
    nearest_index(dates, target).map(|i| dates[i])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Previous,
    Next,
}

/// Move from `current` to the adjacent observed date (keyboard brush handles).
///
/// `current` is first snapped to the nearest observed date; the result is
/// clamped at both ends of `dates`.
pub fn step_date(
    dates: &[NaiveDateTime],
    current: NaiveDateTime,
    direction: StepDirection,
) -> Option<NaiveDateTime> {
    let i = nearest_index(dates, current)?;
    let next = match direction {
        StepDirection::Previous => i.saturating_sub(1),
        StepDirection::Next => (i + 1).min(dates.len() - 1),
    };
    Some(dates[next])
}
