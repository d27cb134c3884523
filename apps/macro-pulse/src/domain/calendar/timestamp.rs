//! Calendar timestamp parsing.
//!
//! - ISO-8601 with an offset (`+08:00`, `+0800`) or trailing `Z` is taken
//!   as-is, with or without seconds.
//! - A naive date-time carries no offset and is assumed UTC.
//! - A bare date may come with a separate `time` field (`HH:MM`, `HHMM`,
//!   `8:30am`, ...), also assumed UTC; a missing time means midnight.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a provider timestamp into a UTC instant.
///
/// Returns `None` when neither `date` nor `date` + `time` is recognizable.
#[must_use]
pub fn parse_instant(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = date.trim();
    if date.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&Utc));
    }

    let zoned = match date.strip_suffix(['Z', 'z']) {
        Some(local) => format!("{local}+0000"),
        None => date.to_string(),
    };
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(date, format) {
            return Some(naive.and_utc());
        }
    }

    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let clock = time.and_then(parse_clock).unwrap_or(NaiveTime::MIN);
    Some(day.and_time(clock).and_utc())
}

/// Parse a loose wall-clock string such as `21:30`, `0930`, `930` or `8:30am`.
#[must_use]
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim().to_ascii_lowercase();
    if raw.is_empty() {
        return None;
    }

    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let (hour, minute) = if let Some((h, rest)) = raw.split_once(':') {
        let h: u32 = h.trim().parse().ok()?;
        let m: String = rest.chars().take_while(char::is_ascii_digit).collect();
        (h, m.parse().ok()?)
    } else if raw.chars().all(|c| c.is_ascii_digit()) && (3..=4).contains(&digits.len()) {
        let split = digits.len() - 2;
        (digits[..split].parse().ok()?, digits[split..].parse().ok()?)
    } else {
        return None;
    };

    let hour = match (raw.ends_with("pm"), raw.ends_with("am")) {
        (true, _) if hour < 12 => hour + 12,
        (_, true) if hour == 12 => 0,
        _ => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}
