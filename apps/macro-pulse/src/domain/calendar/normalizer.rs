//! Event Normalizer
//!
//! Turns opaque provider records into canonical [`Event`]s.
//!
//! # Per-record isolation
//!
//! Every record is decoded and validated on its own. A record that cannot be
//! decoded, has no title, or has an unparseable timestamp is skipped and
//! counted; the rest of the batch is unaffected.
//!
//! # Ordering
//!
//! Output is sorted ascending by `(date, time)` with a stable sort, then
//! optionally capped to the earliest `max_events`, then numbered from 1.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;

use super::event::{ActualValue, Event, Importance, NOT_APPLICABLE};
use super::regions;
use super::timestamp;
use crate::domain::shared::{lenient_text, truncate_chars};

/// Maximum characters kept from an event title.
pub const MAX_NAME_CHARS: usize = 100;

/// Maximum characters kept from forecast, previous and actual values.
pub const MAX_VALUE_CHARS: usize = 50;

/// Raw calendar record with every field optional.
#[derive(Debug, Default, Deserialize)]
struct RawCalendarRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    event: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    country: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    time: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    impact: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    importance: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    forecast: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    previous: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    actual: Option<String>,
}

/// Reason a record was left out of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Record was not a usable JSON object.
    Malformed,
    /// Title was missing or blank.
    MissingTitle,
    /// Timestamp could not be parsed.
    BadTimestamp,
    /// Local date precedes today in the target timezone.
    Past,
}

impl SkipReason {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::MissingTitle => "missing_title",
            Self::BadTimestamp => "bad_timestamp",
            Self::Past => "past",
        }
    }
}

/// Normalization result with skip accounting.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Canonical events in chronological order.
    pub events: Vec<Event>,
    /// Skipped records as `(index, reason)`.
    pub skipped: Vec<(usize, SkipReason)>,
    /// Events removed by the cap.
    pub truncated: usize,
}

/// Converts raw calendar records into canonical events.
#[derive(Debug, Clone)]
pub struct EventNormalizer {
    timezone: Tz,
    max_events: Option<usize>,
}

impl EventNormalizer {
    /// Create a normalizer for the given target timezone.
    #[must_use]
    pub const fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            max_events: None,
        }
    }

    /// Keep only the earliest `max` events.
    #[must_use]
    pub const fn with_max_events(mut self, max: Option<usize>) -> Self {
        self.max_events = max;
        self
    }

    /// Target timezone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Normalize a batch of raw records as of `now`.
    #[must_use]
    pub fn normalize(&self, records: &[Value], now: DateTime<Utc>, source: &str) -> NormalizedBatch {
        let today = now.with_timezone(&self.timezone).date_naive();
        let mut batch = NormalizedBatch::default();

        for (index, value) in records.iter().enumerate() {
            match self.normalize_one(value, now, today, source) {
                Ok(event) => batch.events.push(event),
                Err(reason) => {
                    if reason == SkipReason::Past {
                        tracing::trace!(index, "Skipping past calendar record");
                    } else {
                        tracing::warn!(index, reason = reason.as_str(), "Skipping calendar record");
                    }
                    batch.skipped.push((index, reason));
                }
            }
        }

        batch.events.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        if let Some(max) = self.max_events
            && batch.events.len() > max
        {
            batch.truncated = batch.events.len() - max;
            batch.events.truncate(max);
        }

        for (position, event) in batch.events.iter_mut().enumerate() {
            event.id = u32::try_from(position + 1).unwrap_or(u32::MAX);
        }

        tracing::debug!(
            kept = batch.events.len(),
            skipped = batch.skipped.len(),
            truncated = batch.truncated,
            source,
            "Calendar batch normalized"
        );

        batch
    }

    fn normalize_one(
        &self,
        value: &Value,
        now: DateTime<Utc>,
        today: chrono::NaiveDate,
        source: &str,
    ) -> Result<Event, SkipReason> {
        let raw: RawCalendarRecord =
            serde_json::from_value(value.clone()).map_err(|_| SkipReason::Malformed)?;

        let title = raw
            .title
            .or(raw.event)
            .ok_or(SkipReason::MissingTitle)?;

        let instant = raw
            .date
            .as_deref()
            .and_then(|date| timestamp::parse_instant(date, raw.time.as_deref()))
            .ok_or(SkipReason::BadTimestamp)?;

        let local = instant.with_timezone(&self.timezone);
        if local.date_naive() < today {
            return Err(SkipReason::Past);
        }

        let importance = raw
            .impact
            .or(raw.importance)
            .map_or(Importance::Low, |label| Importance::from_label(&label));

        let region = regions::resolve(raw.country.as_deref(), raw.currency.as_deref());

        let actual = if instant > now {
            ActualValue::NotApplicable
        } else {
            raw.actual.map_or(ActualValue::Pending, |value| {
                ActualValue::Released(truncate_chars(&value, MAX_VALUE_CHARS))
            })
        };

        Ok(Event {
            id: 0,
            date: local.date_naive(),
            time: local.format("%H:%M").to_string(),
            country: region.country,
            currency: region.currency,
            name: truncate_chars(&title, MAX_NAME_CHARS),
            forecast: opaque_value(raw.forecast),
            previous: opaque_value(raw.previous),
            actual,
            importance,
            commentary: None,
            source: source.to_string(),
        })
    }
}

fn opaque_value(value: Option<String>) -> String {
    value.map_or_else(
        || NOT_APPLICABLE.to_string(),
        |v| truncate_chars(&v, MAX_VALUE_CHARS),
    )
}
