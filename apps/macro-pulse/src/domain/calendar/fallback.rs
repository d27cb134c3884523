//! Fallback calendar dataset.
//!
//! Used when the calendar feed is unavailable or mock mode is on. Records
//! are emitted in the same raw shape the feed uses and go through the
//! regular normalizer, so the output obeys every event invariant.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{Value, json};

/// Source tag for events built from this dataset.
pub const FALLBACK_SOURCE: &str = "fallback";

struct Template {
    local_time: (u32, u32),
    country: &'static str,
    currency: &'static str,
    title: &'static str,
    impact: &'static str,
    forecast: &'static str,
    previous: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        local_time: (21, 0),
        country: "US",
        currency: "USD",
        title: "Federal Funds Rate Decision",
        impact: "High",
        forecast: "5.50%",
        previous: "5.50%",
    },
    Template {
        local_time: (9, 30),
        country: "CN",
        currency: "CNY",
        title: "China CPI y/y",
        impact: "Medium",
        forecast: "0.2%",
        previous: "0.1%",
    },
    Template {
        local_time: (15, 0),
        country: "GB",
        currency: "GBP",
        title: "UK GDP m/m",
        impact: "Medium",
        forecast: "0.1%",
        previous: "0.0%",
    },
    Template {
        local_time: (20, 30),
        country: "US",
        currency: "USD",
        title: "US Initial Jobless Claims",
        impact: "Medium",
        forecast: "210K",
        previous: "209K",
    },
    Template {
        local_time: (10, 0),
        country: "EU",
        currency: "EUR",
        title: "Euro Area CPI m/m",
        impact: "Medium",
        forecast: "0.3%",
        previous: "0.2%",
    },
    Template {
        local_time: (7, 50),
        country: "JP",
        currency: "JPY",
        title: "Japan Trade Balance",
        impact: "Medium",
        forecast: "-0.5T",
        previous: "-0.6T",
    },
    Template {
        local_time: (21, 45),
        country: "US",
        currency: "USD",
        title: "US Manufacturing PMI",
        impact: "Medium",
        forecast: "50.5",
        previous: "50.0",
    },
    Template {
        local_time: (16, 30),
        country: "GB",
        currency: "GBP",
        title: "UK Retail Sales m/m",
        impact: "Medium",
        forecast: "0.3%",
        previous: "-0.1%",
    },
];

/// Raw records for today's fallback calendar in `timezone`.
#[must_use]
pub fn fallback_records(now: DateTime<Utc>, timezone: Tz) -> Vec<Value> {
    let today = now.with_timezone(&timezone).date_naive();

    TEMPLATES
        .iter()
        .filter_map(|template| {
            let (hour, minute) = template.local_time;
            let clock = NaiveTime::from_hms_opt(hour, minute, 0)?;
            let instant = timezone
                .from_local_datetime(&today.and_time(clock))
                .earliest()?
                .with_timezone(&Utc);

            Some(json!({
                "title": template.title,
                "country": template.country,
                "currency": template.currency,
                "date": instant.to_rfc3339(),
                "impact": template.impact,
                "forecast": template.forecast,
                "previous": template.previous,
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::EventNormalizer;
    use chrono_tz::{America::New_York, Asia::Shanghai};

    #[test]
    fn fallback_events_are_all_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        let records = fallback_records(now, Shanghai);
        assert_eq!(records.len(), TEMPLATES.len());

        let batch = EventNormalizer::new(Shanghai).normalize(&records, now, FALLBACK_SOURCE);
        assert_eq!(batch.events.len(), TEMPLATES.len());
        assert!(batch.skipped.is_empty());

        let today = now.with_timezone(&Shanghai).date_naive();
        assert!(batch.events.iter().all(|e| e.date == today));
        assert_eq!(batch.events[0].time, "07:50");
        assert_eq!(batch.events[0].currency, "JPY");
        assert!(batch.events.iter().all(|e| e.source == FALLBACK_SOURCE));
    }

    #[test]
    fn fallback_follows_target_timezone() {
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap();
        let records = fallback_records(now, New_York);
        let batch = EventNormalizer::new(New_York).normalize(&records, now, FALLBACK_SOURCE);

        let fed = batch
            .events
            .iter()
            .find(|e| e.name == "Federal Funds Rate Decision")
            .unwrap();
        assert_eq!(fed.time, "21:00");
        assert_eq!(fed.country, "US");
    }
}
