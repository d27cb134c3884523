//! Forex Factory weekly calendar adapter.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::{fetch_json, http_client, provider_message};
use crate::application::ports::{CalendarFeedPort, FeedError};
use crate::infrastructure::config::FeedSettings;

const FEED: &str = "forex_factory";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const REFERER: &str = "https://www.forexfactory.com/";
const CALENDAR_VERSION: &str = "2e51c1d85c12835c82322cd58bd05d7b";

/// Calendar feed backed by the public weekly JSON export.
///
/// The export allows two requests per five minutes; the refresh cadence
/// stays well under that, so no pacer is attached.
#[derive(Debug)]
pub struct ForexFactoryCalendarFeed {
    client: reqwest::Client,
    url: String,
}

impl ForexFactoryCalendarFeed {
    /// Create the adapter.
    pub fn new(settings: &FeedSettings) -> Result<Self, FeedError> {
        Ok(Self {
            client: http_client(FEED, settings.http_timeout, USER_AGENT)?,
            url: settings.forex_factory_url.clone(),
        })
    }
}

#[async_trait]
impl CalendarFeedPort for ForexFactoryCalendarFeed {
    #[tracing::instrument(skip(self), fields(feed = FEED))]
    async fn fetch_calendar(&self) -> Result<Vec<Value>, FeedError> {
        // Millisecond stamp defeats intermediate caches.
        let stamp = Utc::now().timestamp_millis().to_string();
        let request = self
            .client
            .get(&self.url)
            .query(&[("version", CALENDAR_VERSION), ("_", stamp.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::REFERER, REFERER);

        let body = fetch_json(FEED, request).await?;
        let records = decode_records(body)?;
        tracing::debug!(records = records.len(), "Calendar records received");
        Ok(records)
    }
}

fn decode_records(body: Value) -> Result<Vec<Value>, FeedError> {
    match body {
        Value::Array(records) if records.is_empty() => Err(FeedError::Empty { feed: FEED }),
        Value::Array(records) => Ok(records),
        other => Err(provider_message(&other, &["error", "message"]).map_or_else(
            || FeedError::Parse {
                feed: FEED,
                message: "expected a JSON array of events".to_string(),
            },
            |message| FeedError::Rejected {
                feed: FEED,
                message,
            },
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_is_passed_through_undecoded() {
        let body = json!([
            {"title": "CPI m/m", "country": "USD", "date": "2024-03-12T08:30:00-04:00", "impact": "High"},
            {"unexpected": true}
        ]);
        let records = decode_records(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["unexpected"], true);
    }

    #[test]
    fn empty_array_is_empty() {
        assert_eq!(decode_records(json!([])), Err(FeedError::Empty { feed: FEED }));
    }

    #[test]
    fn object_body_is_classified() {
        assert!(matches!(
            decode_records(json!({"error": "Too many requests"})),
            Err(FeedError::Rejected { .. })
        ));
        assert!(matches!(decode_records(json!("nope")), Err(FeedError::Parse { .. })));
    }
}
