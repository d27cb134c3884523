//! Calendar Feed Port (Driven Port)
//!
//! Raw economic calendar records. Records are returned undecoded; the
//! event normalizer owns their interpretation.

use async_trait::async_trait;
use serde_json::Value;

use super::FeedError;

/// Source of raw calendar records.
#[async_trait]
pub trait CalendarFeedPort: Send + Sync {
    /// Fetch the current batch of raw records.
    async fn fetch_calendar(&self) -> Result<Vec<Value>, FeedError>;
}
