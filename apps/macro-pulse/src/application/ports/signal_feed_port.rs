//! Signal Feed Port (Driven Port)
//!
//! Per-instrument market signals.

use async_trait::async_trait;

use super::FeedError;
use crate::domain::market::MarketSignal;

/// Source of market signals.
#[async_trait]
pub trait SignalFeedPort: Send + Sync {
    /// Fetch the signal for one instrument (upper case, e.g. `EURUSD`).
    async fn fetch_signal(&self, pair: &str) -> Result<MarketSignal, FeedError>;
}
