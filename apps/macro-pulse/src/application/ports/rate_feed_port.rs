//! Rate Feed Port (Driven Port)
//!
//! Authoritative exchange rates. Providers are rate limited, so callers
//! decide which instruments to request.

use async_trait::async_trait;

use super::FeedError;
use crate::domain::market::ForexRate;

/// Source of exchange rates.
#[async_trait]
pub trait RateFeedPort: Send + Sync {
    /// Fetch the rate for one instrument (upper case, e.g. `USDJPY`).
    async fn fetch_rate(&self, pair: &str) -> Result<ForexRate, FeedError>;
}
