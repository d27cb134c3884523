//! Upstream Data Feed Adapters
//!
//! HTTP adapters for the signal, rate and calendar ports. Each adapter
//! owns its own `reqwest` client and pacer; errors are classified into
//! [`FeedError`] so the coordinator can log and count them uniformly.

mod alpha_vantage;
mod forex_factory;
mod pacing;
mod ziwox;

use std::time::Duration;

use serde_json::Value;

pub use alpha_vantage::AlphaVantageRateFeed;
pub use forex_factory::ForexFactoryCalendarFeed;
pub use pacing::RequestPacer;
pub use ziwox::ZiwoxSignalFeed;

use crate::application::ports::FeedError;
use crate::domain::shared::truncate_chars;

/// Longest provider message kept in an error.
const MAX_ERROR_CHARS: usize = 200;

/// Build the HTTP client shared by a feed adapter's calls.
pub(crate) fn http_client(
    feed: &'static str,
    timeout: Duration,
    user_agent: &str,
) -> Result<reqwest::Client, FeedError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| FeedError::Network {
            feed,
            message: e.to_string(),
        })
}

/// Send a request and decode the body as JSON.
pub(crate) async fn fetch_json(
    feed: &'static str,
    request: reqwest::RequestBuilder,
) -> Result<Value, FeedError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(feed, &e))?;

    let status = response.status();
    if !status.is_success() {
        tracing::debug!(feed, status = status.as_u16(), "Feed returned non-success status");
        return Err(FeedError::Status {
            feed,
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| classify_transport(feed, &e))?;

    serde_json::from_str(&body).map_err(|e| FeedError::Parse {
        feed,
        message: e.to_string(),
    })
}

fn classify_transport(feed: &'static str, err: &reqwest::Error) -> FeedError {
    if err.is_timeout() {
        FeedError::Timeout { feed }
    } else {
        FeedError::Network {
            feed,
            message: truncate_chars(&err.to_string(), MAX_ERROR_CHARS),
        }
    }
}

/// Provider message carried in an error object, if any of `keys` is present.
pub(crate) fn provider_message(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(|msg| truncate_chars(msg.trim(), MAX_ERROR_CHARS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_message_picks_first_present_key() {
        let body = json!({"Information": "rate limit reached", "Note": "ignored"});
        assert_eq!(
            provider_message(&body, &["Error Message", "Information", "Note"]).as_deref(),
            Some("rate limit reached")
        );
        assert!(provider_message(&json!({"ok": 1}), &["Note"]).is_none());
    }

    #[test]
    fn provider_message_is_truncated() {
        let body = json!({"Note": "x".repeat(1000)});
        let msg = provider_message(&body, &["Note"]).unwrap();
        assert_eq!(msg.chars().count(), MAX_ERROR_CHARS);
    }
}
