//! Alpha Vantage exchange rate adapter.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;

use super::{RequestPacer, fetch_json, http_client, provider_message};
use crate::application::ports::{FeedError, RateFeedPort};
use crate::domain::market::{ForexRate, RateSource};
use crate::infrastructure::config::{FeedSettings, Secret};

const FEED: &str = "alpha_vantage";
const USER_AGENT: &str = "MacroEconomicAI/1.0";
const RATE_KEY: &str = "Realtime Currency Exchange Rate";

/// Instruments whose legs are not a plain six-letter currency pair split.
const SPECIAL_PAIRS: &[(&str, (&str, &str))] = &[
    ("XAUUSD", ("XAU", "USD")),
    ("XAGUSD", ("XAG", "USD")),
    ("BTCUSD", ("BTC", "USD")),
];

/// Rate feed backed by Alpha Vantage `CURRENCY_EXCHANGE_RATE`.
///
/// The free tier allows a handful of calls per minute, so calls are spaced
/// by a jittered gap.
#[derive(Debug)]
pub struct AlphaVantageRateFeed {
    client: reqwest::Client,
    api_key: Option<Secret>,
    url: String,
    pacer: RequestPacer,
}

impl AlphaVantageRateFeed {
    /// Create the adapter. Without a key every call fails with `NotConfigured`.
    pub fn new(settings: &FeedSettings) -> Result<Self, FeedError> {
        Ok(Self {
            client: http_client(FEED, settings.http_timeout, USER_AGENT)?,
            api_key: settings.alpha_vantage_key.clone(),
            url: settings.alpha_vantage_url.clone(),
            pacer: RequestPacer::new(settings.rate_pacing_min, settings.rate_pacing_max),
        })
    }
}

#[async_trait]
impl RateFeedPort for AlphaVantageRateFeed {
    #[tracing::instrument(skip(self), fields(feed = FEED))]
    async fn fetch_rate(&self, pair: &str) -> Result<ForexRate, FeedError> {
        let Some(key) = &self.api_key else {
            return Err(FeedError::NotConfigured { feed: FEED });
        };
        let (from, to) = currency_legs(pair)?;

        self.pacer.wait().await;

        let request = self.client.get(&self.url).query(&[
            ("function", "CURRENCY_EXCHANGE_RATE"),
            ("from_currency", from.as_str()),
            ("to_currency", to.as_str()),
            ("apikey", key.expose()),
        ]);

        let body = fetch_json(FEED, request).await?;
        decode_rate(pair, &body)
    }
}

/// Split an instrument into its from/to currency codes.
fn currency_legs(pair: &str) -> Result<(String, String), FeedError> {
    let pair = pair.to_uppercase();
    if let Some((_, (from, to))) = SPECIAL_PAIRS.iter().find(|(p, _)| *p == pair) {
        return Ok(((*from).to_string(), (*to).to_string()));
    }
    if pair.len() != 6 || !pair.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(FeedError::Rejected {
            feed: FEED,
            message: format!("unsupported instrument {pair}"),
        });
    }
    Ok((pair[..3].to_string(), pair[3..].to_string()))
}

fn decode_rate(pair: &str, body: &Value) -> Result<ForexRate, FeedError> {
    if let Some(message) = provider_message(body, &["Error Message", "Note", "Information"]) {
        return Err(FeedError::Rejected {
            feed: FEED,
            message,
        });
    }

    let data = body.get(RATE_KEY).ok_or(FeedError::Empty { feed: FEED })?;
    let field = |key: &str| data.get(key).and_then(Value::as_str).map(str::trim);
    let decimal = |key: &str| field(key).and_then(|v| Decimal::from_str(v).ok());

    let rate = decimal("5. Exchange Rate")
        .filter(|r| *r > Decimal::ZERO)
        .ok_or_else(|| FeedError::Parse {
            feed: FEED,
            message: format!("no exchange rate for {pair}"),
        })?;

    Ok(ForexRate {
        pair: pair.to_uppercase(),
        rate,
        bid: decimal("8. Bid Price").unwrap_or(rate),
        ask: decimal("9. Ask Price").unwrap_or(rate),
        last_refreshed: field("6. Last Refreshed")
            .filter(|v| !v.is_empty())
            .map_or_else(|| Utc::now().to_rfc3339(), str::to_string),
        source: RateSource::Authoritative,
    })
}
