//! Ziwox market signal adapter.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::{RequestPacer, fetch_json, http_client, provider_message};
use crate::application::ports::{FeedError, SignalFeedPort};
use crate::domain::market::MarketSignal;
use crate::domain::shared::lenient_text;
use crate::infrastructure::config::{FeedSettings, Secret};

const FEED: &str = "ziwox";
const USER_AGENT: &str = "MacroEconomicAI/1.0";
const SOURCE: &str = "Ziwox";

/// Signal feed backed by the Ziwox terminal API.
///
/// One request per instrument, paced by a fixed gap.
#[derive(Debug)]
pub struct ZiwoxSignalFeed {
    client: reqwest::Client,
    api_key: Option<Secret>,
    url: String,
    pacer: RequestPacer,
}

impl ZiwoxSignalFeed {
    /// Create the adapter. Without a key every call fails with `NotConfigured`.
    pub fn new(settings: &FeedSettings) -> Result<Self, FeedError> {
        Ok(Self {
            client: http_client(FEED, settings.http_timeout, USER_AGENT)?,
            api_key: settings.ziwox_api_key.clone(),
            url: settings.ziwox_url.clone(),
            pacer: RequestPacer::fixed(settings.signal_pacing),
        })
    }
}

#[async_trait]
impl SignalFeedPort for ZiwoxSignalFeed {
    #[tracing::instrument(skip(self), fields(feed = FEED))]
    async fn fetch_signal(&self, pair: &str) -> Result<MarketSignal, FeedError> {
        let Some(key) = &self.api_key else {
            return Err(FeedError::NotConfigured { feed: FEED });
        };

        self.pacer.wait().await;

        let lower = pair.to_lowercase();
        let request = self.client.get(&self.url).query(&[
            ("expn", "ziwoxuser"),
            ("apikey", key.expose()),
            ("apitype", "json"),
            ("pair", lower.as_str()),
        ]);

        let body = fetch_json(FEED, request).await?;
        decode_signal(pair, body)
    }
}

fn decode_signal(pair: &str, body: Value) -> Result<MarketSignal, FeedError> {
    let first = match body {
        Value::Array(items) => items.into_iter().next().ok_or(FeedError::Empty { feed: FEED })?,
        other => {
            return Err(FeedError::Rejected {
                feed: FEED,
                message: provider_message(&other, &["error", "message", "msg"])
                    .unwrap_or_else(|| "unexpected response shape".to_string()),
            });
        }
    };

    let record: RawSignalRecord = serde_json::from_value(first).map_err(|e| FeedError::Parse {
        feed: FEED,
        message: e.to_string(),
    })?;

    Ok(record.into_signal(pair))
}

/// One Ziwox record. Every field may be missing, null, a string or a number.
#[derive(Debug, Default, Deserialize)]
struct RawSignalRecord {
    #[serde(rename = "Last Price", default, deserialize_with = "lenient_text")]
    last_price: Option<String>,
    #[serde(rename = "Fundamental Bias", default, deserialize_with = "lenient_text")]
    fundamental_bias: Option<String>,
    #[serde(rename = "Fundamental Power", default, deserialize_with = "lenient_text")]
    fundamental_power: Option<String>,
    #[serde(rename = "AI Bullish Forecast", default, deserialize_with = "lenient_text")]
    ai_bullish_forecast: Option<String>,
    #[serde(rename = "AI Bearish Forecast", default, deserialize_with = "lenient_text")]
    ai_bearish_forecast: Option<String>,
    #[serde(rename = "D1 Trend", default, deserialize_with = "lenient_text")]
    d1_trend: Option<String>,
    #[serde(rename = "D1 RSI", default, deserialize_with = "lenient_text")]
    d1_rsi: Option<String>,
    #[serde(rename = "Retail Long Ratio", default, deserialize_with = "lenient_text")]
    retail_long_ratio: Option<String>,
    #[serde(rename = "Retail Short Ratio", default, deserialize_with = "lenient_text")]
    retail_short_ratio: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    supports: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    resistance: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pivot: Option<String>,
    #[serde(rename = "Risk Sentiment", default, deserialize_with = "lenient_text")]
    risk_sentiment: Option<String>,
}

impl RawSignalRecord {
    fn into_signal(self, pair: &str) -> MarketSignal {
        let or = |value: Option<String>, default: &str| value.unwrap_or_else(|| default.to_string());

        MarketSignal {
            pair: pair.to_uppercase(),
            last_price: self.last_price.as_deref().map_or(Decimal::ZERO, parse_price),
            fundamental_bias: or(self.fundamental_bias, "Neutral"),
            fundamental_power: or(self.fundamental_power, "--"),
            ai_bullish_forecast: or(self.ai_bullish_forecast, "50"),
            ai_bearish_forecast: or(self.ai_bearish_forecast, "50"),
            d1_trend: or(self.d1_trend, "NEUTRAL"),
            d1_rsi: or(self.d1_rsi, "50"),
            retail_long_ratio: or(self.retail_long_ratio, "50%"),
            retail_short_ratio: or(self.retail_short_ratio, "50%"),
            support_levels: levels(self.supports.as_deref(), 3),
            resistance_levels: levels(self.resistance.as_deref(), 3),
            pivot_points: levels(self.pivot.as_deref(), 1),
            risk_sentiment: or(self.risk_sentiment, "Neutral"),
            source: SOURCE.to_string(),
            fetched_at: Utc::now(),
        }
    }
}

/// Parse a price, treating anything unparsable or negative as zero.
fn parse_price(raw: &str) -> Decimal {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .filter(|p| *p > Decimal::ZERO)
        .unwrap_or(Decimal::ZERO)
}

fn levels(raw: Option<&str>, limit: usize) -> Vec<String> {
    raw.map(|s| s.split_whitespace().take(limit).map(str::to_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn decodes_full_record() {
        let body = json!([{
            "Last Price": "1.08512",
            "Fundamental Bias": "Bullish",
            "Fundamental Power": "Strong",
            "AI Bullish Forecast": 62,
            "AI Bearish Forecast": "38",
            "D1 Trend": "UP",
            "D1 RSI": "58.4",
            "Retail Long Ratio": "41%",
            "Retail Short Ratio": "59%",
            "supports": "1.0800 1.0750 1.0700 1.0650",
            "resistance": "1.0900 1.0950",
            "pivot": "1.0850 1.0860",
            "Risk Sentiment": "Risk On"
        }]);

        let signal = decode_signal("eurusd", body).unwrap();
        assert_eq!(signal.pair, "EURUSD");
        assert_eq!(signal.last_price, dec!(1.08512));
        assert_eq!(signal.ai_bullish_forecast, "62");
        assert_eq!(signal.support_levels, vec!["1.0800", "1.0750", "1.0700"]);
        assert_eq!(signal.resistance_levels.len(), 2);
        assert_eq!(signal.pivot_points, vec!["1.0850"]);
        assert_eq!(signal.source, "Ziwox");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let signal = decode_signal("XAUUSD", json!([{"Last Price": "N/A"}])).unwrap();
        assert_eq!(signal.last_price, Decimal::ZERO);
        assert!(signal.usable_price().is_none());
        assert_eq!(signal.fundamental_bias, "Neutral");
        assert_eq!(signal.fundamental_power, "--");
        assert_eq!(signal.d1_trend, "NEUTRAL");
        assert_eq!(signal.retail_long_ratio, "50%");
        assert!(signal.support_levels.is_empty());
    }

    #[test]
    fn empty_array_is_empty_error() {
        let err = decode_signal("EURUSD", json!([])).unwrap_err();
        assert_eq!(err, FeedError::Empty { feed: FEED });
    }

    #[test]
    fn object_body_is_rejected() {
        let err = decode_signal("EURUSD", json!({"error": "invalid api key"})).unwrap_err();
        assert!(matches!(err, FeedError::Rejected { message, .. } if message == "invalid api key"));
    }

    #[test]
    fn price_parsing_is_lenient() {
        assert_eq!(parse_price(" 2345.6 "), dec!(2345.6));
        assert_eq!(parse_price("1e2"), dec!(100));
        assert_eq!(parse_price("-3"), Decimal::ZERO);
        assert_eq!(parse_price("--"), Decimal::ZERO);
    }
}
