//! Market Context Types
//!
//! Per-instrument signals and exchange rates. The rate book is assembled
//! from the authoritative rate feed where available, with signal prices
//! standing in for any instrument the rate feed could not serve.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spread applied either side of a signal price to derive bid/ask (0.1%).
const SIGNAL_SPREAD: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Decimal places kept on derived bid/ask.
const PRICE_DP: u32 = 6;

/// Market signal for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSignal {
    /// Instrument, upper case (e.g. `EURUSD`).
    pub pair: String,
    /// Last traded price; zero when the feed had none.
    pub last_price: Decimal,
    /// Fundamental bias (e.g. `Bullish`).
    pub fundamental_bias: String,
    /// Fundamental power.
    pub fundamental_power: String,
    /// Model bullish probability.
    pub ai_bullish_forecast: String,
    /// Model bearish probability.
    pub ai_bearish_forecast: String,
    /// Daily trend.
    pub d1_trend: String,
    /// Daily RSI.
    pub d1_rsi: String,
    /// Retail long share.
    pub retail_long_ratio: String,
    /// Retail short share.
    pub retail_short_ratio: String,
    /// Up to three support levels.
    pub support_levels: Vec<String>,
    /// Up to three resistance levels.
    pub resistance_levels: Vec<String>,
    /// Pivot level.
    pub pivot_points: Vec<String>,
    /// Risk sentiment.
    pub risk_sentiment: String,
    /// Provenance tag.
    pub source: String,
    /// Fetch time.
    pub fetched_at: DateTime<Utc>,
}

impl MarketSignal {
    /// Price usable as a rate fallback, if positive.
    #[must_use]
    pub fn usable_price(&self) -> Option<Decimal> {
        (self.last_price > Decimal::ZERO).then_some(self.last_price)
    }
}

/// Where a rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateSource {
    /// Returned by the rate feed.
    Authoritative,
    /// Rate feed call failed; signal price substituted.
    SignalFallback,
    /// Pair outside the rate feed budget; signal price used.
    Signal,
}

impl RateSource {
    /// Label for logs and status output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authoritative => "authoritative",
            Self::SignalFallback => "signal-fallback",
            Self::Signal => "signal",
        }
    }
}

/// Exchange rate for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForexRate {
    /// Instrument, upper case.
    pub pair: String,
    /// Mid rate.
    pub rate: Decimal,
    /// Bid.
    pub bid: Decimal,
    /// Ask.
    pub ask: Decimal,
    /// Provider refresh time, as reported.
    pub last_refreshed: String,
    /// Provenance.
    pub source: RateSource,
}

impl ForexRate {
    /// Derive a rate from a signal price with a symmetric 0.1% spread.
    #[must_use]
    pub fn from_signal_price(
        pair: &str,
        price: Decimal,
        source: RateSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            pair: pair.to_string(),
            rate: price,
            bid: (price * (Decimal::ONE - SIGNAL_SPREAD)).round_dp(PRICE_DP),
            ask: (price * (Decimal::ONE + SIGNAL_SPREAD)).round_dp(PRICE_DP),
            last_refreshed: now.to_rfc3339(),
            source,
        }
    }
}

/// Rates keyed by instrument.
pub type RateBook = BTreeMap<String, ForexRate>;

/// Index positive signal prices by pair.
#[must_use]
pub fn signal_prices(signals: &[MarketSignal]) -> HashMap<&str, Decimal> {
    signals
        .iter()
        .filter_map(|s| s.usable_price().map(|price| (s.pair.as_str(), price)))
        .collect()
}

/// Fill every watched pair missing from `book` with its signal price.
///
/// Returns the number of pairs added.
pub fn fill_from_signals(
    book: &mut RateBook,
    watched: &[String],
    signals: &[MarketSignal],
    now: DateTime<Utc>,
) -> usize {
    let prices = signal_prices(signals);
    let mut added = 0;

    for pair in watched {
        if book.contains_key(pair) {
            continue;
        }
        if let Some(price) = prices.get(pair.as_str()) {
            book.insert(
                pair.clone(),
                ForexRate::from_signal_price(pair, *price, RateSource::Signal, now),
            );
            added += 1;
        }
    }

    added
}

/// Count rates per provenance.
#[must_use]
pub fn source_counts(book: &RateBook) -> BTreeMap<RateSource, usize> {
    let mut counts = BTreeMap::new();
    for rate in book.values() {
        *counts.entry(rate.source).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
pub(crate) fn test_signal(pair: &str, price: Decimal) -> MarketSignal {
    MarketSignal {
        pair: pair.to_string(),
        last_price: price,
        fundamental_bias: "Bullish".to_string(),
        fundamental_power: "--".to_string(),
        ai_bullish_forecast: "55".to_string(),
        ai_bearish_forecast: "45".to_string(),
        d1_trend: "UP".to_string(),
        d1_rsi: "58".to_string(),
        retail_long_ratio: "40%".to_string(),
        retail_short_ratio: "60%".to_string(),
        support_levels: vec![],
        resistance_levels: vec![],
        pivot_points: vec![],
        risk_sentiment: "Neutral".to_string(),
        source: "test".to_string(),
        fetched_at: Utc::now(),
    }
}
