//! Prompt construction.
//!
//! Prompts are pure functions of their inputs so identical context always
//! yields an identical request.

use std::fmt::Write as _;

use crate::domain::calendar::Event;
use crate::domain::market::{MarketSignal, RateBook};

use super::sections::SectionKey;

const NARRATIVE_SYSTEM: &str = "You are an experienced macro FX trader. You combine technical \
and fundamental views into clear, direct, actionable analysis. Keep answers short and focused.";

const COMMENTARY_SYSTEM: &str = "You are a macro FX analyst. Reply with one or two sentences \
on how the release may move the affected currency. No preamble.";

/// Commentary for events that get no model call.
pub const GENERIC_COMMENTARY: &str =
    "Lower-impact release; limited market reaction expected unless the figure surprises sharply.";

/// System and user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    /// System instruction.
    pub system: String,
    /// User message.
    pub user: String,
}

/// Aggregated context for one narrative request.
#[derive(Debug, Clone, Copy)]
pub struct NarrativeContext<'a> {
    /// Market signals in feed order.
    pub signals: &'a [MarketSignal],
    /// Rates by instrument.
    pub rates: &'a RateBook,
    /// Normalized events in chronological order.
    pub events: &'a [Event],
    /// Number of signals summarized.
    pub top_signals: usize,
    /// Number of notable events summarized.
    pub top_events: usize,
}

/// Earliest `limit` events with at least medium importance.
#[must_use]
pub fn notable_events(events: &[Event], limit: usize) -> Vec<&Event> {
    events
        .iter()
        .filter(|event| event.importance.is_notable())
        .take(limit)
        .collect()
}

/// Build the narrative request.
#[must_use]
pub fn narrative_prompt(context: &NarrativeContext<'_>) -> ChatPrompt {
    let mut user = String::from(
        "Write a concise FX market briefing for today's intraday traders based on the data below.\n\n",
    );

    user.push_str("[Market data]\n");
    let signals: Vec<_> = context.signals.iter().take(context.top_signals).collect();
    if signals.is_empty() {
        user.push_str("No market data available.\n");
    }
    for (i, signal) in signals.iter().enumerate() {
        let rate = context
            .rates
            .get(&signal.pair)
            .map_or_else(|| "N/A".to_string(), |r| r.rate.to_string());
        let _ = writeln!(
            user,
            "{}. {}: rate {} | trend {} | bias {}",
            i + 1,
            signal.pair,
            rate,
            non_blank(&signal.d1_trend, "NEUTRAL"),
            non_blank(&signal.fundamental_bias, "Neutral"),
        );
    }

    user.push_str("\n[Economic calendar]\n");
    let events = notable_events(context.events, context.top_events);
    if events.is_empty() {
        user.push_str("No important events today.\n");
    }
    for (i, event) in events.iter().enumerate() {
        let _ = writeln!(
            user,
            "{}. {} {} {}: forecast {}, previous {}",
            i + 1,
            event.time,
            event.country,
            event.name,
            event.forecast,
            event.previous,
        );
    }

    user.push_str(
        "\n[Format]\nUse exactly these sections, in this order, each starting with its \
         bracketed label on its own line:\n",
    );
    for (i, key) in SectionKey::ALL.iter().enumerate() {
        let _ = writeln!(user, "{}. [{}]", i + 1, key.label());
    }
    user.push_str("Base the analysis on the data above; keep it to 300-400 words.");

    ChatPrompt {
        system: NARRATIVE_SYSTEM.to_string(),
        user,
    }
}

/// Build the commentary request for one event.
#[must_use]
pub fn commentary_prompt(event: &Event) -> ChatPrompt {
    ChatPrompt {
        system: COMMENTARY_SYSTEM.to_string(),
        user: format!(
            "Event: {} ({}, {})\nScheduled: {} {}\nForecast: {}\nPrevious: {}\nImportance: {}",
            event.name,
            event.country,
            event.currency,
            event.date,
            event.time,
            event.forecast,
            event.previous,
            event.importance.as_str(),
        ),
    }
}

/// Deterministic commentary used when the model call fails.
#[must_use]
pub fn templated_commentary(event: &Event) -> String {
    format!(
        "{} for {} is due at {}. A print away from the {} forecast (previous {}) could move {} \
         pairs.",
        event.name, event.country, event.time, event.forecast, event.previous, event.currency,
    )
}

fn non_blank<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}
