//! Canonical calendar event types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel for a released-value slot that does not apply (future event).
pub const NOT_APPLICABLE: &str = "N/A";

/// Sentinel for a past event whose release value has not been supplied.
pub const PENDING: &str = "pending";

/// Ordinal classification of an event's expected market effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Importance {
    /// Minor release.
    Low = 1,
    /// Noticeable release.
    Medium = 2,
    /// Market-moving release.
    High = 3,
}

impl Importance {
    /// Resolve a provider impact label (case-insensitive).
    ///
    /// `high`, `red`, `3` map to high; `medium`, `orange`, `yellow`, `2`
    /// map to medium; anything else is low.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" | "red" | "3" => Self::High,
            "medium" | "orange" | "yellow" | "2" => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Whether this event qualifies for narrative context and commentary.
    #[must_use]
    pub const fn is_notable(self) -> bool {
        matches!(self, Self::Medium | Self::High)
    }

    /// Label used in logs and prompts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl From<Importance> for u8 {
    fn from(value: Importance) -> Self {
        value as Self
    }
}

impl TryFrom<u8> for Importance {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            other => Err(format!("importance out of range: {other}")),
        }
    }
}

/// Released value of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ActualValue {
    /// Value published by the provider.
    Released(String),
    /// Event time has passed but no value was supplied.
    Pending,
    /// Event is still in the future.
    NotApplicable,
}

impl ActualValue {
    /// Text form served to consumers.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Released(value) => value,
            Self::Pending => PENDING,
            Self::NotApplicable => NOT_APPLICABLE,
        }
    }
}

impl From<ActualValue> for String {
    fn from(value: ActualValue) -> Self {
        value.as_str().to_string()
    }
}

impl From<String> for ActualValue {
    fn from(value: String) -> Self {
        match value.as_str() {
            PENDING => Self::Pending,
            NOT_APPLICABLE => Self::NotApplicable,
            _ => Self::Released(value),
        }
    }
}

/// A normalized economic calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// 1-based position within the normalized batch.
    pub id: u32,
    /// Calendar date in the target timezone.
    pub date: NaiveDate,
    /// Local time `HH:MM` in the target timezone.
    pub time: String,
    /// Two-letter country code, `GL` when unknown.
    pub country: String,
    /// Three-letter currency code.
    pub currency: String,
    /// Event title.
    pub name: String,
    /// Consensus forecast, opaque.
    pub forecast: String,
    /// Previous release, opaque.
    pub previous: String,
    /// Released value or sentinel.
    pub actual: ActualValue,
    /// Expected market effect.
    pub importance: Importance,
    /// Short generated commentary.
    pub commentary: Option<String>,
    /// Provenance tag.
    pub source: String,
}

impl Event {
    /// Sort key; zero-padded so lexicographic order is chronological.
    #[must_use]
    pub fn sort_key(&self) -> (NaiveDate, &str) {
        (self.date, self.time.as_str())
    }
}
