//! Narrative section schema.

use std::collections::BTreeMap;

use serde::Serialize;

/// Minimum trimmed length for a section to count as usable.
pub const MIN_SECTION_CHARS: usize = 30;

/// Required narrative section, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKey {
    /// Dominant market themes.
    Market,
    /// Calendar events worth watching.
    Events,
    /// Key instruments and levels.
    Outlook,
    /// Data, event and liquidity risks.
    Risks,
}

impl SectionKey {
    /// Every required key in report order.
    pub const ALL: [Self; 4] = [Self::Market, Self::Events, Self::Outlook, Self::Risks];

    /// Stable key used in serialized output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Events => "events",
            Self::Outlook => "outlook",
            Self::Risks => "risks",
        }
    }

    /// Label the model is asked to emit.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Market => "Market Focus",
            Self::Events => "Key Events",
            Self::Outlook => "Pair Outlook",
            Self::Risks => "Risk Watch",
        }
    }

    /// Alternative labels a reply may use instead of [`Self::label`].
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Market => &["Market Overview", "Market Focus", "市场焦点"],
            Self::Events => &["Key Events", "Event Watch", "Calendar", "重要事件"],
            Self::Outlook => &["Pair Outlook", "Pair Analysis", "Currency Outlook", "关键货币对分析"],
            Self::Risks => &["Risk Watch", "Risks", "Risk Warning", "风险提示"],
        }
    }

    /// Deterministic filler used when no usable text exists.
    #[must_use]
    pub const fn placeholder(self) -> &'static str {
        match self {
            Self::Market => {
                "Market commentary is unavailable for this update. Watch the dollar index and \
                 major yields for the day's direction."
            }
            Self::Events => {
                "Event commentary is unavailable for this update. Check the calendar below for \
                 scheduled high-impact releases."
            }
            Self::Outlook => {
                "Pair outlook is unavailable for this update. Refer to the signal table for \
                 trend, bias and key levels."
            }
            Self::Risks => {
                "Risk commentary is unavailable for this update. Expect volatility around \
                 data releases and thin liquidity periods."
            }
        }
    }
}

/// Sections recovered so far; may be missing keys or hold short text.
pub type PartialSections = BTreeMap<SectionKey, String>;

/// Whether `text` is long enough to stand as a section.
#[must_use]
pub fn is_substantial(text: &str) -> bool {
    text.trim().chars().count() >= MIN_SECTION_CHARS
}

/// Complete narrative: every [`SectionKey`] maps to non-empty text.
///
/// Only constructible through [`NarrativeSections::placeholders`] or the
/// repair pass, both of which fill every key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NarrativeSections {
    entries: BTreeMap<SectionKey, String>,
}

impl NarrativeSections {
    /// Every section set to its placeholder.
    #[must_use]
    pub fn placeholders() -> Self {
        Self {
            entries: SectionKey::ALL
                .into_iter()
                .map(|key| (key, key.placeholder().to_string()))
                .collect(),
        }
    }

    pub(crate) fn from_complete(entries: BTreeMap<SectionKey, String>) -> Self {
        Self { entries }
    }

    /// Text for `key`.
    #[must_use]
    pub fn get(&self, key: SectionKey) -> &str {
        self.entries.get(&key).map_or("", String::as_str)
    }

    /// Sections in report order.
    pub fn iter(&self) -> impl Iterator<Item = (SectionKey, &str)> {
        self.entries.iter().map(|(key, text)| (*key, text.as_str()))
    }

    /// Keys that are missing or blank. Empty when the schema holds.
    #[must_use]
    pub fn missing(&self) -> Vec<SectionKey> {
        SectionKey::ALL
            .into_iter()
            .filter(|key| self.entries.get(key).is_none_or(|text| text.trim().is_empty()))
            .collect()
    }

    /// Whether every required key is present and non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.entries.len() == SectionKey::ALL.len() && self.missing().is_empty()
    }
}

impl Default for NarrativeSections {
    fn default() -> Self {
        Self::placeholders()
    }
}
