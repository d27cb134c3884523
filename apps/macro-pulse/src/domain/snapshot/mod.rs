//! Snapshot Types
//!
//! A [`Snapshot`] is one complete generation of aggregated data. Snapshots
//! are immutable once built; recording an error produces a new snapshot
//! that keeps the previous generation's data.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::calendar::Event;
use crate::domain::market::{MarketSignal, RateBook, RateSource, source_counts};
use crate::domain::narrative::{Narrative, NarrativeSections};

/// Refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateState {
    /// No refresh running.
    Idle,
    /// A refresh holds the single-flight guard.
    Updating,
}

impl UpdateState {
    /// Label for logs and status output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Updating => "updating",
        }
    }
}

/// One generation of aggregated data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// Generation counter; zero before the first successful refresh.
    pub generation: u64,
    /// Completion time of the refresh that built this generation.
    pub generated_at: Option<DateTime<Utc>>,
    /// Market signals.
    pub signals: Vec<MarketSignal>,
    /// Rates by instrument.
    pub rates: RateBook,
    /// Calendar events in chronological order.
    pub events: Vec<Event>,
    /// Narrative report.
    pub narrative: Narrative,
    /// Error from the most recent refresh, if any.
    pub last_error: Option<String>,
}

impl Snapshot {
    /// Empty snapshot present at process start.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether no generation has been published yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.generation == 0
    }

    /// Narrative sections.
    #[must_use]
    pub const fn sections(&self) -> &NarrativeSections {
        &self.narrative.sections
    }

    /// Copy of this generation with `error` recorded.
    #[must_use]
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self {
            last_error: Some(error.into()),
            ..self.clone()
        }
    }

    /// Collection sizes.
    #[must_use]
    pub fn counts(&self) -> DataCounts {
        DataCounts {
            signals: self.signals.len(),
            rates: self.rates.len(),
            events: self.events.len(),
            important_events: self
                .events
                .iter()
                .filter(|e| e.importance.is_notable())
                .count(),
            rate_sources: source_counts(&self.rates),
        }
    }
}

/// Collection sizes reported by status endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataCounts {
    /// Market signals.
    pub signals: usize,
    /// Rates.
    pub rates: usize,
    /// Events.
    pub events: usize,
    /// Events with at least medium importance.
    pub important_events: usize,
    /// Rates per provenance.
    pub rate_sources: BTreeMap<RateSource, usize>,
}

/// Snapshot as seen by a reader, with the live update state.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotView {
    /// Current generation.
    #[serde(flatten)]
    pub snapshot: Arc<Snapshot>,
    /// Whether a refresh is running.
    pub update_state: UpdateState,
}
