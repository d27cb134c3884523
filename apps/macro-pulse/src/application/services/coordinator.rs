//! Refresh Coordinator
//!
//! Runs the refresh pipeline (signals, rates, calendar, narrative, publish)
//! under the store's single-flight guard.
//!
//! # Triggers
//!
//! Every trigger goes through [`SnapshotStore::try_begin`]. A trigger that
//! loses the compare-and-swap is logged, counted and dropped; it never
//! queues and never touches the published generation.
//!
//! # Failure containment
//!
//! Collaborator failures degrade data at the call site (skip a pair, fall
//! back to signal prices, use the fallback calendar, use placeholder
//! sections). Only a [`PipelineError`] reaches this level, and panics are
//! caught here too. Either way the previous generation stays published with
//! the error recorded, and the guard returns the store to Idle.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::time::timeout;

use super::store::{SnapshotStore, UpdateGuard};
use super::synthesizer::NarrativeSynthesizer;
use crate::application::ports::{CalendarFeedPort, FeedError, RateFeedPort, SignalFeedPort};
use crate::domain::calendar::{EventNormalizer, NormalizedBatch, fallback};
use crate::domain::market::{ForexRate, MarketSignal, RateBook, RateSource, fill_from_signals, signal_prices};
use crate::domain::narrative::{NarrativeContext, SectionKey};
use crate::domain::snapshot::{Snapshot, SnapshotView};
use crate::infrastructure::metrics::{self, RefreshOutcome};

/// What started a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    /// Synchronous refresh at process start.
    Startup,
    /// Periodic timer.
    Interval,
    /// Fixed daily time.
    Daily,
    /// Explicit `refresh()` call.
    OnDemand,
    /// Reader found the store empty.
    Lazy,
}

impl TriggerSource {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Interval => "interval",
            Self::Daily => "daily",
            Self::OnDemand => "on_demand",
            Self::Lazy => "lazy",
        }
    }
}

/// Immediate answer to a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A new refresh was started.
    Started,
    /// A refresh was already running; nothing was started.
    AlreadyRunning,
}

/// Unexpected failure that aborts a refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The pipeline panicked.
    #[error("refresh pipeline panicked: {0}")]
    Panicked(String),

    /// No signals, rates or events at all.
    #[error("refresh produced no data")]
    EmptyGeneration,

    /// Narrative sections were missing after repair.
    #[error("narrative sections incomplete: {0:?}")]
    SectionsIncomplete(Vec<SectionKey>),
}

/// Result of a refresh that held the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshResult {
    /// New generation published.
    Published {
        /// Generation number.
        generation: u64,
        /// Degradation recorded on the generation, if any.
        degraded: Option<String>,
    },
    /// Refresh aborted; previous generation kept with the error recorded.
    Failed(PipelineError),
}

/// Refresh tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Watched instruments, upper case.
    pub watch_pairs: Vec<String>,
    /// Leading watched pairs requested from the rate feed.
    pub rate_pair_limit: usize,
    /// Use the fallback calendar and skip the rate feed.
    pub use_mock_data: bool,
    /// Deadline per signal call.
    pub signal_timeout: Duration,
    /// Deadline per rate call, pacing included.
    pub rate_timeout: Duration,
    /// Deadline for the calendar call.
    pub calendar_timeout: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            watch_pairs: [
                "EURUSD", "GBPUSD", "USDCHF", "USDCNH", "USDJPY", "AUDUSD", "XAUUSD", "XAGUSD",
                "BTCUSD",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            rate_pair_limit: 5,
            use_mock_data: false,
            signal_timeout: Duration::from_secs(20),
            rate_timeout: Duration::from_secs(35),
            calendar_timeout: Duration::from_secs(20),
        }
    }
}

/// Data collaborators used by the pipeline.
#[derive(Clone)]
pub struct RefreshPorts {
    /// Signal feed.
    pub signals: Arc<dyn SignalFeedPort>,
    /// Rate feed.
    pub rates: Arc<dyn RateFeedPort>,
    /// Calendar feed.
    pub calendar: Arc<dyn CalendarFeedPort>,
}

/// Owns the refresh pipeline and its triggers.
pub struct RefreshCoordinator {
    store: Arc<SnapshotStore>,
    ports: RefreshPorts,
    synthesizer: NarrativeSynthesizer,
    normalizer: EventNormalizer,
    settings: RefreshSettings,
    clock: fn() -> DateTime<Utc>,
}

struct Generation {
    snapshot: Snapshot,
    degraded: Option<String>,
}

impl RefreshCoordinator {
    /// Create a coordinator over `store`.
    #[must_use]
    pub fn new(
        store: Arc<SnapshotStore>,
        ports: RefreshPorts,
        synthesizer: NarrativeSynthesizer,
        normalizer: EventNormalizer,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            store,
            ports,
            synthesizer,
            normalizer,
            settings,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Store this coordinator publishes to.
    #[must_use]
    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Start a refresh on its own task unless one is running.
    pub fn trigger(self: &Arc<Self>, source: TriggerSource) -> TriggerOutcome {
        let Some(guard) = self.begin(source) else {
            return TriggerOutcome::AlreadyRunning;
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_guarded(guard, source).await;
        });
        TriggerOutcome::Started
    }

    /// On-demand refresh. Returns immediately.
    pub fn refresh(self: &Arc<Self>) -> TriggerOutcome {
        self.trigger(TriggerSource::OnDemand)
    }

    /// Run a refresh on the current task and wait for it.
    ///
    /// Returns `None` if another refresh held the guard.
    pub async fn run_exclusive(&self, source: TriggerSource) -> Option<RefreshResult> {
        let guard = self.begin(source)?;
        Some(self.run_guarded(guard, source).await)
    }

    /// Latest generation. Starts a refresh in the background when nothing
    /// has been published yet, without waiting for it.
    pub fn current_snapshot(self: &Arc<Self>) -> SnapshotView {
        if self.store.is_empty() {
            let _ = self.trigger(TriggerSource::Lazy);
        }
        self.store.view()
    }

    fn begin(&self, source: TriggerSource) -> Option<UpdateGuard> {
        let guard = self.store.try_begin();
        if guard.is_none() {
            metrics::record_trigger_declined(source);
            tracing::info!(trigger = source.as_str(), "Refresh already running, trigger discarded");
        }
        guard
    }

    async fn run_guarded(&self, guard: UpdateGuard, source: TriggerSource) -> RefreshResult {
        let started = Instant::now();
        tracing::info!(trigger = source.as_str(), "Refresh started");

        let outcome = AssertUnwindSafe(self.run_pipeline())
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(&*payload))));

        let result = match outcome {
            Ok(Generation { snapshot, degraded }) => {
                let counts = (snapshot.signals.len(), snapshot.rates.len(), snapshot.events.len());
                let generation = guard.publish(snapshot);
                metrics::set_snapshot_sizes(generation, counts.0, counts.1, counts.2);

                let outcome = if degraded.is_some() {
                    RefreshOutcome::Degraded
                } else {
                    RefreshOutcome::Published
                };
                metrics::record_refresh(source, outcome, started.elapsed());
                tracing::info!(
                    trigger = source.as_str(),
                    generation,
                    signals = counts.0,
                    rates = counts.1,
                    events = counts.2,
                    degraded = degraded.as_deref().unwrap_or(""),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Refresh published"
                );
                RefreshResult::Published { generation, degraded }
            }
            Err(e) => {
                guard.record_error(e.to_string());
                metrics::record_refresh(source, RefreshOutcome::Failed, started.elapsed());
                tracing::error!(
                    trigger = source.as_str(),
                    error = %e,
                    "Refresh failed, keeping previous generation"
                );
                RefreshResult::Failed(e)
            }
        };

        drop(guard);
        result
    }

    async fn run_pipeline(&self) -> Result<Generation, PipelineError> {
        let now = (self.clock)();

        tracing::info!(stage = "signals", "Refresh stage 1/4");
        let signals = self.fetch_signals().await;

        tracing::info!(stage = "rates", "Refresh stage 2/4");
        let rates = self.fetch_rates(&signals, now).await;

        tracing::info!(stage = "calendar", "Refresh stage 3/4");
        let mut events = self.fetch_events(now).await.events;

        if signals.is_empty() && rates.is_empty() && events.is_empty() {
            return Err(PipelineError::EmptyGeneration);
        }

        tracing::info!(stage = "narrative", "Refresh stage 4/4");
        let settings = self.synthesizer.settings();
        let narrative = self
            .synthesizer
            .synthesize(&NarrativeContext {
                signals: &signals,
                rates: &rates,
                events: &events,
                top_signals: settings.top_signals,
                top_events: settings.top_events,
            })
            .await;

        let missing = narrative.sections.missing();
        if !missing.is_empty() {
            return Err(PipelineError::SectionsIncomplete(missing));
        }

        self.synthesizer.annotate(&mut events).await;

        let degraded = narrative
            .failure
            .as_ref()
            .map(|reason| format!("narrative degraded: {reason}"));

        Ok(Generation {
            snapshot: Snapshot {
                generation: 0,
                generated_at: Some((self.clock)()),
                signals,
                rates,
                events,
                narrative,
                last_error: degraded.clone(),
            },
            degraded,
        })
    }

    async fn fetch_signals(&self) -> Vec<MarketSignal> {
        let mut signals = Vec::with_capacity(self.settings.watch_pairs.len());

        for pair in &self.settings.watch_pairs {
            let call = self.ports.signals.fetch_signal(pair);
            match bounded("signals", self.settings.signal_timeout, call).await {
                Ok(signal) => signals.push(signal),
                Err(e) => {
                    metrics::record_feed_failure("signals", e.kind());
                    tracing::warn!(pair = %pair, error = %e, "Signal fetch failed, skipping pair");
                }
            }
        }

        tracing::info!(
            fetched = signals.len(),
            watched = self.settings.watch_pairs.len(),
            "Signals fetched"
        );
        signals
    }

    async fn fetch_rates(&self, signals: &[MarketSignal], now: DateTime<Utc>) -> RateBook {
        let prices = signal_prices(signals);
        let mut book = RateBook::new();

        if self.settings.use_mock_data {
            tracing::info!("Mock data mode, skipping rate feed");
        } else {
            for pair in self.settings.watch_pairs.iter().take(self.settings.rate_pair_limit) {
                let call = self.ports.rates.fetch_rate(pair);
                match bounded("rates", self.settings.rate_timeout, call).await {
                    Ok(rate) => {
                        book.insert(pair.clone(), rate);
                    }
                    Err(e) => {
                        metrics::record_feed_failure("rates", e.kind());
                        if let Some(price) = prices.get(pair.as_str()) {
                            tracing::warn!(pair = %pair, error = %e, "Rate fetch failed, using signal price");
                            book.insert(
                                pair.clone(),
                                ForexRate::from_signal_price(pair, *price, RateSource::SignalFallback, now),
                            );
                        } else {
                            tracing::warn!(pair = %pair, error = %e, "Rate fetch failed, no signal price");
                        }
                    }
                }
            }
        }

        let filled = fill_from_signals(&mut book, &self.settings.watch_pairs, signals, now);
        tracing::info!(rates = book.len(), from_signals = filled, "Rates assembled");
        book
    }

    async fn fetch_events(&self, now: DateTime<Utc>) -> NormalizedBatch {
        if self.settings.use_mock_data {
            tracing::info!("Mock data mode, using fallback calendar");
            return self.fallback_events(now);
        }

        let call = self.ports.calendar.fetch_calendar();
        let records = match bounded("calendar", self.settings.calendar_timeout, call).await {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => {
                tracing::warn!("Calendar feed returned no records, using fallback calendar");
                return self.fallback_events(now);
            }
            Err(e) => {
                metrics::record_feed_failure("calendar", e.kind());
                tracing::warn!(error = %e, "Calendar fetch failed, using fallback calendar");
                return self.fallback_events(now);
            }
        };

        let batch = self.normalizer.normalize(&records, now, "forex_factory");
        record_skips(&batch);

        if batch.events.is_empty() {
            tracing::warn!(
                records = records.len(),
                "No current events in calendar feed, using fallback calendar"
            );
            return self.fallback_events(now);
        }
        batch
    }

    fn fallback_events(&self, now: DateTime<Utc>) -> NormalizedBatch {
        let records = fallback::fallback_records(now, self.normalizer.timezone());
        let batch = self
            .normalizer
            .normalize(&records, now, fallback::FALLBACK_SOURCE);
        record_skips(&batch);
        batch
    }
}

async fn bounded<T>(
    feed: &'static str,
    deadline: Duration,
    call: impl Future<Output = Result<T, FeedError>>,
) -> Result<T, FeedError> {
    timeout(deadline, call)
        .await
        .unwrap_or(Err(FeedError::Timeout { feed }))
}

fn record_skips(batch: &NormalizedBatch) {
    for (_, reason) in &batch.skipped {
        metrics::record_records_skipped(reason.as_str(), 1);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
