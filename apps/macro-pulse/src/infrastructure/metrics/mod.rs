//! Prometheus Metrics Module
//!
//! Exposes refresh pipeline metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Refresh**: outcomes, declined triggers, durations
//! - **Data**: sizes of the published generation, skipped calendar records
//! - **Narrative**: completion failures, repaired sections
//! - **Feeds**: per-feed call failures
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::application::services::TriggerSource;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)] // Startup-only; a missing recorder is unrecoverable
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "macro_pulse_refreshes_total",
        "Completed refresh attempts by trigger and outcome"
    );
    describe_counter!(
        "macro_pulse_triggers_declined_total",
        "Triggers discarded because a refresh was already running"
    );
    describe_histogram!(
        "macro_pulse_refresh_duration_seconds",
        "Wall time of one refresh pipeline run"
    );

    describe_gauge!("macro_pulse_generation", "Currently published generation");
    describe_gauge!(
        "macro_pulse_snapshot_items",
        "Items in the published generation by kind"
    );
    describe_counter!(
        "macro_pulse_calendar_records_skipped_total",
        "Calendar records dropped during normalization by reason"
    );

    describe_counter!(
        "macro_pulse_completion_failures_total",
        "Failed completion calls by purpose and kind"
    );
    describe_counter!(
        "macro_pulse_sections_repaired_total",
        "Narrative sections filled by the repair pass"
    );

    describe_counter!(
        "macro_pulse_feed_failures_total",
        "Failed feed calls by feed and kind"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Refresh outcome label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New generation published, no degradation.
    Published,
    /// New generation published with a recorded degradation.
    Degraded,
    /// Pipeline aborted; previous generation kept.
    Failed,
}

impl RefreshOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }
}

/// Record a finished refresh.
pub fn record_refresh(source: TriggerSource, outcome: RefreshOutcome, duration: Duration) {
    counter!(
        "macro_pulse_refreshes_total",
        "trigger" => source.as_str(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!(
        "macro_pulse_refresh_duration_seconds",
        "trigger" => source.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record a trigger discarded by the single-flight guard.
pub fn record_trigger_declined(source: TriggerSource) {
    counter!(
        "macro_pulse_triggers_declined_total",
        "trigger" => source.as_str()
    )
    .increment(1);
}

/// Update gauges for a newly published generation.
#[allow(clippy::cast_precision_loss)]
pub fn set_snapshot_sizes(generation: u64, signals: usize, rates: usize, events: usize) {
    gauge!("macro_pulse_generation").set(generation as f64);
    gauge!("macro_pulse_snapshot_items", "kind" => "signals").set(signals as f64);
    gauge!("macro_pulse_snapshot_items", "kind" => "rates").set(rates as f64);
    gauge!("macro_pulse_snapshot_items", "kind" => "events").set(events as f64);
}

/// Record calendar records skipped for `reason`.
pub fn record_records_skipped(reason: &'static str, count: u64) {
    counter!(
        "macro_pulse_calendar_records_skipped_total",
        "reason" => reason
    )
    .increment(count);
}

/// Record a failed completion call.
pub fn record_completion_failure(purpose: &'static str, kind: &'static str) {
    counter!(
        "macro_pulse_completion_failures_total",
        "purpose" => purpose,
        "kind" => kind
    )
    .increment(1);
}

/// Record sections filled by the repair pass.
pub fn record_sections_repaired(count: u64) {
    counter!("macro_pulse_sections_repaired_total").increment(count);
}

/// Record a failed feed call.
pub fn record_feed_failure(feed: &'static str, kind: &'static str) {
    counter!(
        "macro_pulse_feed_failures_total",
        "feed" => feed,
        "kind" => kind
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
