#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::significant_drop_tightening
    )
)]

//! Macro Pulse - Economic Calendar & Market Narrative Service
//!
//! Collects market signals, exchange rates and the weekly economic calendar,
//! normalizes calendar records into a consistent event shape, asks a
//! chat-completion service for a sectioned market report and publishes the
//! result as an immutable snapshot generation.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and rules
//!   - `calendar`: Event model, record normalization, fallback calendar
//!   - `market`: Signals, rates and the rate book
//!   - `narrative`: Prompts, section parsing and repair
//!   - `snapshot`: Published generation and status view
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Signal, rate, calendar and completion interfaces
//!   - `services`: Snapshot store, synthesizer, refresh coordinator, scheduler
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `feeds`: Ziwox, Alpha Vantage and Forex Factory adapters
//!   - `completion`: OpenAI-compatible chat client
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `metrics` / `telemetry`: Prometheus and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//! signals ──► rates ──► calendar ──► narrative ──► commentary ──► publish
//!    │          │           │             │
//!  Ziwox   Alpha Vantage  Forex Factory  chat completion
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure types and rules with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::calendar::{Event, EventNormalizer, Importance, NormalizedBatch, SkipReason};
pub use domain::market::{ForexRate, MarketSignal, RateBook, RateSource};
pub use domain::narrative::{Narrative, NarrativeOutcome, NarrativeSections, SectionKey};
pub use domain::snapshot::{DataCounts, Snapshot, SnapshotView, UpdateState};

// Application services
pub use application::services::{
    NarrativeSynthesizer, RefreshCoordinator, RefreshPorts, RefreshResult, RefreshScheduler,
    SnapshotStore, TriggerOutcome, TriggerSource,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, ServiceConfig};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
