//! Macro Pulse Binary
//!
//! Starts the refresh pipeline, its triggers and the health server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin macro-pulse
//! ```
//!
//! # Environment Variables
//!
//! ## Feeds
//! - `ZIWOX_API_KEY`: Signal feed key (signals skipped when unset)
//! - `ALPHA_VANTAGE_KEY`: Rate feed key (signal prices used when unset)
//! - `USE_MOCK_DATA`: Use the built-in calendar and skip the rate feed
//!
//! ## Completion
//! - `ENABLE_AI`: Master switch (default: true)
//! - `OPENAI_API_KEY`: Bearer token; keys shorter than 30 chars disable completion
//! - `OPENAI_BASE_URL`: Base URL (default: <https://api.openai.com/v1>)
//! - `COMPLETION_MODEL`: Model identifier (default: gpt-4o-mini)
//!
//! ## Refresh
//! - `MACRO_PULSE_TIMEZONE`: Target timezone (default: Asia/Shanghai)
//! - `MACRO_PULSE_DAILY_TIMES`: Daily refresh times (default: 08:00,16:00)
//! - `MACRO_PULSE_REFRESH_INTERVAL_MINS`: Periodic interval (default: 120)
//! - `MACRO_PULSE_PAIRS`: Watched instruments, comma separated
//! - `MACRO_PULSE_HEALTH_PORT`: Health check HTTP port (default: 8082)
//!
//! ## Telemetry
//! - `OTEL_ENABLED`: Enable OpenTelemetry span export (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `RUST_LOG`: Log filter (default: `macro_pulse=info`)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use macro_pulse::application::ports::{CompletionPort, DisabledCompletion};
use macro_pulse::infrastructure::completion::ChatCompletionClient;
use macro_pulse::infrastructure::feeds::{
    AlphaVantageRateFeed, ForexFactoryCalendarFeed, ZiwoxSignalFeed,
};
use macro_pulse::infrastructure::telemetry;
use macro_pulse::{
    HealthServer, HealthServerState, NarrativeSynthesizer, RefreshCoordinator, RefreshPorts,
    RefreshResult, RefreshScheduler, ServiceConfig, SnapshotStore, TriggerSource, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Macro Pulse");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Feed adapters
    let ports = RefreshPorts {
        signals: Arc::new(ZiwoxSignalFeed::new(&config.feeds)?),
        rates: Arc::new(AlphaVantageRateFeed::new(&config.feeds)?),
        calendar: Arc::new(ForexFactoryCalendarFeed::new(&config.feeds)?),
    };

    // Completion client, or a disabled port when switched off
    let completion: Arc<dyn CompletionPort> = if config.completion.is_usable() {
        Arc::new(ChatCompletionClient::new(&config.completion)?)
    } else {
        tracing::warn!("Completion disabled or key missing, narrative will use placeholders");
        Arc::new(DisabledCompletion)
    };
    let synthesizer = NarrativeSynthesizer::new(completion, config.synthesizer_settings());

    let store = Arc::new(SnapshotStore::new());
    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::clone(&store),
        ports,
        synthesizer,
        config.normalizer(),
        config.refresh_settings(),
    ));

    // Spawn health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&store),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    let health_task = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Initial refresh completes before the timed triggers are armed
    match coordinator.run_exclusive(TriggerSource::Startup).await {
        Some(RefreshResult::Published { generation, .. }) => {
            tracing::info!(generation, "Initial refresh published");
        }
        Some(RefreshResult::Failed(e)) => {
            tracing::warn!(error = %e, "Initial refresh failed, waiting for next trigger");
        }
        None => {}
    }

    let scheduler = RefreshScheduler::new(Arc::clone(&coordinator), config.schedule_settings());
    let mut tasks = scheduler.spawn(shutdown_token.clone());
    tasks.push(health_task);

    tracing::info!("Macro Pulse ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, futures::future::join_all(tasks))
        .await
        .is_err()
    {
        tracing::warn!("Shutdown timeout elapsed, exiting with tasks still running");
    }

    tracing::info!("Macro Pulse stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        timezone = %config.refresh.timezone,
        pairs = config.refresh.watch_pairs.len(),
        rate_pairs = config.refresh.rate_pair_limit,
        interval_mins = config.refresh.interval.as_secs() / 60,
        use_mock_data = config.refresh.use_mock_data,
        completion = config.completion.is_usable(),
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        signal_feed = config.feeds.ziwox_api_key.is_some(),
        rate_feed = config.feeds.alpha_vantage_key.is_some(),
        model = %config.completion.model,
        base_url = %config.completion.base_url,
        "Upstream endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
