//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Chat completion HTTP client.
pub mod completion;

/// Configuration loading.
pub mod config;

/// Signal, rate and calendar feed adapters.
pub mod feeds;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
