//! Configuration Module
//!
//! Configuration loading for the service.

mod settings;

pub use settings::{
    CompletionSettings, ConfigError, FeedSettings, MIN_COMPLETION_KEY_CHARS, NarrativeConfig,
    RefreshConfig, Secret, ServerSettings, ServiceConfig,
};
