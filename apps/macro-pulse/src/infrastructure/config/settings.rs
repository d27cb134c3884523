//! Service Configuration Settings
//!
//! Configuration types for the service, loaded from environment variables.
//! [`ServiceConfig::from_lookup`] takes any key lookup so tests can supply
//! values without touching the process environment.

use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::application::services::{
    RefreshSettings, ScheduleSettings, SynthesizerSettings,
};
use crate::domain::calendar::EventNormalizer;

/// Shortest API key accepted for the completion service.
pub const MIN_COMPLETION_KEY_CHARS: usize = 30;

/// Secret value with a redacted `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret.
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// Expose the secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Upstream data feed settings.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Signal feed key.
    pub ziwox_api_key: Option<Secret>,
    /// Signal feed endpoint.
    pub ziwox_url: String,
    /// Rate feed key.
    pub alpha_vantage_key: Option<Secret>,
    /// Rate feed endpoint.
    pub alpha_vantage_url: String,
    /// Calendar feed endpoint.
    pub forex_factory_url: String,
    /// HTTP client timeout per request.
    pub http_timeout: Duration,
    /// Gap between signal feed calls.
    pub signal_pacing: Duration,
    /// Minimum gap between rate feed calls.
    pub rate_pacing_min: Duration,
    /// Maximum gap between rate feed calls.
    pub rate_pacing_max: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            ziwox_api_key: None,
            ziwox_url: "https://ziwox.com/terminal/services/API/V1/fulldata.php".to_string(),
            alpha_vantage_key: None,
            alpha_vantage_url: "https://www.alphavantage.co/query".to_string(),
            forex_factory_url: "https://nfs.faireconomy.media/ff_calendar_thisweek.json"
                .to_string(),
            http_timeout: Duration::from_secs(15),
            signal_pacing: Duration::from_millis(500),
            rate_pacing_min: Duration::from_secs(12),
            rate_pacing_max: Duration::from_secs(15),
        }
    }
}

/// Completion service settings.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    /// Master switch.
    pub enabled: bool,
    /// Bearer token.
    pub api_key: Option<Secret>,
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Reply token limit for the report.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Deadline for the report call.
    pub timeout: Duration,
    /// Deadline for each commentary call.
    pub commentary_timeout: Duration,
}

impl CompletionSettings {
    /// Whether completion is switched on and has a plausible key.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.enabled
            && self
                .api_key
                .as_ref()
                .is_some_and(|key| key.expose().trim().len() >= MIN_COMPLETION_KEY_CHARS)
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 600,
            temperature: 0.4,
            timeout: Duration::from_secs(45),
            commentary_timeout: Duration::from_secs(20),
        }
    }
}

/// Refresh and trigger settings.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Watched instruments, upper case.
    pub watch_pairs: Vec<String>,
    /// Leading watched pairs requested from the rate feed.
    pub rate_pair_limit: usize,
    /// Fallback calendar, no rate feed.
    pub use_mock_data: bool,
    /// Periodic refresh interval.
    pub interval: Duration,
    /// Local daily refresh times.
    pub daily_times: Vec<NaiveTime>,
    /// Target timezone for dates, times and daily triggers.
    pub timezone: Tz,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        let refresh = RefreshSettings::default();
        let schedule = ScheduleSettings::default();
        Self {
            watch_pairs: refresh.watch_pairs,
            rate_pair_limit: refresh.rate_pair_limit,
            use_mock_data: false,
            interval: schedule.interval,
            daily_times: schedule.daily_times,
            timezone: schedule.timezone,
        }
    }
}

/// Narrative and calendar sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeConfig {
    /// Notable events used for context and commentary.
    pub top_events: usize,
    /// Signals summarized in the prompt.
    pub top_signals: usize,
    /// Event cap (`None` = uncapped).
    pub max_events: Option<usize>,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            top_events: 5,
            top_signals: 6,
            max_events: Some(50),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8082 }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Upstream feeds.
    pub feeds: FeedSettings,
    /// Completion service.
    pub completion: CompletionSettings,
    /// Refresh and triggers.
    pub refresh: RefreshConfig,
    /// Narrative sizing.
    pub narrative: NarrativeConfig,
    /// Server ports.
    pub server: ServerSettings,
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone, daily times or watch list are invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone, daily times or watch list are invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);
        let defaults = Self::default();

        let feeds = FeedSettings {
            ziwox_api_key: env.secret("ZIWOX_API_KEY"),
            ziwox_url: env.string("ZIWOX_API_URL", defaults.feeds.ziwox_url),
            alpha_vantage_key: env.secret("ALPHA_VANTAGE_KEY"),
            alpha_vantage_url: env.string("ALPHA_VANTAGE_URL", defaults.feeds.alpha_vantage_url),
            forex_factory_url: env.string("FOREX_FACTORY_URL", defaults.feeds.forex_factory_url),
            http_timeout: env.secs("MACRO_PULSE_HTTP_TIMEOUT_SECS", defaults.feeds.http_timeout),
            signal_pacing: env.millis("MACRO_PULSE_SIGNAL_PACING_MS", defaults.feeds.signal_pacing),
            rate_pacing_min: env.secs(
                "MACRO_PULSE_RATE_PACING_MIN_SECS",
                defaults.feeds.rate_pacing_min,
            ),
            rate_pacing_max: env.secs(
                "MACRO_PULSE_RATE_PACING_MAX_SECS",
                defaults.feeds.rate_pacing_max,
            ),
        };

        let completion = CompletionSettings {
            enabled: env.flag("ENABLE_AI", defaults.completion.enabled),
            api_key: env.secret("OPENAI_API_KEY"),
            base_url: env
                .string("OPENAI_BASE_URL", defaults.completion.base_url)
                .trim_end_matches('/')
                .to_string(),
            model: env.string("COMPLETION_MODEL", defaults.completion.model),
            max_tokens: env.parsed("COMPLETION_MAX_TOKENS", defaults.completion.max_tokens),
            temperature: env.parsed("COMPLETION_TEMPERATURE", defaults.completion.temperature),
            timeout: env.secs("COMPLETION_TIMEOUT_SECS", defaults.completion.timeout),
            commentary_timeout: env.secs(
                "COMPLETION_COMMENTARY_TIMEOUT_SECS",
                defaults.completion.commentary_timeout,
            ),
        };

        let timezone = match env.get("MACRO_PULSE_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::InvalidTimezone(name))?,
            None => defaults.refresh.timezone,
        };

        let daily_times = match env.get("MACRO_PULSE_DAILY_TIMES") {
            Some(raw) => parse_daily_times(&raw)?,
            None => defaults.refresh.daily_times,
        };

        let watch_pairs = match env.get("MACRO_PULSE_PAIRS") {
            Some(raw) => parse_pairs(&raw)?,
            None => defaults.refresh.watch_pairs,
        };

        let refresh = RefreshConfig {
            watch_pairs,
            rate_pair_limit: env.parsed("MACRO_PULSE_RATE_PAIRS", defaults.refresh.rate_pair_limit),
            use_mock_data: env.flag("USE_MOCK_DATA", defaults.refresh.use_mock_data),
            interval: env
                .get("MACRO_PULSE_REFRESH_INTERVAL_MINS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(defaults.refresh.interval, |mins| Duration::from_secs(mins * 60)),
            daily_times,
            timezone,
        };

        let narrative = NarrativeConfig {
            top_events: env.parsed("MACRO_PULSE_TOP_EVENTS", defaults.narrative.top_events),
            top_signals: env.parsed("MACRO_PULSE_TOP_SIGNALS", defaults.narrative.top_signals),
            max_events: match env.parsed::<usize>("MACRO_PULSE_MAX_EVENTS", 50) {
                0 => None,
                n => Some(n),
            },
        };

        let server = ServerSettings {
            health_port: env.parsed("MACRO_PULSE_HEALTH_PORT", defaults.server.health_port),
        };

        Ok(Self {
            feeds,
            completion,
            refresh,
            narrative,
            server,
        })
    }

    /// Settings for the narrative synthesizer.
    #[must_use]
    pub fn synthesizer_settings(&self) -> SynthesizerSettings {
        SynthesizerSettings {
            model: self.completion.model.clone(),
            max_tokens: self.completion.max_tokens,
            temperature: self.completion.temperature,
            timeout: self.completion.timeout,
            commentary_timeout: self.completion.commentary_timeout,
            top_events: self.narrative.top_events,
            top_signals: self.narrative.top_signals,
            ..SynthesizerSettings::default()
        }
    }

    /// Settings for the refresh coordinator.
    ///
    /// Per-call deadlines leave room for the adapter's pacing on top of the
    /// HTTP timeout.
    #[must_use]
    pub fn refresh_settings(&self) -> RefreshSettings {
        let http = self.feeds.http_timeout;
        RefreshSettings {
            watch_pairs: self.refresh.watch_pairs.clone(),
            rate_pair_limit: self.refresh.rate_pair_limit,
            use_mock_data: self.refresh.use_mock_data,
            signal_timeout: http + self.feeds.signal_pacing + Duration::from_secs(5),
            rate_timeout: http + self.feeds.rate_pacing_max + Duration::from_secs(5),
            calendar_timeout: http + Duration::from_secs(5),
        }
    }

    /// Settings for the refresh scheduler.
    #[must_use]
    pub fn schedule_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            interval: self.refresh.interval,
            daily_times: self.refresh.daily_times.clone(),
            timezone: self.refresh.timezone,
        }
    }

    /// Event normalizer for the configured timezone and cap.
    #[must_use]
    pub const fn normalizer(&self) -> EventNormalizer {
        EventNormalizer::new(self.refresh.timezone).with_max_events(self.narrative.max_events)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Timezone name is not in the tz database.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    /// Daily refresh time is not `HH:MM`.
    #[error("invalid daily refresh time: {0}")]
    InvalidDailyTime(String),
    /// Watch list is empty.
    #[error("watch list cannot be empty")]
    EmptyWatchList,
}

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: String) -> String {
        self.get(key).unwrap_or(default)
    }

    fn secret(&self, key: &str) -> Option<Secret> {
        self.get(key).map(Secret::new)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key).map_or(default, |v| {
            matches!(v.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
        })
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}

fn parse_daily_times(raw: &str) -> Result<Vec<NaiveTime>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveTime::parse_from_str(s, "%H:%M")
                .map_err(|_| ConfigError::InvalidDailyTime(s.to_string()))
        })
        .collect()
}

fn parse_pairs(raw: &str) -> Result<Vec<String>, ConfigError> {
    let pairs: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if pairs.is_empty() {
        return Err(ConfigError::EmptyWatchList);
    }
    Ok(pairs)
}
