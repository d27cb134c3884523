//! Refresh Scheduler
//!
//! Periodic and daily triggers, each on its own task. Both run the pipeline
//! through [`RefreshCoordinator::run_exclusive`], so a tick that lands
//! during another refresh is discarded rather than queued.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::coordinator::{RefreshCoordinator, TriggerSource};

/// Trigger timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Periodic refresh interval.
    pub interval: Duration,
    /// Local wall-clock times for the daily refreshes.
    pub daily_times: Vec<NaiveTime>,
    /// Timezone the daily times are in.
    pub timezone: Tz,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120 * 60),
            daily_times: [(8, 0), (16, 0)]
                .into_iter()
                .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
                .collect(),
            timezone: chrono_tz::Asia::Shanghai,
        }
    }
}

/// Next instant strictly after `now` matching one of `times` in `timezone`.
///
/// Local times that do not exist on a given day (DST gaps) are skipped for
/// that day; ambiguous ones resolve to the earlier instant.
#[must_use]
pub fn next_daily_run(now: DateTime<Utc>, times: &[NaiveTime], timezone: Tz) -> Option<DateTime<Utc>> {
    let today = now.with_timezone(&timezone).date_naive();

    (0..=2)
        .filter_map(|offset| today.checked_add_days(chrono::Days::new(offset)))
        .flat_map(|day| times.iter().map(move |time| day.and_time(*time)))
        .filter_map(|local| timezone.from_local_datetime(&local).earliest())
        .map(|instant| instant.with_timezone(&Utc))
        .filter(|instant| *instant > now)
        .min()
}

/// Spawns the timed trigger tasks.
pub struct RefreshScheduler {
    coordinator: Arc<RefreshCoordinator>,
    settings: ScheduleSettings,
}

impl RefreshScheduler {
    /// Create a scheduler for `coordinator`.
    #[must_use]
    pub const fn new(coordinator: Arc<RefreshCoordinator>, settings: ScheduleSettings) -> Self {
        Self {
            coordinator,
            settings,
        }
    }

    /// Start the interval and daily tasks. Both stop when `shutdown` fires.
    pub fn spawn(self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);

        if self.settings.interval.is_zero() {
            tracing::warn!("Refresh interval is zero, periodic trigger disabled");
        } else {
            handles.push(tokio::spawn(run_interval(
                Arc::clone(&self.coordinator),
                self.settings.interval,
                shutdown.clone(),
            )));
        }

        if self.settings.daily_times.is_empty() {
            tracing::info!("No daily refresh times configured");
        } else {
            handles.push(tokio::spawn(run_daily(
                Arc::clone(&self.coordinator),
                self.settings.daily_times.clone(),
                self.settings.timezone,
                shutdown,
            )));
        }

        handles
    }
}

async fn run_interval(
    coordinator: Arc<RefreshCoordinator>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(interval_mins = period.as_secs() / 60, "Interval trigger armed");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let _ = coordinator.run_exclusive(TriggerSource::Interval).await;
            }
        }
    }
    tracing::debug!("Interval trigger stopped");
}

async fn run_daily(
    coordinator: Arc<RefreshCoordinator>,
    times: Vec<NaiveTime>,
    timezone: Tz,
    shutdown: CancellationToken,
) {
    loop {
        let now = Utc::now();
        let Some(next) = next_daily_run(now, &times, timezone) else {
            tracing::error!("No future daily refresh time could be resolved");
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next = %next.with_timezone(&timezone), "Daily trigger armed");

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(wait) => {
                let _ = coordinator.run_exclusive(TriggerSource::Daily).await;
            }
        }
    }
    tracing::debug!("Daily trigger stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::{America::New_York, Asia::Shanghai};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn next_run_later_today() {
        // 10:00 in Shanghai
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        let next = next_daily_run(now, &[hm(8, 0), hm(16, 0)], Shanghai).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn next_run_rolls_to_tomorrow() {
        // 17:00 in Shanghai
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let next = next_daily_run(now, &[hm(8, 0), hm(16, 0)], Shanghai).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn exact_time_is_not_repeated() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let next = next_daily_run(now, &[hm(8, 0)], Shanghai).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn dst_gap_is_skipped() {
        // 2024-03-10 02:30 does not exist in New York
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap();
        let next = next_daily_run(now, &[hm(2, 30)], New_York).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 6, 30, 0).unwrap());
    }

    #[test]
    fn no_times_means_no_run() {
        assert!(next_daily_run(Utc::now(), &[], Shanghai).is_none());
    }

    #[test]
    fn default_schedule() {
        let settings = ScheduleSettings::default();
        assert_eq!(settings.interval, Duration::from_secs(7200));
        assert_eq!(settings.daily_times, vec![hm(8, 0), hm(16, 0)]);
    }
}
