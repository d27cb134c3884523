//! Refresh Pipeline Integration Tests
//!
//! Drive the coordinator end to end with in-process stub ports:
//! - Full refresh and generation numbering
//! - Single-flight triggers and the Updating state
//! - Completion timeout degrading to placeholder sections
//! - Panic containment keeping the previous generation, before and after a publish
//! - Feed failures falling back to signal prices and the fallback calendar
//! - Lazy refresh on first read

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use macro_pulse::application::ports::{
    CalendarFeedPort, CompletionError, CompletionPort, CompletionRequest, FeedError, RateFeedPort,
    SignalFeedPort,
};
use macro_pulse::application::services::{PipelineError, RefreshSettings, SynthesizerSettings};
use macro_pulse::domain::calendar::fallback::FALLBACK_SOURCE;
use macro_pulse::{
    EventNormalizer, ForexRate, MarketSignal, NarrativeOutcome, NarrativeSynthesizer, RateSource,
    RefreshCoordinator, RefreshPorts, RefreshResult, SectionKey, SnapshotStore, TriggerOutcome,
    TriggerSource, UpdateState,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::sync::Notify;

// ============================================
// Fixtures
// ============================================

/// 12:00 in Shanghai on 2024-03-12.
fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 12, 4, 0, 0).unwrap()
}

const REPORT: &str = "【市场焦点】Dollar firm ahead of US CPI as yields edge higher across the curve.\n\
【重要事件】US CPI at 20:30 is the key release; a hot print would lift USD broadly.\n\
【关键货币对分析】EURUSD capped below 1.0950, USDJPY supported above 147.00 on yield spread.\n\
【风险提示】Geopolitical headlines and thin liquidity could trigger sharp reversals today.";

fn signal(pair: &str, price: Decimal) -> MarketSignal {
    MarketSignal {
        pair: pair.to_string(),
        last_price: price,
        fundamental_bias: "Bullish".to_string(),
        fundamental_power: "Strong".to_string(),
        ai_bullish_forecast: "60".to_string(),
        ai_bearish_forecast: "40".to_string(),
        d1_trend: "UP".to_string(),
        d1_rsi: "55".to_string(),
        retail_long_ratio: "45%".to_string(),
        retail_short_ratio: "55%".to_string(),
        support_levels: vec!["1.0800".to_string()],
        resistance_levels: vec!["1.0950".to_string()],
        pivot_points: vec!["1.0870".to_string()],
        risk_sentiment: "Neutral".to_string(),
        source: "stub".to_string(),
        fetched_at: fixed_now(),
    }
}

fn calendar_records() -> Vec<Value> {
    vec![
        json!({"title": "CPI m/m", "country": "USD", "date": "2024-03-12T08:30:00-04:00", "impact": "High", "forecast": "0.4%", "previous": "0.3%"}),
        json!({"title": "BoE Gov Bailey Speaks", "country": "GBP", "date": "2024-03-12T10:00:00-04:00", "impact": "Medium"}),
        json!({"title": "Bank Holiday", "country": "JPY", "date": "2024-03-12T00:00:00-04:00", "impact": "Holiday"}),
        json!({"title": "Stale Release", "country": "EUR", "date": "2024-03-08T05:00:00-05:00", "impact": "High"}),
    ]
}

// ============================================
// Stub Ports
// ============================================

#[derive(Default)]
struct StubSignals {
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl SignalFeedPort for StubSignals {
    async fn fetch_signal(&self, pair: &str) -> Result<MarketSignal, FeedError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0
            && let Some(gate) = &self.gate
        {
            gate.notified().await;
        }
        match pair {
            "EURUSD" => Ok(signal(pair, Decimal::new(10870, 4))),
            "USDJPY" => Ok(signal(pair, Decimal::new(14755, 2))),
            _ => Err(FeedError::Empty { feed: "stub" }),
        }
    }
}

#[derive(Default)]
struct StubRates {
    fail: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl RateFeedPort for StubRates {
    async fn fetch_rate(&self, pair: &str) -> Result<ForexRate, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FeedError::Rejected {
                feed: "stub",
                message: "rate limit".to_string(),
            });
        }
        Ok(ForexRate {
            pair: pair.to_string(),
            rate: Decimal::new(1085, 3),
            bid: Decimal::new(1084, 3),
            ask: Decimal::new(1086, 3),
            last_refreshed: "2024-03-12 03:59:00".to_string(),
            source: RateSource::Authoritative,
        })
    }
}

enum CalendarBehavior {
    Records,
    Fail,
    Panic,
}

struct StubCalendar {
    behavior: CalendarBehavior,
    panic_next: AtomicBool,
}

#[async_trait]
impl CalendarFeedPort for StubCalendar {
    async fn fetch_calendar(&self) -> Result<Vec<Value>, FeedError> {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("calendar adapter bug");
        }
        match self.behavior {
            CalendarBehavior::Records => Ok(calendar_records()),
            CalendarBehavior::Fail => Err(FeedError::Timeout { feed: "stub" }),
            CalendarBehavior::Panic => panic!("calendar adapter bug"),
        }
    }
}

/// Replies with the report, or commentary for event prompts.
#[derive(Default)]
struct StubCompletion {
    hang_report: AtomicBool,
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionPort for StubCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let user = &request.messages[1].content;
        if user.starts_with("Event:") {
            return Ok("Hot print supports the dollar.".to_string());
        }
        if self.hang_report.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(REPORT.to_string())
    }
}

struct Harness {
    coordinator: Arc<RefreshCoordinator>,
    store: Arc<SnapshotStore>,
    signals: Arc<StubSignals>,
    rates: Arc<StubRates>,
    calendar: Arc<StubCalendar>,
    completion: Arc<StubCompletion>,
}

fn harness(signals: StubSignals, rates: StubRates, calendar: CalendarBehavior) -> Harness {
    let signals = Arc::new(signals);
    let rates = Arc::new(rates);
    let calendar = Arc::new(StubCalendar {
        behavior: calendar,
        panic_next: AtomicBool::new(false),
    });
    let completion = Arc::new(StubCompletion::default());
    let store = Arc::new(SnapshotStore::new());

    let synthesizer = NarrativeSynthesizer::new(
        Arc::clone(&completion) as Arc<dyn CompletionPort>,
        SynthesizerSettings {
            timeout: Duration::from_millis(200),
            commentary_timeout: Duration::from_millis(200),
            ..SynthesizerSettings::default()
        },
    );

    let coordinator = RefreshCoordinator::new(
        Arc::clone(&store),
        RefreshPorts {
            signals: Arc::clone(&signals) as Arc<dyn SignalFeedPort>,
            rates: Arc::clone(&rates) as Arc<dyn RateFeedPort>,
            calendar: Arc::clone(&calendar) as Arc<dyn CalendarFeedPort>,
        },
        synthesizer,
        EventNormalizer::new(chrono_tz::Asia::Shanghai),
        RefreshSettings {
            watch_pairs: vec!["EURUSD".to_string(), "USDJPY".to_string(), "XAUUSD".to_string()],
            rate_pair_limit: 1,
            ..RefreshSettings::default()
        },
    )
    .with_clock(fixed_now);

    Harness {
        coordinator: Arc::new(coordinator),
        store,
        signals,
        rates,
        calendar,
        completion,
    }
}

fn default_harness() -> Harness {
    harness(
        StubSignals::default(),
        StubRates::default(),
        CalendarBehavior::Records,
    )
}

// ============================================
// Full Refresh
// ============================================

#[tokio::test]
async fn refresh_publishes_complete_generation() {
    let h = default_harness();

    let result = h.coordinator.run_exclusive(TriggerSource::OnDemand).await;
    assert_eq!(
        result,
        Some(RefreshResult::Published {
            generation: 1,
            degraded: None
        })
    );

    let snapshot = h.store.load();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.generated_at, Some(fixed_now()));
    assert_eq!(snapshot.signals.len(), 2);
    assert!(snapshot.last_error.is_none());
    assert_eq!(h.store.update_state(), UpdateState::Idle);

    // One authoritative rate, the other priced pair from its signal
    assert_eq!(snapshot.rates["EURUSD"].source, RateSource::Authoritative);
    assert_eq!(snapshot.rates["USDJPY"].source, RateSource::Signal);
    assert!(!snapshot.rates.contains_key("XAUUSD"));
    assert_eq!(h.rates.calls.load(Ordering::SeqCst), 1);

    // Past record dropped; ids follow chronological order
    let names: Vec<&str> = snapshot.events.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Bank Holiday", "CPI m/m", "BoE Gov Bailey Speaks"]);
    let ids: Vec<u32> = snapshot.events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(snapshot.events.iter().all(|e| e.commentary.is_some()));

    assert_eq!(snapshot.narrative.outcome, NarrativeOutcome::Generated);
    assert!(snapshot.narrative.sections.is_complete());
    assert!(
        snapshot
            .sections()
            .get(SectionKey::Events)
            .contains("US CPI at 20:30")
    );
}

#[tokio::test]
async fn generations_increase_by_one() {
    let h = default_harness();
    for expected in 1..=3 {
        let result = h.coordinator.run_exclusive(TriggerSource::Interval).await;
        assert!(
            matches!(result, Some(RefreshResult::Published { generation, .. }) if generation == expected)
        );
    }
    assert_eq!(h.store.load().generation, 3);
}

// ============================================
// Single-Flight
// ============================================

#[tokio::test]
async fn concurrent_triggers_are_discarded() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        StubSignals {
            gate: Some(Arc::clone(&gate)),
            ..StubSignals::default()
        },
        StubRates::default(),
        CalendarBehavior::Records,
    );

    assert_eq!(h.coordinator.refresh(), TriggerOutcome::Started);
    tokio::task::yield_now().await;

    // Held open by the gate
    assert_eq!(h.store.update_state(), UpdateState::Updating);
    assert_eq!(h.coordinator.refresh(), TriggerOutcome::AlreadyRunning);
    assert_eq!(
        h.coordinator.trigger(TriggerSource::Daily),
        TriggerOutcome::AlreadyRunning
    );
    assert!(h.coordinator.run_exclusive(TriggerSource::Interval).await.is_none());

    let view = h.coordinator.current_snapshot();
    assert_eq!(view.update_state, UpdateState::Updating);
    assert_eq!(view.snapshot.generation, 0);

    gate.notify_one();
    for _ in 0..100 {
        if h.store.update_state() == UpdateState::Idle {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(h.store.update_state(), UpdateState::Idle);
    assert_eq!(h.store.load().generation, 1);
    // Only the first trigger ran the pipeline: three pairs, one call each
    assert_eq!(h.signals.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn lazy_read_starts_refresh_once() {
    let h = default_harness();

    let view = h.coordinator.current_snapshot();
    assert!(view.snapshot.is_empty());

    for _ in 0..100 {
        if !h.store.is_empty() && h.store.update_state() == UpdateState::Idle {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let view = h.coordinator.current_snapshot();
    assert_eq!(view.snapshot.generation, 1);
    assert_eq!(view.update_state, UpdateState::Idle);
}

// ============================================
// Degradation
// ============================================

#[tokio::test]
async fn completion_timeout_publishes_placeholders() {
    let h = default_harness();
    h.coordinator.run_exclusive(TriggerSource::Startup).await;
    let before = h.store.load();

    h.completion.hang_report.store(true, Ordering::SeqCst);
    let result = h.coordinator.run_exclusive(TriggerSource::Interval).await;

    let Some(RefreshResult::Published {
        generation,
        degraded: Some(reason),
    }) = result
    else {
        panic!("expected degraded publish, got {result:?}");
    };
    assert_eq!(generation, 2);
    assert!(reason.contains("timed out"));

    let after = h.store.load();
    assert_eq!(after.narrative.outcome, NarrativeOutcome::Substituted);
    assert!(after.narrative.sections.is_complete());
    for key in SectionKey::ALL {
        assert_eq!(after.sections().get(key), key.placeholder());
    }
    assert_eq!(after.last_error.as_deref(), Some(reason.as_str()));

    // Data half of the generation is unaffected
    let key = |e: &macro_pulse::Event| (e.id, e.name.clone(), e.date, e.time.clone());
    assert_eq!(
        after.events.iter().map(key).collect::<Vec<_>>(),
        before.events.iter().map(key).collect::<Vec<_>>()
    );
    assert_eq!(after.signals, before.signals);
    assert_eq!(h.store.update_state(), UpdateState::Idle);
}

#[tokio::test]
async fn panic_keeps_previous_generation() {
    let h = harness(
        StubSignals::default(),
        StubRates::default(),
        CalendarBehavior::Panic,
    );

    let result = h.coordinator.run_exclusive(TriggerSource::OnDemand).await;
    assert!(matches!(
        result,
        Some(RefreshResult::Failed(PipelineError::Panicked(ref msg))) if msg.contains("calendar adapter bug")
    ));

    let snapshot = h.store.load();
    assert_eq!(snapshot.generation, 0);
    assert!(snapshot.last_error.as_deref().unwrap().contains("panicked"));
    assert_eq!(h.store.update_state(), UpdateState::Idle);

    // Guard released: the next trigger is accepted
    assert!(h.coordinator.run_exclusive(TriggerSource::OnDemand).await.is_some());
}

#[tokio::test]
async fn failed_refresh_keeps_published_generation() {
    let h = default_harness();

    let first = h.coordinator.run_exclusive(TriggerSource::Startup).await;
    assert!(matches!(first, Some(RefreshResult::Published { generation: 1, .. })));
    let published = h.store.load();

    h.calendar.panic_next.store(true, Ordering::SeqCst);
    let second = h.coordinator.run_exclusive(TriggerSource::Interval).await;
    assert!(matches!(second, Some(RefreshResult::Failed(PipelineError::Panicked(_)))));

    let view = h.store.view();
    let current = &view.snapshot;
    assert_eq!(current.generation, 1);
    assert_eq!(current.generated_at, published.generated_at);
    assert_eq!(current.events, published.events);
    assert_eq!(current.signals, published.signals);
    assert_eq!(current.sections(), published.sections());
    assert!(current.last_error.as_deref().unwrap().contains("panicked"));
    assert!(published.last_error.is_none());
    assert_eq!(view.update_state, UpdateState::Idle);

    // The next successful run publishes generation 2 and clears the error
    let third = h.coordinator.run_exclusive(TriggerSource::OnDemand).await;
    assert!(matches!(third, Some(RefreshResult::Published { generation: 2, .. })));
    assert!(h.store.load().last_error.is_none());
}

#[tokio::test]
async fn feed_failures_fall_back() {
    let h = harness(
        StubSignals::default(),
        StubRates {
            fail: true,
            ..StubRates::default()
        },
        CalendarBehavior::Fail,
    );

    h.coordinator.run_exclusive(TriggerSource::OnDemand).await;
    let snapshot = h.store.load();

    assert_eq!(snapshot.rates["EURUSD"].source, RateSource::SignalFallback);
    assert_eq!(snapshot.rates["EURUSD"].rate, Decimal::new(10870, 4));
    assert!(snapshot.rates["EURUSD"].bid < snapshot.rates["EURUSD"].ask);

    assert!(!snapshot.events.is_empty());
    assert!(snapshot.events.iter().all(|e| e.source == FALLBACK_SOURCE));
    assert!(
        snapshot
            .events
            .windows(2)
            .all(|w| (w[0].date, &w[0].time) <= (w[1].date, &w[1].time))
    );
}

#[tokio::test]
async fn commentary_is_budgeted() {
    let h = default_harness();
    h.coordinator.run_exclusive(TriggerSource::OnDemand).await;

    let snapshot = h.store.load();
    let cpi = snapshot.events.iter().find(|e| e.name == "CPI m/m").unwrap();
    assert_eq!(cpi.commentary.as_deref(), Some("Hot print supports the dollar."));

    // One report call plus one per notable event
    let notable = snapshot
        .events
        .iter()
        .filter(|e| e.importance.is_notable())
        .count();
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1 + notable);
}
