//! Request pacing for rate-limited providers.

use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::time::Instant;

/// Enforces a minimum gap between consecutive calls to one provider.
///
/// The gap is drawn uniformly from `[min_gap, max_gap]` on every call so
/// request timing does not settle into a fixed cadence.
#[derive(Debug)]
pub struct RequestPacer {
    min_gap: Duration,
    max_gap: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Pacer with a jittered gap. A `max_gap` below `min_gap` is raised to it.
    #[must_use]
    pub fn new(min_gap: Duration, max_gap: Duration) -> Self {
        Self {
            min_gap,
            max_gap: max_gap.max(min_gap),
            last_call: Mutex::new(None),
        }
    }

    /// Pacer with a fixed gap.
    #[must_use]
    pub fn fixed(gap: Duration) -> Self {
        Self::new(gap, gap)
    }

    fn next_gap(&self) -> Duration {
        if self.max_gap <= self.min_gap {
            return self.min_gap;
        }
        rand::rng().random_range(self.min_gap..=self.max_gap)
    }

    /// Reserve the next call slot and sleep until it opens.
    ///
    /// The first call goes through immediately. Concurrent callers each
    /// reserve a distinct slot.
    pub async fn wait(&self) {
        let gap = self.next_gap();
        let slot = {
            let mut last = self.last_call.lock();
            let now = Instant::now();
            let slot = last.map_or(now, |prev| (prev + gap).max(now));
            *last = Some(slot);
            slot
        };

        if slot > Instant::now() {
            tracing::debug!(wait_ms = (slot - Instant::now()).as_millis(), "Pacing request");
            tokio::time::sleep_until(slot).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_call_is_immediate() {
        let pacer = RequestPacer::fixed(Duration::from_secs(5));
        let start = Instant::now();
        pacer.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn subsequent_calls_respect_gap() {
        let pacer = RequestPacer::fixed(Duration::from_secs(5));
        let start = Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn jittered_gap_stays_in_range() {
        let pacer = RequestPacer::new(Duration::from_secs(12), Duration::from_secs(15));
        pacer.wait().await;
        let start = Instant::now();
        pacer.wait().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(12));
        assert!(elapsed <= Duration::from_secs(15));
    }

    #[test]
    fn inverted_bounds_collapse_to_min() {
        let pacer = RequestPacer::new(Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(pacer.next_gap(), Duration::from_secs(3));
    }
}
