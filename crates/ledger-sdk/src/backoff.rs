//! Randomized exponential backoff between attempts

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Default base delay
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(500);

// 2^31 still fits the multiplier in a u32 and is far past any sane budget.
const MAX_EXPONENT: u32 = 31;

/// Source of jitter for backoff delays
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `low..=high`
    fn between(&self, low: u64, high: u64) -> u64;
}

/// Jitter from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn between(&self, low: u64, high: u64) -> u64 {
        rand::thread_rng().gen_range(low..=high)
    }
}

/// Deterministic jitter for tests and replay
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Create a seeded source
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn between(&self, low: u64, high: u64) -> u64 {
        self.rng.lock().gen_range(low..=high)
    }
}

/// How a backoff wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Full delay elapsed
    Elapsed,
    /// Cancellation fired first
    Cancelled,
    /// Execution deadline fired first
    DeadlineReached,
}

/// Computes and applies the delay before a retry
#[derive(Clone)]
pub struct BackoffScheduler {
    base: Duration,
    max: Option<Duration>,
    random: Arc<dyn RandomSource>,
}

impl BackoffScheduler {
    /// Scheduler with the given base delay, no ceiling and thread-local jitter
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: None,
            random: Arc::new(ThreadRandom),
        }
    }

    /// Replace the jitter source
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Cap every delay at `max`
    pub fn with_max(mut self, max: Option<Duration>) -> Self {
        self.max = max;
        self
    }

    /// Base delay
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Ceiling, if any
    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Delay before the retry that follows attempt `attempt` (0-based)
    ///
    /// `base * k` for a uniform `k` in `[1, 2^attempt]`, so the result lies
    /// in `[base, base * 2^attempt]` unless a ceiling is configured.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let high = 1u64 << attempt.min(MAX_EXPONENT);
        let multiplier = self.random.between(1, high) as u32;
        let delay = self.base.saturating_mul(multiplier);
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Sleep for `delay`, returning early on cancellation or deadline
    pub async fn wait(
        &self,
        delay: Duration,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> WaitOutcome {
        let wake = Instant::now() + delay;
        let until = wake.min(deadline);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
            _ = sleep_until(until) => {
                if until < wake {
                    WaitOutcome::DeadlineReached
                } else {
                    WaitOutcome::Elapsed
                }
            }
        }
    }
}

impl Default for BackoffScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_BACKOFF)
    }
}

impl fmt::Debug for BackoffScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffScheduler")
            .field("base", &self.base)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Fixed(u64);

    impl RandomSource for Fixed {
        fn between(&self, low: u64, high: u64) -> u64 {
            self.0.clamp(low, high)
        }
    }

    #[test]
    fn test_first_retry_is_exactly_base() {
        let scheduler = BackoffScheduler::new(Duration::from_millis(500));
        assert_eq!(scheduler.delay_for(0), Duration::from_millis(500));
    }

    #[test]
    fn test_injected_source_drives_multiplier() {
        let scheduler = BackoffScheduler::new(Duration::from_millis(100))
            .with_random(Arc::new(Fixed(u64::MAX)));
        assert_eq!(scheduler.delay_for(0), Duration::from_millis(100));
        assert_eq!(scheduler.delay_for(1), Duration::from_millis(200));
        assert_eq!(scheduler.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn test_ceiling_caps_delay() {
        let scheduler = BackoffScheduler::new(Duration::from_millis(250))
            .with_random(Arc::new(Fixed(u64::MAX)))
            .with_max(Some(Duration::from_secs(8)));
        assert_eq!(scheduler.delay_for(10), Duration::from_secs(8));
    }

    #[test]
    fn test_huge_attempt_index_does_not_overflow() {
        let scheduler = BackoffScheduler::new(Duration::from_millis(500))
            .with_random(Arc::new(Fixed(u64::MAX)));
        let delay = scheduler.delay_for(u32::MAX);
        assert!(delay >= Duration::from_millis(500));
    }

    #[test]
    fn test_seeded_source_is_reproducible() {
        let a = BackoffScheduler::default().with_random(Arc::new(SeededRandom::new(7)));
        let b = BackoffScheduler::default().with_random(Arc::new(SeededRandom::new(7)));
        let xs: Vec<_> = (0..8).map(|n| a.delay_for(n)).collect();
        let ys: Vec<_> = (0..8).map(|n| b.delay_for(n)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_mean_delay_grows_with_attempt() {
        let scheduler = BackoffScheduler::new(Duration::from_millis(10))
            .with_random(Arc::new(SeededRandom::new(42)));
        let mean = |attempt: u32| {
            let total: Duration = (0..400).map(|_| scheduler.delay_for(attempt)).sum();
            total / 400
        };
        let means: Vec<_> = (0..6).map(mean).collect();
        for pair in means.windows(2) {
            assert!(pair[0] <= pair[1], "{:?}", means);
        }
    }

    proptest! {
        #[test]
        fn prop_delay_within_bounds(attempt in 0u32..20, seed in any::<u64>(), base_ms in 1u64..1000) {
            let base = Duration::from_millis(base_ms);
            let scheduler = BackoffScheduler::new(base)
                .with_random(Arc::new(SeededRandom::new(seed)));
            let delay = scheduler.delay_for(attempt);
            prop_assert!(delay >= base);
            prop_assert!(delay <= base * (1u32 << attempt));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_elapses() {
        let scheduler = BackoffScheduler::default();
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let deadline = start + Duration::from_secs(60);

        let outcome = scheduler
            .wait(Duration::from_millis(500), &cancel, deadline)
            .await;
        assert_eq!(outcome, WaitOutcome::Elapsed);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_stops_at_deadline() {
        let scheduler = BackoffScheduler::default();
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let deadline = start + Duration::from_millis(100);

        let outcome = scheduler.wait(Duration::from_secs(10), &cancel, deadline).await;
        assert_eq!(outcome, WaitOutcome::DeadlineReached);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_on_cancel() {
        let scheduler = BackoffScheduler::default();
        let cancel = CancellationToken::new();
        let deadline = Instant::now() + Duration::from_secs(60);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let outcome = scheduler.wait(Duration::from_secs(30), &cancel, deadline).await;
        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(30));
    }
}
