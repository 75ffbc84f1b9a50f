use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Nanoseconds in `d`, saturating at `u64::MAX` (about 584 years).
pub fn duration_ns(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Timestamp `d` after `now_ns`. Saturates instead of wrapping, so an
/// absurdly long wait stays in the future.
pub fn deadline_after(now_ns: u64, d: Duration) -> u64 {
    now_ns.saturating_add(duration_ns(d))
}

/// Monotonic time source. Timestamps are nanoseconds since the clock's epoch.
pub trait Clock: Clone + Send + Sync {
    fn now(&self) -> u64;

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
}

/// Wall-independent clock backed by `Instant`.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    pub start: Instant,
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Converts a timestamp of this clock back into an `Instant`, for event
    /// loops that wake on deadlines. `None` when the platform can not
    /// represent an instant that far out.
    pub fn instant_at(&self, ts: u64) -> Option<Instant> {
        self.start.checked_add(Duration::from_nanos(ts))
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HighPrecisionTimer {
    fn now(&self) -> u64 {
        duration_ns(self.start.elapsed())
    }
}

/// Simulated clock. Clones share the same reading, so a test can hold one
/// handle and advance the time seen by the code under test.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        let step = duration_ns(d);
        let _ = self
            .now_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(step))
            });
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    pub fn set(&self, ns: u64) {
        self.now_ns.store(ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }
}
