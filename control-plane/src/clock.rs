//! Monotonic time source, injected everywhere a timeout or heartbeat age is
//! computed so tests can drive the health monitor without real sleeps.

use orka_types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub trait Clock: Send + Sync {
    /// Milliseconds elapsed since this clock was created.
    fn now_millis(&self) -> Timestamp;
}

/// Wraps `std::time::Instant`; the only `Clock` the production binary uses.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> Timestamp {
        self.start.elapsed().as_millis() as Timestamp
    }
}

/// Deterministic clock for tests: starts at 0 and only moves when told to.
pub struct FakeClock {
    millis: AtomicU64,
}

impl FakeClock {
    pub fn new() -> Self {
        FakeClock {
            millis: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, delta_millis: u64) {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now_millis(&self) -> Timestamp {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_on_command() {
        let clock = FakeClock::new();
        assert_eq!(clock.now_millis(), 0);
        clock.advance(5_000);
        assert_eq!(clock.now_millis(), 5_000);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now_millis();
        assert!(b >= a);
    }
}
