//! Clock abstraction used for reconnect cooldowns and request timestamping.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

/// Monotonic clock trait, injected wherever wall-clock elapsed time
/// gates a decision (driver reconnect cooldown, request timestamping).
pub trait MonotonicClock: Send + Sync {
    /// Current instant, as UTC wall time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall-clock time.
#[derive(Debug, Default)]
pub struct SystemClock;

impl MonotonicClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests; advances only when told to.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap();
        *current += chrono::Duration::from_std(by).expect("duration fits in chrono range");
    }
}

impl MonotonicClock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}

pub fn shared_clock() -> Arc<dyn MonotonicClock> {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_clock_only_moves_on_advance() {
        let clock = SimulatedClock::new(Utc::now());
        let t0 = clock.now();
        let t1 = clock.now();
        assert_eq!(t0, t1);

        clock.advance(Duration::from_secs(5));
        assert!(clock.now() > t0);
    }
}
