//! Injected time source. All staleness arithmetic in the repositories reads
//! `Clock::now`, never `chrono::Utc::now()` or `SystemTime::now()` directly.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Epoch-plus-one-second, used to seed `LastCheckedAt` on resource creation
/// so a freshly stored resource is immediately due for check.
pub fn epoch_plus_one_second() -> DateTime<Utc> {
    Utc.timestamp_opt(1, 0).single().expect("epoch+1s is a valid instant")
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn zone(&self) -> Utc {
        Utc
    }
}

/// Reads the real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock tests can advance explicitly instead of racing wall-clock time.
#[derive(Debug, Clone)]
pub struct FixedClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { inner: Arc::new(Mutex::new(start)) }
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.inner.lock().expect("clock mutex poisoned");
        *guard += duration;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        let mut guard = self.inner.lock().expect("clock mutex poisoned");
        *guard = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock().expect("clock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let start = Utc.timestamp_opt(1_000, 0).single().unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::hours(1));
        assert_eq!(clock.now(), start + chrono::Duration::hours(1));
    }

    #[test]
    fn epoch_plus_one_second_is_past() {
        assert!(epoch_plus_one_second() < Utc::now());
    }
}
