//! Time source used by the job controllers

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current time. Injected so tests can drive time by hand.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `Utc::now()`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Clock starting at the Unix epoch, handy for "t = N seconds" tests
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        if let Ok(mut now) = self.now.lock() {
            *now += Duration::seconds(secs);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Epoch plus `secs` seconds
pub fn epoch_plus(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_on_request() {
        let clock = ManualClock::at_epoch();
        assert_eq!(clock.now(), epoch_plus(0));
        clock.advance_secs(42);
        assert_eq!(clock.now(), epoch_plus(42));
        clock.set(epoch_plus(7));
        assert_eq!(clock.now(), epoch_plus(7));
    }
}
