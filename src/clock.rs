//! Time source for the caches.
//!
//! Production code reads the system clock; tests drive a [`ManualClock`] so
//! retention and ordering can be checked without sleeping.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Mutex;

/// Source of "now" for timestamped cache entries
pub trait Clock: Send + Sync {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by [`Utc::now`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// ```
/// use chat_archiver::clock::{Clock, ManualClock};
/// use chrono::TimeDelta;
///
/// let clock = ManualClock::default();
/// let start = clock.now();
/// clock.advance(TimeDelta::hours(25));
/// assert_eq!(clock.now() - start, TimeDelta::hours(25));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    step: TimeDelta,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000))
    }
}

impl ManualClock {
    /// Frozen clock starting at `start`
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            step: TimeDelta::zero(),
        }
    }

    /// Clock that moves forward by `step` after every reading, so
    /// consecutive records get strictly increasing timestamps.
    #[must_use]
    pub fn ticking(step: TimeDelta) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let current = *now;
        *now += self.step;
        current
    }
}
