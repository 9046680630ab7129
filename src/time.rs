//! Clock abstraction so schedule arithmetic can be driven manually in tests.

use chrono::{DateTime, TimeDelta, Utc};

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of "now" for every timestamp the queue persists.
///
/// The realtime clock is the default. A manual clock starts at a fixed
/// instant and only moves when [`Clock::advance`] is called, which makes
/// backoff and scheduling arithmetic deterministic under test.
#[derive(Clone, Debug)]
pub struct Clock(Inner);

#[derive(Clone, Debug)]
enum Inner {
    Realtime,
    Manual(Arc<Mutex<DateTime<Utc>>>),
}

impl Clock {
    pub fn realtime() -> Self {
        Clock(Inner::Realtime)
    }

    pub fn manual(start: DateTime<Utc>) -> Self {
        Clock(Inner::Manual(Arc::new(Mutex::new(start))))
    }

    pub fn now(&self) -> DateTime<Utc> {
        match &self.0 {
            Inner::Realtime => Utc::now(),
            Inner::Manual(t) => *t.lock().expect("clock mutex poisoned"),
        }
    }

    /// Move a manual clock forward. No-op on the realtime clock.
    pub fn advance(&self, by: Duration) {
        if let Inner::Manual(t) = &self.0 {
            let mut now = t.lock().expect("clock mutex poisoned");
            *now += TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        }
    }

    /// Sleep for `duration` of this clock's time. A manual clock advances
    /// itself and returns immediately.
    pub async fn sleep(&self, duration: Duration) {
        match &self.0 {
            Inner::Realtime => tokio::time::sleep(duration).await,
            Inner::Manual(_) => self.advance(duration),
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::realtime()
    }
}

/// Timestamps are persisted as integer milliseconds since the Unix epoch so
/// the claim predicate compares them without any string-format ambiguity.
pub(crate) fn dt_to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn ms_to_dt(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
