use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the wall-clock instant used for expiration deadlines.
///
/// Deadlines are absolute Unix nanoseconds so they survive a snapshot and a
/// process restart unchanged.
pub trait Clock {
    fn now_nanos(&self) -> i64;
}

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

#[derive(Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as i64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
pub(crate) struct ManualClock {
    nanos: std::sync::atomic::AtomicI64,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(start_nanos: i64) -> ManualClock {
        ManualClock {
            nanos: std::sync::atomic::AtomicI64::new(start_nanos),
        }
    }

    pub(crate) fn advance(&self, duration: std::time::Duration) {
        self.nanos.fetch_add(
            duration.as_nanos() as i64,
            std::sync::atomic::Ordering::SeqCst,
        );
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_nanos(&self) -> i64 {
        self.nanos.load(std::sync::atomic::Ordering::SeqCst)
    }
}
