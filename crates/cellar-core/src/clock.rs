//! [`Clock`] implementations.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::traits::Clock;

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Wall clock shifted by an adjustable offset in milliseconds.
///
/// Useful against local networks whose time runs ahead of the host.
#[derive(Debug, Default)]
pub struct ClockWithOffset {
    offset_ms: AtomicI64,
}

impl ClockWithOffset {
    pub fn new(offset_ms: i64) -> Self {
        Self {
            offset_ms: AtomicI64::new(offset_ms),
        }
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Acquire)
    }

    pub fn set_offset_ms(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::Release);
    }
}

impl Clock for ClockWithOffset {
    fn now_ms(&self) -> u64 {
        let now = SystemClock.now_ms() as i64;
        now.saturating_add(self.offset_ms()).max(0) as u64
    }
}
