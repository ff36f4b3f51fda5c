//! # Time Source
//!
//! Wall-clock port. Expiry and history timestamps read time through this
//! trait so tests can drive the clock explicitly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Abstract wall clock.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// Seconds since the Unix epoch.
    fn now_secs(&self) -> u64 {
        self.now_millis() / 1000
    }
}

/// System clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    millis: Arc<AtomicU64>,
}

impl ManualTimeSource {
    pub fn at_secs(secs: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(secs * 1000)),
        }
    }

    pub fn set_secs(&self, secs: u64) {
        self.millis.store(secs * 1000, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.millis.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
