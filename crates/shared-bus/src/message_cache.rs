//! # Time-Bounded Message Cache
//!
//! The relay delivers at least once. This cache remembers the digest of each
//! inbound message for a validity window so a redelivery inside that window
//! is recognised and dropped.
//!
//! - Entries are garbage-collected once older than the validity window
//! - GC runs lazily on insert, at most once per GC interval

use shared_types::{SystemTimeSource, TimeSource};
use std::collections::HashMap;
use std::sync::Arc;

/// Time-bounded cache of message digests.
pub struct TimeBoundedMessageCache {
    /// Map of digest -> timestamp (secs) when first seen.
    cache: HashMap<[u8; 32], u64>,

    /// Validity window in seconds.
    validity_window_secs: u64,

    /// Last garbage collection timestamp.
    last_gc: u64,

    /// Garbage collection interval in seconds.
    gc_interval_secs: u64,

    clock: Arc<dyn TimeSource>,
}

impl TimeBoundedMessageCache {
    /// Default validity window. Matches the longest publish TTL (one day).
    pub const DEFAULT_VALIDITY_WINDOW: u64 = shared_types::ONE_DAY;

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL: u64 = 60;

    #[must_use]
    pub fn new() -> Self {
        Self::with_config(
            Self::DEFAULT_VALIDITY_WINDOW,
            Self::DEFAULT_GC_INTERVAL,
            Arc::new(SystemTimeSource),
        )
    }

    #[must_use]
    pub fn with_config(
        validity_window_secs: u64,
        gc_interval_secs: u64,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let now = clock.now_secs();
        Self {
            cache: HashMap::new(),
            validity_window_secs,
            last_gc: now,
            gc_interval_secs,
            clock,
        }
    }

    /// Record `digest`. Returns `false` if it was already seen inside the
    /// validity window (the message is a duplicate).
    pub fn check_and_insert(&mut self, digest: [u8; 32]) -> bool {
        let now = self.clock.now_secs();

        if now.saturating_sub(self.last_gc) > self.gc_interval_secs {
            self.garbage_collect(now);
            self.last_gc = now;
        }

        if let Some(&seen) = self.cache.get(&digest) {
            if now.saturating_sub(seen) < self.validity_window_secs {
                return false;
            }
        }
        self.cache.insert(digest, now);
        true
    }

    /// Check if a digest is cached without adding it.
    #[must_use]
    pub fn contains(&self, digest: &[u8; 32]) -> bool {
        self.cache.contains_key(digest)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Remove expired digests from the cache.
    fn garbage_collect(&mut self, now: u64) {
        let expiry_threshold = now.saturating_sub(self.validity_window_secs);
        self.cache.retain(|_, &mut ts| ts > expiry_threshold);
    }
}

impl Default for TimeBoundedMessageCache {
    fn default() -> Self {
        Self::new()
    }
}
