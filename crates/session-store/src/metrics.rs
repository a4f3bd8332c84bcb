use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::time::now_ms;

pub struct StoreMetrics {
    start_ms: u64,
    pub created_total: AtomicU64,
    pub hits_total: AtomicU64,
    pub misses_total: AtomicU64,
    pub invalid_id_total: AtomicU64,
    pub dropped_total: AtomicU64,
    pub sweeps_total: AtomicU64,
    pub evicted_total: AtomicU64,
    pub collisions_total: AtomicU64,
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self {
            start_ms: now_ms(),
            created_total: AtomicU64::new(0),
            hits_total: AtomicU64::new(0),
            misses_total: AtomicU64::new(0),
            invalid_id_total: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            sweeps_total: AtomicU64::new(0),
            evicted_total: AtomicU64::new(0),
            collisions_total: AtomicU64::new(0),
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        now_ms().saturating_sub(self.start_ms)
    }

    pub fn inc_created(&self) {
        self.created_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_hit(&self) {
        self.hits_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_miss(&self) {
        self.misses_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_invalid_id(&self) {
        self.invalid_id_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_dropped(&self) {
        self.dropped_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_collision(&self) {
        self.collisions_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn record_sweep(&self, evicted: u64) {
        self.sweeps_total.fetch_add(1, Ordering::Relaxed);
        self.evicted_total.fetch_add(evicted, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entries: u64, live_sessions: u64) -> StoreStats {
        StoreStats {
            entries,
            live_sessions,
            created_total: self.created_total.load(Ordering::Relaxed),
            hits_total: self.hits_total.load(Ordering::Relaxed),
            misses_total: self.misses_total.load(Ordering::Relaxed),
            invalid_id_total: self.invalid_id_total.load(Ordering::Relaxed),
            dropped_total: self.dropped_total.load(Ordering::Relaxed),
            sweeps_total: self.sweeps_total.load(Ordering::Relaxed),
            evicted_total: self.evicted_total.load(Ordering::Relaxed),
            collisions_total: self.collisions_total.load(Ordering::Relaxed),
            uptime_ms: self.uptime_ms(),
        }
    }
}

/// Point-in-time view of the store, cheap to serialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entries: u64,
    pub live_sessions: u64,
    pub created_total: u64,
    pub hits_total: u64,
    pub misses_total: u64,
    pub invalid_id_total: u64,
    pub dropped_total: u64,
    pub sweeps_total: u64,
    pub evicted_total: u64,
    pub collisions_total: u64,
    pub uptime_ms: u64,
}
