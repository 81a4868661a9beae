//! Time-bounded cache of image probe results.
//!
//! Entries are immutable values keyed by URL. A lookup treats anything older
//! than the TTL as absent; an insert always replaces the whole entry. Two
//! workers racing on the same URL may both probe and both insert, which costs
//! one extra request but never leaves a half-written entry behind.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};

use tracing::debug;

use super::probe::ProbeInfo;

/// Source of "now" for cache freshness checks.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> SystemTime;
}

/// Wall clock used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock for tests and replay tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    pub fn new(start: SystemTime) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: SystemTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One cached probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeCacheEntry {
    pub url: String,
    pub probe: ProbeInfo,
    pub timestamp: SystemTime,
}

/// Shared probe cache. Clones share the same underlying map.
#[derive(Debug, Clone)]
pub struct ProbeCache {
    entries: Arc<RwLock<HashMap<String, ProbeCacheEntry>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ProbeCache {
    /// Create a cache backed by the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached probe for `url` if it is younger than the TTL.
    pub fn get_fresh(&self, url: &str) -> Option<ProbeInfo> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(url)?;

        let age = self
            .clock
            .now()
            .duration_since(entry.timestamp)
            .unwrap_or(Duration::ZERO);

        if age < self.ttl {
            Some(entry.probe.clone())
        } else {
            debug!("Probe cache entry for {} expired ({:?} old)", url, age);
            None
        }
    }

    /// Store a probe result stamped with the current time, replacing any previous entry.
    pub fn insert(&self, url: &str, probe: ProbeInfo) {
        let entry = ProbeCacheEntry {
            url: url.to_string(),
            probe,
            timestamp: self.clock.now(),
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(url.to_string(), entry);
    }

    /// Drop every entry, e.g. between batch runs.
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
