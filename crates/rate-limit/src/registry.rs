use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::lru::{Handle, LruList};
use crate::token_bucket::TokenBucket;

/// Identities tracked when no explicit limit is configured.
pub const DEFAULT_MAX_TRACKED: usize = 10_000;

/// Minimum spacing between two eviction summary log lines.
const EVICTION_LOG_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Entry {
    identity: String,
    bucket: TokenBucket,
    last_seen: Instant,
}

#[derive(Debug)]
struct Inner {
    index: HashMap<String, Handle>,
    order: LruList<Entry>,
    evicted_since_log: u64,
    last_eviction_log: Option<Instant>,
}

/// Point-in-time counters exposed to the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    pub tracked: usize,
    pub max_tracked: usize,
    pub evicted_total: u64,
    pub denied_total: u64,
}

/// Bounded map of client identity to token bucket, ordered by recency.
///
/// When a new identity arrives and the registry is full, the least recently
/// used entry is evicted and the newcomer gets a fresh, full bucket. Index and
/// recency list sit behind a single mutex; every critical section is O(1)
/// except [`sweep`](Self::sweep), which walks the list.
#[derive(Debug)]
pub struct TokenBucketRegistry {
    inner: Mutex<Inner>,
    rps: f64,
    burst: u32,
    max_tracked: usize,
    evicted_total: AtomicU64,
    denied_total: AtomicU64,
}

impl TokenBucketRegistry {
    /// A `max_tracked` of zero selects [`DEFAULT_MAX_TRACKED`].
    pub fn new(rps: f64, burst: u32, max_tracked: usize) -> Self {
        let max_tracked = if max_tracked == 0 {
            DEFAULT_MAX_TRACKED
        } else {
            max_tracked
        };

        Self {
            inner: Mutex::new(Inner {
                index: HashMap::with_capacity(max_tracked.min(1024)),
                order: LruList::with_capacity(max_tracked.min(1024)),
                evicted_since_log: 0,
                last_eviction_log: None,
            }),
            rps,
            burst,
            max_tracked,
            evicted_total: AtomicU64::new(0),
            denied_total: AtomicU64::new(0),
        }
    }

    pub fn allow(&self, identity: &str) -> bool {
        self.allow_at(identity, Instant::now())
    }

    /// Touch `identity` (creating or evicting as needed) and try to consume
    /// one token from its bucket.
    pub fn allow_at(&self, identity: &str, now: Instant) -> bool {
        let mut inner = self.lock();

        let handle = match inner.index.get(identity).copied() {
            Some(handle) => {
                inner.order.move_to_front(handle);
                handle
            }
            None => {
                if inner.order.len() >= self.max_tracked {
                    self.evict_lru(&mut inner, now);
                }
                let handle = inner.order.push_front(Entry {
                    identity: identity.to_string(),
                    bucket: TokenBucket::new_at(self.rps, self.burst, now),
                    last_seen: now,
                });
                inner.index.insert(identity.to_string(), handle);
                handle
            }
        };

        let allowed = match inner.order.get_mut(handle) {
            Some(entry) => {
                entry.last_seen = now;
                entry.bucket.try_take_at(now)
            }
            None => true,
        };

        if !allowed {
            self.denied_total.fetch_add(1, Ordering::Relaxed);
        }
        allowed
    }

    fn evict_lru(&self, inner: &mut Inner, now: Instant) {
        let Some(entry) = inner.order.pop_back() else {
            return;
        };
        inner.index.remove(&entry.identity);
        self.evicted_total.fetch_add(1, Ordering::Relaxed);
        inner.evicted_since_log += 1;

        let due = inner
            .last_eviction_log
            .map_or(true, |at| now.saturating_duration_since(at) >= EVICTION_LOG_INTERVAL);
        if due {
            tracing::warn!(
                evicted = inner.evicted_since_log,
                max_tracked = self.max_tracked,
                "rate limiter at capacity, evicting least recently used clients"
            );
            inner.evicted_since_log = 0;
            inner.last_eviction_log = Some(now);
        }
    }

    pub fn sweep(&self, idle_timeout: Duration) -> usize {
        self.sweep_at(idle_timeout, Instant::now())
    }

    /// Remove every entry not seen for longer than `idle_timeout`. Returns the
    /// number of entries removed.
    pub fn sweep_at(&self, idle_timeout: Duration, now: Instant) -> usize {
        let mut inner = self.lock();
        let mut removed = 0;

        for handle in inner.order.handles_from_back() {
            let idle = match inner.order.get(handle) {
                Some(entry) => now.saturating_duration_since(entry.last_seen) > idle_timeout,
                None => false,
            };
            if idle {
                if let Some(entry) = inner.order.remove(handle) {
                    inner.index.remove(&entry.identity);
                    removed += 1;
                }
            }
        }

        tracing::debug!(
            removed,
            remaining = inner.order.len(),
            "rate limiter idle sweep complete"
        );
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.lock().index.contains_key(identity)
    }

    pub fn max_tracked(&self) -> usize {
        self.max_tracked
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            tracked: self.len(),
            max_tracked: self.max_tracked,
            evicted_total: self.evicted_total.load(Ordering::Relaxed),
            denied_total: self.denied_total.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
