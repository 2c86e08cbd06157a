//! Revisioned, best-effort cache for retrieval and synthesis results (SPEC_FULL.md §4.D).
//!
//! Generalizes the teacher's embedding-only `LruEmbeddingCache` (same `parking_lot::RwLock`
//! map plus atomic counters) into a general JSON value cache keyed by tenant and fronted by a
//! per-tenant-per-kind revision counter, so any write that affects a tenant invalidates every
//! previously cached key for it without having to enumerate and delete them.
//!
//! Only an in-process backend ships in this core; the trait shape leaves room for a networked
//! cache (e.g. Redis) to be substituted later without changing callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Schema version embedded in every cache key; bump when the cached payload shape changes so
/// stale entries from a previous deploy are never misread as the new shape.
pub const SCHEMA_VERSION: u32 = 1;

/// Which revision counter a key's invalidation is tied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Text,
    Image,
    Llm,
}

impl CacheKind {
    fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Text => "text",
            CacheKind::Image => "image",
            CacheKind::Llm => "llm",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: usize,
    pub evictions: u64,
    pub circuit_breaker_trips: u64,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries beyond this count trigger LRU eviction.
    pub max_entries: usize,
    pub default_ttl: Duration,
    /// Consecutive failures before the circuit breaker opens.
    pub circuit_breaker_threshold: u64,
    /// How long the breaker stays open once tripped.
    pub circuit_breaker_cooldown: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 50_000,
            default_ttl: Duration::from_secs(300),
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown: Duration::from_secs(30),
        }
    }
}

struct Entry {
    value: serde_json::Value,
    last_accessed: Instant,
    expires_at: Instant,
}

/// In-process revisioned cache. `parking_lot`-guarded map, atomics for stats and the circuit
/// breaker, mirroring the teacher's `LruEmbeddingCache` shape.
pub struct Cache {
    store: RwLock<HashMap<String, Entry>>,
    revisions: RwLock<HashMap<String, u64>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    consecutive_failures: AtomicU64,
    breaker_trips: AtomicU64,
    breaker_opened_at: RwLock<Option<Instant>>,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            revisions: RwLock::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            breaker_trips: AtomicU64::new(0),
            breaker_opened_at: RwLock::new(None),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// `fingerprint = hash(normalized_query, filters, backend, model_id)`.
    pub fn fingerprint(normalized_query: &str, filters: &str, backend: &str, model_id: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [normalized_query, filters, backend, model_id] {
            hasher.update(part.as_bytes());
            hasher.update(b"\0");
        }
        format!("{:x}", hasher.finalize())
    }

    fn rev_key(user_id: &str, space_id: &str, kind: CacheKind) -> String {
        format!("rev:{}:{user_id}:{space_id}", kind.as_str())
    }

    /// Current revision for a tenant/kind, `0` if never bumped.
    pub fn current_rev(&self, user_id: &str, space_id: &str, kind: CacheKind) -> u64 {
        *self
            .revisions
            .read()
            .get(&Self::rev_key(user_id, space_id, kind))
            .unwrap_or(&0)
    }

    /// Build `v{schema}:rev{rev}:{kind}:{user_id}:{space_id}:{top_k}:{fingerprint}`.
    pub fn make_key(&self, user_id: &str, space_id: &str, kind: CacheKind, top_k: usize, fingerprint: &str) -> String {
        let rev = self.current_rev(user_id, space_id, kind);
        format!(
            "v{SCHEMA_VERSION}:rev{rev}:{}:{user_id}:{space_id}:{top_k}:{fingerprint}",
            kind.as_str()
        )
    }

    /// Increment the revision counter for `(user_id, space_id, kind)`; any key built against the
    /// old revision becomes unreachable (no enumeration or deletion needed).
    pub fn bump(&self, user_id: &str, space_id: &str, kind: CacheKind) -> u64 {
        let mut revisions = self.revisions.write();
        let entry = revisions.entry(Self::rev_key(user_id, space_id, kind)).or_insert(0);
        *entry += 1;
        *entry
    }

    fn breaker_is_open(&self) -> bool {
        let opened_at = *self.breaker_opened_at.read();
        match opened_at {
            Some(t) if t.elapsed() < self.config.circuit_breaker_cooldown => true,
            Some(_) => {
                *self.breaker_opened_at.write() = None;
                self.consecutive_failures.store(0, Ordering::Relaxed);
                false
            }
            None => false,
        }
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.circuit_breaker_threshold && self.breaker_opened_at.read().is_none() {
            *self.breaker_opened_at.write() = Some(Instant::now());
            self.breaker_trips.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// `nil` on miss, on expiry, or while the circuit breaker is open (bypass). Any of those is
    /// treated identically by callers: fall through to the authoritative path.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        if self.breaker_is_open() {
            return None;
        }
        let now = Instant::now();
        {
            let store = self.store.read();
            match store.get(key) {
                Some(entry) if entry.expires_at > now => {}
                _ => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }
        let mut store = self.store.write();
        match store.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.last_accessed = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.record_success();
                Some(entry.value.clone())
            }
            _ => {
                store.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) {
        if self.breaker_is_open() {
            self.record_failure();
            return;
        }
        let now = Instant::now();
        let mut store = self.store.write();
        if store.len() >= self.config.max_entries && !store.contains_key(key) {
            if let Some(lru_key) = store
                .iter()
                .min_by_key(|(_, e)| e.last_accessed)
                .map(|(k, _)| k.clone())
            {
                store.remove(&lru_key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        store.insert(
            key.to_string(),
            Entry {
                value,
                last_accessed: now,
                expires_at: now + ttl.unwrap_or(self.config.default_ttl),
            },
        );
        self.record_success();
    }

    /// Atomically increment an integer counter stored at `key`, returning the new value.
    pub fn incr(&self, key: &str) -> i64 {
        let mut store = self.store.write();
        let now = Instant::now();
        let current = store
            .get(key)
            .and_then(|e| e.value.as_i64())
            .unwrap_or(0);
        let next = current + 1;
        store.insert(
            key.to_string(),
            Entry {
                value: serde_json::Value::from(next),
                last_accessed: now,
                expires_at: now + self.config.default_ttl,
            },
        );
        next
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.store.read().len(),
            evictions: self.evictions.load(Ordering::Relaxed),
            circuit_breaker_trips: self.breaker_trips.load(Ordering::Relaxed),
        }
    }
}
