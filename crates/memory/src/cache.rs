//! Content-addressed response cache.
//!
//! Keys are a SHA-256 over the canonical request (sorted-key JSON of prompt,
//! model and generation parameters), so identical requests meet the same
//! entry and any parameter change misses. Entries older than the TTL are
//! evicted lazily by `get`, or in bulk by an explicit `sweep`.
//!
//! Only stateless, context-free requests belong here. That rule is enforced
//! by the caller; the cache itself has no notion of conversations.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Deterministic cache key for a generation request.
pub fn key_for(
    prompt: &str,
    model_id: &str,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
) -> String {
    // BTreeMap keeps the serialized keys sorted regardless of serde_json features.
    let mut canonical: BTreeMap<&str, serde_json::Value> = BTreeMap::new();
    canonical.insert("max_tokens", serde_json::json!(max_tokens));
    canonical.insert("model", serde_json::json!(model_id));
    canonical.insert("prompt", serde_json::json!(prompt));
    canonical.insert("temperature", serde_json::json!(temperature));
    canonical.insert("top_k", serde_json::json!(top_k));
    canonical.insert("top_p", serde_json::json!(top_p));

    let encoded = serde_json::to_string(&canonical).unwrap_or_default();
    hex::encode(Sha256::digest(encoded.as_bytes()))
}

/// Cache counters since creation (or the last `clear`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
    pub size: usize,
    pub evictions: u64,
}

/// A keyed store of generated responses.
pub trait CacheStore: Send + Sync {
    /// The cached text if present and no older than `ttl`; an expired entry is evicted.
    fn get(&self, key: &str, ttl: Duration) -> Option<String>;

    /// Store or overwrite `key` with a fresh timestamp and zero hits.
    fn put(&self, key: &str, text: &str, ttl: Duration);

    /// Remove every entry older than `ttl`. Returns the number removed.
    fn sweep(&self, ttl: Duration) -> usize;

    /// Remove every entry. Returns the number removed.
    fn clear(&self) -> usize;

    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    created_at: Instant,
    ttl: Duration,
    hits: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Process-local [`CacheStore`].
#[derive(Default)]
pub struct InMemoryResponseCache {
    state: Mutex<CacheState>,
}

impl InMemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hit count of a live entry.
    pub fn hits_for(&self, key: &str) -> Option<u64> {
        self.lock().entries.get(key).map(|e| e.hits)
    }

    /// TTL recorded when `key` was stored.
    pub fn ttl_for(&self, key: &str) -> Option<Duration> {
        self.lock().entries.get(key).map(|e| e.ttl)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get_at(&self, key: &str, ttl: Duration, now: Instant) -> Option<String> {
        let mut state = self.lock();
        let fresh = match state.entries.get(key) {
            None => None,
            Some(entry) => Some(now.saturating_duration_since(entry.created_at) <= ttl),
        };

        match fresh {
            Some(true) => {
                state.hits += 1;
                let entry = state.entries.get_mut(key)?;
                entry.hits += 1;
                debug!(key = %short(key), hits = entry.hits, "Cache hit");
                Some(entry.text.clone())
            }
            Some(false) => {
                state.entries.remove(key);
                state.evictions += 1;
                state.misses += 1;
                debug!(key = %short(key), "Cache entry expired");
                None
            }
            None => {
                state.misses += 1;
                debug!(key = %short(key), "Cache miss");
                None
            }
        }
    }

    fn put_at(&self, key: &str, text: &str, ttl: Duration, now: Instant) {
        self.lock().entries.insert(
            key.to_string(),
            CacheEntry {
                text: text.to_string(),
                created_at: now,
                ttl,
                hits: 0,
            },
        );
        debug!(key = %short(key), "Cached response");
    }

    fn sweep_at(&self, ttl: Duration, now: Instant) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, e| now.saturating_duration_since(e.created_at) <= ttl);
        let removed = before - state.entries.len();
        state.evictions += removed as u64;
        removed
    }
}

impl CacheStore for InMemoryResponseCache {
    fn get(&self, key: &str, ttl: Duration) -> Option<String> {
        self.get_at(key, ttl, Instant::now())
    }

    fn put(&self, key: &str, text: &str, ttl: Duration) {
        self.put_at(key, text, ttl, Instant::now());
    }

    fn sweep(&self, ttl: Duration) -> usize {
        self.sweep_at(ttl, Instant::now())
    }

    fn clear(&self) -> usize {
        let mut state = self.lock();
        let removed = state.entries.len();
        *state = CacheState::default();
        removed
    }

    fn stats(&self) -> CacheStats {
        let state = self.lock();
        let total_requests = state.hits + state.misses;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            total_requests,
            hit_rate: if total_requests == 0 {
                0.0
            } else {
                state.hits as f64 / total_requests as f64
            },
            size: state.entries.len(),
            evictions: state.evictions,
        }
    }
}

/// Cache keys are logged by prefix only.
fn short(key: &str) -> &str {
    key.get(..16).unwrap_or(key)
}
