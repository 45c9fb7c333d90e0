//! Bounded table of provider-side conversation sessions.
//!
//! One slot per (backend, [`SessionKey`]). A slot is an async mutex around
//! the optional handle: the first caller to lock an empty slot opens the
//! session while concurrent turns for the same key wait on the lock, so
//! exactly one session is ever created per key. A cancelled open leaves the
//! slot empty.
//!
//! The table holds at most `capacity` slots. Slots idle for longer than
//! `idle_ttl` are dropped first, then the least recently used ones. A slot
//! some caller has checked out is never dropped: the table's own reference
//! is then not the only one, and dropping it would orphan whatever session
//! that caller opens.

use rada_core::provider::{SessionHandle, SessionKey};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub type SessionSlot = Arc<tokio::sync::Mutex<Option<SessionHandle>>>;

struct Entry {
    slot: SessionSlot,
    last_used: Instant,
}

impl Entry {
    fn checked_out(&self) -> bool {
        Arc::strong_count(&self.slot) > 1
    }
}

/// A handle dropped from the table, with the backend that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictedSession {
    pub backend: String,
    pub handle: SessionHandle,
}

/// Result of [`SessionTable::checkout`].
pub struct Checkout {
    pub slot: SessionSlot,
    /// Handles dropped to make room; each should be closed on its own backend.
    pub evicted: Vec<EvictedSession>,
}

type TableKey = (String, SessionKey);

pub struct SessionTable {
    capacity: usize,
    idle_ttl: Duration,
    entries: Mutex<HashMap<TableKey, Entry>>,
}

impl SessionTable {
    pub fn new(capacity: usize, idle_ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            idle_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get or create the slot for `key` on `backend`, touching its LRU stamp.
    pub fn checkout(&self, backend: &str, key: &SessionKey) -> Checkout {
        self.checkout_at(backend, key, Instant::now())
    }

    fn checkout_at(&self, backend: &str, key: &SessionKey, now: Instant) -> Checkout {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let map_key = (backend.to_string(), key.clone());

        if let Some(entry) = entries.get_mut(&map_key) {
            entry.last_used = now;
            return Checkout {
                slot: entry.slot.clone(),
                evicted: Vec::new(),
            };
        }

        let mut evicted = Vec::new();

        // Idle slots go first.
        let expired: Vec<TableKey> = entries
            .iter()
            .filter(|(_, e)| !e.checked_out())
            .filter(|(_, e)| now.saturating_duration_since(e.last_used) > self.idle_ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for k in expired {
            Self::evict(&mut entries, &k, &mut evicted);
        }

        // Then least recently used among the slots nobody holds.
        while entries.len() >= self.capacity {
            let victim = entries
                .iter()
                .filter(|(_, e)| !e.checked_out())
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match victim {
                Some(k) => Self::evict(&mut entries, &k, &mut evicted),
                None => break,
            }
        }

        let slot: SessionSlot = Arc::new(tokio::sync::Mutex::new(None));
        entries.insert(
            map_key,
            Entry {
                slot: slot.clone(),
                last_used: now,
            },
        );
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "Evicted idle sessions");
        }
        Checkout { slot, evicted }
    }

    fn evict(
        entries: &mut HashMap<TableKey, Entry>,
        key: &TableKey,
        evicted: &mut Vec<EvictedSession>,
    ) {
        let Some(entry) = entries.remove(key) else {
            return;
        };
        // Not checked out, so nobody else can hold the lock.
        if let Ok(mut guard) = entry.slot.try_lock() {
            if let Some(handle) = guard.take() {
                evicted.push(EvictedSession {
                    backend: key.0.clone(),
                    handle,
                });
            }
        }
    }
}
