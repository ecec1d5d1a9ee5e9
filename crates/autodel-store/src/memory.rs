use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use autodel_types::KeyName;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::event::KeyspaceEvent;
use crate::traits::{KeyStore, Ttl};

/// Limits for an [`InMemoryKeyStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// When set, inserting a new key beyond this many evicts the oldest one.
    pub max_keys: Option<usize>,
    /// Largest accepted value, in bytes.
    pub max_value_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_keys: None,
            max_value_size: 512 * 1024 * 1024,
        }
    }
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    /// Insertion sequence; matches the eviction queue slot for this key.
    seq: u64,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory, HashMap-based key store.
///
/// Expired keys are removed lazily when touched and in bulk by
/// [`KeyStore::purge_expired`]. With `max_keys` set, keys are evicted in
/// insertion order; overwriting a key keeps its original position.
pub struct InMemoryKeyStore {
    entries: HashMap<KeyName, Entry>,
    /// Eviction order. May hold stale slots for keys already removed; those
    /// are skipped by comparing `seq`.
    order: VecDeque<(u64, KeyName)>,
    next_seq: u64,
    events: Vec<KeyspaceEvent>,
    config: StoreConfig,
    clock: Arc<dyn Clock>,
}

impl InMemoryKeyStore {
    /// Create an empty store with default limits and the system clock.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            next_seq: 0,
            events: Vec::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Return a sorted list of all keys, expired or not.
    pub fn keys(&self) -> Vec<KeyName> {
        let mut keys: Vec<KeyName> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Look up a live entry, expiring it first if its deadline has passed.
    fn live(&mut self, key: &[u8]) -> Option<&mut Entry> {
        let now = self.clock.now();
        if self.entries.get(key)?.is_expired(now) {
            self.remove_expired(key);
            return None;
        }
        self.entries.get_mut(key)
    }

    fn remove_expired(&mut self, key: &[u8]) {
        if let Some((name, _)) = self.entries.remove_entry(key) {
            debug!(key = %name, "key expired");
            self.events.push(KeyspaceEvent::expired(name));
        }
    }

    /// Evict the oldest keys until there is room for one more.
    fn make_room(&mut self) {
        let Some(max) = self.config.max_keys else {
            return;
        };
        while self.entries.len() >= max {
            let Some((seq, key)) = self.order.pop_front() else {
                break;
            };
            if self.entries.get(&key).is_some_and(|e| e.seq == seq) {
                self.entries.remove(&key);
                debug!(key = %key, "key evicted");
                self.events.push(KeyspaceEvent::evicted(key));
            }
        }
    }

    /// Drop stale eviction slots once they outnumber live keys.
    fn compact_order(&mut self) {
        if self.order.len() <= 2 * self.entries.len() + 16 {
            return;
        }
        let entries = &self.entries;
        self.order
            .retain(|(seq, key)| entries.get(key).is_some_and(|e| e.seq == *seq));
    }
}

impl Default for InMemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn get(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.live(key).map(|e| e.value.clone())
    }

    fn set(&mut self, key: KeyName, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        if value.len() > self.config.max_value_size {
            return Err(StoreError::ValueTooLarge {
                size: value.len(),
                max: self.config.max_value_size,
            });
        }
        if ttl.is_some_and(|t| t.is_zero()) {
            return Err(StoreError::InvalidExpiry);
        }

        let now = self.clock.now();
        let expires_at = match ttl {
            Some(t) => Some(now.checked_add(t).ok_or(StoreError::ExpiryOutOfRange)?),
            None => None,
        };

        if let Some(entry) = self.live(key.as_bytes()) {
            entry.value = value;
            entry.expires_at = expires_at;
        } else {
            self.make_room();
            let seq = self.next_seq;
            self.next_seq += 1;
            self.order.push_back((seq, key.clone()));
            self.entries.insert(
                key.clone(),
                Entry {
                    value,
                    expires_at,
                    seq,
                },
            );
            self.compact_order();
        }

        self.events.push(KeyspaceEvent::set(key.clone()));
        if expires_at.is_some() {
            self.events.push(KeyspaceEvent::expire(key));
        }
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> bool {
        if self.live(key).is_none() {
            return false;
        }
        match self.entries.remove_entry(key) {
            Some((name, _)) => {
                self.events.push(KeyspaceEvent::del(name));
                true
            }
            None => false,
        }
    }

    fn exists(&mut self, key: &[u8]) -> bool {
        self.live(key).is_some()
    }

    fn expire(&mut self, key: &[u8], ttl: Duration) -> StoreResult<bool> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidExpiry);
        }
        let deadline = self
            .clock
            .now()
            .checked_add(ttl)
            .ok_or(StoreError::ExpiryOutOfRange)?;
        let Some(entry) = self.live(key) else {
            return Ok(false);
        };
        entry.expires_at = Some(deadline);
        self.events.push(KeyspaceEvent::expire(KeyName::from(key)));
        Ok(true)
    }

    fn ttl(&mut self, key: &[u8]) -> Ttl {
        let now = self.clock.now();
        match self.live(key) {
            None => Ttl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => Ttl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => Ttl::Remaining(at.saturating_duration_since(now)),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        let mut expired: Vec<KeyName> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        expired.sort();
        for key in &expired {
            self.remove_expired(key.as_bytes());
        }
        expired.len()
    }

    fn drain_events(&mut self) -> Vec<KeyspaceEvent> {
        std::mem::take(&mut self.events)
    }
}

impl std::fmt::Debug for InMemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyStore")
            .field("key_count", &self.entries.len())
            .field("pending_events", &self.events.len())
            .field("config", &self.config)
            .finish()
    }
}
