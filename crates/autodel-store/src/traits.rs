use std::time::Duration;

use autodel_types::KeyName;

use crate::error::StoreResult;
use crate::event::KeyspaceEvent;

/// Remaining lifetime of a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ttl {
    /// No such key.
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key expires after this long.
    Remaining(Duration),
}

/// Key-value store with keyspace notifications.
///
/// All implementations must satisfy these rules:
/// - A key whose deadline has passed is never observable: reads treat it as
///   absent and remove it, emitting an `expired` event.
/// - Every removal emits exactly one event (`del`, `expired` or `evicted`).
/// - Events queue up until [`KeyStore::drain_events`] is called, in the
///   order the changes happened.
///
/// Methods take `&mut self` because reads may expire keys. The store is
/// meant to be owned by one task.
pub trait KeyStore: Send {
    /// Read a value. Returns `None` if the key is absent or expired.
    fn get(&mut self, key: &[u8]) -> Option<Vec<u8>>;

    /// Write a value, replacing any previous one. With `ttl`, the key
    /// expires after that long; without, any previous deadline is cleared.
    fn set(&mut self, key: KeyName, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Delete a key. Returns `true` if the key existed.
    fn delete(&mut self, key: &[u8]) -> bool;

    /// Check whether a live key exists.
    fn exists(&mut self, key: &[u8]) -> bool;

    /// Give an existing key a deadline. Returns `false` if the key is absent.
    fn expire(&mut self, key: &[u8], ttl: Duration) -> StoreResult<bool>;

    /// Remaining lifetime of a key.
    fn ttl(&mut self, key: &[u8]) -> Ttl;

    /// Number of keys held, including ones past their deadline that have not
    /// been purged yet.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every key whose deadline has passed. Returns how many went.
    fn purge_expired(&mut self) -> usize;

    /// Take all queued keyspace events.
    fn drain_events(&mut self) -> Vec<KeyspaceEvent>;
}
