//! Key-value backing store for autodel.
//!
//! The store holds opaque byte values under [`KeyName`]s and reports every
//! change to its keyspace as a [`KeyspaceEvent`]. Hosts drain those events
//! after each command and forward the ones a subscriber asked for.
//!
//! # Event classes
//!
//! - [`EventClass::Generic`] -- `del`, `expire`
//! - [`EventClass::String`] -- `set`
//! - [`EventClass::Expired`] -- a key reached its deadline
//! - [`EventClass::Evicted`] -- a key was dropped to respect `max_keys`
//!
//! # Storage Backends
//!
//! All backends implement the [`KeyStore`] trait:
//!
//! - [`InMemoryKeyStore`] -- `HashMap`-based store with lazy and active expiry
//!
//! [`KeyName`]: autodel_types::KeyName

pub mod clock;
pub mod error;
pub mod event;
pub mod memory;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use event::{EventClass, KeyspaceEvent, NotifyMask};
pub use memory::{InMemoryKeyStore, StoreConfig};
pub use traits::{KeyStore, Ttl};
