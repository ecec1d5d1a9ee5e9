//! Host adapter for autodel.
//!
//! Wires an [`AssociationTable`] into a key-value host:
//!
//! - the claim command (`ax.associate_key <key>`) records that the calling
//!   client owns an existing key;
//! - a client disconnect deletes every key that client still owns;
//! - a key that is deleted, expires or is evicted stops being owned.
//!
//! The host is reached only through the [`HostContext`] and
//! [`HostRegistry`] traits, so the module never depends on a concrete
//! runtime. [`StoreContext`] adapts any [`autodel_store::KeyStore`].
//!
//! [`AssociationTable`]: autodel_table::AssociationTable

pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod module;
pub mod reply;

pub use config::{KeySpec, ModuleConfig};
pub use error::{ModuleError, ModuleResult};
pub use event::{ClientChangeEvent, ClientSubEvent};
pub use host::{CommandSpec, HostContext, HostRegistry, StoreContext};
pub use module::AutoDelModule;
pub use reply::Reply;
