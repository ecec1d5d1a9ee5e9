//! Capabilities the module needs from its host.

use autodel_store::{KeyStore, NotifyMask};

use crate::config::KeySpec;
use crate::error::ModuleResult;

/// Description of a command the module asks the host to route to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub flags: Vec<String>,
    pub key_spec: KeySpec,
}

/// Registration calls made once, while the module loads.
///
/// Any error aborts the load.
pub trait HostRegistry {
    /// Route `spec.name` to the module's claim handler.
    fn create_command(&mut self, spec: CommandSpec) -> ModuleResult<()>;

    /// Deliver client connect/disconnect notifications to the module.
    fn subscribe_client_events(&mut self) -> ModuleResult<()>;

    /// Deliver keyspace events of the classes in `mask` to the module.
    fn subscribe_keyspace_events(&mut self, mask: NotifyMask) -> ModuleResult<()>;
}

/// Keyspace access available while a handler runs.
pub trait HostContext {
    /// Whether a live key with this name exists.
    fn key_exists(&mut self, key: &[u8]) -> bool;

    /// Delete a key. Returns `true` if it existed.
    fn delete_key(&mut self, key: &[u8]) -> bool;
}

/// [`HostContext`] over any [`KeyStore`].
pub struct StoreContext<'a, S: KeyStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: KeyStore + ?Sized> StoreContext<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }
}

impl<S: KeyStore + ?Sized> HostContext for StoreContext<'_, S> {
    fn key_exists(&mut self, key: &[u8]) -> bool {
        self.store.exists(key)
    }

    fn delete_key(&mut self, key: &[u8]) -> bool {
        self.store.delete(key)
    }
}
