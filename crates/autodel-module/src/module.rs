use autodel_store::{EventClass, KeyspaceEvent};
use autodel_table::{AddOutcome, AssociationTable, TableStats};
use autodel_types::{ClientId, KeyName};
use tracing::{debug, info};

use crate::config::ModuleConfig;
use crate::error::{ModuleError, ModuleResult};
use crate::event::{ClientChangeEvent, ClientSubEvent};
use crate::host::{CommandSpec, HostContext, HostRegistry};
use crate::reply::Reply;

/// A loaded instance of the module.
///
/// Owns the association table for its whole lifetime: the table is created
/// empty by [`AutoDelModule::load`] and dropped by [`AutoDelModule::unload`].
/// Every handler takes `&mut self`; the host must not run two handlers at
/// once.
#[derive(Debug)]
pub struct AutoDelModule {
    config: ModuleConfig,
    table: AssociationTable,
}

impl AutoDelModule {
    /// Register with the host and start with an empty table.
    ///
    /// Subscribes to client events, creates the claim command, then
    /// subscribes to keyspace events. The first refusal aborts the load.
    pub fn load(config: ModuleConfig, registry: &mut dyn HostRegistry) -> ModuleResult<Self> {
        config.validate()?;

        registry
            .subscribe_client_events()
            .map_err(|e| registration("client events", e))?;
        registry
            .create_command(CommandSpec {
                name: config.command_name.clone(),
                flags: config.flags(),
                key_spec: config.key_spec,
            })
            .map_err(|e| registration("claim command", e))?;
        registry
            .subscribe_keyspace_events(config.notify)
            .map_err(|e| registration("keyspace events", e))?;

        info!(
            module = %config.name,
            version = config.version,
            command = %config.command_name,
            notify = ?config.notify,
            "module loaded"
        );
        Ok(Self {
            config,
            table: AssociationTable::new(),
        })
    }

    /// Tear the module down, releasing the table.
    pub fn unload(self) -> TableStats {
        let stats = self.table.stats();
        info!(
            module = %self.config.name,
            clients = stats.clients,
            keys = stats.keys,
            "module unloaded"
        );
        stats
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    pub fn table(&self) -> &AssociationTable {
        &self.table
    }

    pub fn stats(&self) -> TableStats {
        self.table.stats()
    }

    // ---------------------------------------------------------------
    // Handlers
    // ---------------------------------------------------------------

    /// The claim command: `<command_name> <key>`.
    ///
    /// `argv[0]` is the command name. Replies `1` after recording that
    /// `client` owns the key, `0` without touching the table when the key
    /// does not exist, and a usage error for any other argument count.
    pub fn associate_key(
        &mut self,
        ctx: &mut dyn HostContext,
        client: ClientId,
        argv: &[Vec<u8>],
    ) -> Reply {
        let [_, key] = argv else {
            return Reply::wrong_arity(&self.config.command_name);
        };
        if !ctx.key_exists(key) {
            debug!(%client, key = %KeyName::from(key.as_slice()), "claim on missing key");
            return Reply::Integer(0);
        }

        let key = KeyName::from(key.as_slice());
        match self.table.add(client, key.clone()) {
            AddOutcome::Inserted => debug!(%client, %key, "key claimed"),
            AddOutcome::Unchanged => debug!(%client, %key, "key already claimed by caller"),
            AddOutcome::Reassigned { previous } => {
                debug!(%client, %key, %previous, "key claimed from another client");
            }
        }
        Reply::Integer(1)
    }

    /// Client lifecycle notification.
    ///
    /// On disconnect, every key the client still owns is deleted from the
    /// host. Keys that are already gone are skipped. Returns how many keys
    /// were deleted.
    pub fn on_client_change(
        &mut self,
        ctx: &mut dyn HostContext,
        event: &ClientChangeEvent,
    ) -> usize {
        if event.sub != ClientSubEvent::Disconnected {
            return 0;
        }

        let claimed = self.table.remove_client(event.client);
        if claimed.is_empty() {
            return 0;
        }

        let mut deleted = 0;
        for key in &claimed {
            if !ctx.key_exists(key.as_bytes()) {
                debug!(client = %event.client, %key, "claimed key already gone");
                continue;
            }
            if ctx.delete_key(key.as_bytes()) {
                deleted += 1;
            }
        }
        info!(
            client = %event.client,
            claimed = claimed.len(),
            deleted,
            "purged keys of disconnected client"
        );
        deleted
    }

    /// Keyspace notification.
    ///
    /// Expired and evicted keys always lose their owner; generic events do
    /// so only for `del`. Returns `true` if an association was dropped.
    pub fn on_keyspace_event(&mut self, event: &KeyspaceEvent) -> bool {
        if !self.config.notify.matches(event) {
            return false;
        }
        let relevant = match event.class {
            EventClass::Expired | EventClass::Evicted => true,
            EventClass::Generic => event.event == "del",
            EventClass::String => false,
        };
        if !relevant {
            return false;
        }

        match self.table.remove_key(event.key.as_bytes()) {
            Some(owner) => {
                debug!(key = %event.key, %owner, event = %event.event, "dropped claim");
                true
            }
            None => false,
        }
    }
}

fn registration(step: &'static str, err: ModuleError) -> ModuleError {
    ModuleError::Registration {
        step,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autodel_store::NotifyMask;
    use std::collections::BTreeSet;

    /// Host double: a set of existing keys plus a log of registrations.
    #[derive(Default)]
    struct FakeHost {
        keys: BTreeSet<Vec<u8>>,
        deleted: Vec<Vec<u8>>,
        commands: Vec<CommandSpec>,
        client_subscribed: bool,
        mask: Option<NotifyMask>,
        refuse: Option<&'static str>,
    }

    impl FakeHost {
        fn with_keys(keys: &[&str]) -> Self {
            Self {
                keys: keys.iter().map(|k| k.as_bytes().to_vec()).collect(),
                ..Default::default()
            }
        }

        fn check(&self, step: &'static str) -> ModuleResult<()> {
            if self.refuse == Some(step) {
                return Err(ModuleError::Host(format!("{step} refused")));
            }
            Ok(())
        }
    }

    impl HostRegistry for FakeHost {
        fn create_command(&mut self, spec: CommandSpec) -> ModuleResult<()> {
            self.check("command")?;
            self.commands.push(spec);
            Ok(())
        }

        fn subscribe_client_events(&mut self) -> ModuleResult<()> {
            self.check("client")?;
            self.client_subscribed = true;
            Ok(())
        }

        fn subscribe_keyspace_events(&mut self, mask: NotifyMask) -> ModuleResult<()> {
            self.check("keyspace")?;
            self.mask = Some(mask);
            Ok(())
        }
    }

    impl HostContext for FakeHost {
        fn key_exists(&mut self, key: &[u8]) -> bool {
            self.keys.contains(key)
        }

        fn delete_key(&mut self, key: &[u8]) -> bool {
            let existed = self.keys.remove(key);
            if existed {
                self.deleted.push(key.to_vec());
            }
            existed
        }
    }

    fn argv(parts: &[&str]) -> Vec<Vec<u8>> {
        parts.iter().map(|p| p.as_bytes().to_vec()).collect()
    }

    fn claim(module: &mut AutoDelModule, host: &mut FakeHost, client: u64, key: &str) -> Reply {
        module.associate_key(host, ClientId::new(client), &argv(&["ax.associate_key", key]))
    }

    fn loaded(host: &mut FakeHost) -> AutoDelModule {
        AutoDelModule::load(ModuleConfig::default(), host).unwrap()
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    #[test]
    fn load_registers_everything() {
        let mut host = FakeHost::default();
        let module = loaded(&mut host);
        assert!(host.client_subscribed);
        assert_eq!(host.commands.len(), 1);
        assert_eq!(host.commands[0].name, "ax.associate_key");
        assert_eq!(host.commands[0].flags, vec!["readonly", "fast"]);
        assert_eq!(host.mask, Some(ModuleConfig::default().notify));
        assert!(module.table().is_empty());
    }

    #[test]
    fn load_fails_when_host_refuses() {
        for step in ["client", "command", "keyspace"] {
            let mut host = FakeHost {
                refuse: Some(step),
                ..Default::default()
            };
            let err = AutoDelModule::load(ModuleConfig::default(), &mut host).unwrap_err();
            assert!(matches!(err, ModuleError::Registration { .. }), "{step}: {err}");
        }
    }

    #[test]
    fn load_rejects_invalid_config() {
        let mut host = FakeHost::default();
        let config = ModuleConfig {
            name: String::new(),
            ..Default::default()
        };
        let err = AutoDelModule::load(config, &mut host).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidConfig(_)));
        assert!(!host.client_subscribed);
    }

    // -----------------------------------------------------------------------
    // Claim command
    // -----------------------------------------------------------------------

    #[test]
    fn claim_existing_key() {
        let mut host = FakeHost::with_keys(&["lock"]);
        let mut module = loaded(&mut host);
        assert_eq!(claim(&mut module, &mut host, 1, "lock"), Reply::Integer(1));
        assert_eq!(module.table().owner_of(b"lock"), Some(ClientId::new(1)));
    }

    #[test]
    fn claim_missing_key_leaves_table_alone() {
        let mut host = FakeHost::default();
        let mut module = loaded(&mut host);
        assert_eq!(claim(&mut module, &mut host, 1, "nope"), Reply::Integer(0));
        assert!(module.table().is_empty());
    }

    #[test]
    fn claim_with_wrong_arity_is_usage_error() {
        let mut host = FakeHost::with_keys(&["a", "b"]);
        let mut module = loaded(&mut host);
        let client = ClientId::new(1);

        for bad in [argv(&["ax.associate_key"]), argv(&["ax.associate_key", "a", "b"])] {
            let reply = module.associate_key(&mut host, client, &bad);
            assert!(reply.is_error());
            assert_ne!(reply, Reply::Integer(0));
        }
        assert!(module.table().is_empty());
    }

    #[test]
    fn claim_binary_key() {
        let mut host = FakeHost::default();
        host.keys.insert(vec![0, 159, 146, 150]);
        let mut module = loaded(&mut host);
        let reply = module.associate_key(
            &mut host,
            ClientId::new(3),
            &[b"ax.associate_key".to_vec(), vec![0, 159, 146, 150]],
        );
        assert_eq!(reply, Reply::Integer(1));
        assert!(module.table().contains_key(&[0, 159, 146, 150]));
    }

    // -----------------------------------------------------------------------
    // Client lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn disconnect_deletes_claimed_keys() {
        let mut host = FakeHost::with_keys(&["a", "b", "c"]);
        let mut module = loaded(&mut host);
        claim(&mut module, &mut host, 1, "a");
        claim(&mut module, &mut host, 1, "b");
        claim(&mut module, &mut host, 2, "c");

        let deleted =
            module.on_client_change(&mut host, &ClientChangeEvent::disconnected(ClientId::new(1)));
        assert_eq!(deleted, 2);
        assert_eq!(host.deleted, vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(host.keys.contains(b"c".as_slice()));
        assert_eq!(module.table().owner_of(b"c"), Some(ClientId::new(2)));
        assert_eq!(module.stats(), TableStats { clients: 1, keys: 1 });
    }

    #[test]
    fn disconnect_tolerates_keys_already_gone() {
        let mut host = FakeHost::with_keys(&["a", "b"]);
        let mut module = loaded(&mut host);
        claim(&mut module, &mut host, 1, "a");
        claim(&mut module, &mut host, 1, "b");

        // Removed behind the module's back, with no notification.
        host.keys.remove(b"a".as_slice());

        let deleted =
            module.on_client_change(&mut host, &ClientChangeEvent::disconnected(ClientId::new(1)));
        assert_eq!(deleted, 1);
        assert_eq!(host.deleted, vec![b"b".to_vec()]);
        assert!(module.table().is_empty());
    }

    #[test]
    fn connect_and_unknown_disconnect_do_nothing() {
        let mut host = FakeHost::with_keys(&["a"]);
        let mut module = loaded(&mut host);
        claim(&mut module, &mut host, 1, "a");

        assert_eq!(
            module.on_client_change(&mut host, &ClientChangeEvent::connected(ClientId::new(1))),
            0
        );
        assert_eq!(
            module.on_client_change(&mut host, &ClientChangeEvent::disconnected(ClientId::new(9))),
            0
        );
        assert!(host.deleted.is_empty());
        assert_eq!(module.table().key_count(), 1);
    }

    #[test]
    fn reassigned_key_survives_previous_owner_disconnect() {
        let mut host = FakeHost::with_keys(&["k"]);
        let mut module = loaded(&mut host);
        claim(&mut module, &mut host, 1, "k");
        claim(&mut module, &mut host, 2, "k");

        module.on_client_change(&mut host, &ClientChangeEvent::disconnected(ClientId::new(1)));
        assert!(host.keys.contains(b"k".as_slice()));

        module.on_client_change(&mut host, &ClientChangeEvent::disconnected(ClientId::new(2)));
        assert!(!host.keys.contains(b"k".as_slice()));
    }

    // -----------------------------------------------------------------------
    // Keyspace notifications
    // -----------------------------------------------------------------------

    #[test]
    fn expiry_eviction_and_del_drop_claims() {
        let mut host = FakeHost::with_keys(&["a", "b", "c"]);
        let mut module = loaded(&mut host);
        for key in ["a", "b", "c"] {
            claim(&mut module, &mut host, 1, key);
        }

        assert!(module.on_keyspace_event(&KeyspaceEvent::expired(KeyName::from("a"))));
        assert!(module.on_keyspace_event(&KeyspaceEvent::evicted(KeyName::from("b"))));
        assert!(module.on_keyspace_event(&KeyspaceEvent::del(KeyName::from("c"))));
        assert!(module.table().is_empty());
        module.table().check_invariants().unwrap();
    }

    #[test]
    fn other_generic_events_are_ignored() {
        let mut host = FakeHost::with_keys(&["a"]);
        let mut module = loaded(&mut host);
        claim(&mut module, &mut host, 1, "a");

        assert!(!module.on_keyspace_event(&KeyspaceEvent::expire(KeyName::from("a"))));
        assert!(!module.on_keyspace_event(&KeyspaceEvent::new(
            EventClass::Generic,
            "rename_from",
            KeyName::from("a"),
        )));
        assert!(!module.on_keyspace_event(&KeyspaceEvent::set(KeyName::from("a"))));
        assert_eq!(module.table().owner_of(b"a"), Some(ClientId::new(1)));
    }

    #[test]
    fn events_outside_mask_are_ignored() {
        let mut host = FakeHost::with_keys(&["a"]);
        let config = ModuleConfig {
            notify: NotifyMask::EXPIRED,
            ..Default::default()
        };
        let mut module = AutoDelModule::load(config, &mut host).unwrap();
        claim(&mut module, &mut host, 1, "a");

        assert!(!module.on_keyspace_event(&KeyspaceEvent::del(KeyName::from("a"))));
        assert!(module.on_keyspace_event(&KeyspaceEvent::expired(KeyName::from("a"))));
    }

    #[test]
    fn repeated_key_event_is_harmless() {
        let mut host = FakeHost::with_keys(&["a"]);
        let mut module = loaded(&mut host);
        claim(&mut module, &mut host, 1, "a");
        assert!(module.on_keyspace_event(&KeyspaceEvent::del(KeyName::from("a"))));
        assert!(!module.on_keyspace_event(&KeyspaceEvent::del(KeyName::from("a"))));
    }

    #[test]
    fn unload_reports_remaining_claims() {
        let mut host = FakeHost::with_keys(&["a"]);
        let mut module = loaded(&mut host);
        claim(&mut module, &mut host, 1, "a");
        assert_eq!(module.unload(), TableStats { clients: 1, keys: 1 });
    }
}
