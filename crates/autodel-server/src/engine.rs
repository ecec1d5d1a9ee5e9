//! The engine: sole owner of the key store and the module.
//!
//! All commands, client lifecycle changes and expiry ticks are applied one at
//! a time by a single task, which is what lets the module's table run
//! without locks. Connection tasks talk to it through an [`EngineHandle`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use autodel_module::{
    AutoDelModule, ClientChangeEvent, CommandSpec, HostRegistry, ModuleResult, Reply,
    StoreContext,
};
use autodel_store::{Clock, InMemoryKeyStore, KeyStore, NotifyMask, SystemClock, Ttl};
use autodel_table::TableStats;
use autodel_types::{ClientId, KeyName};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Snapshot of engine counters for the admin surface.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub table: TableStats,
    pub store_keys: usize,
    pub connected_clients: usize,
    pub commands_processed: u64,
    pub keys_purged_on_disconnect: u64,
}

/// What the module asked for while loading.
#[derive(Debug, Default)]
struct Subscriptions {
    command: Option<CommandSpec>,
    client_events: bool,
    keyspace: NotifyMask,
}

impl HostRegistry for Subscriptions {
    fn create_command(&mut self, spec: CommandSpec) -> ModuleResult<()> {
        self.command = Some(spec);
        Ok(())
    }

    fn subscribe_client_events(&mut self) -> ModuleResult<()> {
        self.client_events = true;
        Ok(())
    }

    fn subscribe_keyspace_events(&mut self, mask: NotifyMask) -> ModuleResult<()> {
        self.keyspace = self.keyspace | mask;
        Ok(())
    }
}

pub struct Engine {
    store: InMemoryKeyStore,
    module: AutoDelModule,
    subs: Subscriptions,
    connected: HashSet<ClientId>,
    last_client: ClientId,
    commands_processed: u64,
    keys_purged: u64,
}

impl Engine {
    pub fn new(config: &ServerConfig) -> ServerResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &ServerConfig, clock: Arc<dyn Clock>) -> ServerResult<Self> {
        let store = InMemoryKeyStore::with_clock(config.store.clone(), clock);
        let mut subs = Subscriptions::default();
        let module = AutoDelModule::load(config.module.clone(), &mut subs)?;
        Ok(Self {
            store,
            module,
            subs,
            connected: HashSet::new(),
            last_client: ClientId::new(0),
            commands_processed: 0,
            keys_purged: 0,
        })
    }

    pub fn module(&self) -> &AutoDelModule {
        &self.module
    }

    pub fn store(&self) -> &InMemoryKeyStore {
        &self.store
    }

    /// Start a client session and hand out its id.
    pub fn connect(&mut self) -> ClientId {
        let mut client = self.last_client.next();
        while client.get() == 0 || self.connected.contains(&client) {
            client = client.next();
        }
        self.last_client = client;
        self.connected.insert(client);

        if self.subs.client_events {
            let mut ctx = StoreContext::new(&mut self.store);
            self.module
                .on_client_change(&mut ctx, &ClientChangeEvent::connected(client));
        }
        debug!(%client, "client connected");
        client
    }

    /// End a client session. Returns how many claimed keys were deleted.
    ///
    /// Ending a session that is not open does nothing, so the module sees at
    /// most one disconnect per session.
    pub fn disconnect(&mut self, client: ClientId) -> usize {
        if !self.connected.remove(&client) {
            warn!(%client, "disconnect for unknown client");
            return 0;
        }
        let deleted = if self.subs.client_events {
            let mut ctx = StoreContext::new(&mut self.store);
            self.module
                .on_client_change(&mut ctx, &ClientChangeEvent::disconnected(client))
        } else {
            0
        };
        self.keys_purged += deleted as u64;
        self.dispatch_events();
        debug!(%client, deleted, "client disconnected");
        deleted
    }

    /// Run one command for `client`.
    pub fn execute(&mut self, client: ClientId, argv: &[Vec<u8>]) -> Reply {
        let Some(name) = argv.first() else {
            return Reply::error("ERR empty command");
        };
        self.commands_processed += 1;
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();

        let reply = if self.is_claim_command(&name) {
            let mut ctx = StoreContext::new(&mut self.store);
            self.module.associate_key(&mut ctx, client, argv)
        } else {
            self.run_builtin(&name, argv)
        };
        self.dispatch_events();
        reply
    }

    /// Purge expired keys. Returns how many went.
    pub fn tick(&mut self) -> usize {
        let purged = self.store.purge_expired();
        self.dispatch_events();
        purged
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            table: self.module.stats(),
            store_keys: self.store.len(),
            connected_clients: self.connected.len(),
            commands_processed: self.commands_processed,
            keys_purged_on_disconnect: self.keys_purged,
        }
    }

    /// Forward pending keyspace events the module subscribed to.
    fn dispatch_events(&mut self) {
        for event in self.store.drain_events() {
            if self.subs.keyspace.matches(&event) {
                self.module.on_keyspace_event(&event);
            }
        }
    }

    fn is_claim_command(&self, upper: &str) -> bool {
        self.subs
            .command
            .as_ref()
            .is_some_and(|spec| spec.name.eq_ignore_ascii_case(upper))
    }

    fn run_builtin(&mut self, name: &str, argv: &[Vec<u8>]) -> Reply {
        let args = &argv[1..];
        match (name, args) {
            ("PING", []) => Reply::Pong,
            ("PING", [message]) => Reply::Bulk(Some(message.clone())),
            ("QUIT", []) => Reply::Ok,
            ("GET", [key]) => Reply::Bulk(self.store.get(key)),
            ("SET", [key, value, options @ ..]) => self.set(key, value, options),
            ("DEL", keys) if !keys.is_empty() => {
                let n = keys.iter().filter(|k| self.store.delete(k)).count();
                Reply::Integer(n as i64)
            }
            ("EXISTS", keys) if !keys.is_empty() => {
                let n = keys.iter().filter(|k| self.store.exists(k)).count();
                Reply::Integer(n as i64)
            }
            ("EXPIRE", [key, secs]) => match parse_positive(secs) {
                Some(secs) => self.expire(key, Duration::from_secs(secs)),
                None => not_an_integer(),
            },
            ("PEXPIRE", [key, millis]) => match parse_positive(millis) {
                Some(ms) => self.expire(key, Duration::from_millis(ms)),
                None => not_an_integer(),
            },
            ("TTL", [key]) => match self.store.ttl(key) {
                Ttl::Missing => Reply::Integer(-2),
                Ttl::Persistent => Reply::Integer(-1),
                Ttl::Remaining(left) => {
                    Reply::Integer(((left.as_millis() + 500) / 1000) as i64)
                }
            },
            (name, _) if BUILTINS.contains(&name) => Reply::wrong_arity(&name.to_ascii_lowercase()),
            _ => Reply::error(format!("ERR unknown command '{name}'")),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8], options: &[Vec<u8>]) -> Reply {
        let ttl = match options {
            [] => None,
            [unit, amount] => {
                let Some(amount) = parse_positive(amount) else {
                    return not_an_integer();
                };
                match String::from_utf8_lossy(unit).to_ascii_uppercase().as_str() {
                    "EX" => Some(Duration::from_secs(amount)),
                    "PX" => Some(Duration::from_millis(amount)),
                    _ => return Reply::error("ERR syntax error"),
                }
            }
            _ => return Reply::error("ERR syntax error"),
        };
        match self.store.set(KeyName::from(key), value.to_vec(), ttl) {
            Ok(()) => Reply::Ok,
            Err(e) => Reply::error(format!("ERR {e}")),
        }
    }

    fn expire(&mut self, key: &[u8], ttl: Duration) -> Reply {
        match self.store.expire(key, ttl) {
            Ok(applied) => Reply::from_bool(applied),
            Err(e) => Reply::error(format!("ERR {e}")),
        }
    }

    /// Serve requests until every [`EngineHandle`] is dropped.
    pub async fn run(mut self, mut requests: mpsc::Receiver<EngineRequest>) {
        while let Some(request) = requests.recv().await {
            self.handle(request);
        }
        if !self.connected.is_empty() {
            debug!(open = self.connected.len(), "sessions still open at shutdown");
        }
        let stats = self.module.unload();
        info!(claims = stats.keys, "engine stopped");
    }

    fn handle(&mut self, request: EngineRequest) {
        // A dropped reply receiver means the connection went away first.
        match request {
            EngineRequest::Connect { reply } => {
                let client = self.connect();
                if reply.send(client).is_err() {
                    self.disconnect(client);
                }
            }
            EngineRequest::Disconnect { client } => {
                self.disconnect(client);
            }
            EngineRequest::Command {
                client,
                argv,
                reply,
            } => {
                let _ = reply.send(self.execute(client, &argv));
            }
            EngineRequest::Tick => {
                let purged = self.tick();
                if purged > 0 {
                    debug!(purged, "expired keys purged");
                }
            }
            EngineRequest::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }
}

const BUILTINS: [&str; 9] = [
    "PING", "QUIT", "GET", "SET", "DEL", "EXISTS", "EXPIRE", "PEXPIRE", "TTL",
];

fn parse_positive(raw: &[u8]) -> Option<u64> {
    std::str::from_utf8(raw)
        .ok()?
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
}

fn not_an_integer() -> Reply {
    Reply::error("ERR value is not an integer or out of range")
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("store", &self.store)
            .field("module", &self.module)
            .field("connected", &self.connected.len())
            .finish()
    }
}

/// A request for the engine task.
#[derive(Debug)]
pub enum EngineRequest {
    Connect {
        reply: oneshot::Sender<ClientId>,
    },
    Disconnect {
        client: ClientId,
    },
    Command {
        client: ClientId,
        argv: Vec<Vec<u8>>,
        reply: oneshot::Sender<Reply>,
    },
    Tick,
    Stats {
        reply: oneshot::Sender<EngineStats>,
    },
}

/// Cloneable sender side of the engine task.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Spawn `engine` on the current runtime.
    pub fn spawn(engine: Engine, queue: usize) -> (Self, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue);
        let task = tokio::spawn(engine.run(rx));
        (Self { tx }, task)
    }

    async fn send(&self, request: EngineRequest) -> ServerResult<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ServerError::EngineClosed)
    }

    pub async fn connect(&self) -> ServerResult<ClientId> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Connect { reply }).await?;
        rx.await.map_err(|_| ServerError::EngineClosed)
    }

    pub async fn disconnect(&self, client: ClientId) -> ServerResult<()> {
        self.send(EngineRequest::Disconnect { client }).await
    }

    pub async fn execute(&self, client: ClientId, argv: Vec<Vec<u8>>) -> ServerResult<Reply> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Command {
            client,
            argv,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ServerError::EngineClosed)
    }

    pub async fn tick(&self) -> ServerResult<()> {
        self.send(EngineRequest::Tick).await
    }

    pub async fn stats(&self) -> ServerResult<EngineStats> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Stats { reply }).await?;
        rx.await.map_err(|_| ServerError::EngineClosed)
    }
}
