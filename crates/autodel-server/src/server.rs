use std::future::Future;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use autodel_module::Reply;
use autodel_types::ClientId;

use crate::admin::build_router;
use crate::config::ServerConfig;
use crate::engine::{Engine, EngineHandle};
use crate::error::{ServerError, ServerResult};
use crate::protocol::{encode_reply, LineCodec};

/// Command server hosting the autodel module.
pub struct AutoDelServer {
    config: ServerConfig,
}

impl AutoDelServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until the process exits.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, std::future::pending()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves.
    pub async fn serve_on(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()> {
        self.config.validate()?;
        let engine = Engine::new(&self.config)?;
        let (handle, engine_task) = EngineHandle::spawn(engine, self.config.request_queue);

        let ticker = tokio::spawn(expiry_ticker(handle.clone(), self.config.expiry_interval()));
        let admin = match self.config.admin_addr {
            Some(addr) => {
                let admin_listener = TcpListener::bind(addr).await?;
                info!(addr = %admin_listener.local_addr()?, "admin endpoint listening");
                let app = build_router(handle.clone());
                Some(tokio::spawn(async move {
                    if let Err(e) = axum::serve(admin_listener, app).await {
                        warn!(error = %e, "admin endpoint stopped");
                    }
                }))
            }
            None => None,
        };

        info!(addr = %listener.local_addr()?, "autodel server listening");
        let slots = Arc::new(Semaphore::new(self.config.max_connections));
        let codec = LineCodec::new(self.config.max_line_length);

        tokio::pin!(shutdown);
        let result = loop {
            let (mut stream, peer) = tokio::select! {
                _ = &mut shutdown => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => break Err(ServerError::Io(e)),
                },
            };

            let Ok(permit) = slots.clone().try_acquire_owned() else {
                warn!(%peer, "connection refused: too many clients");
                let refusal = encode_reply(&Reply::error("ERR max number of clients reached"));
                let _ = stream.write_all(&refusal).await;
                continue;
            };

            let engine = handle.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, engine, codec).await {
                    debug!(%peer, error = %e, "connection closed with error");
                }
                drop(permit);
            });
        };

        ticker.abort();
        if let Some(admin) = admin {
            admin.abort();
        }
        drop(handle);
        // Connection tasks still hold handles; the engine stops with the last one.
        drop(engine_task);
        info!("autodel server stopped");
        result
    }
}

async fn expiry_ticker(engine: EngineHandle, every: std::time::Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if engine.tick().await.is_err() {
            return;
        }
    }
}

/// Serve one connection. The engine hears exactly one disconnect for it,
/// however the connection ends.
async fn handle_connection(
    mut stream: TcpStream,
    engine: EngineHandle,
    codec: LineCodec,
) -> ServerResult<()> {
    let client = engine.connect().await?;
    debug!(%client, "session started");
    let result = serve_client(&mut stream, client, &engine, codec).await;
    engine.disconnect(client).await?;
    debug!(%client, "session ended");
    result
}

async fn serve_client(
    stream: &mut TcpStream,
    client: ClientId,
    engine: &EngineHandle,
    codec: LineCodec,
) -> ServerResult<()> {
    let mut buf = BytesMut::with_capacity(4 * 1024);
    loop {
        loop {
            let argv = match codec.decode(&mut buf) {
                Ok(Some(argv)) => argv,
                Ok(None) => break,
                Err(e) => {
                    let reply = Reply::error(format!("ERR Protocol error: {e}"));
                    stream.write_all(&encode_reply(&reply)).await?;
                    return Err(e.into());
                }
            };
            if argv.is_empty() {
                continue;
            }
            let quit = argv[0].eq_ignore_ascii_case(b"QUIT");
            let reply = engine.execute(client, argv).await?;
            stream.write_all(&encode_reply(&reply)).await?;
            if quit && !reply.is_error() {
                return Ok(());
            }
        }

        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
    }
}
