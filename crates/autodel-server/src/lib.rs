//! Command server hosting the autodel module.
//!
//! Speaks a small inline text protocol over TCP (see [`protocol`]). One
//! engine task owns the key store and the module and applies every request
//! in order; each connection is a client session whose claimed keys are
//! deleted when it ends. An optional HTTP admin endpoint reports health and
//! table sizes.

pub mod admin;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod server;

pub use admin::{build_router, HealthResponse};
pub use config::ServerConfig;
pub use engine::{Engine, EngineHandle, EngineRequest, EngineStats};
pub use error::{ProtocolError, ProtocolResult, ServerError, ServerResult};
pub use protocol::LineCodec;
pub use server::AutoDelServer;
