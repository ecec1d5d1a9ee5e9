//! Foundation types for autodel.
//!
//! Every other autodel crate depends on `autodel-types`.
//!
//! # Key Types
//!
//! - [`ClientId`] -- Opaque identifier of a connected client session
//! - [`KeyName`] -- Uninterpreted byte string naming a record in the store

pub mod client;
pub mod error;
pub mod key;

pub use client::ClientId;
pub use error::TypeError;
pub use key::KeyName;
