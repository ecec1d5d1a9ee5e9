//! Bidirectional association between client sessions and the keys they own.
//!
//! The [`AssociationTable`] keeps two views of one relation:
//!
//! - forward: client → keys, in the order the client claimed them
//! - reverse: key → the single client that currently owns it
//!
//! # Invariants
//!
//! After every public operation:
//!
//! 1. every key listed under a client maps back to that client;
//! 2. every key in the reverse view is listed exactly once under its owner;
//! 3. no client is listed with an empty key sequence;
//! 4. a key is listed under at most one client.
//!
//! Both views are private. All mutation goes through [`AssociationTable::add`],
//! [`AssociationTable::remove_client`] and [`AssociationTable::remove_key`].
//! The table has no interior locking: callers serialize access (the server
//! does so by owning it on a single engine task).

pub mod error;
pub mod table;

pub use error::InvariantViolation;
pub use table::{AddOutcome, AssociationTable, TableStats};
