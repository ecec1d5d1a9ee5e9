//! Invariant violations reported by [`crate::AssociationTable::check_invariants`].

use autodel_types::{ClientId, KeyName};

/// A broken consistency rule between the forward and reverse views.
///
/// None of these are reachable through the public API; they exist so tests
/// can state exactly which rule failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    /// A key listed under a client is owned by someone else, or by no one.
    #[error("{key} is listed under {client} but owned by {owner:?}")]
    ForwardMismatch {
        client: ClientId,
        key: KeyName,
        owner: Option<ClientId>,
    },

    /// A key in the reverse view is listed `count` times under its owner.
    #[error("{key} is owned by {owner} but listed {count} times")]
    ReverseMismatch {
        key: KeyName,
        owner: ClientId,
        count: usize,
    },

    /// A client is kept with no keys.
    #[error("{0} is listed with an empty key sequence")]
    EmptySequence(ClientId),

    /// The two views disagree on how many associations exist.
    #[error("forward view holds {forward} keys, reverse view holds {reverse}")]
    CountMismatch { forward: usize, reverse: usize },
}
