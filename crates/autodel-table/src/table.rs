//! The [`AssociationTable`] and its three mutating operations.

use std::collections::HashMap;

use autodel_types::{ClientId, KeyName};
use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;

/// What [`AssociationTable::add`] did with a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The key had no owner and now belongs to the claimant.
    Inserted,
    /// The claimant already owned the key; nothing changed.
    Unchanged,
    /// The key was taken from `previous`; the last claim wins.
    Reassigned { previous: ClientId },
}

/// Point-in-time size of the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    /// Clients holding at least one key.
    pub clients: usize,
    /// Keys with an owner.
    pub keys: usize,
}

/// Client → keys and key → client, kept as mutual inverses.
///
/// Two tables compare equal when both views hold the same contents, which
/// makes "this operation left the table as it was" directly testable.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AssociationTable {
    /// Keys per client, in claim order. Never holds an empty `Vec`.
    forward: HashMap<ClientId, Vec<KeyName>>,
    /// The current owner of each claimed key.
    reverse: HashMap<KeyName, ClientId>,
}

impl std::fmt::Debug for AssociationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssociationTable")
            .field("clients", &self.forward.len())
            .field("keys", &self.reverse.len())
            .finish()
    }
}

impl AssociationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------

    /// Record that `client` owns `key`.
    ///
    /// A claim on a key owned by another client moves it: the key leaves the
    /// previous owner's sequence (dropping that client if it ends up with no
    /// keys) and is appended to `client`'s. Re-claiming a key the client
    /// already owns does not duplicate it.
    pub fn add(&mut self, client: ClientId, key: KeyName) -> AddOutcome {
        let outcome = match self.reverse.get_mut(&key) {
            Some(owner) if *owner == client => return AddOutcome::Unchanged,
            Some(owner) => {
                let previous = std::mem::replace(owner, client);
                Self::detach(&mut self.forward, previous, key.as_bytes());
                AddOutcome::Reassigned { previous }
            }
            None => {
                self.reverse.insert(key.clone(), client);
                AddOutcome::Inserted
            }
        };
        self.forward.entry(client).or_default().push(key);
        debug_assert_eq!(self.check_invariants(), Ok(()));
        outcome
    }

    /// Forget `client` and hand back every key it owned, in claim order.
    ///
    /// Keys that were reassigned away from the client are not included.
    /// Unknown clients yield an empty `Vec`.
    pub fn remove_client(&mut self, client: ClientId) -> Vec<KeyName> {
        let Some(keys) = self.forward.remove(&client) else {
            return Vec::new();
        };
        for key in &keys {
            self.reverse.remove(key);
        }
        debug_assert_eq!(self.check_invariants(), Ok(()));
        keys
    }

    /// Drop the association for `key`, if it has one.
    ///
    /// Returns the client that owned it. Calling this for a key without an
    /// owner is a no-op.
    pub fn remove_key(&mut self, key: &[u8]) -> Option<ClientId> {
        let owner = self.reverse.remove(key)?;
        Self::detach(&mut self.forward, owner, key);
        debug_assert_eq!(self.check_invariants(), Ok(()));
        Some(owner)
    }

    /// Remove `key` from `client`'s sequence, dropping the client once empty.
    fn detach(forward: &mut HashMap<ClientId, Vec<KeyName>>, client: ClientId, key: &[u8]) {
        let Some(keys) = forward.get_mut(&client) else {
            return;
        };
        if let Some(pos) = keys.iter().position(|k| k.as_bytes() == key) {
            keys.remove(pos);
        }
        if keys.is_empty() {
            forward.remove(&client);
        }
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// The client currently owning `key`.
    pub fn owner_of(&self, key: &[u8]) -> Option<ClientId> {
        self.reverse.get(key).copied()
    }

    /// Keys owned by `client`, in claim order. Empty for unknown clients.
    pub fn keys_of(&self, client: ClientId) -> &[KeyName] {
        self.forward.get(&client).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.reverse.contains_key(key)
    }

    /// Number of clients owning at least one key.
    pub fn client_count(&self) -> usize {
        self.forward.len()
    }

    /// Number of owned keys.
    pub fn key_count(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            clients: self.client_count(),
            keys: self.key_count(),
        }
    }

    /// Verify that the forward and reverse views are consistent.
    ///
    /// Walks the whole table; meant for tests and diagnostics.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut listed = 0usize;
        for (&client, keys) in &self.forward {
            if keys.is_empty() {
                return Err(InvariantViolation::EmptySequence(client));
            }
            for key in keys {
                let owner = self.reverse.get(key).copied();
                if owner != Some(client) {
                    return Err(InvariantViolation::ForwardMismatch {
                        client,
                        key: key.clone(),
                        owner,
                    });
                }
            }
            listed += keys.len();
        }

        for (key, &owner) in &self.reverse {
            let count = self
                .forward
                .get(&owner)
                .map_or(0, |keys| keys.iter().filter(|k| *k == key).count());
            if count != 1 {
                return Err(InvariantViolation::ReverseMismatch {
                    key: key.clone(),
                    owner,
                    count,
                });
            }
        }

        if listed != self.reverse.len() {
            return Err(InvariantViolation::CountMismatch {
                forward: listed,
                reverse: self.reverse.len(),
            });
        }
        Ok(())
    }
}
