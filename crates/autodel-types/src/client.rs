use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifier of a connected client session.
///
/// Unique for the lifetime of the session. The host hands these out; over a
/// long enough time a value may be reused by a later session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u64);

impl ClientId {
    /// Wrap a raw host-assigned id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id following this one, wrapping at `u64::MAX`.
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<u64> for ClientId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl FromStr for ClientId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("client:").unwrap_or(s);
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| TypeError::InvalidClientId(s.to_string()))
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_roundtrip() {
        let id = ClientId::new(42);
        assert_eq!(id.to_string(), "client:42");
        assert_eq!("client:42".parse::<ClientId>().unwrap(), id);
        assert_eq!("42".parse::<ClientId>().unwrap(), id);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "client:abc".parse::<ClientId>().unwrap_err();
        assert_eq!(err, TypeError::InvalidClientId("client:abc".into()));
    }

    #[test]
    fn next_wraps() {
        assert_eq!(ClientId::new(1).next(), ClientId::new(2));
        assert_eq!(ClientId::new(u64::MAX).next(), ClientId::new(0));
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&ClientId::new(7)).unwrap();
        assert_eq!(json, "7");
        let parsed: ClientId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.get(), 7);
    }
}
