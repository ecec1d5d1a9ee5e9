use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Name of a record in the backing store.
///
/// Treated as an uninterpreted binary blob: no encoding is assumed, and two
/// names are equal iff their bytes are equal. `KeyName` borrows as `[u8]`
/// so maps keyed by it can be queried with a plain byte slice.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyName(Vec<u8>);

impl KeyName {
    /// Build a key name from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Build a key name, rejecting the empty byte string.
    pub fn try_new(bytes: impl Into<Vec<u8>>) -> Result<Self, TypeError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(TypeError::EmptyKey);
        }
        Ok(Self(bytes))
    }

    /// Parse from a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::try_new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The name as UTF-8 text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    fn is_printable(&self) -> bool {
        self.as_str().is_some_and(|s| {
            !s.is_empty() && !s.starts_with("0x") && s.chars().all(|c| !c.is_control())
        })
    }
}

impl Borrow<[u8]> for KeyName {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for KeyName {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for KeyName {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for KeyName {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<&[u8]> for KeyName {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for KeyName {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyName({self})")
    }
}

/// Printable UTF-8 names are shown verbatim; anything else (including names
/// that already look like `0x...`) as `0x<hex>`.
impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(s) if self.is_printable() => f.write_str(s),
            _ => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn borrow_allows_slice_lookup() {
        let mut map = HashMap::new();
        map.insert(KeyName::from("session:1"), 1u8);
        assert_eq!(map.get(b"session:1".as_slice()), Some(&1));
        assert_eq!(map.get(b"session:2".as_slice()), None);
    }

    #[test]
    fn binary_names_are_not_interpreted() {
        let a = KeyName::new(vec![0xff, 0x00, 0x41]);
        let b = KeyName::new(vec![0xff, 0x00, 0x41]);
        let c = KeyName::new(vec![0xff, 0x00]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().is_none());
    }

    #[test]
    fn display_printable_and_binary() {
        assert_eq!(KeyName::from("lock:a").to_string(), "lock:a");
        assert_eq!(KeyName::new(vec![0xff, 0xfe]).to_string(), "0xfffe");
        // Valid UTF-8 outside ASCII is still text.
        assert_eq!(KeyName::new(vec![0xde, 0xad]).to_string(), "\u{7ad}");
        assert_eq!(KeyName::from("clé").to_string(), "clé");
        assert_eq!(KeyName::from("a\nb").to_string(), "0x610a62");
        assert_eq!(KeyName::from("0x1").to_string(), "0x307831");
    }

    #[test]
    fn hex_roundtrip() {
        let key = KeyName::new(vec![1, 2, 254]);
        let parsed = KeyName::from_hex(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn try_new_rejects_empty() {
        assert_eq!(KeyName::try_new(Vec::new()).unwrap_err(), TypeError::EmptyKey);
        assert!(KeyName::from_hex("0x").is_err());
    }

    proptest::proptest! {
        #[test]
        fn display_of_binary_parses_back(
            bytes in proptest::collection::vec(proptest::num::u8::ANY, 1..32)
        ) {
            let key = KeyName::new(bytes);
            let shown = key.to_string();
            if let Some(hex) = shown.strip_prefix("0x") {
                proptest::prop_assert_eq!(KeyName::from_hex(hex).unwrap(), key);
            } else {
                proptest::prop_assert_eq!(shown.as_bytes(), key.as_bytes());
            }
        }
    }
}
