//! Keyspace notifications emitted by a [`crate::KeyStore`].

use std::fmt;
use std::ops::BitOr;

use autodel_types::KeyName;
use serde::{Deserialize, Serialize};

/// Family a keyspace event belongs to; subscribers filter on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventClass {
    /// Type-independent commands such as `del` and `expire`.
    Generic,
    /// Writes of string values (`set`).
    String,
    /// A key was removed because its deadline passed.
    Expired,
    /// A key was removed to make room under `max_keys`.
    Evicted,
}

impl EventClass {
    const fn bit(self) -> u8 {
        match self {
            Self::Generic => 1 << 0,
            Self::String => 1 << 1,
            Self::Expired => 1 << 2,
            Self::Evicted => 1 << 3,
        }
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Generic => "generic",
            Self::String => "string",
            Self::Expired => "expired",
            Self::Evicted => "evicted",
        };
        f.write_str(s)
    }
}

/// One change to the keyspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceEvent {
    pub class: EventClass,
    /// The command-level event name, e.g. `"del"` or `"expired"`.
    pub event: String,
    pub key: KeyName,
}

impl KeyspaceEvent {
    pub fn new(class: EventClass, event: impl Into<String>, key: KeyName) -> Self {
        Self {
            class,
            event: event.into(),
            key,
        }
    }

    pub fn set(key: KeyName) -> Self {
        Self::new(EventClass::String, "set", key)
    }

    pub fn del(key: KeyName) -> Self {
        Self::new(EventClass::Generic, "del", key)
    }

    pub fn expire(key: KeyName) -> Self {
        Self::new(EventClass::Generic, "expire", key)
    }

    pub fn expired(key: KeyName) -> Self {
        Self::new(EventClass::Expired, "expired", key)
    }

    pub fn evicted(key: KeyName) -> Self {
        Self::new(EventClass::Evicted, "evicted", key)
    }
}

impl fmt::Display for KeyspaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.class, self.event, self.key)
    }
}

/// Set of [`EventClass`]es a subscriber wants to hear about.
///
/// Serializes as a list of class names, e.g. `["generic", "expired"]`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<EventClass>", into = "Vec<EventClass>")]
pub struct NotifyMask(u8);

impl NotifyMask {
    pub const NONE: Self = Self(0);
    pub const GENERIC: Self = Self(EventClass::Generic.bit());
    pub const STRING: Self = Self(EventClass::String.bit());
    pub const EXPIRED: Self = Self(EventClass::Expired.bit());
    pub const EVICTED: Self = Self(EventClass::Evicted.bit());
    pub const ALL: Self = Self(0b1111);

    const CLASSES: [EventClass; 4] = [
        EventClass::Generic,
        EventClass::String,
        EventClass::Expired,
        EventClass::Evicted,
    ];

    pub const fn contains(self, class: EventClass) -> bool {
        self.0 & class.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Classes in this mask, in declaration order.
    pub fn classes(self) -> impl Iterator<Item = EventClass> {
        Self::CLASSES.into_iter().filter(move |c| self.contains(*c))
    }

    pub fn matches(self, event: &KeyspaceEvent) -> bool {
        self.contains(event.class)
    }
}

impl BitOr for NotifyMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<EventClass> for NotifyMask {
    fn from(class: EventClass) -> Self {
        Self(class.bit())
    }
}

impl From<Vec<EventClass>> for NotifyMask {
    fn from(classes: Vec<EventClass>) -> Self {
        classes
            .into_iter()
            .fold(Self::NONE, |mask, c| mask | Self::from(c))
    }
}

impl From<NotifyMask> for Vec<EventClass> {
    fn from(mask: NotifyMask) -> Self {
        mask.classes().collect()
    }
}

impl fmt::Debug for NotifyMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.classes()).finish()
    }
}
