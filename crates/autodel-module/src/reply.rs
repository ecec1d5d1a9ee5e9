use std::fmt;

/// Reply to a command, independent of any wire format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Pong,
    Integer(i64),
    /// A byte string, or nil when `None`.
    Bulk(Option<Vec<u8>>),
    Error(String),
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Usage error for a command called with the wrong number of arguments.
    pub fn wrong_arity(command: &str) -> Self {
        Self::Error(format!(
            "ERR wrong number of arguments for '{command}' command"
        ))
    }

    pub fn from_bool(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Pong => f.write_str("PONG"),
            Self::Integer(n) => write!(f, "(integer) {n}"),
            Self::Bulk(None) => f.write_str("(nil)"),
            Self::Bulk(Some(bytes)) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Self::Error(msg) => write!(f, "(error) {msg}"),
        }
    }
}
