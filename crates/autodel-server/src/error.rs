use thiserror::Error;

/// Errors from decoding client requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("request line exceeds {max} bytes")]
    LineTooLong { max: usize },

    #[error("unbalanced quotes in request")]
    UnbalancedQuotes,

    #[error("invalid escape sequence in quoted argument")]
    InvalidEscape,
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("module error: {0}")]
    Module(#[from] autodel_module::ModuleError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("engine is no longer running")]
    EngineClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
