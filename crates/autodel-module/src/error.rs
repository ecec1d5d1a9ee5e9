use thiserror::Error;

/// Errors raised while loading the module into a host.
///
/// Once loaded, the module's handlers never fail: bad input is answered with
/// an error [`crate::Reply`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    /// The host refused a registration or subscription during load.
    #[error("failed to register {step}: {reason}")]
    Registration { step: &'static str, reason: String },

    /// The module configuration is unusable.
    #[error("invalid module configuration: {0}")]
    InvalidConfig(String),

    /// Reported by a host implementation.
    #[error("host error: {0}")]
    Host(String),
}

pub type ModuleResult<T> = Result<T, ModuleError>;
