use thiserror::Error;

/// Common error type for energymon configuration and data validation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type alias using energymon's Error.
pub type Result<T> = std::result::Result<T, Error>;
