use thiserror::Error;

/// Errors raised while assembling the relay before it connects anywhere.
/// Runtime failures have their own types next to the code that raises them.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
