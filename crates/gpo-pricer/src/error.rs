//! Pricer error types.

use thiserror::Error;

/// Result type alias for pricing operations.
pub type PricerResult<T> = Result<T, PricerError>;

/// Errors that can occur while computing a new price.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricerError {
    #[error("invalid observed gas per second: {0}")]
    InvalidInput(f64),

    #[error("invalid pricer configuration: {0}")]
    InvalidConfiguration(String),

    #[error("latest block {latest} is behind epoch start block {start}")]
    OutOfOrderEpoch { start: u64, latest: u64 },
}

impl PricerError {
    /// Configuration errors cannot resolve themselves between epochs.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PricerError::InvalidConfiguration(_))
    }
}
