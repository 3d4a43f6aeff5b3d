//! Update loop and oracle error types.

use thiserror::Error;

use gpo_chain::{Address, ChainError};
use gpo_pricer::PricerError;

/// Result type alias for a single update tick.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Result type alias for oracle lifecycle operations.
pub type OracleResult<T> = Result<T, OracleError>;

/// Errors from a single epoch tick.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("cannot read latest block number: {0}")]
    LatestHeight(#[source] ChainError),

    #[error("cannot read on-chain gas price: {0}")]
    OnChainPrice(#[source] ChainError),

    #[error(transparent)]
    Pricing(#[from] PricerError),

    #[error("cannot submit gas price {price}: {source}")]
    Submit {
        price: f64,
        #[source]
        source: ChainError,
    },
}

impl UpdateError {
    /// Whether the loop must stop. Everything else is retried next epoch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UpdateError::Pricing(e) if e.is_fatal())
    }
}

/// Errors from starting, running, or stopping the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("signer {0:?} is not the oracle contract owner")]
    UnauthorizedSigner(Address),

    #[error("chain read failed during startup: {0}")]
    Startup(#[from] ChainError),

    #[error("invalid epoch configuration: {0}")]
    Epoch(#[from] PricerError),

    #[error("update loop stopped: {0}")]
    Fatal(#[source] UpdateError),

    #[error("oracle already started")]
    AlreadyStarted,

    #[error("oracle not started")]
    NotStarted,

    #[error("update loop task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
