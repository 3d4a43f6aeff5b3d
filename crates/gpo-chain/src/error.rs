//! Chain access error types.

use std::time::Duration;

use ethers::types::TxHash;
use thiserror::Error;

/// Result type alias for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors that can occur while talking to the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    #[error("invalid contract address: {0}")]
    InvalidAddress(String),

    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    #[error("price cannot be represented on chain: {0}")]
    InvalidPrice(String),

    #[error("transaction {0:?} was dropped from the mempool")]
    Dropped(TxHash),

    #[error("transaction {0:?} reverted")]
    Reverted(TxHash),
}
