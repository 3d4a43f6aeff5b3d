//! gpo-chain — everything the oracle needs from the chain.
//!
//! The control loop only sees two capabilities:
//!
//! ```text
//! ChainObserver                      PriceWriter
//!   ├── latest_height()                ├── signer()
//!   ├── on_chain_price()               └── submit_price(price)
//!   └── verify_authority(signer)
//! ```
//!
//! [`EthClient`] implements both over Ethereum JSON-RPC with every request
//! bounded by a timeout. [`MemoryChain`] implements both in memory for tests.

pub mod contract;
pub mod error;
pub mod eth;
pub mod memory;

use std::future::Future;
use std::sync::Arc;

pub use ethers::types::Address;

pub use error::{ChainError, ChainResult};
pub use eth::EthClient;
pub use memory::MemoryChain;

/// Read-only view of the chain.
pub trait ChainObserver: Send + Sync {
    /// Current chain tip.
    fn latest_height(&self) -> impl Future<Output = ChainResult<u64>> + Send;

    /// The gas price currently recorded in the oracle contract.
    fn on_chain_price(&self) -> impl Future<Output = ChainResult<f64>> + Send;

    /// Whether `signer` is allowed to update the oracle contract.
    fn verify_authority(&self, signer: Address)
    -> impl Future<Output = ChainResult<bool>> + Send;
}

/// Writes new prices to the oracle contract.
pub trait PriceWriter: Send + Sync {
    /// Identity transactions are signed with.
    fn signer(&self) -> Address;

    /// Sign and broadcast a price update, optionally waiting for inclusion.
    fn submit_price(&self, price: f64) -> impl Future<Output = ChainResult<()>> + Send;
}

impl<T: ChainObserver> ChainObserver for Arc<T> {
    fn latest_height(&self) -> impl Future<Output = ChainResult<u64>> + Send {
        (**self).latest_height()
    }

    fn on_chain_price(&self) -> impl Future<Output = ChainResult<f64>> + Send {
        (**self).on_chain_price()
    }

    fn verify_authority(
        &self,
        signer: Address,
    ) -> impl Future<Output = ChainResult<bool>> + Send {
        (**self).verify_authority(signer)
    }
}

impl<T: PriceWriter> PriceWriter for Arc<T> {
    fn signer(&self) -> Address {
        (**self).signer()
    }

    fn submit_price(&self, price: f64) -> impl Future<Output = ChainResult<()>> + Send {
        (**self).submit_price(price)
    }
}
