//! gpo-updater — the gas price oracle control loop.
//!
//! # Architecture
//!
//! ```text
//! GasPriceOracle
//!   ├── start(): verify signer owns the contract
//!   │            seed pricer from on-chain price, epoch from chain tip
//!   │            spawn the update loop
//!   └── update loop (one tick per epoch, never overlapping)
//!       └── GasPriceUpdater::update_gas_price()
//!           ReadingChain → Computing → Gated | Submitting → Idle
//! ```
//!
//! Chain read failures and out-of-order heights skip the tick without moving
//! the epoch checkpoint. A pricer configuration error stops the loop.
//! Submission failures are logged and retried implicitly next epoch, since
//! the on-chain price is re-read every tick.

pub mod error;
pub mod oracle;
pub mod updater;

pub use error::{OracleError, OracleResult, UpdateError, UpdateResult};
pub use oracle::GasPriceOracle;
pub use updater::{GasPriceUpdater, Phase, TickOutcome};
