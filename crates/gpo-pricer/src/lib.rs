//! gpo-pricer — the gas price control algorithm.
//!
//! Pure computation, no I/O. The update loop in `gpo-updater` drives it once
//! per epoch.
//!
//! # Pricing Algorithm
//!
//! ```text
//! observed = (latest_block - epoch_start_block) * avg_block_gas_limit / epoch_secs
//! ratio    = observed / target
//! ratio    = clamp(ratio, 1 - max_change, 1 + max_change)
//! price    = max(price * ratio, floor)
//! ```
//!
//! The new price is only written on chain when it differs from the on-chain
//! price by more than the significance factor (see [`is_difference_significant`]).
//! The pricer's own state advances every epoch regardless.

pub mod epoch;
pub mod error;
pub mod pricer;
pub mod significance;

pub use epoch::{average_gas_per_second, EpochTracker};
pub use error::{PricerError, PricerResult};
pub use pricer::GasPricer;
pub use significance::is_difference_significant;
