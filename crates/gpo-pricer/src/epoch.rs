//! Epoch bookkeeping and observed gas rate.
//!
//! Gas usage is not read block by block. The number of blocks produced in
//! the epoch is multiplied by an assumed average block gas limit, so one
//! height query per epoch is enough.

use crate::error::{PricerError, PricerResult};

/// Average gas per second over `[epoch_start_block_number, latest_block_number)`.
pub fn average_gas_per_second(
    epoch_start_block_number: u64,
    latest_block_number: u64,
    epoch_length_seconds: u64,
    average_block_gas_limit: f64,
) -> PricerResult<f64> {
    if latest_block_number < epoch_start_block_number {
        return Err(PricerError::OutOfOrderEpoch {
            start: epoch_start_block_number,
            latest: latest_block_number,
        });
    }
    if epoch_length_seconds == 0 {
        return Err(PricerError::InvalidConfiguration(
            "epoch length cannot be zero seconds".to_string(),
        ));
    }

    let blocks = (latest_block_number - epoch_start_block_number) as f64;
    Ok(blocks * average_block_gas_limit / epoch_length_seconds as f64)
}

/// Tracks the block height at which the current epoch started.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochTracker {
    epoch_start_block_number: u64,
    epoch_length_seconds: u64,
    average_block_gas_limit: f64,
}

impl EpochTracker {
    pub fn new(
        epoch_start_block_number: u64,
        epoch_length_seconds: u64,
        average_block_gas_limit: f64,
    ) -> PricerResult<Self> {
        if !average_block_gas_limit.is_finite() || average_block_gas_limit < 1.0 {
            return Err(PricerError::InvalidConfiguration(format!(
                "average block gas limit cannot be less than 1 gas, got {average_block_gas_limit}"
            )));
        }
        if epoch_length_seconds < 1 {
            return Err(PricerError::InvalidConfiguration(
                "epoch length cannot be less than 1 second".to_string(),
            ));
        }
        Ok(Self {
            epoch_start_block_number,
            epoch_length_seconds,
            average_block_gas_limit,
        })
    }

    pub fn epoch_start_block_number(&self) -> u64 {
        self.epoch_start_block_number
    }

    /// Observed gas rate for the epoch ending at `latest_block_number`.
    ///
    /// Does not move the checkpoint; call [`EpochTracker::advance`] once the
    /// epoch has been fully processed.
    pub fn observe(&self, latest_block_number: u64) -> PricerResult<f64> {
        average_gas_per_second(
            self.epoch_start_block_number,
            latest_block_number,
            self.epoch_length_seconds,
            self.average_block_gas_limit,
        )
    }

    /// Start the next epoch at `latest_block_number`.
    pub fn advance(&mut self, latest_block_number: u64) -> PricerResult<()> {
        if latest_block_number < self.epoch_start_block_number {
            return Err(PricerError::OutOfOrderEpoch {
                start: self.epoch_start_block_number,
                latest: latest_block_number,
            });
        }
        self.epoch_start_block_number = latest_block_number;
        Ok(())
    }
}
