//! One epoch of the control loop.
//!
//! Reads the chain, runs the pricer, and writes the new price only when it
//! moved far enough from what is already on chain. The epoch checkpoint
//! advances once per successfully computed epoch, whether or not a write
//! happened.

use tracing::{debug, info};

use gpo_chain::{ChainObserver, PriceWriter};
use gpo_pricer::{is_difference_significant, EpochTracker, GasPricer};

use crate::error::{UpdateError, UpdateResult};

/// Where the updater is within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ReadingChain,
    Computing,
    Gated,
    Submitting,
}

/// Result of a successfully computed epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The new price was too close to the on-chain price to be written.
    Gated {
        previous: f64,
        price: f64,
        gas_per_second: f64,
    },
    /// The new price was submitted.
    Submitted {
        previous: f64,
        price: f64,
        gas_per_second: f64,
    },
}

impl TickOutcome {
    pub fn price(&self) -> f64 {
        match self {
            TickOutcome::Gated { price, .. } | TickOutcome::Submitted { price, .. } => *price,
        }
    }
}

/// Drives the pricer from chain observations, one epoch per call.
pub struct GasPriceUpdater<C, W> {
    pricer: GasPricer,
    epoch: EpochTracker,
    significant_factor: f64,
    chain: C,
    writer: W,
    phase: Phase,
}

impl<C: ChainObserver, W: PriceWriter> GasPriceUpdater<C, W> {
    pub fn new(
        pricer: GasPricer,
        epoch: EpochTracker,
        significant_factor: f64,
        chain: C,
        writer: W,
    ) -> Self {
        Self {
            pricer,
            epoch,
            significant_factor,
            chain,
            writer,
            phase: Phase::Idle,
        }
    }

    /// The pricer's current price (not necessarily the on-chain price).
    pub fn gas_price(&self) -> f64 {
        self.pricer.price()
    }

    pub fn epoch_start_block_number(&self) -> u64 {
        self.epoch.epoch_start_block_number()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run one epoch.
    ///
    /// On any error before the pricer commits, neither the price nor the
    /// epoch checkpoint moves. A submission error is reported after both
    /// have moved.
    pub async fn update_gas_price(&mut self) -> UpdateResult<TickOutcome> {
        let result = self.tick().await;
        self.enter(Phase::Idle);
        result
    }

    async fn tick(&mut self) -> UpdateResult<TickOutcome> {
        self.enter(Phase::ReadingChain);
        let latest = self
            .chain
            .latest_height()
            .await
            .map_err(UpdateError::LatestHeight)?;
        let previous = self
            .chain
            .on_chain_price()
            .await
            .map_err(UpdateError::OnChainPrice)?;

        self.enter(Phase::Computing);
        let gas_per_second = self.epoch.observe(latest)?;
        let price = self.pricer.complete_epoch(gas_per_second)?;
        self.epoch.advance(latest)?;

        // The contract stores whole units; gate on what would be written.
        if !is_difference_significant(price.trunc(), previous, self.significant_factor) {
            self.enter(Phase::Gated);
            info!(
                min_factor = self.significant_factor,
                current_price = previous,
                next_price = price,
                "gas price did not significantly change"
            );
            return Ok(TickOutcome::Gated {
                previous,
                price,
                gas_per_second,
            });
        }

        self.enter(Phase::Submitting);
        self.writer
            .submit_price(price)
            .await
            .map_err(|source| UpdateError::Submit { price, source })?;

        Ok(TickOutcome::Submitted {
            previous,
            price,
            gas_per_second,
        })
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, epoch_start = self.epoch.epoch_start_block_number(), "updater phase");
        self.phase = phase;
    }
}
