//! Oracle lifecycle: start, the timed update loop, stop and wait.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use gpo_chain::{ChainObserver, PriceWriter};
use gpo_core::{PricingSettings, TargetRate};
use gpo_pricer::{EpochTracker, GasPricer};

use crate::error::{OracleError, OracleResult, UpdateError};
use crate::updater::{GasPriceUpdater, TickOutcome};

/// Runs one [`GasPriceUpdater`] per epoch on a background task.
pub struct GasPriceOracle<C, W> {
    chain: C,
    writer: W,
    pricing: PricingSettings,
    target: TargetRate,
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<OracleResult<()>>>,
}

impl<C, W> GasPriceOracle<C, W>
where
    C: ChainObserver + Clone + 'static,
    W: PriceWriter + Clone + 'static,
{
    /// `target` is read once per epoch, so updating it retunes a running
    /// oracle.
    pub fn new(chain: C, writer: W, pricing: PricingSettings, target: TargetRate) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            chain,
            writer,
            pricing,
            target,
            shutdown_tx,
            handle: None,
        }
    }

    /// Handle to the live target gas rate.
    pub fn target(&self) -> &TargetRate {
        &self.target
    }

    /// Whether the update loop has been spawned and not yet waited on.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Verify authority, seed the pricer and epoch from the chain, and spawn
    /// the update loop.
    ///
    /// Any error here means the loop was never entered.
    pub async fn start(&mut self) -> OracleResult<()> {
        if self.handle.is_some() {
            return Err(OracleError::AlreadyStarted);
        }

        let signer = self.writer.signer();
        if !self.chain.verify_authority(signer).await? {
            return Err(OracleError::UnauthorizedSigner(signer));
        }

        let price = self.chain.on_chain_price().await?;
        let height = self.chain.latest_height().await?;

        let epoch = EpochTracker::new(
            height,
            self.pricing.epoch_length_seconds,
            self.pricing.average_block_gas_limit_per_epoch,
        )?;
        let target = self.target.clone();
        let pricer = GasPricer::new(
            price,
            self.pricing.floor_price,
            move || target.get(),
            self.pricing.max_percent_change_per_epoch,
        );
        let updater = GasPriceUpdater::new(
            pricer,
            epoch,
            self.pricing.significant_factor,
            self.chain.clone(),
            self.writer.clone(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = shutdown_tx;

        let period = self.pricing.epoch_length();
        self.handle = Some(tokio::spawn(run_update_loop(updater, period, shutdown_rx)));

        info!(
            signer = ?signer,
            price,
            epoch_start = height,
            epoch_length_secs = period.as_secs(),
            target_gas_per_second = self.target.get(),
            "gas price oracle started"
        );
        Ok(())
    }

    /// Ask the update loop to exit. Takes effect between ticks.
    pub fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        debug!("gas price oracle stop requested");
    }

    /// Wait for the update loop to exit.
    ///
    /// Returns the fatal error that ended the loop, if any. Cancel-safe: a
    /// dropped `wait` leaves the loop running and can be retried.
    pub async fn wait(&mut self) -> OracleResult<()> {
        let handle = self.handle.as_mut().ok_or(OracleError::NotStarted)?;
        let result = handle.await;
        self.handle = None;
        result?
    }
}

/// One tick per epoch until shutdown or a fatal error.
async fn run_update_loop<C, W>(
    mut updater: GasPriceUpdater<C, W>,
    period: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) -> OracleResult<()>
where
    C: ChainObserver,
    W: PriceWriter,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                // A dropped sender also ends the loop.
                break;
            }
            _ = ticker.tick() => {
                match updater.update_gas_price().await {
                    Ok(TickOutcome::Submitted { previous, price, gas_per_second }) => {
                        info!(previous, current = price, gas_per_second, "updated gas price");
                    }
                    Ok(TickOutcome::Gated { .. }) => {}
                    Err(e) if e.is_fatal() => {
                        error!(error = %e, "gas price update failed, stopping");
                        return Err(OracleError::Fatal(e));
                    }
                    Err(e @ UpdateError::Submit { .. }) => {
                        warn!(error = %e, "gas price update not submitted, retrying next epoch");
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            epoch_start = updater.epoch_start_block_number(),
                            "skipping epoch"
                        );
                    }
                }
            }
        }
    }

    info!("gas price oracle shutting down");
    Ok(())
}
