//! Bounded multiplicative gas pricer.
//!
//! Each epoch the price is scaled by how far observed gas usage sat from
//! the target, with the scale factor clamped to `1 ± max_change_per_epoch`
//! and the result held at or above the floor.

use tracing::debug;

use crate::error::{PricerError, PricerResult};

/// Accessor for the current target gas per second.
pub type TargetRateFn = Box<dyn Fn() -> f64 + Send + Sync>;

/// Owns the current price and moves it once per completed epoch.
pub struct GasPricer {
    cur_price: f64,
    floor_price: f64,
    get_target_gas_per_second: TargetRateFn,
    max_change_per_epoch: f64,
}

impl GasPricer {
    /// Create a pricer starting from `initial_price`.
    ///
    /// `target_gas_per_second` is polled on every [`GasPricer::complete_epoch`],
    /// so the target can change without rebuilding the pricer.
    pub fn new(
        initial_price: f64,
        floor_price: f64,
        target_gas_per_second: impl Fn() -> f64 + Send + Sync + 'static,
        max_change_per_epoch: f64,
    ) -> Self {
        Self {
            cur_price: initial_price,
            floor_price,
            get_target_gas_per_second: Box::new(target_gas_per_second),
            max_change_per_epoch,
        }
    }

    /// The current price.
    pub fn price(&self) -> f64 {
        self.cur_price
    }

    /// Compute the price for the next epoch without committing it.
    pub fn calc_next_epoch_price(&self, avg_gas_per_second: f64) -> PricerResult<f64> {
        if !avg_gas_per_second.is_finite() || avg_gas_per_second < 0.0 {
            return Err(PricerError::InvalidInput(avg_gas_per_second));
        }

        let target = (self.get_target_gas_per_second)();
        if !target.is_finite() || target <= 0.0 {
            return Err(PricerError::InvalidConfiguration(format!(
                "target gas per second must be positive, got {target}"
            )));
        }

        if !(0.0..=1.0).contains(&self.max_change_per_epoch) {
            return Err(PricerError::InvalidConfiguration(format!(
                "max change per epoch must be within [0, 1], got {}",
                self.max_change_per_epoch
            )));
        }

        let proportion = (avg_gas_per_second / target).clamp(
            1.0 - self.max_change_per_epoch,
            1.0 + self.max_change_per_epoch,
        );
        let updated = (self.cur_price * proportion).max(self.floor_price);

        debug!(
            observed = avg_gas_per_second,
            target,
            proportion,
            current = self.cur_price,
            updated,
            "calculated next epoch gas price"
        );

        Ok(updated)
    }

    /// Complete an epoch: compute the next price and make it current.
    ///
    /// On error the current price is left untouched.
    pub fn complete_epoch(&mut self, avg_gas_per_second: f64) -> PricerResult<f64> {
        let updated = self.calc_next_epoch_price(avg_gas_per_second)?;
        self.cur_price = updated;
        Ok(updated)
    }
}
