//! Live target gas rate shared between the daemon and the pricer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A cheaply cloneable handle to the current target gas-per-second.
///
/// The pricer polls it once per epoch, so a [`TargetRate::set`] takes effect
/// at the next epoch boundary.
#[derive(Debug, Clone)]
pub struct TargetRate {
    bits: Arc<AtomicU64>,
}

impl TargetRate {
    pub fn new(target_gas_per_second: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(target_gas_per_second.to_bits())),
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Replace the target, returning the previous value.
    pub fn set(&self, target_gas_per_second: f64) -> f64 {
        f64::from_bits(self.bits.swap(target_gas_per_second.to_bits(), Ordering::Relaxed))
    }
}
