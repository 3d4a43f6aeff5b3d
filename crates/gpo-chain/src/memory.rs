//! In-memory chain for tests and local runs.
//!
//! Clones share state, so a test can keep one handle to mine blocks or
//! inject failures while the oracle holds another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ethers::types::Address;
use tracing::debug;

use crate::error::{ChainError, ChainResult};
use crate::{ChainObserver, PriceWriter};

#[derive(Debug)]
struct MemoryState {
    height: u64,
    price: u64,
    owner: Address,
    signer: Address,
    failing_height_reads: u32,
    failing_price_reads: u32,
    failing_submissions: u32,
    submissions: Vec<u64>,
}

/// A single-contract chain held in memory.
#[derive(Debug, Clone)]
pub struct MemoryChain {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryChain {
    /// A chain at height 0 whose oracle contract holds `price` and is owned
    /// by `owner`. The signer defaults to the owner.
    pub fn new(price: u64, owner: Address) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                height: 0,
                price,
                owner,
                signer: owner,
                failing_height_reads: 0,
                failing_price_reads: 0,
                failing_submissions: 0,
                submissions: Vec::new(),
            })),
        }
    }

    /// Sign with `signer` instead of the owner.
    pub fn with_signer(self, signer: Address) -> Self {
        self.state().signer = signer;
        self
    }

    pub fn height(&self) -> u64 {
        self.state().height
    }

    pub fn set_height(&self, height: u64) {
        self.state().height = height;
    }

    /// Append `blocks` empty blocks and return the new height.
    pub fn mine(&self, blocks: u64) -> u64 {
        let mut state = self.state();
        state.height += blocks;
        state.height
    }

    pub fn price(&self) -> u64 {
        self.state().price
    }

    /// Fail the next `count` height reads.
    pub fn fail_height_reads(&self, count: u32) {
        self.state().failing_height_reads = count;
    }

    /// Fail the next `count` price reads.
    pub fn fail_price_reads(&self, count: u32) {
        self.state().failing_price_reads = count;
    }

    /// Fail the next `count` submissions.
    pub fn fail_submissions(&self, count: u32) {
        self.state().failing_submissions = count;
    }

    /// Every price successfully written, oldest first.
    pub fn submissions(&self) -> Vec<u64> {
        self.state().submissions.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn take_failure(counter: &mut u32) -> bool {
    if *counter == 0 {
        return false;
    }
    *counter -= 1;
    true
}

impl ChainObserver for MemoryChain {
    async fn latest_height(&self) -> ChainResult<u64> {
        let mut state = self.state();
        if take_failure(&mut state.failing_height_reads) {
            return Err(ChainError::Rpc("injected height read failure".to_string()));
        }
        Ok(state.height)
    }

    async fn on_chain_price(&self) -> ChainResult<f64> {
        let mut state = self.state();
        if take_failure(&mut state.failing_price_reads) {
            return Err(ChainError::Rpc("injected price read failure".to_string()));
        }
        Ok(state.price as f64)
    }

    async fn verify_authority(&self, signer: Address) -> ChainResult<bool> {
        Ok(self.state().owner == signer)
    }
}

impl PriceWriter for MemoryChain {
    fn signer(&self) -> Address {
        self.state().signer
    }

    async fn submit_price(&self, price: f64) -> ChainResult<()> {
        if !price.is_finite() || price < 0.0 {
            return Err(ChainError::InvalidPrice(price.to_string()));
        }

        let mut state = self.state();
        if take_failure(&mut state.failing_submissions) {
            return Err(ChainError::Rpc("injected submission failure".to_string()));
        }
        if state.signer != state.owner {
            return Err(ChainError::Rpc("caller is not the owner".to_string()));
        }

        let price = price.trunc() as u64;
        state.price = price;
        state.submissions.push(price);
        debug!(price, height = state.height, "memory chain price updated");
        Ok(())
    }
}
