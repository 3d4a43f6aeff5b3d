//! Daemon wiring: connect, run the oracle, handle signals.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use gpo_chain::EthClient;
use gpo_core::{OracleConfig, OracleSettings, TargetRate};
use gpo_updater::GasPriceOracle;

use signals::Listener;

/// Run until interrupted or until the update loop fails.
///
/// `overrides` are re-applied on every config reload so command-line values
/// keep precedence over the file.
pub async fn run(
    settings: OracleSettings,
    config_path: Option<PathBuf>,
    overrides: OracleConfig,
) -> anyhow::Result<()> {
    info!(
        url = %settings.rpc.ethereum_http_url,
        contract = %settings.rpc.gas_price_oracle_address,
        pricing = ?settings.pricing,
        "gas price oracle daemon starting"
    );

    // ── Chain connection ──────────────────────────────────────────
    let client = tokio::select! {
        client = EthClient::connect(&settings.rpc) => {
            Arc::new(client.context("failed to connect to chain")?)
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received before connecting");
            return Ok(());
        }
    };

    // ── Oracle ────────────────────────────────────────────────────
    let target = TargetRate::new(settings.pricing.target_gas_per_second);
    let mut oracle =
        GasPriceOracle::new(client.clone(), client, settings.pricing, target.clone());
    oracle.start().await.context("failed to start gas price oracle")?;

    // ── Signals ───────────────────────────────────────────────────
    let mut terminate = Listener::terminate()?;
    let mut hangup = Listener::hangup()?;

    loop {
        tokio::select! {
            result = oracle.wait() => {
                if let Err(e) = &result {
                    error!(error = %e, "gas price oracle stopped");
                }
                return result.context("gas price oracle stopped");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            _ = terminate.recv() => {
                info!("SIGTERM received");
                break;
            }
            _ = hangup.recv() => {
                reload_target(config_path.as_deref(), &overrides, &target);
            }
        }
    }

    oracle.stop();
    oracle.wait().await?;
    info!("gas price oracle daemon stopped");
    Ok(())
}

/// Re-read the target gas rate. Other options need a restart.
fn reload_target(path: Option<&Path>, overrides: &OracleConfig, target: &TargetRate) {
    let Some(path) = path else {
        warn!("reload requested but no config file was given");
        return;
    };

    let reloaded = OracleConfig::from_file(path)
        .map(|file| file.merge(overrides.clone()))
        .and_then(|config| config.validate_target());
    match reloaded {
        Ok(new) => {
            let old = target.set(new);
            info!(old, new, "target gas per second reloaded");
        }
        Err(e) => warn!(error = %e, path = ?path, "config reload failed, keeping current target"),
    }
}

#[cfg(unix)]
mod signals {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    pub struct Listener(Signal);

    impl Listener {
        pub fn terminate() -> std::io::Result<Self> {
            signal(SignalKind::terminate()).map(Self)
        }

        pub fn hangup() -> std::io::Result<Self> {
            signal(SignalKind::hangup()).map(Self)
        }

        pub async fn recv(&mut self) {
            self.0.recv().await;
        }
    }
}

#[cfg(not(unix))]
mod signals {
    /// No SIGTERM or SIGHUP here; ctrl-c still works.
    pub struct Listener;

    impl Listener {
        pub fn terminate() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub fn hangup() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub async fn recv(&mut self) {
            std::future::pending::<()>().await
        }
    }
}
