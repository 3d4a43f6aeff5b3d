//! gpod — the gas price oracle daemon.
//!
//! Watches L2 block production and keeps the on-chain gas price oracle
//! contract tracking congestion, one correction per epoch.
//!
//! # Usage
//!
//! ```text
//! gpod --config /etc/gpod.toml
//! GAS_PRICE_ORACLE_PRIVATE_KEY=... gpod --target-gas-per-second 11000000 \
//!     --max-percent-change-per-epoch 0.1 --average-block-gas-limit-per-epoch 11000000 \
//!     --epoch-length-seconds 10
//! ```
//!
//! Flags and `GAS_PRICE_ORACLE_*` environment variables override the config
//! file. `SIGHUP` reloads `target_gas_per_second` from the file.

mod daemon;

use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use gpo_core::OracleConfig;

#[derive(Parser, Debug)]
#[command(name = "gpod", about = "Gas price oracle daemon", version)]
struct Cli {
    /// TOML config file. Flags and environment override its values.
    #[arg(long, env = "GAS_PRICE_ORACLE_CONFIG")]
    config: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, env = "GAS_PRICE_ORACLE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "GAS_PRICE_ORACLE_LOG_JSON")]
    log_json: bool,

    /// L2 JSON-RPC endpoint.
    #[arg(long, env = "GAS_PRICE_ORACLE_ETHEREUM_HTTP_URL")]
    ethereum_http_url: Option<String>,

    /// Chain id used for signing. Fetched from the node when unset.
    #[arg(long, env = "GAS_PRICE_ORACLE_CHAIN_ID")]
    chain_id: Option<u64>,

    /// Address of the gas price oracle contract.
    #[arg(long, env = "GAS_PRICE_ORACLE_GAS_PRICE_ORACLE_ADDRESS")]
    gas_price_oracle_address: Option<String>,

    /// Hex private key of the contract owner, with or without 0x.
    #[arg(long, env = "GAS_PRICE_ORACLE_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Gas price for update transactions. Left to the node when unset.
    #[arg(long, env = "GAS_PRICE_ORACLE_TRANSACTION_GAS_PRICE")]
    transaction_gas_price: Option<u64>,

    #[arg(long, env = "GAS_PRICE_ORACLE_FLOOR_PRICE")]
    floor_price: Option<f64>,

    #[arg(long, env = "GAS_PRICE_ORACLE_TARGET_GAS_PER_SECOND")]
    target_gas_per_second: Option<f64>,

    #[arg(long, env = "GAS_PRICE_ORACLE_MAX_PERCENT_CHANGE_PER_EPOCH")]
    max_percent_change_per_epoch: Option<f64>,

    #[arg(long, env = "GAS_PRICE_ORACLE_AVERAGE_BLOCK_GAS_LIMIT_PER_EPOCH")]
    average_block_gas_limit_per_epoch: Option<f64>,

    #[arg(long, env = "GAS_PRICE_ORACLE_EPOCH_LENGTH_SECONDS")]
    epoch_length_seconds: Option<u64>,

    /// Minimum relative change before a new price is written.
    #[arg(long, env = "GAS_PRICE_ORACLE_SIGNIFICANT_FACTOR")]
    significant_factor: Option<f64>,

    /// Wait for each update transaction to be mined.
    #[arg(long, env = "GAS_PRICE_ORACLE_WAIT_FOR_RECEIPT")]
    wait_for_receipt: bool,

    #[arg(long, env = "GAS_PRICE_ORACLE_REQUEST_TIMEOUT_SECONDS")]
    request_timeout_seconds: Option<u64>,

    #[arg(long, env = "GAS_PRICE_ORACLE_RECEIPT_TIMEOUT_SECONDS")]
    receipt_timeout_seconds: Option<u64>,
}

impl Cli {
    /// Options given on the command line or in the environment.
    fn overrides(&self) -> OracleConfig {
        OracleConfig {
            ethereum_http_url: self.ethereum_http_url.clone(),
            chain_id: self.chain_id,
            gas_price_oracle_address: self.gas_price_oracle_address.clone(),
            private_key: self.private_key.clone(),
            transaction_gas_price: self.transaction_gas_price,
            floor_price: self.floor_price,
            target_gas_per_second: self.target_gas_per_second,
            max_percent_change_per_epoch: self.max_percent_change_per_epoch,
            average_block_gas_limit_per_epoch: self.average_block_gas_limit_per_epoch,
            epoch_length_seconds: self.epoch_length_seconds,
            significant_factor: self.significant_factor,
            // A bare switch can only turn waiting on.
            wait_for_receipt: self.wait_for_receipt.then_some(true),
            request_timeout_seconds: self.request_timeout_seconds,
            receipt_timeout_seconds: self.receipt_timeout_seconds,
        }
    }

    /// The config file (if any) with command-line overrides applied.
    fn load_config(&self) -> anyhow::Result<OracleConfig> {
        let base = match &self.config {
            Some(path) => OracleConfig::from_file(path)?,
            None => OracleConfig::default(),
        };
        Ok(base.merge(self.overrides()))
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    // Reject bad configuration before touching the chain.
    let settings = match cli.load_config().and_then(|c| Ok(c.validate()?)) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return Err(e);
        }
    };

    let overrides = cli.overrides();
    daemon::run(settings, cli.config, overrides).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["gpod"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = parse(&[
            "--private-key",
            KEY,
            "--target-gas-per-second",
            "11000000",
            "--max-percent-change-per-epoch",
            "0.1",
            "--average-block-gas-limit-per-epoch",
            "11000000",
            "--epoch-length-seconds",
            "10",
            "--wait-for-receipt",
        ]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.target_gas_per_second, Some(11_000_000.0));
        assert_eq!(config.wait_for_receipt, Some(true));
        assert_eq!(config.floor_price, None);

        let settings = config.validate().unwrap();
        assert_eq!(settings.pricing.epoch_length_seconds, 10);
        assert!(settings.rpc.wait_for_receipt);
    }

    #[test]
    fn unset_switch_leaves_file_value() {
        let cli = parse(&[]);
        assert_eq!(cli.overrides().wait_for_receipt, None);
        assert_eq!(cli.log_level, "info");
        assert!(!cli.log_json);
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
private_key = "0x{KEY}"
target_gas_per_second = 100.0
max_percent_change_per_epoch = 0.1
average_block_gas_limit_per_epoch = 1000.0
epoch_length_seconds = 10
floor_price = 5.0
"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = parse(&["--config", &path, "--target-gas-per-second", "250"]);
        let settings = cli.load_config().unwrap().validate().unwrap();

        assert_eq!(settings.pricing.target_gas_per_second, 250.0);
        assert_eq!(settings.pricing.floor_price, 5.0);
        assert_eq!(settings.rpc.private_key, KEY);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = parse(&["--config", "/nonexistent/gpod.toml"]);
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
