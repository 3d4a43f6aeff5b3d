//! Oracle configuration: the raw operator-facing shape and its validated form.
//!
//! Every option is optional in [`OracleConfig`] so that a TOML file and the
//! command line can each supply a subset; [`OracleConfig::merge`] layers them
//! and [`OracleConfig::validate`] enforces required options and bounds.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON-RPC endpoint used when none is configured.
pub const DEFAULT_ETHEREUM_HTTP_URL: &str = "http://127.0.0.1:8545";

/// Predeployed gas price oracle contract on the L2.
pub const DEFAULT_GAS_PRICE_ORACLE_ADDRESS: &str = "0x420000000000000000000000000000000000000F";

const DEFAULT_SIGNIFICANT_FACTOR: f64 = 0.05;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 120;

/// Result type alias for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing config option: {0}")]
    Missing(&'static str),

    #[error("invalid config option {option}: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },
}

/// Operator-supplied configuration, as read from a TOML file or flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleConfig {
    pub ethereum_http_url: Option<String>,
    pub chain_id: Option<u64>,
    pub gas_price_oracle_address: Option<String>,
    pub private_key: Option<String>,
    /// Fixed `tx.gasPrice` for price updates. Provider-estimated when unset.
    pub transaction_gas_price: Option<u64>,
    pub floor_price: Option<f64>,
    pub target_gas_per_second: Option<f64>,
    pub max_percent_change_per_epoch: Option<f64>,
    pub average_block_gas_limit_per_epoch: Option<f64>,
    pub epoch_length_seconds: Option<u64>,
    pub significant_factor: Option<f64>,
    pub wait_for_receipt: Option<bool>,
    pub request_timeout_seconds: Option<u64>,
    pub receipt_timeout_seconds: Option<u64>,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleSettings {
    pub rpc: RpcSettings,
    pub pricing: PricingSettings,
}

/// Everything the chain collaborator needs.
#[derive(Clone, PartialEq)]
pub struct RpcSettings {
    pub ethereum_http_url: String,
    pub chain_id: Option<u64>,
    pub gas_price_oracle_address: String,
    /// Hex encoded secp256k1 key, without `0x` prefix.
    pub private_key: String,
    pub transaction_gas_price: Option<u64>,
    pub wait_for_receipt: bool,
    pub request_timeout: Duration,
    pub receipt_timeout: Duration,
}

impl fmt::Debug for RpcSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcSettings")
            .field("ethereum_http_url", &self.ethereum_http_url)
            .field("chain_id", &self.chain_id)
            .field("gas_price_oracle_address", &self.gas_price_oracle_address)
            .field("private_key", &"<redacted>")
            .field("transaction_gas_price", &self.transaction_gas_price)
            .field("wait_for_receipt", &self.wait_for_receipt)
            .field("request_timeout", &self.request_timeout)
            .field("receipt_timeout", &self.receipt_timeout)
            .finish()
    }
}

/// Control-loop parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingSettings {
    pub floor_price: f64,
    pub target_gas_per_second: f64,
    pub max_percent_change_per_epoch: f64,
    pub average_block_gas_limit_per_epoch: f64,
    pub epoch_length_seconds: u64,
    pub significant_factor: f64,
}

impl PricingSettings {
    pub fn epoch_length(&self) -> Duration {
        Duration::from_secs(self.epoch_length_seconds)
    }
}

impl OracleConfig {
    /// Load a config file. Unknown keys are rejected.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer `overrides` on top of `self`. Options set in `overrides` win.
    pub fn merge(self, overrides: OracleConfig) -> OracleConfig {
        OracleConfig {
            ethereum_http_url: overrides.ethereum_http_url.or(self.ethereum_http_url),
            chain_id: overrides.chain_id.or(self.chain_id),
            gas_price_oracle_address: overrides
                .gas_price_oracle_address
                .or(self.gas_price_oracle_address),
            private_key: overrides.private_key.or(self.private_key),
            transaction_gas_price: overrides.transaction_gas_price.or(self.transaction_gas_price),
            floor_price: overrides.floor_price.or(self.floor_price),
            target_gas_per_second: overrides.target_gas_per_second.or(self.target_gas_per_second),
            max_percent_change_per_epoch: overrides
                .max_percent_change_per_epoch
                .or(self.max_percent_change_per_epoch),
            average_block_gas_limit_per_epoch: overrides
                .average_block_gas_limit_per_epoch
                .or(self.average_block_gas_limit_per_epoch),
            epoch_length_seconds: overrides.epoch_length_seconds.or(self.epoch_length_seconds),
            significant_factor: overrides.significant_factor.or(self.significant_factor),
            wait_for_receipt: overrides.wait_for_receipt.or(self.wait_for_receipt),
            request_timeout_seconds: overrides
                .request_timeout_seconds
                .or(self.request_timeout_seconds),
            receipt_timeout_seconds: overrides
                .receipt_timeout_seconds
                .or(self.receipt_timeout_seconds),
        }
    }

    /// Check required options and bounds, filling in defaults.
    pub fn validate(&self) -> ConfigResult<OracleSettings> {
        Ok(OracleSettings {
            rpc: self.validate_rpc()?,
            pricing: self.validate_pricing()?,
        })
    }

    /// Validate only the target rate. Used for live reconfiguration, where
    /// everything else is fixed for the life of the process.
    pub fn validate_target(&self) -> ConfigResult<f64> {
        let target = require(self.target_gas_per_second, "target_gas_per_second")?;
        if !target.is_finite() || target <= 0.0 {
            return Err(invalid("target_gas_per_second", format!("must be positive, got {target}")));
        }
        Ok(target)
    }

    fn validate_rpc(&self) -> ConfigResult<RpcSettings> {
        let ethereum_http_url = self
            .ethereum_http_url
            .clone()
            .unwrap_or_else(|| DEFAULT_ETHEREUM_HTTP_URL.to_string());
        if !(ethereum_http_url.starts_with("http://") || ethereum_http_url.starts_with("https://")) {
            return Err(invalid(
                "ethereum_http_url",
                format!("expected an http(s) URL, got {ethereum_http_url:?}"),
            ));
        }

        let gas_price_oracle_address = self
            .gas_price_oracle_address
            .clone()
            .unwrap_or_else(|| DEFAULT_GAS_PRICE_ORACLE_ADDRESS.to_string());
        if !is_hex_of_len(&gas_price_oracle_address, 40) {
            return Err(invalid(
                "gas_price_oracle_address",
                format!("expected 20 byte hex address, got {gas_price_oracle_address:?}"),
            ));
        }

        let private_key = require(self.private_key.as_deref(), "private_key")?;
        if !is_hex_of_len(private_key, 64) {
            return Err(invalid("private_key", "expected 32 byte hex key".to_string()));
        }
        let private_key = strip_hex_prefix(private_key).to_string();

        if self.chain_id == Some(0) {
            return Err(invalid("chain_id", "must be non-zero".to_string()));
        }

        let request_timeout = self
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout < 1 {
            return Err(invalid("request_timeout_seconds", "must be at least 1".to_string()));
        }
        let receipt_timeout = self
            .receipt_timeout_seconds
            .unwrap_or(DEFAULT_RECEIPT_TIMEOUT_SECS);
        if receipt_timeout < 1 {
            return Err(invalid("receipt_timeout_seconds", "must be at least 1".to_string()));
        }

        Ok(RpcSettings {
            ethereum_http_url,
            chain_id: self.chain_id,
            gas_price_oracle_address,
            private_key,
            transaction_gas_price: self.transaction_gas_price,
            wait_for_receipt: self.wait_for_receipt.unwrap_or(false),
            request_timeout: Duration::from_secs(request_timeout),
            receipt_timeout: Duration::from_secs(receipt_timeout),
        })
    }

    fn validate_pricing(&self) -> ConfigResult<PricingSettings> {
        let target_gas_per_second = self.validate_target()?;

        let max_percent_change_per_epoch =
            require(self.max_percent_change_per_epoch, "max_percent_change_per_epoch")?;
        if !(0.0..=1.0).contains(&max_percent_change_per_epoch) {
            return Err(invalid(
                "max_percent_change_per_epoch",
                format!("must be within [0, 1], got {max_percent_change_per_epoch}"),
            ));
        }

        let average_block_gas_limit_per_epoch = require(
            self.average_block_gas_limit_per_epoch,
            "average_block_gas_limit_per_epoch",
        )?;
        if !average_block_gas_limit_per_epoch.is_finite() || average_block_gas_limit_per_epoch < 1.0
        {
            return Err(invalid(
                "average_block_gas_limit_per_epoch",
                format!("must be at least 1 gas, got {average_block_gas_limit_per_epoch}"),
            ));
        }

        let epoch_length_seconds = require(self.epoch_length_seconds, "epoch_length_seconds")?;
        if epoch_length_seconds < 1 {
            return Err(invalid("epoch_length_seconds", "must be at least 1 second".to_string()));
        }

        let floor_price = self.floor_price.unwrap_or(0.0);
        if !floor_price.is_finite() || floor_price < 0.0 {
            return Err(invalid("floor_price", format!("must be non-negative, got {floor_price}")));
        }

        let significant_factor = self.significant_factor.unwrap_or(DEFAULT_SIGNIFICANT_FACTOR);
        if !significant_factor.is_finite() || significant_factor < 0.0 {
            return Err(invalid(
                "significant_factor",
                format!("must be non-negative, got {significant_factor}"),
            ));
        }

        Ok(PricingSettings {
            floor_price,
            target_gas_per_second,
            max_percent_change_per_epoch,
            average_block_gas_limit_per_epoch,
            epoch_length_seconds,
            significant_factor,
        })
    }
}

fn require<T>(value: Option<T>, option: &'static str) -> ConfigResult<T> {
    value.ok_or(ConfigError::Missing(option))
}

fn invalid(option: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { option, reason }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

fn is_hex_of_len(s: &str, len: usize) -> bool {
    let digits = strip_hex_prefix(s);
    digits.len() == len && digits.chars().all(|c| c.is_ascii_hexdigit())
}
