//! gpo-core — configuration and shared types for the gas price oracle.
//!
//! The raw [`OracleConfig`] is what operators write (TOML file, CLI flags,
//! environment). [`OracleConfig::validate`] turns it into
//! [`OracleSettings`], the only form the rest of the workspace accepts.

pub mod config;
pub mod target;

pub use config::{
    ConfigError, ConfigResult, OracleConfig, OracleSettings, PricingSettings, RpcSettings,
    DEFAULT_ETHEREUM_HTTP_URL, DEFAULT_GAS_PRICE_ORACLE_ADDRESS,
};
pub use target::TargetRate;
