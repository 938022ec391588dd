use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rusty_met_forms_core::units::{ten_pow, to_base, ETHER_DECIMALS, GWEI_DECIMALS};
use rusty_met_forms_core::{
    ConvertConstraints, GasDefaults, GasLimitBounds, SendConstraints, DEFAULT_DEBOUNCE_MS,
};

const ENV_PREFIX: &str = "RUSTY_MET_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidVar { key: String, value: String },
    #[error("invalid amount for {field}: {reason}")]
    InvalidAmount { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormsAdapterConfig {
    pub ledger_base_url: String,
    pub ledger_timeout_ms: u64,
    pub debounce_window_ms: u64,
    pub default_gas_price_gwei: String,
    pub default_gas_limit: u64,
    pub max_gas_price_gwei: u64,
    pub min_gas_limit: u64,
    pub max_gas_limit: u64,
    /// ETH held back from the balance when converting.
    pub convert_fee_reserve_eth: String,
    pub met_token_address: Address,
    pub eth_usd_rate: f64,
}

impl Default for FormsAdapterConfig {
    fn default() -> Self {
        Self {
            ledger_base_url: "http://127.0.0.1:8545".to_owned(),
            ledger_timeout_ms: 15_000,
            debounce_window_ms: DEFAULT_DEBOUNCE_MS,
            default_gas_price_gwei: "10".to_owned(),
            default_gas_limit: 200_000,
            max_gas_price_gwei: 200,
            min_gas_limit: 21_000,
            max_gas_limit: 8_000_000,
            convert_fee_reserve_eth: "0".to_owned(),
            met_token_address: address!("a3d58c4e56fedcae3a7c43a725aee9a71f0ece4e"),
            eth_usd_rate: 0.0,
        }
    }
}

impl FormsAdapterConfig {
    /// Defaults overridden by any `RUSTY_MET_*` variable that is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Applies `RUSTY_MET_*` overrides read through `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };
        if let Some((_, v)) = get("LEDGER_URL") {
            self.ledger_base_url = v.trim_end_matches('/').to_owned();
        }
        if let Some(kv) = get("LEDGER_TIMEOUT_MS") {
            self.ledger_timeout_ms = parse_var(kv)?;
        }
        if let Some(kv) = get("DEBOUNCE_MS") {
            self.debounce_window_ms = parse_var(kv)?;
        }
        if let Some((_, v)) = get("GAS_PRICE_GWEI") {
            self.default_gas_price_gwei = v;
        }
        if let Some(kv) = get("GAS_LIMIT") {
            self.default_gas_limit = parse_var(kv)?;
        }
        if let Some(kv) = get("MAX_GAS_PRICE_GWEI") {
            self.max_gas_price_gwei = parse_var(kv)?;
        }
        if let Some(kv) = get("MIN_GAS_LIMIT") {
            self.min_gas_limit = parse_var(kv)?;
        }
        if let Some(kv) = get("MAX_GAS_LIMIT") {
            self.max_gas_limit = parse_var(kv)?;
        }
        if let Some((_, v)) = get("FEE_RESERVE_ETH") {
            self.convert_fee_reserve_eth = v;
        }
        if let Some(kv) = get("TOKEN_ADDRESS") {
            self.met_token_address = parse_var(kv)?;
        }
        if let Some(kv) = get("ETH_USD_RATE") {
            self.eth_usd_rate = parse_var(kv)?;
        }
        Ok(self)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }

    pub fn gas_limit_bounds(&self) -> GasLimitBounds {
        GasLimitBounds {
            min: self.min_gas_limit,
            max: self.max_gas_limit,
        }
    }

    pub fn max_gas_price_wei(&self) -> U256 {
        U256::from(self.max_gas_price_gwei) * ten_pow(GWEI_DECIMALS)
    }

    pub fn gas_defaults(&self) -> GasDefaults {
        GasDefaults {
            gas_price_gwei: self.default_gas_price_gwei.clone(),
            gas_limit: self.default_gas_limit,
        }
    }

    pub fn fee_reserve_wei(&self) -> Result<U256, ConfigError> {
        to_base(&self.convert_fee_reserve_eth, ETHER_DECIMALS).map_err(|e| {
            ConfigError::InvalidAmount {
                field: "convert_fee_reserve_eth",
                reason: e.to_string(),
            }
        })
    }

    pub fn convert_constraints(&self, available_eth: U256) -> Result<ConvertConstraints, ConfigError> {
        Ok(ConvertConstraints {
            available_eth,
            fee_reserve: self.fee_reserve_wei()?,
            eth_rate: self.eth_usd_rate,
            max_gas_price: self.max_gas_price_wei(),
            gas_limit: self.gas_limit_bounds(),
        })
    }

    pub fn send_constraints(&self, available_mtn: U256) -> SendConstraints {
        SendConstraints {
            available_mtn,
            max_gas_price: self.max_gas_price_wei(),
            gas_limit: self.gas_limit_bounds(),
        }
    }
}

fn parse_var<T: FromStr>((key, value): (String, String)) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidVar { key, value })
}
