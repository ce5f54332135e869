//! Reconciler configuration from environment variables
//!
//! Environment variables:
//! - `CONTRACT_ADDRESS` (required, 0x-prefixed 20-byte address)
//! - `RPC_URL` (required, http:// or https://)
//! - `START_BLOCK` (default: 0)
//! - `STABLECOIN_DECIMALS` (optional, 0..=36, used when the token does not report decimals)
//! - `POLL_INTERVAL_MS` (default: 4000)
//! - `SNAPSHOT_PATH` (default: dashboard.json)
//! - `AUTOSAVE_INTERVAL_SECS` (default: 60)
//! - `RUST_LOG` (default: info)

use crate::source::abi;
use std::env;

const DEFAULT_POLL_INTERVAL_MS: u64 = 4_000;
const DEFAULT_SNAPSHOT_PATH: &str = "dashboard.json";
const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 60;
const MAX_DECIMALS: u8 = 36;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// EIP-55 checksummed
    pub contract_address: String,
    pub rpc_url: String,
    pub start_block: Option<u64>,
    pub decimals_override: Option<u8>,
    pub poll_interval_ms: u64,
    pub snapshot_path: String,
    pub autosave_interval_secs: u64,
    pub rust_log: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let contract_raw = get("CONTRACT_ADDRESS")
            .ok_or_else(|| ConfigError::MissingVariable("CONTRACT_ADDRESS".to_string()))?;
        let contract_address = abi::checksum_address(&contract_raw).ok_or_else(|| {
            ConfigError::InvalidValue("Enter a valid Lettuce X Trees contract address.".to_string())
        })?;

        let rpc_url = get("RPC_URL")
            .ok_or_else(|| ConfigError::MissingVariable("RPC_URL".to_string()))?;
        if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "RPC_URL must start with http:// or https://".to_string(),
            ));
        }

        let start_block = get("START_BLOCK")
            .map(|value| {
                value.parse::<u64>().map_err(|_| {
                    ConfigError::InvalidValue("Start block must be a positive number.".to_string())
                })
            })
            .transpose()?;

        let decimals_override = get("STABLECOIN_DECIMALS")
            .map(|value| match value.parse::<u8>() {
                Ok(decimals) if decimals <= MAX_DECIMALS => Ok(decimals),
                _ => Err(ConfigError::InvalidValue(
                    "Stablecoin decimals override must be between 0 and 36.".to_string(),
                )),
            })
            .transpose()?;

        let poll_interval_ms = positive(get("POLL_INTERVAL_MS"), "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let autosave_interval_secs = positive(
            get("AUTOSAVE_INTERVAL_SECS"),
            "AUTOSAVE_INTERVAL_SECS",
            DEFAULT_AUTOSAVE_INTERVAL_SECS,
        )?;

        Ok(Self {
            contract_address,
            rpc_url,
            start_block,
            decimals_override,
            poll_interval_ms,
            snapshot_path: get("SNAPSHOT_PATH").unwrap_or_else(|| DEFAULT_SNAPSHOT_PATH.to_string()),
            autosave_interval_secs,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// First block of every historical query
    pub fn from_block(&self) -> u64 {
        self.start_block.unwrap_or(0)
    }
}

fn positive(value: Option<String>, name: &str, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(ConfigError::InvalidValue(format!(
                "{} must be a positive integer, got '{}'",
                name, raw
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const CONTRACT: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("CONTRACT_ADDRESS", CONTRACT), ("RPC_URL", "http://127.0.0.1:8545")]).unwrap();

        assert_eq!(config.contract_address, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert_eq!(config.start_block, None);
        assert_eq!(config.from_block(), 0);
        assert_eq!(config.decimals_override, None);
        assert_eq!(config.poll_interval_ms, 4_000);
        assert_eq!(config.snapshot_path, "dashboard.json");
        assert_eq!(config.autosave_interval_secs, 60);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_custom_values() {
        let config = load(&[
            ("CONTRACT_ADDRESS", CONTRACT),
            ("RPC_URL", "https://rpc.example.org"),
            ("START_BLOCK", "1200"),
            ("STABLECOIN_DECIMALS", "18"),
            ("POLL_INTERVAL_MS", "1000"),
            ("SNAPSHOT_PATH", "/tmp/view.json"),
            ("AUTOSAVE_INTERVAL_SECS", "5"),
        ])
        .unwrap();

        assert_eq!(config.from_block(), 1200);
        assert_eq!(config.decimals_override, Some(18));
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.snapshot_path, "/tmp/view.json");
        assert_eq!(config.autosave_interval_secs, 5);
    }

    #[test]
    fn test_missing_required() {
        assert_eq!(
            load(&[("RPC_URL", "http://localhost:8545")]),
            Err(ConfigError::MissingVariable("CONTRACT_ADDRESS".to_string()))
        );
        assert_eq!(
            load(&[("CONTRACT_ADDRESS", CONTRACT), ("RPC_URL", "  ")]),
            Err(ConfigError::MissingVariable("RPC_URL".to_string()))
        );
    }

    #[test]
    fn test_invalid_values() {
        let base = [("CONTRACT_ADDRESS", CONTRACT), ("RPC_URL", "http://localhost:8545")];

        let bad_address = load(&[("CONTRACT_ADDRESS", "0x1234"), ("RPC_URL", "http://localhost:8545")]);
        assert!(matches!(bad_address, Err(ConfigError::InvalidValue(_))));

        let bad_url = load(&[("CONTRACT_ADDRESS", CONTRACT), ("RPC_URL", "ws://localhost:8546")]);
        assert!(matches!(bad_url, Err(ConfigError::InvalidValue(_))));

        let mut vars = base.to_vec();
        vars.push(("START_BLOCK", "-5"));
        assert_eq!(
            load(&vars),
            Err(ConfigError::InvalidValue("Start block must be a positive number.".to_string()))
        );

        let mut vars = base.to_vec();
        vars.push(("STABLECOIN_DECIMALS", "37"));
        assert_eq!(
            load(&vars),
            Err(ConfigError::InvalidValue(
                "Stablecoin decimals override must be between 0 and 36.".to_string()
            ))
        );

        let mut vars = base.to_vec();
        vars.push(("POLL_INTERVAL_MS", "0"));
        assert!(matches!(load(&vars), Err(ConfigError::InvalidValue(_))));
    }
}
