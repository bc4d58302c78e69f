//! Engine configuration

use flashpool_bus::DeliveryPolicy;
use flashpool_pool::PoolSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// What to do with a repayment larger than `principal + fee`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// Only the exact amount settles a loan
    #[default]
    Reject,
    /// Accept and report the excess as a refund
    Refund,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Longest loan duration admission accepts
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,

    #[serde(default)]
    pub overpayment: OverpaymentPolicy,

    /// Attempts per collaborator call, including the first
    #[serde(default = "default_delivery_max_attempts")]
    pub delivery_max_attempts: u32,

    #[serde(default = "default_delivery_backoff_ms")]
    pub delivery_backoff_ms: u64,

    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory of the JSONL journal; no journal when unset
    #[serde(default)]
    pub journal_dir: Option<PathBuf>,

    /// Pools created at startup
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

fn default_max_duration_secs() -> u64 {
    3600
}

fn default_delivery_max_attempts() -> u32 {
    3
}

fn default_delivery_backoff_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration_secs(),
            overpayment: OverpaymentPolicy::default(),
            delivery_max_attempts: default_delivery_max_attempts(),
            delivery_backoff_ms: default_delivery_backoff_ms(),
            log_level: default_log_level(),
            journal_dir: None,
            pools: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            max_attempts: self.delivery_max_attempts,
            backoff: Duration::from_millis(self.delivery_backoff_ms),
        }
    }
}

/// Reads and validates [`EngineConfig`] from TOML
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    pub fn load_str(content: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        if config.max_duration_secs == 0 {
            return Err(ConfigError::Validation(
                "max_duration_secs must be positive".to_string(),
            ));
        }

        if config.delivery_max_attempts == 0 {
            return Err(ConfigError::Validation(
                "delivery_max_attempts must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for pool in &config.pools {
            if !seen.insert((pool.chain.clone(), pool.token.clone())) {
                return Err(ConfigError::Validation(format!(
                    "duplicate pool {}/{}",
                    pool.chain, pool.token
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flashpool_core::Amount;

    #[test]
    fn test_defaults_from_empty_string() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_duration_secs, 3600);
        assert_eq!(config.overpayment, OverpaymentPolicy::Reject);
        assert_eq!(config.delivery_policy(), DeliveryPolicy::default());
    }

    #[test]
    fn test_load_pools() {
        let config_str = r#"
max_duration_secs = 600
overpayment = "refund"
journal_dir = "/tmp/flashpool"

[[pools]]
chain = "eos"
token = "eos"
address = "flashpool.eos"
total_liquidity = 1000
fee_rate_bps = 10
max_loan_ratio_bps = 8000

[[pools]]
chain = "ton"
token = "TON"
total_liquidity = 50000
fee_rate_bps = 9
max_loan_ratio_bps = 5000
"#;

        let config = ConfigLoader::load_str(config_str).unwrap();
        assert_eq!(config.max_duration_secs, 600);
        assert_eq!(config.overpayment, OverpaymentPolicy::Refund);
        assert_eq!(config.pools.len(), 2);
        assert_eq!(config.pools[0].token.symbol(), "EOS");
        assert_eq!(config.pools[0].address.as_deref(), Some("flashpool.eos"));
        assert_eq!(config.pools[1].total_liquidity, Amount::new(50_000));
        assert!(config.pools[1].address.is_none());
    }

    #[test]
    fn test_invalid_bps_is_parse_error() {
        let config_str = r#"
[[pools]]
chain = "eos"
token = "EOS"
total_liquidity = 1000
fee_rate_bps = 0
max_loan_ratio_bps = 8000
"#;
        assert!(matches!(
            ConfigLoader::load_str(config_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_duplicate_pool_rejected() {
        let config_str = r#"
[[pools]]
chain = "eos"
token = "EOS"
total_liquidity = 1000
fee_rate_bps = 10
max_loan_ratio_bps = 8000

[[pools]]
chain = "EOS"
token = "eos"
total_liquidity = 2000
fee_rate_bps = 10
max_loan_ratio_bps = 8000
"#;
        assert!(matches!(
            ConfigLoader::load_str(config_str),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = ConfigLoader::load_str("delivery_max_attempts = 0");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::load_file("/nonexistent/flashpool.toml");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
