//! Framework configuration
//!
//! Loaded once from YAML and handed to every component through
//! [`crate::scenarios::ScenarioContext`]; nothing reads it from a global.
//!
//! ```yaml
//! network:
//!   chain_id: 2
//!   shard_count: 1
//!   staking_wait_time: 10
//!   map3_active_wait_time: 60
//!   epoch_poll_interval: 5
//!   epoch_wait_timeout: 3600   # null waits forever
//! funding:
//!   address: "0x1f9a...c3"
//!   passphrase: ""
//!   gas_reserve: "1"
//! account:
//!   passphrase: ""
//! ```

use crate::waiters::MIN_EPOCH_POLL_INTERVAL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use staking_common::crypto::Address;
use staking_common::staking::GasParams;
use staking_common::Amount;
use std::path::Path;
use std::time::Duration;

// Seconds between two epoch queries while waiting for an epoch
pub const DEFAULT_EPOCH_POLL_INTERVAL: u64 = 5;
// Upper bound for a single epoch wait
pub const DEFAULT_EPOCH_WAIT_TIMEOUT: u64 = 3600;
// Seconds a funding or teardown transfer may take to be included
pub const DEFAULT_TRANSFER_TIMEOUT: u64 = 60;

fn default_chain_id() -> u64 {
    2
}

fn default_shard_count() -> u32 {
    1
}

fn default_epoch_poll_interval() -> u64 {
    DEFAULT_EPOCH_POLL_INTERVAL
}

fn default_epoch_wait_timeout() -> Option<u64> {
    Some(DEFAULT_EPOCH_WAIT_TIMEOUT)
}

fn default_transfer_timeout() -> u64 {
    DEFAULT_TRANSFER_TIMEOUT
}

fn default_gas_reserve() -> Amount {
    Amount::from_coins(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,
    /// Seconds to let the chain settle after a create transaction
    #[serde(default)]
    pub staking_wait_time: u64,
    /// Seconds a new map3 node needs before it can be restaked
    #[serde(default)]
    pub map3_active_wait_time: u64,
    #[serde(default = "default_epoch_poll_interval")]
    pub epoch_poll_interval: u64,
    #[serde(default = "default_epoch_wait_timeout")]
    pub epoch_wait_timeout: Option<u64>,
}

impl NetworkConfig {
    pub fn staking_wait_time(&self) -> Duration {
        Duration::from_secs(self.staking_wait_time)
    }

    pub fn map3_active_wait_time(&self) -> Duration {
        Duration::from_secs(self.map3_active_wait_time)
    }

    /// Never shorter than [`MIN_EPOCH_POLL_INTERVAL`], even for a config
    /// built in code that skipped [`FrameworkConfig::validate`]
    pub fn epoch_poll_interval(&self) -> Duration {
        Duration::from_secs(self.epoch_poll_interval).max(MIN_EPOCH_POLL_INTERVAL)
    }

    pub fn epoch_wait_timeout(&self) -> Option<Duration> {
        self.epoch_wait_timeout.map(Duration::from_secs)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            shard_count: default_shard_count(),
            staking_wait_time: 0,
            map3_active_wait_time: 0,
            epoch_poll_interval: default_epoch_poll_interval(),
            epoch_wait_timeout: default_epoch_wait_timeout(),
        }
    }
}

/// Shared account every test account is funded from and returns funds to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    pub address: Address,
    #[serde(default)]
    pub passphrase: String,
    #[serde(default)]
    pub gas: GasParams,
    /// Added on top of every computed funding amount to pay for fees
    #[serde(default = "default_gas_reserve")]
    pub gas_reserve: Amount,
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout: u64,
    #[serde(default)]
    pub shard: u32,
}

impl FundingConfig {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            passphrase: String::new(),
            gas: GasParams::default(),
            gas_reserve: default_gas_reserve(),
            transfer_timeout: default_transfer_timeout(),
            shard: 0,
        }
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    // Passphrase protecting every generated test account
    #[serde(default)]
    pub passphrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    pub funding: FundingConfig,
    #[serde(default)]
    pub account: AccountConfig,
}

impl FrameworkConfig {
    pub fn new(funding_address: Address) -> Self {
        Self {
            network: NetworkConfig::default(),
            funding: FundingConfig::new(funding_address),
            account: AccountConfig::default(),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).context("Failed to parse framework config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.shard_count == 0 {
            anyhow::bail!("network.shard_count must be at least 1");
        }
        if self.network.epoch_poll_interval == 0 {
            anyhow::bail!("network.epoch_poll_interval must be at least 1 second");
        }
        if self.funding.gas_reserve.is_negative() {
            anyhow::bail!("funding.gas_reserve can not be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn test_minimal_config_uses_defaults() {
        let yaml = format!("funding:\n  address: \"{}\"\n", ADDRESS);
        let config = FrameworkConfig::from_yaml(&yaml).unwrap();

        assert_eq!(config.network.chain_id, 2);
        assert_eq!(config.network.shard_count, 1);
        assert_eq!(config.network.epoch_poll_interval(), Duration::from_secs(5));
        assert_eq!(
            config.network.epoch_wait_timeout(),
            Some(Duration::from_secs(DEFAULT_EPOCH_WAIT_TIMEOUT))
        );
        assert_eq!(config.funding.gas_reserve, Amount::from_coins(1));
        assert_eq!(config.funding.address.to_string(), ADDRESS);
    }

    #[test]
    fn test_null_epoch_timeout_disables_cap() {
        let yaml = format!(
            "network:\n  epoch_wait_timeout: null\nfunding:\n  address: \"{}\"\n",
            ADDRESS
        );
        let config = FrameworkConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.network.epoch_wait_timeout(), None);
    }

    #[test]
    fn test_zero_shard_count_is_rejected() {
        let yaml = format!(
            "network:\n  shard_count: 0\nfunding:\n  address: \"{}\"\n",
            ADDRESS
        );
        assert!(FrameworkConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_zero_epoch_poll_interval() {
        let yaml = format!(
            "network:\n  epoch_poll_interval: 0\nfunding:\n  address: \"{}\"\n",
            ADDRESS
        );
        let err = FrameworkConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("epoch_poll_interval"));

        let mut config = FrameworkConfig::new(ADDRESS.parse().unwrap());
        config.network.epoch_poll_interval = 0;
        assert_eq!(config.network.epoch_poll_interval(), MIN_EPOCH_POLL_INTERVAL);
    }

    #[test]
    fn test_missing_funding_is_rejected() {
        assert!(FrameworkConfig::from_yaml("network:\n  chain_id: 1\n").is_err());
    }
}
