//! Settings loaded from `~/.meebot/config.yaml` with environment overrides

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::abi::MAX_DECIMALS;
use crate::constants::*;
use crate::models::Address;

/// Addresses of the three MeeBot contracts
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contracts {
    pub nft: Address,
    pub token: Address,
    pub staking: Address,
}

impl Default for Contracts {
    fn default() -> Self {
        // constants are valid addresses
        Contracts {
            nft: parse_default(DEFAULT_NFT_CONTRACT),
            token: parse_default(DEFAULT_TOKEN_CONTRACT),
            staking: parse_default(DEFAULT_STAKING_CONTRACT),
        }
    }
}

fn parse_default(s: &str) -> Address {
    s.parse().unwrap_or_else(|_| Address::zero())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rpc_url: String,
    pub ws_url: String,
    pub chain_id: u64,
    pub contracts: Contracts,
    pub token_symbol: String,
    pub token_decimals: u8,
    pub ai_url: String,
    pub ai_api_key: Option<String>,
    pub read_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub confirmation_timeout_secs: u64,
    pub notification_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            rpc_url: String::from(DEFAULT_RPC_URL),
            ws_url: String::from(DEFAULT_WS_URL),
            chain_id: DEFAULT_CHAIN_ID,
            contracts: Contracts::default(),
            token_symbol: String::from(DEFAULT_TOKEN_SYMBOL),
            token_decimals: DEFAULT_TOKEN_DECIMALS,
            ai_url: String::from(DEFAULT_AI_URL),
            ai_api_key: None,
            read_timeout_secs: DEFAULT_READ_TIMEOUT.as_secs(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT.as_secs(),
            notification_ttl_secs: NOTIFICATION_TTL.as_secs(),
        }
    }
}

impl Settings {
    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".meebot")
            .join("config.yaml")
    }

    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = Self::from_file(&Self::default_path())?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Read a YAML settings file; a missing file yields defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        if settings.token_decimals > MAX_DECIMALS {
            bail!(
                "{}: token_decimals must be at most {}, got {}",
                path.display(),
                MAX_DECIMALS,
                settings.token_decimals
            );
        }
        Ok(settings)
    }

    /// Apply `MEEBOT_*` overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MEEBOT_RPC_URL") {
            self.rpc_url = v;
        }
        if let Some(v) = lookup("MEEBOT_WS_URL") {
            self.ws_url = v;
        }
        if let Some(v) = lookup("MEEBOT_AI_URL") {
            self.ai_url = v;
        }
        if let Some(v) = lookup("MEEBOT_AI_KEY") {
            self.ai_api_key = Some(v);
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }
}
