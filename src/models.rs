use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 20-byte account or contract address, shown lower-cased with `0x` prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(alloy_primitives::Address);

impl Address {
    pub fn zero() -> Self {
        Address(alloy_primitives::Address::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == alloy_primitives::Address::ZERO
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Shortened form for user-facing messages, e.g. `0x1234…abcd`
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl From<alloy_primitives::Address> for Address {
    fn from(value: alloy_primitives::Address) -> Self {
        Address(value)
    }
}

impl From<Address> for alloy_primitives::Address {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| anyhow::anyhow!("address must start with 0x: {}", s))?;
        let inner = alloy_primitives::Address::from_str(digits)
            .map_err(|e| anyhow::anyhow!("invalid address {}: {}", s, e))?;
        Ok(Address(inner))
    }
}

impl TryFrom<String> for Address {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

/// Which wallet integration to connect through
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorId {
    Injected,
    WalletConnect,
    CoinbaseWallet,
    Other(String),
}

impl ConnectorId {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectorId::Injected => "injected",
            ConnectorId::WalletConnect => "walletConnect",
            ConnectorId::CoinbaseWallet => "coinbaseWallet",
            ConnectorId::Other(name) => name,
        }
    }
}

impl FromStr for ConnectorId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "injected" | "metamask" => ConnectorId::Injected,
            "walletconnect" | "wc" => ConnectorId::WalletConnect,
            "coinbase" | "coinbasewallet" => ConnectorId::CoinbaseWallet,
            _ => ConnectorId::Other(s.to_string()),
        })
    }
}

/// Wallet session as last reported by the connector
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub connected_address: Option<Address>,
    pub chain_id: Option<u64>,
    pub is_connecting: bool,
}

/// Derived connection state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl Session {
    pub fn status(&self) -> ConnectionStatus {
        if self.is_connecting {
            ConnectionStatus::Connecting
        } else if self.connected_address.is_some() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

/// Balances read for the connected address. Always replaced as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub native_balance: String,
    pub fungible_token_balance: String,
    pub nft_count: u64,
    pub staking_reward_rate: String,
}

impl Default for BalanceSnapshot {
    fn default() -> Self {
        BalanceSnapshot {
            native_balance: String::from("0"),
            fungible_token_balance: String::from("0"),
            nft_count: 0,
            staking_reward_rate: String::from("0"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Prophecy,
}

/// Ephemeral user-facing message
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventKind {
    Transfer,
    Approval,
    Staked,
    Claimed,
    Minted,
}

impl LedgerEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            LedgerEventKind::Transfer => "Transfer",
            LedgerEventKind::Approval => "Approval",
            LedgerEventKind::Staked => "Staked",
            LedgerEventKind::Claimed => "Claimed",
            LedgerEventKind::Minted => "Minted",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceContract {
    Nft,
    Token,
    Staking,
}

/// Event fields as produced by a subscription callback, before stamping
#[derive(Clone, Debug, PartialEq)]
pub struct NewLedgerEvent {
    pub kind: LedgerEventKind,
    pub source_contract: SourceContract,
    pub from: Address,
    pub to: Option<Address>,
    pub amount: Option<String>,
    pub token_id: Option<String>,
    pub tx_hash: String,
}

/// Observed on-chain occurrence, immutable once stamped
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LedgerEvent {
    pub id: String,
    pub kind: LedgerEventKind,
    pub source_contract: SourceContract,
    pub from: Address,
    pub to: Option<Address>,
    pub amount: Option<String>,
    pub token_id: Option<String>,
    pub tx_hash: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl LedgerEvent {
    pub fn stamp(id: String, event: NewLedgerEvent) -> Self {
        LedgerEvent {
            id,
            kind: event.kind,
            source_contract: event.source_contract,
            from: event.from,
            to: event.to,
            amount: event.amount,
            token_id: event.token_id,
            tx_hash: event.tx_hash,
            timestamp: chrono::Utc::now(),
        }
    }

    /// One-line description used for the informational notification
    pub fn describe(&self) -> String {
        let mut text = String::from(self.kind.as_str());
        if let Some(amount) = &self.amount {
            text.push_str(&format!(" {}", amount));
        }
        if let Some(token_id) = &self.token_id {
            text.push_str(&format!(" #{}", token_id));
        }
        if !self.from.is_zero() {
            text.push_str(&format!(" from {}", self.from.short()));
        }
        if let Some(to) = &self.to {
            text.push_str(&format!(" to {}", to.short()));
        }
        text
    }
}

/// Operation categories that carry a loading indicator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadingFlag {
    Balances,
    Staking,
    Claiming,
    General,
    GalleryScan,
    OracleConsult,
}

impl LoadingFlag {
    pub const ALL: [LoadingFlag; 6] = [
        LoadingFlag::Balances,
        LoadingFlag::Staking,
        LoadingFlag::Claiming,
        LoadingFlag::General,
        LoadingFlag::GalleryScan,
        LoadingFlag::OracleConsult,
    ];

    fn index(self) -> usize {
        match self {
            LoadingFlag::Balances => 0,
            LoadingFlag::Staking => 1,
            LoadingFlag::Claiming => 2,
            LoadingFlag::General => 3,
            LoadingFlag::GalleryScan => 4,
            LoadingFlag::OracleConsult => 5,
        }
    }
}

/// Loading indicators. Each flag counts overlapping holders so it stays
/// raised until the last operation in its category ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    holders: [u32; 6],
}

impl LoadingFlags {
    pub fn set(&mut self, flag: LoadingFlag, value: bool) {
        let slot = &mut self.holders[flag.index()];
        if value {
            *slot += 1;
        } else {
            *slot = slot.saturating_sub(1);
        }
    }

    pub fn is_loading(&self, flag: LoadingFlag) -> bool {
        self.holders[flag.index()] > 0
    }

    pub fn any(&self) -> bool {
        self.holders.iter().any(|h| *h > 0)
    }
}

/// A generated image kept in the local gallery
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: String,
    pub prompt: String,
    pub mime_type: String,
    /// Base64 image payload
    pub image: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
