//! Interfaces of the external collaborators the coordinator drives
//!
//! Each trait is an async request/response boundary. Implementations live in
//! [`crate::network`]; tests use the scripted doubles in `test_support`.

use alloy_primitives::U256;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::abi::ContractCall;
use crate::models::{Address, ConnectorId};

/// Account reported by a successful wallet handshake
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectedAccount {
    pub address: Address,
    pub chain_id: u64,
}

/// Changes pushed by the wallet outside of any request
#[derive(Clone, Debug, PartialEq)]
pub enum WalletEvent {
    AccountChanged(Address),
    ChainChanged(u64),
    Disconnected,
}

#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(&self, connector: &ConnectorId) -> Result<ConnectedAccount>;
    async fn disconnect(&self) -> Result<()>;
    /// Stream of wallet-side changes
    fn events(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Log filter for one contract event
#[derive(Clone, Debug, PartialEq)]
pub struct LogFilter {
    pub contract: Address,
    /// Topic positions; `None` matches anything
    pub topics: Vec<Option<String>>,
}

/// A raw log delivered by a subscription
#[derive(Clone, Debug, PartialEq)]
pub struct ContractLog {
    pub address: Address,
    pub topics: Vec<String>,
    pub data: Vec<u8>,
    pub tx_hash: String,
}

/// Live log stream. Dropping it releases the underlying subscription.
pub struct LogSubscription {
    pub logs: mpsc::UnboundedReceiver<ContractLog>,
    _release: oneshot::Sender<()>,
}

impl LogSubscription {
    /// `release` fires (by being dropped) when the subscriber goes away
    pub fn new(logs: mpsc::UnboundedReceiver<ContractLog>, release: oneshot::Sender<()>) -> Self {
        LogSubscription {
            logs,
            _release: release,
        }
    }
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Native balance in base units
    async fn native_balance(&self, address: &Address) -> Result<U256>;
    /// Raw return data of an `eth_call`
    async fn read_contract(&self, call: &ContractCall) -> Result<Vec<u8>>;
    async fn subscribe_logs(&self, filter: LogFilter) -> Result<LogSubscription>;
}

/// Transaction to be signed and sent by the wallet
#[derive(Clone, Debug, PartialEq)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: U256,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

#[async_trait]
pub trait TransactionClient: Send + Sync {
    /// Returns the transaction hash
    async fn send_transaction(&self, tx: TxRequest) -> Result<String>;
    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus>;
}

/// Image returned by the generation service
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait AiService: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage>;
    async fn complete(&self, prompt: &str) -> Result<String>;
}
