//! Network layer - JSON-RPC, log subscriptions and the AI service
//!
//! Concrete adapters for the collaborator traits in [`crate::ports`].

pub mod rpc;
pub mod logs;
pub mod wallet;
pub mod ai;

pub use rpc::JsonRpcClient;
pub use wallet::RpcWallet;
pub use ai::HttpAiService;

use std::time::Duration;

/// Create an HTTP client with default configuration
pub fn create_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
