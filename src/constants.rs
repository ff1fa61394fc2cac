//! Application constants
//!
//! Centralized location for default endpoints, contract addresses and limits.

use std::time::Duration;

/// Default JSON-RPC endpoint (HTTP)
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Default JSON-RPC endpoint for log subscriptions (WebSocket)
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8546";

/// Default image/text generation endpoint
pub const DEFAULT_AI_URL: &str = "http://127.0.0.1:7860/api";

pub const DEFAULT_CHAIN_ID: u64 = 31337;

pub const DEFAULT_NFT_CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
pub const DEFAULT_TOKEN_CONTRACT: &str = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512";
pub const DEFAULT_STAKING_CONTRACT: &str = "0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0";

pub const DEFAULT_TOKEN_SYMBOL: &str = "MCB";
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;
pub const NATIVE_DECIMALS: u8 = 18;

/// Notifications dismiss themselves after this long
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(6);

/// Ledger events kept in the recent-activity log
pub const MAX_LEDGER_EVENTS: usize = 50;

/// Generated images kept in the local gallery
pub const MAX_GALLERY_ITEMS: usize = 20;

/// Upper bound on a single chain read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on the wallet handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait for a transaction receipt before giving up
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How often the RPC wallet checks for account or chain changes
pub const WALLET_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Upper bound on a single image or text generation
pub const AI_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Delay before a live preview request is actually sent
pub const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(600);

/// Storage key holding the generated-image gallery
pub const GALLERY_STORAGE_KEY: &str = "meebot.gallery";

/// Application name
pub const APP_NAME: &str = "MeeBot";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
