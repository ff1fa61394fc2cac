//! # MeeBot core
//!
//! Wallet session and telemetry coordinator for the MeeBot dApp.
//!
//! ## Features
//! - Wallet session lifecycle with stale-session cleanup
//! - Balance snapshots with per-field fallback
//! - Live ledger of contract events (newest 50)
//! - Self-expiring notifications
//! - Staking, claiming, minting and AI rituals with loading flags
//! - Local gallery of generated images
//!
//! ## Architecture
//! Actor-based with channels:
//! - Front end - sends [`Action`]s, watches [`CoordinatorView`]
//! - App layer - the [`Coordinator`] and its actor
//! - Network layer - JSON-RPC, WebSocket log subscriptions, AI service

pub mod abi;
pub mod app;
pub mod balances;
pub mod config;
pub mod constants;
pub mod errors;
pub mod messages;
pub mod models;
pub mod network;
pub mod ports;
pub mod sanitize;
pub mod storage;
pub mod timeout;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use models::{Address, BalanceSnapshot, ConnectorId, LedgerEvent, LoadingFlag, Notification};
pub use errors::{classify, classify_error, ErrorKind};
pub use messages::{Action, CoordinatorView};
pub use app::{Collaborators, Coordinator, CoordinatorActor, PreviewChannel};
pub use config::Settings;
