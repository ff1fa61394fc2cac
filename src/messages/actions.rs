//! Actions - imperative requests from a front-end to the coordinator

use alloy_primitives::U256;

use crate::models::ConnectorId;

/// Requests handled by the coordinator actor
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Connect(ConnectorId),
    Disconnect,
    RefreshBalances,
    /// Stake an amount of tokens, in base units
    Stake(U256),
    Claim,
    Mint,
    GenerateImage(String),
    ConsultOracle(String),
    ScanGallery,
    DismissNotification(String),
    /// Stop the actor
    Shutdown,
}

impl Action {
    /// Short label for logs
    pub fn name(&self) -> &'static str {
        match self {
            Action::Connect(_) => "connect",
            Action::Disconnect => "disconnect",
            Action::RefreshBalances => "refresh_balances",
            Action::Stake(_) => "stake",
            Action::Claim => "claim",
            Action::Mint => "mint",
            Action::GenerateImage(_) => "generate_image",
            Action::ConsultOracle(_) => "consult_oracle",
            Action::ScanGallery => "scan_gallery",
            Action::DismissNotification(_) => "dismiss_notification",
            Action::Shutdown => "shutdown",
        }
    }
}
