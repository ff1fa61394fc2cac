//! Coordinator view - read model published after every state change

use crate::models::{
    BalanceSnapshot, ConnectionStatus, LedgerEvent, LoadingFlag, LoadingFlags, Notification,
    Session,
};

/// Complete state a front-end needs to render
#[derive(Debug, Clone)]
pub struct CoordinatorView {
    pub status: ConnectionStatus,
    pub session: Session,
    pub balances: BalanceSnapshot,
    /// Newest first
    pub ledger: Vec<LedgerEvent>,
    /// Newest last
    pub notifications: Vec<Notification>,
    pub loading: LoadingFlags,
}

impl CoordinatorView {
    pub fn is_loading(&self, flag: LoadingFlag) -> bool {
        self.loading.is_loading(flag)
    }
}

impl Default for CoordinatorView {
    fn default() -> Self {
        CoordinatorView {
            status: ConnectionStatus::Disconnected,
            session: Session::default(),
            balances: BalanceSnapshot::default(),
            ledger: Vec::new(),
            notifications: Vec::new(),
            loading: LoadingFlags::default(),
        }
    }
}
