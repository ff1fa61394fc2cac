//! Coordinator state - pure data structure with no I/O logic

use std::collections::VecDeque;

use crate::constants::MAX_LEDGER_EVENTS;
use crate::messages::CoordinatorView;
use crate::models::{BalanceSnapshot, LedgerEvent, LoadingFlags, Notification, Session};

/// Everything the coordinator owns
#[derive(Debug)]
pub struct CoordinatorState {
    pub session: Session,
    pub balances: BalanceSnapshot,
    /// Newest first, capped at [`MAX_LEDGER_EVENTS`]
    pub ledger: VecDeque<LedgerEvent>,
    /// Insertion order, newest last
    pub notifications: Vec<Notification>,
    pub loading: LoadingFlags,
    /// Bumped whenever the connected address or chain changes. Async work
    /// captures it at start and drops its result if it moved.
    pub session_epoch: u64,
    pub(crate) next_id: u64,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorState {
    pub fn new() -> Self {
        CoordinatorState {
            session: Session::default(),
            balances: BalanceSnapshot::default(),
            ledger: VecDeque::with_capacity(MAX_LEDGER_EVENTS),
            notifications: Vec::new(),
            loading: LoadingFlags::default(),
            session_epoch: 0,
            next_id: 1,
        }
    }

    /// Generate a unique id with the given prefix
    pub fn next_id(&mut self, prefix: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("{}-{}-{}", prefix, chrono::Utc::now().timestamp_millis(), id)
    }

    /// Convert state to the read model published to consumers
    pub fn to_view(&self) -> CoordinatorView {
        CoordinatorView {
            status: self.session.status(),
            session: self.session.clone(),
            balances: self.balances.clone(),
            ledger: self.ledger.iter().cloned().collect(),
            notifications: self.notifications.clone(),
            loading: self.loading.clone(),
        }
    }
}
