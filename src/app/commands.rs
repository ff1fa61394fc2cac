//! State transitions - synchronous mutations applied under the state lock

use crate::app::CoordinatorState;
use crate::constants::MAX_LEDGER_EVENTS;
use crate::models::{
    Address, BalanceSnapshot, LedgerEvent, LoadingFlag, NewLedgerEvent, Notification,
    NotificationKind,
};

impl CoordinatorState {
    // ========================
    // Session
    // ========================

    /// Enter `Connecting`; false when a connection is already mid-flight
    pub fn begin_connect(&mut self) -> bool {
        if self.session.is_connecting {
            return false;
        }
        self.session.is_connecting = true;
        true
    }

    pub fn end_connect(&mut self) {
        self.session.is_connecting = false;
    }

    /// Record the connected account. Returns true when address or chain changed.
    pub fn set_account(&mut self, address: Address, chain_id: u64) -> bool {
        let changed = self.session.connected_address.as_ref() != Some(&address)
            || self.session.chain_id != Some(chain_id);
        self.session.connected_address = Some(address);
        self.session.chain_id = Some(chain_id);
        if changed {
            self.session_epoch += 1;
        }
        changed
    }

    /// Switch chains on the current account. Returns true when it changed.
    pub fn set_chain(&mut self, chain_id: u64) -> bool {
        if self.session.connected_address.is_none() || self.session.chain_id == Some(chain_id) {
            return false;
        }
        self.session.chain_id = Some(chain_id);
        self.session_epoch += 1;
        true
    }

    /// Back to the empty state: no session, zero balances, no events, no
    /// notifications
    pub fn clear_session(&mut self) {
        self.session.connected_address = None;
        self.session.chain_id = None;
        self.balances = BalanceSnapshot::default();
        self.ledger.clear();
        self.notifications.clear();
        self.session_epoch += 1;
    }

    // ========================
    // Balances
    // ========================

    /// Replace the snapshot wholesale if it was read for the current session
    pub fn apply_snapshot(&mut self, epoch: u64, snapshot: BalanceSnapshot) -> bool {
        if epoch != self.session_epoch || self.session.connected_address.is_none() {
            return false;
        }
        self.balances = snapshot;
        true
    }

    // ========================
    // Ledger events
    // ========================

    /// Stamp and prepend an event, evicting the oldest past the cap
    pub fn push_ledger_event(&mut self, event: NewLedgerEvent) -> LedgerEvent {
        let stamped = LedgerEvent::stamp(self.next_id("evt"), event);
        if self.ledger.len() >= MAX_LEDGER_EVENTS {
            self.ledger.pop_back();
        }
        self.ledger.push_front(stamped.clone());
        stamped
    }

    // ========================
    // Notifications
    // ========================

    pub fn push_notification(
        &mut self,
        kind: NotificationKind,
        message: impl Into<String>,
    ) -> Notification {
        let notification = Notification {
            id: self.next_id("note"),
            kind,
            message: message.into(),
            created_at: chrono::Utc::now(),
        };
        self.notifications.push(notification.clone());
        notification
    }

    /// Remove exactly the notification with `id`
    pub fn dismiss_notification(&mut self, id: &str) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.id != id);
        self.notifications.len() != before
    }

    // ========================
    // Loading flags
    // ========================

    pub fn set_loading(&mut self, flag: LoadingFlag, value: bool) {
        self.loading.set(flag, value);
    }
}
