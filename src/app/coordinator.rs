//! Session & telemetry coordinator
//!
//! Single owner of session, balance snapshot, ledger log, notifications and
//! loading flags. Consumers hold a cheap [`Coordinator`] handle and either
//! call its operations or watch the published [`CoordinatorView`].
//!
//! The state lock is a plain mutex that is never held across an `.await`;
//! every external call happens outside it.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;

use crate::app::subscriptions::{self, SubscriptionSet};
use crate::app::CoordinatorState;
use crate::balances::BalanceSource;
use crate::config::Settings;
use crate::errors::{classify_error, ErrorKind};
use crate::messages::CoordinatorView;
use crate::models::{
    Address, ConnectorId, LedgerEvent, LoadingFlag, NewLedgerEvent, NotificationKind,
};
use crate::ports::{AiService, ChainReader, TransactionClient, WalletConnector, WalletEvent};
use crate::sanitize::sanitize_store;
use crate::storage::{Gallery, KeyValueStore};
use crate::timeout::with_timeout;

/// External services the coordinator drives
#[derive(Clone)]
pub struct Collaborators {
    pub wallet: Arc<dyn WalletConnector>,
    pub chain: Arc<dyn ChainReader>,
    pub transactions: Arc<dyn TransactionClient>,
    pub ai: Arc<dyn AiService>,
    pub balances: Arc<dyn BalanceSource>,
    pub store: Arc<dyn KeyValueStore>,
}

pub(crate) struct Inner {
    state: Mutex<CoordinatorState>,
    view_tx: watch::Sender<CoordinatorView>,
    pub(crate) services: Collaborators,
    pub(crate) settings: Settings,
    pub(crate) gallery: Mutex<Gallery>,
    subscriptions: tokio::sync::Mutex<SubscriptionSet>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a mutation and publish the resulting view
    pub(crate) fn update<T>(&self, f: impl FnOnce(&mut CoordinatorState) -> T) -> T {
        let mut state = self.lock();
        let result = f(&mut state);
        self.view_tx.send_replace(state.to_view());
        result
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&CoordinatorState) -> T) -> T {
        f(&self.lock())
    }
}

/// Handle to the coordinator. Clones share the same state.
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) inner: Arc<Inner>,
}

/// Holds a loading flag raised until dropped
#[must_use = "the loading flag is released when the guard is dropped"]
pub struct LoadingGuard {
    inner: Arc<Inner>,
    flag: LoadingFlag,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        let flag = self.flag;
        self.inner.update(|s| s.set_loading(flag, false));
    }
}

/// Clears `is_connecting` on every exit path of a connect
struct ConnectingGuard {
    inner: Arc<Inner>,
}

impl Drop for ConnectingGuard {
    fn drop(&mut self) {
        self.inner.update(|s| s.end_connect());
    }
}

impl Coordinator {
    pub fn new(services: Collaborators, settings: Settings) -> Self {
        let state = CoordinatorState::new();
        let (view_tx, _) = watch::channel(state.to_view());
        let gallery = Gallery::load(services.store.as_ref());
        Coordinator {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                view_tx,
                services,
                settings,
                gallery: Mutex::new(gallery),
                subscriptions: tokio::sync::Mutex::new(SubscriptionSet::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Coordinator { inner }
    }

    /// Receiver that always holds the latest view
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorView> {
        self.inner.view_tx.subscribe()
    }

    pub fn view(&self) -> CoordinatorView {
        self.inner.read(|s| s.to_view())
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Wallet change stream of the underlying connector
    pub fn wallet_events(&self) -> tokio::sync::broadcast::Receiver<WalletEvent> {
        self.inner.services.wallet.events()
    }

    pub fn connected_address(&self) -> Option<Address> {
        self.inner.read(|s| s.session.connected_address.clone())
    }

    pub(crate) fn session_epoch(&self) -> u64 {
        self.inner.read(|s| s.session_epoch)
    }

    // ========================
    // Session
    // ========================

    /// Connect through `connector`. Errors are reported as notifications and
    /// returned classified; a connect already in flight makes this a no-op.
    pub async fn connect(&self, connector: ConnectorId) -> Result<(), ErrorKind> {
        if !self.inner.update(|s| s.begin_connect()) {
            tracing::debug!(connector = connector.as_str(), "Connect already in flight");
            return Ok(());
        }
        let guard = ConnectingGuard {
            inner: self.inner.clone(),
        };

        match sanitize_store(self.inner.services.store.as_ref()) {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Cleared stale wallet session keys"),
            Err(e) => tracing::warn!(error = %e, "Could not clear stale wallet session keys"),
        }

        tracing::info!(connector = connector.as_str(), "Connecting wallet");
        let result = with_timeout(
            self.inner.settings.connect_timeout(),
            "wallet connect",
            self.inner.services.wallet.connect(&connector),
        )
        .await;

        match result {
            Ok(account) => {
                let short = account.address.short();
                let chain_id = account.chain_id;
                tracing::info!(address = %account.address, chain_id, "Wallet connected");
                self.inner
                    .update(|s| s.set_account(account.address, chain_id));
                drop(guard);
                self.notify(NotificationKind::Success, format!("Wallet connected: {}", short));
                self.check_network(chain_id);
                self.resubscribe().await;
                self.refresh_balances().await;
                Ok(())
            }
            Err(e) => {
                let kind = classify_error(&e);
                let detail = format!("{:#}", e);
                tracing::warn!(error = %detail, kind = ?kind, "Wallet connection failed");
                drop(guard);
                self.notify(NotificationKind::Error, kind.to_string());
                Err(kind)
            }
        }
    }

    /// Disconnect the wallet and reset all session-scoped state
    pub async fn disconnect(&self) {
        let result = with_timeout(
            self.inner.settings.connect_timeout(),
            "wallet disconnect",
            self.inner.services.wallet.disconnect(),
        )
        .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "Wallet disconnect reported an error");
        }
        self.teardown_session().await;
        tracing::info!("Wallet disconnected");
    }

    async fn teardown_session(&self) {
        self.inner.update(|s| s.clear_session());
        self.inner.subscriptions.lock().await.clear().await;
    }

    /// React to a change pushed by the wallet
    pub async fn handle_wallet_event(&self, event: WalletEvent) {
        match event {
            WalletEvent::AccountChanged(address) => {
                let changed = self.inner.update(|s| match s.session.chain_id {
                    Some(chain_id) if s.session.connected_address.is_some() => {
                        s.set_account(address.clone(), chain_id)
                    }
                    _ => false,
                });
                if changed {
                    tracing::info!(address = %address, "Wallet account changed");
                    self.notify(
                        NotificationKind::Info,
                        format!("Switched to account {}", address.short()),
                    );
                    self.resubscribe().await;
                    self.refresh_balances().await;
                }
            }
            WalletEvent::ChainChanged(chain_id) => {
                if self.inner.update(|s| s.set_chain(chain_id)) {
                    tracing::info!(chain_id, "Wallet chain changed");
                    self.check_network(chain_id);
                    self.resubscribe().await;
                    self.refresh_balances().await;
                }
            }
            WalletEvent::Disconnected => {
                if self.connected_address().is_some() {
                    tracing::info!("Wallet disconnected on the wallet side");
                    self.teardown_session().await;
                }
            }
        }
    }

    /// Warn when the wallet sits on a chain other than the configured one
    fn check_network(&self, chain_id: u64) {
        let expected = self.inner.settings.chain_id;
        if chain_id == expected {
            return;
        }
        tracing::warn!(chain_id, expected, "Wallet is on the wrong network");
        self.notify(
            NotificationKind::Error,
            format!(
                "Wrong network: connected to chain {}, MeeBot runs on chain {}",
                chain_id, expected
            ),
        );
    }

    /// Replace the live event subscriptions with ones for the current address
    async fn resubscribe(&self) {
        let mut set = self.inner.subscriptions.lock().await;
        set.clear().await;

        let Some((address, epoch)) = self
            .inner
            .read(|s| s.session.connected_address.clone().map(|a| (a, s.session_epoch)))
        else {
            return;
        };

        let settings = &self.inner.settings;
        for ledger_watch in subscriptions::ledger_watches(settings, &address) {
            match self
                .inner
                .services
                .chain
                .subscribe_logs(ledger_watch.filter.clone())
                .await
            {
                Ok(subscription) => {
                    let inner = Arc::downgrade(&self.inner);
                    set.push(tokio::spawn(subscriptions::pump(
                        inner,
                        epoch,
                        ledger_watch.decoder,
                        subscription,
                    )));
                }
                Err(e) => {
                    tracing::warn!(source = ?ledger_watch.decoder.source, error = %e, "Could not subscribe to contract events");
                }
            }
        }
        set.set_address(address);
    }

    // ========================
    // Balances
    // ========================

    /// Read a fresh snapshot for the connected address and replace the
    /// current one. Without a connected address this does nothing.
    pub async fn refresh_balances(&self) {
        let Some((address, epoch, previous)) = self.inner.read(|s| {
            s.session
                .connected_address
                .clone()
                .map(|a| (a, s.session_epoch, s.balances.clone()))
        }) else {
            return;
        };

        let _loading = self.begin_loading(LoadingFlag::Balances);
        let snapshot = self.inner.services.balances.fetch(&address, &previous).await;
        if !self.inner.update(|s| s.apply_snapshot(epoch, snapshot)) {
            tracing::debug!(address = %address, "Discarded balances read for a previous session");
        }
    }

    // ========================
    // Ledger events
    // ========================

    /// Stamp and record an observed event, notify, and refresh balances
    pub async fn add_ledger_event(&self, event: NewLedgerEvent) -> LedgerEvent {
        let stamped = self.inner.update(|s| s.push_ledger_event(event));
        tracing::info!(kind = stamped.kind.as_str(), tx = %stamped.tx_hash, "Ledger event");
        self.notify(NotificationKind::Info, stamped.describe());
        self.refresh_balances().await;
        stamped
    }

    // ========================
    // Notifications
    // ========================

    /// Queue a notification; it dismisses itself after the configured TTL
    pub fn notify(&self, kind: NotificationKind, message: impl Into<String>) -> String {
        let notification = self.inner.update(|s| s.push_notification(kind, message));
        let id = notification.id.clone();
        let ttl = self.inner.settings.notification_ttl();
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(expire_notification(inner, notification.id, ttl));
        id
    }

    pub fn dismiss_notification(&self, id: &str) -> bool {
        self.inner.update(|s| s.dismiss_notification(id))
    }

    // ========================
    // Loading flags
    // ========================

    pub fn set_loading(&self, flag: LoadingFlag, value: bool) {
        self.inner.update(|s| s.set_loading(flag, value));
    }

    /// Raise `flag` until the returned guard is dropped
    pub fn begin_loading(&self, flag: LoadingFlag) -> LoadingGuard {
        self.set_loading(flag, true);
        LoadingGuard {
            inner: self.inner.clone(),
            flag,
        }
    }

    pub fn is_loading(&self, flag: LoadingFlag) -> bool {
        self.inner.read(|s| s.loading.is_loading(flag))
    }

    #[cfg(test)]
    pub(crate) async fn open_subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().await.len()
    }
}

async fn expire_notification(inner: Weak<Inner>, id: String, ttl: Duration) {
    tokio::time::sleep(ttl).await;
    if let Some(inner) = inner.upgrade() {
        inner.update(|s| s.dismiss_notification(&id));
    }
}
