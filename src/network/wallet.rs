//! Wallet connector backed by the node's unlocked accounts
//!
//! Only the injected connector is available here; the node plays the part of
//! the browser wallet. Account and chain changes are picked up by polling.

use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::constants::WALLET_POLL_INTERVAL;
use crate::models::{Address, ConnectorId};
use crate::network::JsonRpcClient;
use crate::ports::{ConnectedAccount, WalletConnector, WalletEvent};

pub struct RpcWallet {
    rpc: Arc<JsonRpcClient>,
    events: broadcast::Sender<WalletEvent>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl RpcWallet {
    pub fn new(rpc: Arc<JsonRpcClient>) -> Self {
        let (events, _) = broadcast::channel(32);
        RpcWallet {
            rpc,
            events,
            watcher: Mutex::new(None),
        }
    }

    fn stop_watching(&self) {
        let handle = self.watcher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn start_watching(&self, account: ConnectedAccount) {
        self.stop_watching();
        let handle = tokio::spawn(watch_account(
            self.rpc.clone(),
            self.events.clone(),
            account,
        ));
        *self.watcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }
}

/// Compare the node's first account and chain id against the last seen ones
async fn watch_account(
    rpc: Arc<JsonRpcClient>,
    events: broadcast::Sender<WalletEvent>,
    mut current: ConnectedAccount,
) {
    let mut interval = tokio::time::interval(WALLET_POLL_INTERVAL);
    interval.tick().await;

    loop {
        interval.tick().await;

        match rpc.accounts().await {
            Ok(accounts) => match accounts.into_iter().next() {
                Some(address) if address != current.address => {
                    current.address = address.clone();
                    let _ = events.send(WalletEvent::AccountChanged(address));
                }
                Some(_) => {}
                None => {
                    let _ = events.send(WalletEvent::Disconnected);
                    return;
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "Account poll failed");
                continue;
            }
        }

        match rpc.chain_id().await {
            Ok(chain_id) if chain_id != current.chain_id => {
                current.chain_id = chain_id;
                let _ = events.send(WalletEvent::ChainChanged(chain_id));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "Chain id poll failed"),
        }
    }
}

fn first_account(accounts: Vec<Address>) -> Result<Address> {
    match accounts.into_iter().next() {
        Some(address) => Ok(address),
        None => bail!("User rejected the request: no unlocked accounts"),
    }
}

#[async_trait]
impl WalletConnector for RpcWallet {
    async fn connect(&self, connector: &ConnectorId) -> Result<ConnectedAccount> {
        if *connector != ConnectorId::Injected {
            bail!("Connector not found: {} is not available", connector.as_str());
        }

        let address = first_account(self.rpc.accounts().await?)?;
        let chain_id = self.rpc.chain_id().await?;
        let account = ConnectedAccount { address, chain_id };
        self.start_watching(account.clone());
        Ok(account)
    }

    async fn disconnect(&self) -> Result<()> {
        self.stop_watching();
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

impl Drop for RpcWallet {
    fn drop(&mut self) {
        self.stop_watching();
    }
}
