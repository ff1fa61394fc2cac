//! Scripted collaborator doubles shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::U256;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot, Notify};

use crate::abi::{self, ContractCall, Function};
use crate::app::{Collaborators, Coordinator};
use crate::balances::BalanceSource;
use crate::config::Settings;
use crate::errors::AiServiceFailure;
use crate::models::{
    Address, BalanceSnapshot, ConnectorId, LedgerEventKind, NewLedgerEvent, SourceContract,
};
use crate::ports::*;
use crate::storage::{KeyValueStore, MemoryStore};

pub fn alice() -> Address {
    "0x1111111111111111111111111111111111111111".parse().unwrap()
}

pub fn bob() -> Address {
    "0x2222222222222222222222222222222222222222".parse().unwrap()
}

pub fn tx_hash(n: usize) -> String {
    format!("0x{:064x}", n)
}

/// Hash the mock transaction client assigns to its `n`th send (0-based)
pub fn sent_hash(n: usize) -> String {
    format!("0x{:064x}", 0xface_0000 + n)
}

pub fn uint_word(value: u128) -> Vec<u8> {
    U256::from(value).to_be_bytes::<32>().to_vec()
}

pub fn snapshot(native: &str, token: &str, nfts: u64, rate: &str) -> BalanceSnapshot {
    BalanceSnapshot {
        native_balance: native.into(),
        fungible_token_balance: token.into(),
        nft_count: nfts,
        staking_reward_rate: rate.into(),
    }
}

pub fn staked_event(n: usize) -> NewLedgerEvent {
    NewLedgerEvent {
        kind: LedgerEventKind::Staked,
        source_contract: SourceContract::Staking,
        from: alice(),
        to: None,
        amount: Some("10 MCB".into()),
        token_id: None,
        tx_hash: tx_hash(n),
    }
}

/// Yield until `check` holds, failing the test after a bounded wait
pub async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}

// ============================================================================
// Wallet
// ============================================================================

pub struct MockWallet {
    script: Mutex<VecDeque<Result<ConnectedAccount, String>>>,
    gate: Mutex<Option<Arc<Notify>>>,
    events: broadcast::Sender<WalletEvent>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockWallet {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        MockWallet {
            script: Mutex::new(VecDeque::new()),
            gate: Mutex::new(None),
            events,
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn push_account(&self, address: Address, chain_id: u64) {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(ConnectedAccount { address, chain_id }));
    }

    pub fn push_error(&self, message: &str) {
        self.script.lock().unwrap().push_back(Err(message.to_string()));
    }

    /// The next connect waits until the returned notify fires
    pub fn gate_next_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    pub fn connect_calls(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletConnector for MockWallet {
    async fn connect(&self, _connector: &ConnectorId) -> Result<ConnectedAccount> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(account)) => Ok(account),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("Connector not found")),
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

// ============================================================================
// Chain
// ============================================================================

struct OpenSubscription {
    filter: LogFilter,
    tx: mpsc::UnboundedSender<ContractLog>,
}

pub struct MockChain {
    native: Mutex<Option<U256>>,
    hang_native: AtomicBool,
    calls: Mutex<HashMap<(Address, Vec<u8>), Vec<u8>>>,
    subscriptions: Mutex<Vec<OpenSubscription>>,
}

impl MockChain {
    pub fn new() -> Self {
        MockChain {
            native: Mutex::new(None),
            hang_native: AtomicBool::new(false),
            calls: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn set_native(&self, wei: u128) {
        *self.native.lock().unwrap() = Some(U256::from(wei));
    }

    /// Native balance reads never complete
    pub fn hang_native(&self) {
        self.hang_native.store(true, Ordering::SeqCst);
    }

    pub fn set_call(&self, contract: &Address, function: Function, result: Vec<u8>) {
        self.calls
            .lock()
            .unwrap()
            .insert((contract.clone(), function.encode()), result);
    }

    /// Deliver `log` to every open subscription on its contract
    pub fn emit(&self, log: ContractLog) {
        for sub in self.subscriptions.lock().unwrap().iter() {
            if sub.filter.contract == log.address && !sub.tx.is_closed() {
                let _ = sub.tx.send(log.clone());
            }
        }
    }

    pub fn total_subscriptions(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    pub fn open_subscriptions(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.tx.is_closed())
            .count()
    }

    pub fn open_filters_mention(&self, address: &Address) -> bool {
        let topic = abi::address_topic(address);
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.tx.is_closed())
            .any(|s| s.filter.topics.iter().any(|t| t.as_deref() == Some(topic.as_str())))
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn native_balance(&self, _address: &Address) -> Result<U256> {
        if self.hang_native.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let native = *self.native.lock().unwrap();
        native.ok_or_else(|| anyhow!("network unreachable"))
    }

    async fn read_contract(&self, call: &ContractCall) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .get(&(call.contract.clone(), call.function.encode()))
            .cloned()
            .ok_or_else(|| anyhow!("execution reverted"))
    }

    async fn subscribe_logs(&self, filter: LogFilter) -> Result<LogSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (release_tx, _release_rx) = oneshot::channel();
        self.subscriptions
            .lock()
            .unwrap()
            .push(OpenSubscription { filter, tx });
        Ok(LogSubscription::new(rx, release_tx))
    }
}

// ============================================================================
// Transactions
// ============================================================================

pub struct MockTransactions {
    sent: Mutex<Vec<TxRequest>>,
    statuses: Mutex<VecDeque<TxStatus>>,
    send_error: Mutex<Option<String>>,
    always_pending: AtomicBool,
}

impl MockTransactions {
    pub fn new() -> Self {
        MockTransactions {
            sent: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            send_error: Mutex::new(None),
            always_pending: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<TxRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Queue a status; once the queue is empty receipts are confirmed
    pub fn push_status(&self, status: TxStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn always_pending(&self) {
        self.always_pending.store(true, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, message: &str) {
        *self.send_error.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl TransactionClient for MockTransactions {
    async fn send_transaction(&self, tx: TxRequest) -> Result<String> {
        if let Some(message) = self.send_error.lock().unwrap().clone() {
            return Err(anyhow!(message));
        }
        let mut sent = self.sent.lock().unwrap();
        let hash = sent_hash(sent.len());
        sent.push(tx);
        Ok(hash)
    }

    async fn transaction_status(&self, _tx_hash: &str) -> Result<TxStatus> {
        if self.always_pending.load(Ordering::SeqCst) {
            return Ok(TxStatus::Pending);
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TxStatus::Confirmed))
    }
}

// ============================================================================
// AI
// ============================================================================

pub struct MockAi {
    image: Mutex<Option<GeneratedImage>>,
    text: Mutex<Option<String>>,
    error: Mutex<Option<String>>,
    delay: Mutex<Duration>,
    prompts: Mutex<Vec<String>>,
    image_calls: AtomicUsize,
}

impl MockAi {
    pub fn new() -> Self {
        MockAi {
            image: Mutex::new(None),
            text: Mutex::new(None),
            error: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            prompts: Mutex::new(Vec::new()),
            image_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_image(&self, image: GeneratedImage) {
        *self.image.lock().unwrap() = Some(image);
    }

    pub fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = Some(text.to_string());
    }

    pub fn fail(&self, message: &str) {
        *self.error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    async fn respond<T: Clone>(&self, prompt: &str, value: &Mutex<Option<T>>) -> Result<T> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.error.lock().unwrap().clone() {
            return Err(AiServiceFailure(message).into());
        }
        let value = value.lock().unwrap().clone();
        value.ok_or_else(|| AiServiceFailure("no response scripted".into()).into())
    }
}

#[async_trait]
impl AiService for MockAi {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.respond(prompt, &self.image).await
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.respond(prompt, &self.text).await
    }
}

// ============================================================================
// Balances
// ============================================================================

/// Balance source returning queued snapshots, optionally held behind a gate.
/// With nothing queued it returns the previous snapshot unchanged.
pub struct ScriptedBalances {
    script: Mutex<VecDeque<(Option<oneshot::Receiver<()>>, BalanceSnapshot)>>,
    calls: AtomicUsize,
}

impl ScriptedBalances {
    pub fn new() -> Self {
        ScriptedBalances {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, snapshot: BalanceSnapshot) {
        self.script.lock().unwrap().push_back((None, snapshot));
    }

    /// Queue a snapshot released only when the returned sender fires
    pub fn push_gated(&self, snapshot: BalanceSnapshot) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().push_back((Some(rx), snapshot));
        tx
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BalanceSource for ScriptedBalances {
    async fn fetch(&self, _address: &Address, previous: &BalanceSnapshot) -> BalanceSnapshot {
        let next = self.script.lock().unwrap().pop_front();
        self.calls.fetch_add(1, Ordering::SeqCst);
        match next {
            Some((gate, snapshot)) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                snapshot
            }
            None => previous.clone(),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A coordinator wired to fresh doubles
pub struct Harness {
    pub coordinator: Coordinator,
    pub wallet: Arc<MockWallet>,
    pub chain: Arc<MockChain>,
    pub transactions: Arc<MockTransactions>,
    pub ai: Arc<MockAi>,
    pub balances: Arc<ScriptedBalances>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        let wallet = Arc::new(MockWallet::new());
        let chain = Arc::new(MockChain::new());
        let transactions = Arc::new(MockTransactions::new());
        let ai = Arc::new(MockAi::new());
        let balances = Arc::new(ScriptedBalances::new());
        let store = Arc::new(MemoryStore::new());

        let coordinator = Coordinator::new(
            Collaborators {
                wallet: wallet.clone(),
                chain: chain.clone(),
                transactions: transactions.clone(),
                ai: ai.clone(),
                balances: balances.clone(),
                store: store.clone() as Arc<dyn KeyValueStore>,
            },
            Settings {
                chain_id: 1,
                ..Settings::default()
            },
        );

        Harness {
            coordinator,
            wallet,
            chain,
            transactions,
            ai,
            balances,
            store,
        }
    }
}
