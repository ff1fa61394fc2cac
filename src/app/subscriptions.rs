//! Live contract-event subscriptions feeding the ledger log
//!
//! One task per subscription pumps decoded logs into the coordinator. The
//! tasks are tied to a session epoch: a log arriving after the address or
//! chain changed ends the task instead of being recorded.

use std::sync::{Arc, Weak};

use tokio::task::JoinHandle;

use crate::abi::{self, address_topic, Event};
use crate::app::coordinator::{Coordinator, Inner};
use crate::config::Settings;
use crate::models::{Address, LedgerEventKind, NewLedgerEvent, SourceContract};
use crate::ports::{ContractLog, LogFilter, LogSubscription};

/// Running subscription tasks for one address
pub struct SubscriptionSet {
    address: Option<Address>,
    tasks: Vec<JoinHandle<()>>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        SubscriptionSet {
            address: None,
            tasks: Vec::new(),
        }
    }

    pub fn push(&mut self, task: JoinHandle<()>) {
        self.tasks.push(task);
    }

    pub fn set_address(&mut self, address: Address) {
        self.address = Some(address);
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Abort every task and wait until each is gone, so the log streams they
    /// own are released before this returns
    pub async fn clear(&mut self) {
        if let Some(address) = self.address.take() {
            tracing::debug!(address = %address, count = self.tasks.len(), "Releasing event subscriptions");
        }
        for task in self.tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Default for SubscriptionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Turns raw logs from one contract into ledger events
#[derive(Clone, Debug)]
pub struct EventDecoder {
    pub source: SourceContract,
    pub token_symbol: String,
    pub token_decimals: u8,
}

/// One subscription to open for the connected address
#[derive(Clone, Debug)]
pub struct LedgerWatch {
    pub filter: LogFilter,
    pub decoder: EventDecoder,
}

/// The three watches: NFT transfers to the address, token transfers to the
/// address, stakes by the address
pub fn ledger_watches(settings: &Settings, address: &Address) -> Vec<LedgerWatch> {
    let topic = Some(address_topic(address));
    let decoder = |source| EventDecoder {
        source,
        token_symbol: settings.token_symbol.clone(),
        token_decimals: settings.token_decimals,
    };
    vec![
        LedgerWatch {
            filter: LogFilter {
                contract: settings.contracts.nft.clone(),
                topics: vec![Some(Event::Transfer.topic_hex()), None, topic.clone()],
            },
            decoder: decoder(SourceContract::Nft),
        },
        LedgerWatch {
            filter: LogFilter {
                contract: settings.contracts.token.clone(),
                topics: vec![Some(Event::Transfer.topic_hex()), None, topic.clone()],
            },
            decoder: decoder(SourceContract::Token),
        },
        LedgerWatch {
            filter: LogFilter {
                contract: settings.contracts.staking.clone(),
                topics: vec![Some(Event::Staked.topic_hex()), topic],
            },
            decoder: decoder(SourceContract::Staking),
        },
    ]
}

impl EventDecoder {
    fn amount(&self, data: &[u8]) -> Option<String> {
        let value = abi::decode_uint(data).ok()?;
        let shown = abi::format_units(value, self.token_decimals).ok()?;
        Some(format!("{} {}", shown, self.token_symbol))
    }

    /// Decode a log; unknown or malformed logs yield `None`
    pub fn decode(&self, log: &ContractLog) -> Option<NewLedgerEvent> {
        let event = Event::from_topic(log.topics.first()?)?;
        let topic_address = |i: usize| {
            log.topics
                .get(i)
                .and_then(|t| abi::decode_address_topic(t).ok())
        };

        let (kind, from, to, amount, token_id) = match event {
            Event::Transfer => {
                let from = topic_address(1)?;
                let to = topic_address(2)?;
                match self.source {
                    SourceContract::Nft => {
                        let token_id = abi::decode_uint_topic(log.topics.get(3)?).ok()?;
                        let kind = if from.is_zero() {
                            LedgerEventKind::Minted
                        } else {
                            LedgerEventKind::Transfer
                        };
                        (kind, from, Some(to), None, Some(token_id.to_string()))
                    }
                    _ => (
                        LedgerEventKind::Transfer,
                        from,
                        Some(to),
                        self.amount(&log.data),
                        None,
                    ),
                }
            }
            Event::Approval => (
                LedgerEventKind::Approval,
                topic_address(1)?,
                topic_address(2),
                self.amount(&log.data),
                None,
            ),
            Event::Staked => (
                LedgerEventKind::Staked,
                topic_address(1)?,
                None,
                self.amount(&log.data),
                None,
            ),
            Event::RewardPaid => (
                LedgerEventKind::Claimed,
                topic_address(1)?,
                None,
                self.amount(&log.data),
                None,
            ),
        };

        Some(NewLedgerEvent {
            kind,
            source_contract: self.source,
            from,
            to,
            amount,
            token_id,
            tx_hash: log.tx_hash.clone(),
        })
    }
}

/// Forward decoded logs to the coordinator until the stream ends, the
/// coordinator is dropped, or the session moves on
pub(crate) async fn pump(
    inner: Weak<Inner>,
    epoch: u64,
    decoder: EventDecoder,
    mut subscription: LogSubscription,
) {
    while let Some(log) = subscription.logs.recv().await {
        let Some(event) = decoder.decode(&log) else {
            tracing::debug!(source = ?decoder.source, tx = %log.tx_hash, "Ignoring undecodable log");
            continue;
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let coordinator = Coordinator::from_inner(Arc::clone(&inner));
        if coordinator.session_epoch() != epoch {
            tracing::debug!(source = ?decoder.source, "Dropping event for a previous session");
            break;
        }
        coordinator.add_ledger_event(event).await;
    }
    tracing::debug!(source = ?decoder.source, "Event subscription ended");
}
