//! Balance snapshot reads with per-field fallback
//!
//! The four reads run concurrently. A read that fails or times out keeps the
//! previous snapshot's value for that field (zero when there is none), so a
//! refresh always yields a complete snapshot.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::abi::{self, ContractCall, Function};
use crate::config::Contracts;
use crate::constants::NATIVE_DECIMALS;
use crate::models::{Address, BalanceSnapshot};
use crate::ports::ChainReader;
use crate::timeout::with_timeout;

#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Produce a full snapshot for `address`; `previous` is the last good one
    async fn fetch(&self, address: &Address, previous: &BalanceSnapshot) -> BalanceSnapshot;
}

/// Reads balances from the MeeBot contracts through a [`ChainReader`]
pub struct ChainBalanceSource {
    chain: Arc<dyn ChainReader>,
    contracts: Contracts,
    token_decimals: u8,
    read_timeout: Duration,
}

impl ChainBalanceSource {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        contracts: Contracts,
        token_decimals: u8,
        read_timeout: Duration,
    ) -> Self {
        ChainBalanceSource {
            chain,
            contracts,
            token_decimals,
            read_timeout,
        }
    }

    async fn read_uint(&self, call: ContractCall) -> Result<U256> {
        let label = call.function.name();
        let data = with_timeout(self.read_timeout, label, self.chain.read_contract(&call)).await?;
        abi::decode_uint(&data)
    }

    async fn native(&self, address: &Address) -> Result<String> {
        let wei = with_timeout(
            self.read_timeout,
            "native balance",
            self.chain.native_balance(address),
        )
        .await?;
        abi::format_units(wei, NATIVE_DECIMALS)
    }

    async fn token(&self, address: &Address) -> Result<String> {
        let call = ContractCall::new(self.contracts.token.clone(), Function::BalanceOf(address.clone()));
        abi::format_units(self.read_uint(call).await?, self.token_decimals)
    }

    async fn nft_count(&self, address: &Address) -> Result<u64> {
        let call = ContractCall::new(self.contracts.nft.clone(), Function::BalanceOf(address.clone()));
        let count = self.read_uint(call).await?;
        u64::try_from(count).map_err(|_| anyhow!("NFT count {} does not fit in 64 bits", count))
    }

    async fn reward_rate(&self) -> Result<String> {
        let call = ContractCall::new(self.contracts.staking.clone(), Function::RewardRate);
        abi::format_units(self.read_uint(call).await?, self.token_decimals)
    }
}

fn or_fallback<T>(field: &str, result: Result<T>, fallback: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(field, error = %e, "Balance read failed, keeping last known value");
            fallback
        }
    }
}

#[async_trait]
impl BalanceSource for ChainBalanceSource {
    async fn fetch(&self, address: &Address, previous: &BalanceSnapshot) -> BalanceSnapshot {
        let (native, token, nfts, rate) = tokio::join!(
            self.native(address),
            self.token(address),
            self.nft_count(address),
            self.reward_rate(),
        );

        BalanceSnapshot {
            native_balance: or_fallback("native", native, previous.native_balance.clone()),
            fungible_token_balance: or_fallback(
                "token",
                token,
                previous.fungible_token_balance.clone(),
            ),
            nft_count: or_fallback("nft_count", nfts, previous.nft_count),
            staking_reward_rate: or_fallback(
                "reward_rate",
                rate,
                previous.staking_reward_rate.clone(),
            ),
        }
    }
}
