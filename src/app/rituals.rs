//! Rituals - user-triggered actions with loading and notification semantics
//!
//! Every ritual holds its loading flag for its whole duration and reports
//! its outcome as a notification. Failures come back classified.

use alloy_primitives::U256;
use anyhow::anyhow;
use base64::Engine;
use tokio::time::Instant;

use crate::abi::{self, ContractCall, Function};
use crate::app::Coordinator;
use crate::constants::RECEIPT_POLL_INTERVAL;
use crate::errors::{classify_ai_error, classify_error, ErrorKind};
use crate::models::{Address, GalleryItem, LoadingFlag, NotificationKind};
use crate::ports::{TxRequest, TxStatus};
use crate::timeout::with_timeout;

/// Framing sent ahead of every oracle question
pub const ORACLE_PREAMBLE: &str = "You are the MeeBot oracle. Answer in one short, cryptic prophecy.";

impl Coordinator {
    fn require_account(&self) -> Result<Address, ErrorKind> {
        match self.connected_address() {
            Some(address) => Ok(address),
            None => {
                self.notify(NotificationKind::Error, "Connect your wallet first.");
                Err(ErrorKind::ConnectionNotFound)
            }
        }
    }

    fn report_failure(&self, ritual: &str, err: anyhow::Error, kind: ErrorKind) -> ErrorKind {
        let detail = format!("{:#}", err);
        tracing::warn!(ritual, error = %detail, kind = ?kind, "Ritual failed");
        self.notify(NotificationKind::Error, kind.to_string());
        kind
    }

    /// Send a contract transaction from `from` and wait until it is mined
    async fn send_and_confirm(
        &self,
        from: &Address,
        contract: &Address,
        function: Function,
    ) -> anyhow::Result<String> {
        let name = function.name();
        let tx = TxRequest {
            from: from.clone(),
            to: contract.clone(),
            data: function.encode(),
            value: U256::ZERO,
        };
        let tx_hash = self.inner.services.transactions.send_transaction(tx).await?;
        tracing::info!(function = name, tx = %tx_hash, "Transaction sent");
        self.await_confirmation(&tx_hash).await?;
        tracing::info!(function = name, tx = %tx_hash, "Transaction confirmed");
        Ok(tx_hash)
    }

    /// Poll the transaction status until it settles or the deadline passes
    pub async fn await_confirmation(&self, tx_hash: &str) -> anyhow::Result<()> {
        let settings = &self.inner.settings;
        let deadline = Instant::now() + settings.confirmation_timeout();
        loop {
            let status = with_timeout(
                settings.read_timeout(),
                "transaction status",
                self.inner.services.transactions.transaction_status(tx_hash),
            )
            .await;
            match status {
                Ok(TxStatus::Confirmed) => return Ok(()),
                Ok(TxStatus::Failed) => anyhow::bail!("transaction failed: {}", tx_hash),
                Ok(TxStatus::Pending) => {}
                Err(e) => tracing::debug!(tx = %tx_hash, error = %e, "Receipt poll failed"),
            }
            if Instant::now() >= deadline {
                anyhow::bail!("confirmation of {} timed out", tx_hash);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    /// Approve and stake `amount` token base units
    pub async fn stake(&self, amount: U256) -> Result<String, ErrorKind> {
        let owner = self.require_account()?;
        let _loading = self.begin_loading(LoadingFlag::Staking);
        let settings = &self.inner.settings;
        let contracts = &settings.contracts;

        let result = async {
            self.send_and_confirm(
                &owner,
                &contracts.token,
                Function::Approve(contracts.staking.clone(), amount),
            )
            .await?;
            self.send_and_confirm(&owner, &contracts.staking, Function::Stake(amount))
                .await
        }
        .await;

        match result {
            Ok(tx_hash) => {
                let shown = abi::format_units(amount, settings.token_decimals)
                    .unwrap_or_else(|_| amount.to_string());
                self.notify(
                    NotificationKind::Success,
                    format!("Staked {} {}", shown, settings.token_symbol),
                );
                self.refresh_balances().await;
                Ok(tx_hash)
            }
            Err(e) => {
                let kind = classify_error(&e);
                Err(self.report_failure("stake", e, kind))
            }
        }
    }

    /// Claim accrued staking rewards
    pub async fn claim(&self) -> Result<String, ErrorKind> {
        let owner = self.require_account()?;
        let _loading = self.begin_loading(LoadingFlag::Claiming);
        let staking = self.inner.settings.contracts.staking.clone();

        match self.send_and_confirm(&owner, &staking, Function::GetReward).await {
            Ok(tx_hash) => {
                self.notify(NotificationKind::Success, "Rewards claimed");
                self.refresh_balances().await;
                Ok(tx_hash)
            }
            Err(e) => {
                let kind = classify_error(&e);
                Err(self.report_failure("claim", e, kind))
            }
        }
    }

    /// Mint a MeeBot NFT
    pub async fn mint(&self) -> Result<String, ErrorKind> {
        let owner = self.require_account()?;
        let _loading = self.begin_loading(LoadingFlag::General);
        let nft = self.inner.settings.contracts.nft.clone();

        match self.send_and_confirm(&owner, &nft, Function::Mint).await {
            Ok(tx_hash) => {
                self.notify(NotificationKind::Success, "MeeBot minted");
                self.refresh_balances().await;
                Ok(tx_hash)
            }
            Err(e) => {
                let kind = classify_error(&e);
                Err(self.report_failure("mint", e, kind))
            }
        }
    }

    /// Generate an image and keep it at the head of the local gallery
    pub async fn generate_image(&self, prompt: &str) -> Result<GalleryItem, ErrorKind> {
        let _loading = self.begin_loading(LoadingFlag::General);

        let image = match self.inner.services.ai.generate_image(prompt).await {
            Ok(image) => image,
            Err(e) => {
                let kind = classify_ai_error(&e);
                return Err(self.report_failure("generate_image", e, kind));
            }
        };

        let item = GalleryItem {
            id: self.inner.update(|s| s.next_id("img")),
            prompt: prompt.to_string(),
            mime_type: image.mime_type,
            image: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            created_at: chrono::Utc::now(),
        };

        {
            let mut gallery = self.inner.gallery.lock().unwrap_or_else(|e| e.into_inner());
            gallery.add(item.clone());
            if let Err(e) = gallery.save(self.inner.services.store.as_ref()) {
                tracing::warn!(error = %e, "Could not persist gallery");
            }
        }

        self.notify(NotificationKind::Success, "Your MeeBot vision is ready");
        Ok(item)
    }

    /// Ask the oracle; the answer is delivered as a prophecy notification
    pub async fn consult_oracle(&self, question: &str) -> Result<String, ErrorKind> {
        let _loading = self.begin_loading(LoadingFlag::OracleConsult);
        let prompt = format!("{}\n\n{}", ORACLE_PREAMBLE, question.trim());

        match self.inner.services.ai.complete(&prompt).await {
            Ok(answer) => {
                let answer = answer.trim().to_string();
                self.notify(NotificationKind::Prophecy, answer.clone());
                Ok(answer)
            }
            Err(e) => {
                let kind = classify_ai_error(&e);
                Err(self.report_failure("consult_oracle", e, kind))
            }
        }
    }

    /// Token ids of every MeeBot NFT owned by the connected address
    pub async fn scan_gallery(&self) -> Result<Vec<U256>, ErrorKind> {
        let owner = self.require_account()?;
        let _loading = self.begin_loading(LoadingFlag::GalleryScan);

        match self.owned_token_ids(&owner).await {
            Ok(ids) => {
                tracing::info!(owner = %owner, count = ids.len(), "Gallery scan complete");
                Ok(ids)
            }
            Err(e) => {
                let kind = classify_error(&e);
                Err(self.report_failure("scan_gallery", e, kind))
            }
        }
    }

    async fn owned_token_ids(&self, owner: &Address) -> anyhow::Result<Vec<U256>> {
        let settings = &self.inner.settings;
        let chain = &self.inner.services.chain;
        let nft = settings.contracts.nft.clone();

        let count_call = ContractCall::new(nft.clone(), Function::BalanceOf(owner.clone()));
        let count = abi::decode_uint(
            &with_timeout(settings.read_timeout(), "balanceOf", chain.read_contract(&count_call))
                .await?,
        )?;
        let count = u64::try_from(count)
            .map_err(|_| anyhow!("NFT count {} does not fit in 64 bits", count))?;

        let mut ids = Vec::with_capacity(count.min(1024) as usize);
        for index in 0..count {
            let call = ContractCall::new(
                nft.clone(),
                Function::TokenOfOwnerByIndex(owner.clone(), U256::from(index)),
            );
            let data =
                with_timeout(settings.read_timeout(), "tokenOfOwnerByIndex", chain.read_contract(&call))
                    .await?;
            ids.push(abi::decode_uint(&data)?);
        }
        Ok(ids)
    }

    /// Generated images, newest first
    pub fn gallery(&self) -> Vec<GalleryItem> {
        let gallery = self.inner.gallery.lock().unwrap_or_else(|e| e.into_inner());
        gallery.items().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectorId;
    use crate::ports::GeneratedImage;
    use crate::storage::KeyValueStore;
    use crate::test_support::*;
    use std::time::Duration;

    async fn connected() -> Harness {
        let h = Harness::new();
        h.wallet.push_account(alice(), 1);
        h.coordinator.connect(ConnectorId::Injected).await.unwrap();
        h
    }

    #[tokio::test]
    async fn test_stake_approves_then_stakes() {
        let h = connected().await;
        let contracts = h.coordinator.settings().contracts.clone();
        let amount = U256::from(10_000_000_000_000_000_000u128);

        let tx = h.coordinator.stake(amount).await.unwrap();

        let sent = h.transactions.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, contracts.token);
        assert_eq!(
            sent[0].data,
            Function::Approve(contracts.staking.clone(), amount).encode()
        );
        assert_eq!(sent[1].to, contracts.staking);
        assert_eq!(sent[1].data, Function::Stake(amount).encode());
        assert_eq!(tx, sent_hash(1));

        let view = h.coordinator.view();
        assert!(!view.is_loading(LoadingFlag::Staking));
        let last = view.notifications.last().unwrap();
        assert_eq!(last.kind, NotificationKind::Success);
        assert_eq!(last.message, "Staked 10 MCB");
    }

    #[tokio::test]
    async fn test_claim_failure_releases_flag() {
        let h = connected().await;
        h.transactions
            .fail_sends("execution reverted: nothing to claim");

        let err = h.coordinator.claim().await.unwrap_err();
        assert_eq!(err, ErrorKind::ContractCallFailed);

        let view = h.coordinator.view();
        assert!(!view.is_loading(LoadingFlag::Claiming));
        let last = view.notifications.last().unwrap();
        assert_eq!(last.kind, NotificationKind::Error);
        assert_eq!(last.message, ErrorKind::ContractCallFailed.to_string());
    }

    #[tokio::test]
    async fn test_mint_reverted_receipt() {
        let h = connected().await;
        h.transactions.push_status(TxStatus::Pending);
        h.transactions.push_status(TxStatus::Failed);

        tokio::time::pause();
        let err = h.coordinator.mint().await.unwrap_err();
        assert_eq!(err, ErrorKind::ContractCallFailed);
        assert!(!h.coordinator.is_loading(LoadingFlag::General));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_times_out() {
        let h = Harness::new();
        h.transactions.always_pending();
        let err = h.coordinator.await_confirmation("0xabc").await.unwrap_err();
        assert_eq!(classify_error(&err), ErrorKind::NetworkUnreachable);
    }

    #[tokio::test]
    async fn test_rituals_require_connection() {
        let h = Harness::new();
        assert_eq!(h.coordinator.claim().await.unwrap_err(), ErrorKind::ConnectionNotFound);
        assert_eq!(h.coordinator.stake(U256::from(1)).await.unwrap_err(), ErrorKind::ConnectionNotFound);
        assert!(h.transactions.sent().is_empty());
        let view = h.coordinator.view();
        assert_eq!(view.notifications.len(), 2);
        assert!(view
            .notifications
            .iter()
            .all(|n| n.kind == NotificationKind::Error));
    }

    #[tokio::test]
    async fn test_generate_image_lands_in_gallery() {
        let h = Harness::new();
        h.ai.set_image(GeneratedImage {
            mime_type: "image/png".into(),
            bytes: b"hello".to_vec(),
        });

        let item = h.coordinator.generate_image("a robot in a garden").await.unwrap();
        assert_eq!(item.image, "aGVsbG8=");
        assert_eq!(h.coordinator.gallery()[0].id, item.id);
        assert!(h.store.get(crate::constants::GALLERY_STORAGE_KEY).is_some());
        assert!(!h.coordinator.is_loading(LoadingFlag::General));
    }

    #[tokio::test]
    async fn test_generate_image_failure_is_ai_error() {
        let h = Harness::new();
        h.ai.fail("model overloaded");
        let err = h.coordinator.generate_image("anything").await.unwrap_err();
        assert_eq!(err, ErrorKind::AiServiceError);
        assert!(h.coordinator.gallery().is_empty());
        assert!(!h.coordinator.is_loading(LoadingFlag::General));
    }

    #[tokio::test]
    async fn test_consult_oracle_prophecy() {
        let h = Harness::new();
        h.ai.set_text("  The chain remembers.  ");

        let answer = h.coordinator.consult_oracle("Will MCB moon?").await.unwrap();
        assert_eq!(answer, "The chain remembers.");
        assert!(h.ai.last_prompt().unwrap().starts_with(ORACLE_PREAMBLE));

        let view = h.coordinator.view();
        assert_eq!(view.notifications[0].kind, NotificationKind::Prophecy);
        assert!(!view.is_loading(LoadingFlag::OracleConsult));
    }

    #[tokio::test]
    async fn test_scan_gallery_reads_each_token() {
        let h = connected().await;
        let nft = h.coordinator.settings().contracts.nft.clone();
        h.chain.set_call(&nft, Function::BalanceOf(alice()), uint_word(2));
        h.chain.set_call(&nft, Function::TokenOfOwnerByIndex(alice(), U256::ZERO), uint_word(7));
        h.chain.set_call(&nft, Function::TokenOfOwnerByIndex(alice(), U256::from(1)), uint_word(19));

        let ids = h.coordinator.scan_gallery().await.unwrap();
        assert_eq!(ids, vec![U256::from(7), U256::from(19)]);
        assert!(!h.coordinator.is_loading(LoadingFlag::GalleryScan));
    }

    #[tokio::test]
    async fn test_stake_during_slow_receipt_holds_flag() {
        let h = connected().await;
        h.transactions.push_status(TxStatus::Pending);

        tokio::time::pause();
        let stake = {
            let c = h.coordinator.clone();
            tokio::spawn(async move { c.stake(U256::from(1)).await })
        };
        eventually(|| h.transactions.sent().len() == 1).await;
        assert!(h.coordinator.is_loading(LoadingFlag::Staking));
        tokio::time::sleep(Duration::from_secs(10)).await;
        stake.await.unwrap().unwrap();
        assert!(!h.coordinator.is_loading(LoadingFlag::Staking));
    }
}
