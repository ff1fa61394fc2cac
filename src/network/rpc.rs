//! JSON-RPC client over HTTP for chain reads and transactions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::U256;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::abi::{self, ContractCall};
use crate::models::Address;
use crate::network::{create_client, logs};
use crate::ports::{ChainReader, LogFilter, LogSubscription, TransactionClient, TxRequest, TxStatus};
use crate::timeout::with_timeout;

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

impl RpcResponse {
    fn into_result(self, method: &str) -> Result<Value> {
        if let Some(err) = self.error {
            bail!("{} failed: {} (code {})", method, err.message, err.code);
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    ws_url: String,
    read_timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, ws_url: impl Into<String>, read_timeout: Duration) -> Self {
        JsonRpcClient {
            client: create_client(read_timeout),
            url: url.into(),
            ws_url: ws_url.into(),
            read_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Send one request and decode its `result`
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        tracing::debug!(method, id, "RPC request");

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} request to {}", method, self.url))?;
        if !resp.status().is_success() {
            bail!("{} returned HTTP {}", method, resp.status());
        }
        let response: RpcResponse = resp.json().await.context("invalid JSON-RPC response")?;
        let value = response.into_result(method)?;
        serde_json::from_value(value).with_context(|| format!("unexpected {} result", method))
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let quantity: String = self.call("eth_chainId", json!([])).await?;
        u64::try_from(abi::parse_quantity(&quantity)?)
            .map_err(|_| anyhow!("chain id {} does not fit in 64 bits", quantity))
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        let accounts: Vec<String> = self.call("eth_accounts", json!([])).await?;
        accounts.iter().map(|a| a.parse()).collect()
    }
}

/// Map a receipt (or its absence) to a status
fn receipt_status(receipt: &Value) -> TxStatus {
    if receipt.is_null() {
        return TxStatus::Pending;
    }
    match receipt.get("status").and_then(Value::as_str) {
        Some("0x1") => TxStatus::Confirmed,
        Some(_) => TxStatus::Failed,
        // pre-Byzantium receipts carry no status
        None => TxStatus::Confirmed,
    }
}

#[async_trait]
impl ChainReader for JsonRpcClient {
    async fn native_balance(&self, address: &Address) -> Result<U256> {
        let quantity: String = self
            .call("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        abi::parse_quantity(&quantity)
    }

    async fn read_contract(&self, call: &ContractCall) -> Result<Vec<u8>> {
        let data: String = self
            .call(
                "eth_call",
                json!([
                    {
                        "to": call.contract.to_string(),
                        "data": abi::hex_encode(&call.function.encode()),
                    },
                    "latest"
                ]),
            )
            .await?;
        abi::hex_decode(&data)
    }

    async fn subscribe_logs(&self, filter: LogFilter) -> Result<LogSubscription> {
        with_timeout(
            self.read_timeout,
            "eth_subscribe",
            logs::subscribe_logs(&self.ws_url, filter),
        )
        .await
    }
}

#[async_trait]
impl TransactionClient for JsonRpcClient {
    async fn send_transaction(&self, tx: TxRequest) -> Result<String> {
        let hash: String = self
            .call(
                "eth_sendTransaction",
                json!([{
                    "from": tx.from.to_string(),
                    "to": tx.to.to_string(),
                    "data": abi::hex_encode(&tx.data),
                    "value": format!("0x{:x}", tx.value),
                }]),
            )
            .await?;
        if hash.is_empty() {
            return Err(anyhow!("eth_sendTransaction returned no hash"));
        }
        Ok(hash)
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus> {
        let receipt: Value = self
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        Ok(receipt_status(&receipt))
    }
}
