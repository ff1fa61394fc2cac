//! Contract log subscriptions over a JSON-RPC WebSocket
//!
//! Each subscription owns one socket. The reader task forwards matching
//! notifications until the [`LogSubscription`] is dropped, then sends
//! `eth_unsubscribe` and closes the socket.

use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::abi;
use crate::ports::{ContractLog, LogFilter, LogSubscription};

const SUBSCRIBE_ID: u64 = 1;
const UNSUBSCRIBE_ID: u64 = 2;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    address: String,
    topics: Vec<String>,
    data: String,
    #[serde(default)]
    transaction_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotificationParams {
    subscription: String,
    result: RawLog,
}

#[derive(Debug, Deserialize)]
struct Notification {
    method: String,
    params: NotificationParams,
}

/// `eth_subscribe` parameters for `filter`
fn subscribe_request(filter: &LogFilter) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": SUBSCRIBE_ID,
        "method": "eth_subscribe",
        "params": ["logs", {
            "address": filter.contract.to_string(),
            "topics": filter.topics,
        }],
    })
}

/// Subscription id from the reply to our `eth_subscribe`, if `text` is that reply
fn subscription_id(text: &str) -> Option<Result<String>> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("id").and_then(Value::as_u64) != Some(SUBSCRIBE_ID) {
        return None;
    }
    if let Some(err) = value.get("error") {
        let message = err.get("message").and_then(Value::as_str).unwrap_or("unknown error");
        return Some(Err(anyhow!("eth_subscribe failed: {}", message)));
    }
    Some(
        value
            .get("result")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("eth_subscribe returned no subscription id")),
    )
}

/// Decode a log notification for subscription `id`
fn parse_notification(text: &str, id: &str) -> Option<ContractLog> {
    let notification: Notification = serde_json::from_str(text).ok()?;
    if notification.method != "eth_subscription" || notification.params.subscription != id {
        return None;
    }
    let raw = notification.params.result;
    let log = ContractLog {
        address: raw.address.parse().ok()?,
        topics: raw.topics,
        data: abi::hex_decode(&raw.data).ok()?,
        tx_hash: raw.transaction_hash.unwrap_or_default(),
    };
    Some(log)
}

/// Open a socket to `url` and subscribe to logs matching `filter`
pub async fn subscribe_logs(url: &str, filter: LogFilter) -> Result<LogSubscription> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| anyhow!("Connection failed: {}", e))?;
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(subscribe_request(&filter).to_string()))
        .await?;

    let id = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some(id) = subscription_id(&text) {
                    break id?;
                }
            }
            Some(Ok(Message::Close(_))) | None => bail!("connection closed before subscribing"),
            Some(Ok(_)) => {}
            Some(Err(e)) => bail!("Receive error: {}", e),
        }
    };
    tracing::debug!(subscription = %id, contract = %filter.contract, "Log subscription open");

    let (logs_tx, logs_rx) = mpsc::unbounded_channel();
    let (release_tx, mut release_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                // Subscriber went away
                _ = &mut release_rx => {
                    let unsubscribe = json!({
                        "jsonrpc": "2.0",
                        "id": UNSUBSCRIBE_ID,
                        "method": "eth_unsubscribe",
                        "params": [id],
                    });
                    let _ = write.send(Message::Text(unsubscribe.to_string())).await;
                    let _ = write.close().await;
                    tracing::debug!(subscription = %id, "Log subscription released");
                    return;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(log) = parse_notification(&text, &id) {
                                let _ = logs_tx.send(log);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::warn!(subscription = %id, "Log subscription closed by node");
                            return;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(subscription = %id, error = %e, "Log subscription failed");
                            return;
                        }
                    }
                }
            }
        }
    });

    Ok(LogSubscription::new(logs_rx, release_tx))
}
