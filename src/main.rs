//! MeeBot console - line-oriented front end for the coordinator
//!
//! Architecture:
//! - Console loop - reads commands from stdin, sends actions
//! - Coordinator actor - runs rituals and follows the wallet
//! - Printer task - renders view changes as they are published

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use meebot_core::abi;
use meebot_core::balances::ChainBalanceSource;
use meebot_core::constants::{AI_REQUEST_TIMEOUT, APP_NAME, APP_VERSION};
use meebot_core::models::{ConnectionStatus, LoadingFlag, NotificationKind};
use meebot_core::network::{HttpAiService, JsonRpcClient, RpcWallet};
use meebot_core::storage::{FileStore, KeyValueStore};
use meebot_core::{
    Action, Collaborators, ConnectorId, Coordinator, CoordinatorActor, CoordinatorView, Settings,
};

const HELP: &str = "\
commands:
  connect [connector]   connect a wallet (injected, walletconnect, coinbase)
  disconnect            end the session
  refresh               re-read balances
  stake <amount>        approve and stake tokens
  claim                 claim staking rewards
  mint                  mint a MeeBot
  image <prompt>        generate an image into the gallery
  oracle <question>     consult the oracle
  gallery               list owned MeeBots and generated images
  status                print the current state
  quit                  exit";

/// Parsed console input
#[derive(Debug, PartialEq)]
enum Command {
    Send(Action),
    Status,
    Gallery,
    Help,
    Quit,
}

fn parse_command(line: &str, token_decimals: u8) -> Result<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let command = match word.to_ascii_lowercase().as_str() {
        "connect" => {
            let connector = if rest.is_empty() {
                ConnectorId::Injected
            } else {
                rest.parse().unwrap_or(ConnectorId::Injected)
            };
            Command::Send(Action::Connect(connector))
        }
        "disconnect" => Command::Send(Action::Disconnect),
        "refresh" => Command::Send(Action::RefreshBalances),
        "stake" => Command::Send(Action::Stake(abi::parse_units(rest, token_decimals)?)),
        "claim" => Command::Send(Action::Claim),
        "mint" => Command::Send(Action::Mint),
        "image" if !rest.is_empty() => Command::Send(Action::GenerateImage(rest.to_string())),
        "oracle" if !rest.is_empty() => Command::Send(Action::ConsultOracle(rest.to_string())),
        "image" | "oracle" => bail!("{} needs some text", word),
        "gallery" => Command::Gallery,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => bail!("unknown command: {}", other),
    };
    Ok(command)
}

fn status_line(view: &CoordinatorView, symbol: &str) -> String {
    let session = match (view.status, &view.session.connected_address) {
        (ConnectionStatus::Connecting, _) => "connecting…".to_string(),
        (ConnectionStatus::Connected, Some(address)) => format!(
            "{} on chain {}",
            address.short(),
            view.session.chain_id.unwrap_or_default()
        ),
        _ => "not connected".to_string(),
    };
    let busy: Vec<String> = LoadingFlag::ALL
        .iter()
        .filter(|f| view.is_loading(**f))
        .map(|f| format!("{:?}", f))
        .collect();

    let b = &view.balances;
    let mut line = format!(
        "[{}] ETH {} | {} {} | MeeBots {} | reward rate {}",
        session, b.native_balance, symbol, b.fungible_token_balance, b.nft_count, b.staking_reward_rate
    );
    if !busy.is_empty() {
        line.push_str(&format!(" | busy: {}", busy.join(", ")));
    }
    line
}

fn notification_prefix(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Success => "✔",
        NotificationKind::Error => "✖",
        NotificationKind::Info => "•",
        NotificationKind::Prophecy => "☽",
    }
}

/// Print new notifications and status changes as the view moves
async fn print_changes(mut view_rx: watch::Receiver<CoordinatorView>, symbol: String) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut last_status = String::new();

    while view_rx.changed().await.is_ok() {
        let view = view_rx.borrow_and_update().clone();

        for notification in &view.notifications {
            if seen.insert(notification.id.clone()) {
                println!("{} {}", notification_prefix(notification.kind), notification.message);
            }
        }
        seen.retain(|id| view.notifications.iter().any(|n| &n.id == id));

        let status = status_line(&view, &symbol);
        if status != last_status {
            println!("{}", status);
            last_status = status;
        }
    }
}

fn build_coordinator(settings: Settings) -> Coordinator {
    let rpc = Arc::new(JsonRpcClient::new(
        settings.rpc_url.clone(),
        settings.ws_url.clone(),
        settings.read_timeout(),
    ));
    let balances = Arc::new(ChainBalanceSource::new(
        rpc.clone(),
        settings.contracts.clone(),
        settings.token_decimals,
        settings.read_timeout(),
    ));
    let ai = Arc::new(HttpAiService::new(
        settings.ai_url.clone(),
        settings.ai_api_key.clone(),
        AI_REQUEST_TIMEOUT,
    ));
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new());

    let services = Collaborators {
        wallet: Arc::new(RpcWallet::new(rpc.clone())),
        chain: rpc.clone(),
        transactions: rpc,
        ai,
        balances,
        store,
    };
    Coordinator::new(services, settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to file
    let file_appender = tracing_appender::rolling::never(".", "meebot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let settings = Settings::load()?;
    tracing::info!(rpc = %settings.rpc_url, chain_id = settings.chain_id, "Starting {} {}", APP_NAME, APP_VERSION);
    let token_decimals = settings.token_decimals;
    let symbol = settings.token_symbol.clone();

    let coordinator = build_coordinator(settings);

    // Spawn coordinator actor
    let (action_tx, action_rx) = mpsc::unbounded_channel::<Action>();
    let actor = CoordinatorActor::new(coordinator.clone());
    let actor_handle = tokio::spawn(actor.run(action_rx, coordinator.wallet_events()));

    tokio::spawn(print_changes(coordinator.subscribe(), symbol.clone()));

    println!("{} {} - type 'help' for commands", APP_NAME, APP_VERSION);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line, token_decimals) {
            Ok(Command::Send(action)) => {
                if action_tx.send(action).is_err() {
                    break;
                }
            }
            Ok(Command::Status) => println!("{}", status_line(&coordinator.view(), &symbol)),
            Ok(Command::Gallery) => {
                for item in coordinator.gallery() {
                    println!("  {} {} ({})", item.id, item.prompt, item.created_at.format("%Y-%m-%d %H:%M"));
                }
                let _ = action_tx.send(Action::ScanGallery);
            }
            Ok(Command::Help) => println!("{}", HELP),
            Ok(Command::Quit) => break,
            Err(e) => println!("{}", e),
        }
    }

    let _ = action_tx.send(Action::Shutdown);
    actor_handle.await?;
    Ok(())
}
