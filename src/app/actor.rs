//! Coordinator actor - message loop processing front-end actions and wallet events

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

use crate::app::Coordinator;
use crate::messages::Action;
use crate::ports::WalletEvent;

/// Actor that feeds actions and wallet events into the coordinator
pub struct CoordinatorActor {
    coordinator: Coordinator,
    rituals: JoinSet<()>,
}

impl CoordinatorActor {
    pub fn new(coordinator: Coordinator) -> Self {
        CoordinatorActor {
            coordinator,
            rituals: JoinSet::new(),
        }
    }

    /// Run the actor message loop until `Shutdown` or the action channel closes
    pub async fn run(
        mut self,
        mut action_rx: mpsc::UnboundedReceiver<Action>,
        mut wallet_rx: broadcast::Receiver<WalletEvent>,
    ) {
        // Wallet events are applied one at a time, in order, off the loop
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<WalletEvent>();
        let mut event_tx = Some(event_tx);
        let coordinator = self.coordinator.clone();
        self.rituals.spawn(async move {
            while let Some(event) = event_rx.recv().await {
                coordinator.handle_wallet_event(event).await;
            }
        });

        loop {
            tokio::select! {
                action = action_rx.recv() => {
                    match action {
                        Some(Action::Shutdown) | None => break,
                        Some(action) => self.handle_action(action),
                    }
                }
                event = wallet_rx.recv(), if event_tx.is_some() => {
                    match event {
                        Ok(event) => {
                            if let Some(tx) = &event_tx {
                                let _ = tx.send(event);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Missed wallet events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!("Wallet event stream closed");
                            event_tx = None;
                        }
                    }
                }
                // Clean up finished rituals
                Some(_result) = self.rituals.join_next() => {}
            }
        }

        tracing::info!("Coordinator actor shutting down");
        self.rituals.shutdown().await;
        self.coordinator.disconnect().await;
    }

    /// Start an action. Long-running work goes on the ritual set so wallet
    /// events keep flowing while it runs.
    fn handle_action(&mut self, action: Action) {
        tracing::debug!(action = action.name(), "Action received");
        let coordinator = self.coordinator.clone();

        match action {
            Action::DismissNotification(id) => {
                coordinator.dismiss_notification(&id);
            }
            Action::Connect(connector) => {
                self.rituals.spawn(async move {
                    let _ = coordinator.connect(connector).await;
                });
            }
            Action::Disconnect => {
                self.rituals.spawn(async move { coordinator.disconnect().await });
            }
            Action::RefreshBalances => {
                self.rituals
                    .spawn(async move { coordinator.refresh_balances().await });
            }
            Action::Stake(amount) => {
                self.rituals.spawn(async move {
                    let _ = coordinator.stake(amount).await;
                });
            }
            Action::Claim => {
                self.rituals.spawn(async move {
                    let _ = coordinator.claim().await;
                });
            }
            Action::Mint => {
                self.rituals.spawn(async move {
                    let _ = coordinator.mint().await;
                });
            }
            Action::GenerateImage(prompt) => {
                self.rituals.spawn(async move {
                    let _ = coordinator.generate_image(&prompt).await;
                });
            }
            Action::ConsultOracle(question) => {
                self.rituals.spawn(async move {
                    let _ = coordinator.consult_oracle(&question).await;
                });
            }
            Action::ScanGallery => {
                self.rituals.spawn(async move {
                    if let Ok(ids) = coordinator.scan_gallery().await {
                        coordinator.notify(
                            crate::models::NotificationKind::Info,
                            format!("You own {} MeeBot(s)", ids.len()),
                        );
                    }
                });
            }
            Action::Shutdown => {}
        }
    }
}
