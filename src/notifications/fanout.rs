/// Detached notification queue
///
/// `notify` never blocks and never fails from the caller's point of view.
/// A single worker drains the queue into the [`NotificationStore`]; insert
/// failures are logged and counted, then dropped.
use crate::{
    metrics,
    notifications::{NotificationRequest, NotificationStore},
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

enum FanoutMessage {
    Deliver(NotificationRequest),
    Flush(oneshot::Sender<()>),
}

/// Handle to the notification worker
#[derive(Clone)]
pub struct NotificationFanout {
    sender: mpsc::Sender<FanoutMessage>,
}

impl NotificationFanout {
    /// Start the worker. It stops once every handle has been dropped.
    pub fn spawn(store: NotificationStore, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(store, receiver));
        (Self { sender }, worker)
    }

    /// Queue a notification. Self-notifications are skipped here so no
    /// caller has to remember to check.
    pub fn notify(&self, request: NotificationRequest) {
        if request.is_self_notification() {
            tracing::debug!(
                "Skipping {} notification to its own actor {}",
                request.kind.as_str(),
                request.actor_id
            );
            return;
        }

        let kind = request.kind.as_str();
        match self.sender.try_send(FanoutMessage::Deliver(request)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Notification queue full, dropping {} notification", kind);
                metrics::record_notification(kind, "dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Notification worker stopped, dropping {} notification", kind);
                metrics::record_notification(kind, "dropped");
            }
        }
    }

    /// Wait until everything queued before this call has been handled
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(FanoutMessage::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run_worker(store: NotificationStore, mut receiver: mpsc::Receiver<FanoutMessage>) {
    tracing::info!("Notification fan-out worker started");

    while let Some(message) = receiver.recv().await {
        match message {
            FanoutMessage::Deliver(request) => {
                let kind = request.kind.as_str();
                match store.insert(&request).await {
                    Ok(notification) => {
                        tracing::debug!(
                            "Delivered {} notification {} to {}",
                            kind,
                            notification.id,
                            notification.recipient_id
                        );
                        metrics::record_notification(kind, "delivered");
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to deliver {} notification to {}: {}",
                            kind,
                            request.recipient_id,
                            e
                        );
                        metrics::record_notification(kind, "failed");
                    }
                }
            }
            FanoutMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    tracing::info!("Notification fan-out worker stopped");
}
