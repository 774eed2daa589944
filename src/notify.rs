//! Fire-and-forget outbound notifications.
//!
//! The authorizer enqueues and never awaits: delivery is best-effort,
//! happens on a background worker, and its failures never touch game
//! state.

use async_trait::async_trait;
use derive_more::{Display, Error};
use derive_new::new;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// One outbound message to a party.
#[derive(Debug, Clone, PartialEq, Eq, new, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient identity, as registered at game creation.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
}

/// Delivery failure at the notifier.
#[derive(Debug, Clone, Display, Error)]
#[display("Notification error: {message}")]
pub struct NotifyError {
    /// Error message.
    pub message: String,
}

impl NotifyError {
    /// Creates a new delivery error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outbound delivery collaborator.
///
/// Implementations own the actual channel (mail, webhook, ...); the
/// core only needs this one capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notification.
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Default notifier: logs the message instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            body = %notification.body,
            "Outbound notification"
        );
        Ok(())
    }
}

/// Sender half of the outbound queue.
///
/// Enqueueing is synchronous and infallible from the caller's point of
/// view; a closed queue is logged and dropped.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationQueue {
    /// Creates a queue, returning the sender and the raw receiver.
    ///
    /// Pass the receiver to [`NotificationQueue::spawn_worker`], or
    /// drain it directly in tests.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueues a notification without waiting for delivery.
    #[instrument(skip(self, notification), fields(recipient = %notification.recipient))]
    pub fn enqueue(&self, notification: Notification) {
        debug!(subject = %notification.subject, "Queueing notification");
        if self.tx.send(notification).is_err() {
            warn!("Notification queue closed, message dropped");
        }
    }

    /// Spawns the background worker draining the queue into a notifier.
    ///
    /// Delivery failures are logged and the worker keeps going.
    pub fn spawn_worker(
        mut rx: mpsc::UnboundedReceiver<Notification>,
        notifier: std::sync::Arc<dyn Notifier>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                let recipient = notification.recipient.clone();
                if let Err(e) = notifier.notify(notification).await {
                    warn!(recipient = %recipient, error = %e, "Notification delivery failed");
                }
            }
            debug!("Notification queue drained and closed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_is_sync_and_preserves_order() {
        let (queue, mut rx) = NotificationQueue::channel();
        queue.enqueue(Notification::new(
            "a".to_string(),
            "first".to_string(),
            "".to_string(),
        ));
        queue.enqueue(Notification::new(
            "b".to_string(),
            "second".to_string(),
            "".to_string(),
        ));
        assert_eq!(rx.try_recv().unwrap().subject, "first");
        assert_eq!(rx.try_recv().unwrap().subject, "second");
    }

    #[test]
    fn enqueue_after_receiver_drop_does_not_panic() {
        let (queue, rx) = NotificationQueue::channel();
        drop(rx);
        queue.enqueue(Notification::new(
            "a".to_string(),
            "lost".to_string(),
            "".to_string(),
        ));
    }

    #[tokio::test]
    async fn worker_drains_into_the_notifier() {
        let (queue, rx) = NotificationQueue::channel();
        let handle = NotificationQueue::spawn_worker(rx, std::sync::Arc::new(LogNotifier));
        queue.enqueue(Notification::new(
            "a".to_string(),
            "hello".to_string(),
            "body".to_string(),
        ));
        drop(queue);
        handle.await.unwrap();
    }
}
