//! Intent channel
//!
//! In-process stand-in for the message broker: a bounded tokio mpsc channel
//! carrying wire payloads. The publisher half is held by the submitter (and
//! by workers, for redelivery); the receiver half is shared by the consumer
//! workers. Delivery is at-least-once from the consumer's perspective -
//! workers re-publish transiently-failed payloads.

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// Sender side of the intent channel
#[derive(Clone)]
pub struct IntentPublisher {
    tx: mpsc::Sender<String>,
}

impl IntentPublisher {
    /// Publish a wire payload, suspending if the channel is full.
    ///
    /// Errors only when the channel is closed (all receivers dropped).
    pub async fn publish(&self, payload: String) -> Result<(), String> {
        self.tx
            .send(payload)
            .await
            .map_err(|_| "intent channel closed".to_string())
    }

    /// Publish without suspending. Errors when the channel is full or
    /// closed. Consumers that also produce (redelivery) must use this:
    /// suspending on a full queue they are responsible for draining is a
    /// deadlock.
    pub fn try_publish(&self, payload: String) -> Result<(), String> {
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => "intent channel full".to_string(),
            mpsc::error::TrySendError::Closed(_) => "intent channel closed".to_string(),
        })
    }
}

/// Receiver side of the intent channel.
///
/// Cloneable so several workers can pull from the same queue; each payload
/// is delivered to exactly one worker.
#[derive(Clone)]
pub struct IntentReceiver {
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl IntentReceiver {
    /// Receive the next payload, or None when the channel is closed
    pub async fn recv(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }
}

/// Create a new intent channel pair
pub fn intent_channel(buffer: usize) -> (IntentPublisher, IntentReceiver) {
    let (tx, rx) = mpsc::channel(buffer);
    (
        IntentPublisher { tx },
        IntentReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}
