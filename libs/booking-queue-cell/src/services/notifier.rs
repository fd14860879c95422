use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use appointment_cell::{Appointment, ScopeKey};

use crate::BookingQueueError;

pub type QueueEventSender = broadcast::Sender<String>;
pub type QueueEventReceiver = broadcast::Receiver<String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    AppointmentCreated { appointment: Appointment },
    StatusChanged { appointment: Appointment },
    AppointmentDeleted { appointment_id: Uuid, scope: ScopeKey },
}

impl QueueEvent {
    pub fn scope(&self) -> ScopeKey {
        match self {
            QueueEvent::AppointmentCreated { appointment } | QueueEvent::StatusChanged { appointment } => {
                appointment.scope()
            }
            QueueEvent::AppointmentDeleted { scope, .. } => scope.clone(),
        }
    }
}

/// Told about committed queue changes after the fact. Delivery is best effort and a
/// failure never undoes the change.
#[async_trait]
pub trait QueueNotifier: Send + Sync {
    async fn notify(&self, event: QueueEvent) -> Result<(), BookingQueueError>;
}

/// Fans events out over tokio broadcast channels: one per scope for waiting-room
/// displays, plus a global feed for monitoring.
pub struct BroadcastNotifier {
    channels: Arc<RwLock<HashMap<ScopeKey, QueueEventSender>>>,
    global_sender: QueueEventSender,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (global_sender, _) = broadcast::channel(1000);

        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            global_sender,
        }
    }

    pub async fn subscribe(&self, scope: &ScopeKey) -> QueueEventReceiver {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(scope.clone())
            .or_insert_with(|| broadcast::channel(100).0);

        debug!("Subscribed to queue events for {}", scope);
        sender.subscribe()
    }

    pub fn subscribe_global(&self) -> QueueEventReceiver {
        self.global_sender.subscribe()
    }

    pub async fn remove_channel(&self, scope: &ScopeKey) {
        self.channels.write().await.remove(scope);
        debug!("Removed queue channel for {}", scope);
    }

    pub async fn get_active_channels(&self) -> Vec<ScopeKey> {
        self.channels.read().await.keys().cloned().collect()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for BroadcastNotifier {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            global_sender: self.global_sender.clone(),
        }
    }
}

#[async_trait]
impl QueueNotifier for BroadcastNotifier {
    async fn notify(&self, event: QueueEvent) -> Result<(), BookingQueueError> {
        let scope = event.scope();
        let message = serde_json::to_string(&event)?;

        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(&scope) {
                // No receivers left is not an error for a display feed.
                if sender.send(message).is_err() {
                    debug!("No listeners on {}", scope);
                }
            }
        }

        let global_message = serde_json::json!({
            "type": "queue_event",
            "scope": scope.to_string(),
            "timestamp": Utc::now().to_rfc3339(),
            "data": event
        })
        .to_string();

        if self.global_sender.send(global_message).is_err() {
            debug!("No listeners on the global queue feed");
        }

        Ok(())
    }
}
