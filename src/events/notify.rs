//! Notification boundary.
//!
//! Delivery (email, chat) lives outside this service. The listener turns
//! time-entry workflow events into [`Notification`]s and hands them to a
//! [`Notifier`]; a failed delivery is logged and never touches the entry.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// An entry is waiting for a decision
    ApprovalRequested { entry_id: Uuid, submitter_id: Uuid },
    /// The entry owner is told about the outcome
    Decided { entry_id: Uuid, owner_id: Uuid, approved: bool },
}

impl Notification {
    /// Maps a bus event to a notification, if it warrants one.
    pub fn from_event(event: &Value) -> Option<Self> {
        let name = event.get("name")?.as_str()?;
        let entry = event.get("payload")?.get("new")?;
        let entry_id = entry.get("id")?.as_str().and_then(|s| Uuid::parse_str(s).ok())?;
        let owner_id = entry.get("user_id")?.as_str().and_then(|s| Uuid::parse_str(s).ok())?;
        let status = entry.get("status").and_then(|s| s.as_str());

        match name {
            // auto-approved submissions carry status "approved" and need no approver
            "time_entry.submitted" if status == Some("submitted") => Some(Notification::ApprovalRequested {
                entry_id,
                submitter_id: owner_id,
            }),
            "time_entry.submitted" | "time_entry.approved" if status == Some("approved") => {
                Some(Notification::Decided { entry_id, owner_id, approved: true })
            }
            "time_entry.rejected" => Some(Notification::Decided { entry_id, owner_id, approved: false }),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Default notifier: records the dispatch in the service log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(?notification, "notification dispatched");
        Ok(())
    }
}

pub async fn start_notification_listener(mut rx: broadcast::Receiver<Value>, notifier: Arc<dyn Notifier>) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification listener lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let Some(notification) = Notification::from_event(&event) else {
            continue;
        };

        if let Err(err) = notifier.notify(&notification).await {
            tracing::warn!(?notification, error = %err, "notification delivery failed");
        }
    }
}
