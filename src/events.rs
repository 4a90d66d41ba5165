//! Event topics (spec §4.10): a `tokio::sync::broadcast` channel per topic, so the
//! Control API, health manager and a future UI can each subscribe independently.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct ConfigUpdatedEvent {
    pub version_id: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateFailedEvent {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSwitchedEvent {
    pub group_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatusChangedEvent {
    pub provider: String,
    pub status: crate::config::types::ProviderStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollbackCompletedEvent {
    pub version_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub message: String,
}

/// One broadcast sender per topic named in spec §4.10. Cloning an `EventBus` clones
/// the senders, not the channels, so all clones publish to the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    pub config_updated: broadcast::Sender<ConfigUpdatedEvent>,
    pub update_failed: broadcast::Sender<UpdateFailedEvent>,
    pub group_switched: broadcast::Sender<GroupSwitchedEvent>,
    pub health_status_changed: broadcast::Sender<HealthStatusChangedEvent>,
    pub rollback_completed: broadcast::Sender<RollbackCompletedEvent>,
    pub error: broadcast::Sender<ErrorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            config_updated: broadcast::channel(CHANNEL_CAPACITY).0,
            update_failed: broadcast::channel(CHANNEL_CAPACITY).0,
            group_switched: broadcast::channel(CHANNEL_CAPACITY).0,
            health_status_changed: broadcast::channel(CHANNEL_CAPACITY).0,
            rollback_completed: broadcast::channel(CHANNEL_CAPACITY).0,
            error: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    /// Publish `message` on `error`, swallowing the "no subscribers" case — nobody
    /// listening is not itself an error.
    pub fn emit_error(&self, message: impl Into<String>) {
        let _ = self.error.send(ErrorEvent {
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
