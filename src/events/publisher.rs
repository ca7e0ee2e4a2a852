//! Change events and fire-and-forget dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::PublishError;

/// Sends encoded payloads to a named broker channel.
///
/// Implementations carry no transactional coupling with the write that
/// triggered the event. An outbox-backed implementation can replace the
/// broker one without touching request handlers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), PublishError>;
}

/// Notification that an entity was created.
///
/// Serialized flat: the entity id next to the caller-supplied fields.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent<T> {
    #[serde(skip)]
    channel: String,

    id: Uuid,

    #[serde(flatten)]
    fields: T,
}

impl<T: Serialize> ChangeEvent<T> {
    pub fn new(channel: impl Into<String>, id: Uuid, fields: T) -> Self {
        Self {
            channel: channel.into(),
            id,
            fields,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn fields(&self) -> &T {
        &self.fields
    }

    /// JSON payload as written to the broker.
    pub fn to_payload(&self) -> Result<Vec<u8>, PublishError> {
        serde_json::to_vec(self).map_err(|e| PublishError::Encode(e.to_string()))
    }
}

/// Publishes change events in the background.
///
/// Each event is published on its own task registered with a
/// [`TaskTracker`], so the caller's response never waits on the broker and
/// shutdown can wait for outstanding publishes. Failures are logged and
/// dropped; nothing is retried.
#[derive(Clone)]
pub struct EventDispatcher {
    publisher: Arc<dyn EventPublisher>,
    tracker: TaskTracker,
}

impl EventDispatcher {
    pub fn new(publisher: Arc<dyn EventPublisher>, tracker: TaskTracker) -> Self {
        Self { publisher, tracker }
    }

    /// Tracker that owns in-flight publishes.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Queue `event` for publication and return immediately.
    pub fn dispatch<T: Serialize>(&self, event: &ChangeEvent<T>) {
        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(channel = event.channel(), id = %event.id(), error = %e, "Dropping change event");
                return;
            }
        };

        let publisher = Arc::clone(&self.publisher);
        let channel = event.channel().to_string();
        let id = event.id();

        self.tracker.spawn(async move {
            match publisher.publish(&channel, &payload).await {
                Ok(()) => debug!(channel = %channel, id = %id, "Change event published"),
                Err(e) => error!(
                    channel = %channel,
                    id = %id,
                    error = %e,
                    "Failed to publish change event"
                ),
            }
        });
    }
}
