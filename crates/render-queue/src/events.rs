//! Queue lifecycle events via a broadcast channel.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use render_queue_models::{EntryId, JobId, Priority, RenderJobStatus};

use crate::error::QueueResult;

/// Something that happened to a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// Entry inserted into the queue
    Enqueued {
        entry_id: EntryId,
        job_id: JobId,
        priority: Priority,
        position: Option<usize>,
    },
    /// Entry took a concurrency slot
    Dispatched { entry_id: EntryId, job_id: JobId },
    /// Render job reached a terminal status
    Finished {
        entry_id: EntryId,
        job_id: JobId,
        status: RenderJobStatus,
    },
    /// Render job exceeded its maximum lifetime
    TimedOut { entry_id: EntryId, job_id: JobId },
    /// Entry dropped because its render job could not be found or read
    Discarded {
        entry_id: EntryId,
        job_id: JobId,
        reason: String,
    },
    /// Entry removed by a caller
    Removed { entry_id: EntryId, job_id: JobId },
    /// Queue emptied by an emergency clear
    Cleared { removed: usize },
    /// Old completion records pruned
    Pruned { removed: usize },
}

impl QueueEvent {
    /// Render job this event refers to, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            QueueEvent::Enqueued { job_id, .. }
            | QueueEvent::Dispatched { job_id, .. }
            | QueueEvent::Finished { job_id, .. }
            | QueueEvent::TimedOut { job_id, .. }
            | QueueEvent::Discarded { job_id, .. }
            | QueueEvent::Removed { job_id, .. } => Some(job_id),
            QueueEvent::Cleared { .. } | QueueEvent::Pruned { .. } => None,
        }
    }

    /// Serialize for forwarding to clients.
    pub fn to_json(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Fan-out channel for queue events.
#[derive(Debug, Clone)]
pub struct EventChannel {
    sender: broadcast::Sender<QueueEvent>,
}

impl EventChannel {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: QueueEvent) {
        trace!(?event, "Publishing queue event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = QueueEvent::Finished {
            entry_id: EntryId::from_string("queue_1"),
            job_id: JobId::from("render-1"),
            status: RenderJobStatus::Completed,
        };
        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "finished");
        assert_eq!(json["job_id"], "render-1");
        assert_eq!(json["status"], "completed");
        assert_eq!(event.job_id(), Some(&JobId::from("render-1")));
        assert_eq!(QueueEvent::Cleared { removed: 2 }.job_id(), None);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let channel = EventChannel::new(4);
        channel.publish(QueueEvent::Pruned { removed: 1 });

        let mut rx = channel.subscribe();
        assert_eq!(channel.subscriber_count(), 1);
        channel.publish(QueueEvent::Cleared { removed: 0 });
        assert_eq!(rx.recv().await.unwrap(), QueueEvent::Cleared { removed: 0 });
    }
}
