use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::jobs::{JobKind, JobRecord, JobStatus, Outcome};

/// Lifecycle change pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl LifecycleEvent {
    pub fn from_record(record: &JobRecord) -> Self {
        Self {
            job_id: record.id,
            kind: record.kind,
            status: record.status,
            timestamp: record.updated_at,
            outcome: record.outcome.clone(),
        }
    }
}

/// Fire-and-forget publish. Delivery failures never reach the publisher.
pub trait Notifier: Send + Sync {
    fn publish(&self, event: LifecycleEvent);
}

/// Fans events out over a `tokio::sync::broadcast` channel.
///
/// Publishing with no subscribers is fine; slow subscribers lag and drop
/// the oldest events rather than blocking publishers.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, event: LifecycleEvent) {
        let job_id = event.job_id;
        if self.tx.send(event).is_err() {
            tracing::trace!(job_id = %job_id, "No event subscribers");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn publish(&self, _event: LifecycleEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: JobStatus) -> LifecycleEvent {
        LifecycleEvent {
            job_id: Uuid::new_v4(),
            kind: JobKind::Xss,
            status,
            timestamp: Utc::now(),
            outcome: None,
        }
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let notifier = BroadcastNotifier::new(4);
        assert_eq!(notifier.subscriber_count(), 0);
        notifier.publish(event(JobStatus::Running));
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let notifier = BroadcastNotifier::new(4);
        let mut rx = notifier.subscribe();

        notifier.publish(event(JobStatus::Running));
        notifier.publish(event(JobStatus::Completed));

        assert_eq!(rx.recv().await.unwrap().status, JobStatus::Running);
        assert_eq!(rx.recv().await.unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn event_serializes_camel_case() {
        let json = serde_json::to_value(event(JobStatus::Failed)).unwrap();
        assert!(json.get("jobId").is_some());
        assert_eq!(json["status"], "FAILED");
        assert!(json.get("outcome").is_none());
    }
}
