use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::actor::ActorId;
use crate::domain::request::{RequestId, RequestStatus};
use crate::workflow::states::WorkflowEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Created,
    Transitioned(WorkflowEvent),
    CommentAdded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Transitioned(event) => event.as_str(),
            Self::CommentAdded => "comment_added",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub request_id: RequestId,
    pub request_number: String,
    pub kind: NotificationKind,
    pub actor_id: ActorId,
    pub status: RequestStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
}

/// Best-effort delivery of committed changes. Implementations must not block
/// on network I/O; errors are only ever logged by the caller.
pub trait Notifier: Send + Sync {
    fn emit(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn emit(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        info!(
            event_name = "notify.request.event",
            request_id = %event.request_id,
            request_number = %event.request_number,
            kind = event.kind.as_str(),
            actor_id = %event.actor_id,
            status = %event.status,
            "request notification"
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
    failing: bool,
}

impl InMemoryNotifier {
    /// A notifier that records nothing and fails every emit.
    pub fn failing() -> Self {
        Self { events: Arc::default(), failing: true }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for InMemoryNotifier {
    fn emit(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::Transport("in-memory notifier configured to fail".to_owned()));
        }
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{InMemoryNotifier, NotificationEvent, NotificationKind, Notifier};
    use crate::domain::actor::ActorId;
    use crate::domain::request::{RequestId, RequestStatus};
    use crate::workflow::states::WorkflowEvent;

    fn event() -> NotificationEvent {
        NotificationEvent {
            request_id: RequestId("req-1".to_owned()),
            request_number: "REQ-20260302-ABC123".to_owned(),
            kind: NotificationKind::Transitioned(WorkflowEvent::StartProcessing),
            actor_id: ActorId("acct-1".to_owned()),
            status: RequestStatus::InProgress,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn in_memory_notifier_records_events() {
        let notifier = InMemoryNotifier::default();
        notifier.emit(event()).expect("emit");

        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.as_str(), "start_processing");
    }

    #[test]
    fn failing_notifier_reports_transport_error() {
        let notifier = InMemoryNotifier::failing();
        assert!(notifier.emit(event()).is_err());
        assert!(notifier.events().is_empty());
    }
}
