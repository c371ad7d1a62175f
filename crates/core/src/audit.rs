use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::ActorId;
use crate::domain::request::{RequestId, RequestStatus};
use crate::workflow::states::WorkflowEvent;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEntryId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Transition(WorkflowEvent),
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Transition(event) => event.as_str(),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("created") {
            return Some(Self::Created);
        }
        WorkflowEvent::parse(value).map(Self::Transition)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// One immutable record per state change. Approval actions also carry the
/// step they were taken at and the approver's decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub request_id: RequestId,
    pub action: AuditAction,
    pub from_status: Option<RequestStatus>,
    pub to_status: RequestStatus,
    pub step: Option<u8>,
    pub actor_id: ActorId,
    pub decision: Option<Decision>,
    pub comments: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        request_id: RequestId,
        action: AuditAction,
        from_status: Option<RequestStatus>,
        to_status: RequestStatus,
        actor_id: ActorId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditEntryId(Uuid::new_v4().to_string()),
            request_id,
            action,
            from_status,
            to_status,
            step: None,
            actor_id,
            decision: None,
            comments: None,
            occurred_at,
        }
    }

    pub fn with_step(mut self, step: u8, decision: Decision) -> Self {
        self.step = Some(step);
        self.decision = Some(decision);
        self
    }

    pub fn with_comments(mut self, comments: Option<String>) -> Self {
        self.comments = comments.filter(|value| !value.trim().is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{AuditAction, AuditEntry, Decision};
    use crate::domain::actor::ActorId;
    use crate::domain::request::{RequestId, RequestStatus};
    use crate::workflow::states::WorkflowEvent;

    #[test]
    fn approval_entries_record_step_and_decision() {
        let entry = AuditEntry::new(
            RequestId("req-1".to_owned()),
            AuditAction::Transition(WorkflowEvent::Approve),
            Some(RequestStatus::PendingApproval),
            RequestStatus::PendingApproval,
            ActorId("chief-1".to_owned()),
            Utc::now(),
        )
        .with_step(1, Decision::Approve)
        .with_comments(Some("  ".to_owned()));

        assert_eq!(entry.step, Some(1));
        assert_eq!(entry.decision, Some(Decision::Approve));
        assert_eq!(entry.comments, None);
        assert!(!entry.id.0.is_empty());
    }

    #[test]
    fn action_names_parse_back() {
        assert_eq!(AuditAction::parse("created"), Some(AuditAction::Created));
        assert_eq!(
            AuditAction::parse("reject_approval"),
            Some(AuditAction::Transition(WorkflowEvent::RejectApproval))
        );
        assert_eq!(AuditAction::parse("archived"), None);
        assert_eq!(Decision::parse("Reject"), Some(Decision::Reject));
    }
}
