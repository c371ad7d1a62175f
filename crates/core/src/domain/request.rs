use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::actor::ActorId;
use crate::domain::comment::Comment;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Reconciliation,
    Payment,
    Confirmation,
}

impl RequestType {
    pub const ALL: [RequestType; 3] = [Self::Reconciliation, Self::Payment, Self::Confirmation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reconciliation => "reconciliation",
            Self::Payment => "payment",
            Self::Confirmation => "confirmation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reconciliation" => Some(Self::Reconciliation),
            "payment" => Some(Self::Payment),
            "confirmation" => Some(Self::Confirmation),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    NeedsInfo,
    PendingApproval,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::NeedsInfo => "needs_info",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "needs_info" => Some(Self::NeedsInfo),
            "pending_approval" => Some(Self::PendingApproval),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Approval track of a request, frozen at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLevel {
    None,
    ChiefAccountant,
    Executive,
}

impl ApprovalLevel {
    pub fn required_steps(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ChiefAccountant => 1,
            Self::Executive => 2,
        }
    }

    pub fn requires_approval(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ChiefAccountant => "chief_accountant",
            Self::Executive => "executive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "chief_accountant" => Some(Self::ChiefAccountant),
            "executive" => Some(Self::Executive),
            _ => None,
        }
    }
}

/// Caller-supplied fields for a new request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub request_type: Option<RequestType>,
    #[serde(default)]
    pub priority: Priority,
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub request_number: String,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub priority: Priority,
    pub title: String,
    pub description: Option<String>,
    /// Present iff `request_type` is `Payment`.
    pub amount: Option<Decimal>,
    pub approval_level: ApprovalLevel,
    /// `None` until the request is first sent for approval. Never decreases.
    pub current_approval_step: Option<u8>,
    pub requester_id: ActorId,
    pub assignee_id: Option<ActorId>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<Comment>,
}

impl Request {
    pub fn required_steps(&self) -> u8 {
        self.approval_level.required_steps()
    }

    pub fn is_requester(&self, actor_id: &ActorId) -> bool {
        &self.requester_id == actor_id
    }
}
