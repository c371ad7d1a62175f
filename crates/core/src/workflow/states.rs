use std::fmt;

use serde::{Deserialize, Serialize};

use crate::audit::AuditEntry;
use crate::domain::request::{Request, RequestStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEvent {
    StartProcessing,
    RequestInfo,
    Resume,
    SendForApproval,
    Reject,
    Complete,
    Approve,
    RejectApproval,
    Cancel,
}

impl WorkflowEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartProcessing => "start_processing",
            Self::RequestInfo => "request_info",
            Self::Resume => "resume",
            Self::SendForApproval => "send_for_approval",
            Self::Reject => "reject",
            Self::Complete => "complete",
            Self::Approve => "approve",
            Self::RejectApproval => "reject_approval",
            Self::Cancel => "cancel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "start_processing" => Some(Self::StartProcessing),
            "request_info" => Some(Self::RequestInfo),
            "resume" => Some(Self::Resume),
            "send_for_approval" => Some(Self::SendForApproval),
            "reject" => Some(Self::Reject),
            "complete" => Some(Self::Complete),
            "approve" => Some(Self::Approve),
            "reject_approval" => Some(Self::RejectApproval),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events accepted by the generic status-change entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingEvent {
    StartProcessing,
    RequestInfo,
    Resume,
    SendForApproval,
    Reject,
    Complete,
}

impl ProcessingEvent {
    pub fn parse(value: &str) -> Option<Self> {
        match WorkflowEvent::parse(value)? {
            WorkflowEvent::StartProcessing => Some(Self::StartProcessing),
            WorkflowEvent::RequestInfo => Some(Self::RequestInfo),
            WorkflowEvent::Resume => Some(Self::Resume),
            WorkflowEvent::SendForApproval => Some(Self::SendForApproval),
            WorkflowEvent::Reject => Some(Self::Reject),
            WorkflowEvent::Complete => Some(Self::Complete),
            _ => None,
        }
    }
}

impl From<ProcessingEvent> for WorkflowEvent {
    fn from(value: ProcessingEvent) -> Self {
        match value {
            ProcessingEvent::StartProcessing => Self::StartProcessing,
            ProcessingEvent::RequestInfo => Self::RequestInfo,
            ProcessingEvent::Resume => Self::Resume,
            ProcessingEvent::SendForApproval => Self::SendForApproval,
            ProcessingEvent::Reject => Self::Reject,
            ProcessingEvent::Complete => Self::Complete,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPayload {
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowCommand {
    Process { event: ProcessingEvent, payload: TransitionPayload },
    /// `expected_step` pins the step the approver believes they are acting on.
    Approve { comments: Option<String>, expected_step: Option<u8> },
    RejectApproval { reason: Option<String>, expected_step: Option<u8> },
    Cancel { reason: Option<String> },
}

impl WorkflowCommand {
    pub fn event(&self) -> WorkflowEvent {
        match self {
            Self::Process { event, .. } => (*event).into(),
            Self::Approve { .. } => WorkflowEvent::Approve,
            Self::RejectApproval { .. } => WorkflowEvent::RejectApproval,
            Self::Cancel { .. } => WorkflowEvent::Cancel,
        }
    }

    /// Copy of the command with an unset approval step pinned to `step`.
    pub fn pinned_to_step(&self, step: Option<u8>) -> Self {
        match self {
            Self::Approve { comments, expected_step: None } => {
                Self::Approve { comments: comments.clone(), expected_step: step }
            }
            Self::RejectApproval { reason, expected_step: None } => {
                Self::RejectApproval { reason: reason.clone(), expected_step: step }
            }
            other => other.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransitionOutcome {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub event: WorkflowEvent,
    pub request: Request,
    pub audit: AuditEntry,
}
