use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::approvals::{ApprovalThresholds, Capability, PermissionGate};
use crate::audit::{AuditAction, AuditEntry, Decision};
use crate::domain::actor::Actor;
use crate::domain::request::{NewRequest, Request, RequestId, RequestStatus, RequestType};
use crate::errors::WorkflowError;
use crate::sla::SlaPolicy;
use crate::workflow::states::{
    ProcessingEvent, TransitionOutcome, TransitionPayload, WorkflowCommand, WorkflowEvent,
};

/// Pure request lifecycle rules. Never touches storage; every accepted
/// command yields the next request value plus exactly one audit entry.
#[derive(Clone, Debug, Default)]
pub struct RequestMachine {
    thresholds: ApprovalThresholds,
    gate: PermissionGate,
    sla: SlaPolicy,
}

impl RequestMachine {
    pub fn new(thresholds: ApprovalThresholds, gate: PermissionGate, sla: SlaPolicy) -> Self {
        Self { thresholds, gate, sla }
    }

    pub fn thresholds(&self) -> &ApprovalThresholds {
        &self.thresholds
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn sla(&self) -> &SlaPolicy {
        &self.sla
    }

    pub fn open(
        &self,
        requester: &Actor,
        new: NewRequest,
        now: DateTime<Utc>,
    ) -> Result<(Request, AuditEntry), WorkflowError> {
        let request_type = new
            .request_type
            .ok_or_else(|| WorkflowError::validation("request_type", "request type is required"))?;

        match (request_type, new.amount) {
            (RequestType::Payment, None) => {
                return Err(WorkflowError::validation(
                    "amount",
                    "payment requests require an amount",
                ));
            }
            (RequestType::Payment, Some(amount))
                if amount.is_sign_negative() && !amount.is_zero() =>
            {
                return Err(WorkflowError::validation("amount", "amount must not be negative"));
            }
            (RequestType::Reconciliation | RequestType::Confirmation, Some(_)) => {
                return Err(WorkflowError::validation(
                    "amount",
                    "only payment requests carry an amount",
                ));
            }
            _ => {}
        }

        let requirement = self.thresholds.resolve(request_type, new.amount);
        let title = match new.title.trim() {
            "" => format!("{} request", request_type.as_str()),
            title => title.to_owned(),
        };
        let description = new.description.filter(|value| !value.trim().is_empty());

        let request = Request {
            id: RequestId(Uuid::new_v4().to_string()),
            request_number: request_number(now),
            request_type,
            status: RequestStatus::Pending,
            priority: new.priority,
            title,
            description,
            amount: new.amount,
            approval_level: requirement.level,
            current_approval_step: None,
            requester_id: requester.id.clone(),
            assignee_id: None,
            sla_deadline: Some(self.sla.compute_deadline(now, request_type, new.priority)),
            rejection_reason: None,
            cancellation_reason: None,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
            comments: Vec::new(),
        };
        let audit = AuditEntry::new(
            request.id.clone(),
            AuditAction::Created,
            None,
            RequestStatus::Pending,
            requester.id.clone(),
            now,
        );
        Ok((request, audit))
    }

    pub fn apply(
        &self,
        current: &Request,
        actor: &Actor,
        command: &WorkflowCommand,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        let event = command.event();
        if current.status.is_terminal() {
            return Err(invalid(current, event, "request is in a terminal status"));
        }

        let mut next = current.clone();
        let audit = match command {
            WorkflowCommand::Process { event, payload } => {
                self.process(&mut next, actor, *event, payload, now)?
            }
            WorkflowCommand::Approve { comments, expected_step } => {
                let step = self.authorize_approval(current, actor, event, *expected_step)?;
                if step < current.required_steps() {
                    next.current_approval_step = Some(step + 1);
                } else {
                    next.status = RequestStatus::Approved;
                }
                self.audit(current, &next, actor, event, now)
                    .with_step(step, Decision::Approve)
                    .with_comments(comments.clone())
            }
            WorkflowCommand::RejectApproval { reason, expected_step } => {
                let step = self.authorize_approval(current, actor, event, *expected_step)?;
                let reason = required_reason(reason.as_deref())?;
                next.status = RequestStatus::Rejected;
                next.rejection_reason = Some(reason.clone());
                self.audit(current, &next, actor, event, now)
                    .with_step(step, Decision::Reject)
                    .with_comments(Some(reason))
            }
            WorkflowCommand::Cancel { reason } => {
                if !current.is_requester(&actor.id) {
                    return Err(WorkflowError::Permission {
                        actor_id: actor.id.clone(),
                        action: "cancel a request they did not create".to_owned(),
                        required: None,
                    });
                }
                if current.status != RequestStatus::Pending {
                    return Err(invalid(
                        current,
                        event,
                        "requests can only be cancelled before processing starts",
                    ));
                }
                let reason = required_reason(reason.as_deref())?;
                next.status = RequestStatus::Cancelled;
                next.cancellation_reason = Some(reason.clone());
                self.audit(current, &next, actor, event, now).with_comments(Some(reason))
            }
        };

        next.updated_at = now;
        if next.status.is_terminal() {
            next.sla_deadline = None;
        }

        Ok(TransitionOutcome { from: current.status, to: next.status, event, request: next, audit })
    }

    fn process(
        &self,
        next: &mut Request,
        actor: &Actor,
        event: ProcessingEvent,
        payload: &TransitionPayload,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, WorkflowError> {
        use RequestStatus::{
            Approved, Completed, InProgress, NeedsInfo, Pending, PendingApproval, Rejected,
        };

        let attempted = WorkflowEvent::from(event);
        if !self.gate.can_process(&actor.role) {
            return Err(WorkflowError::Permission {
                actor_id: actor.id.clone(),
                action: format!("apply `{attempted}`"),
                required: Some(Capability::ProcessRequests),
            });
        }

        let before = next.clone();
        let mut comments = payload.notes.clone();
        match (before.status, event) {
            (Pending, ProcessingEvent::StartProcessing) => {
                next.status = InProgress;
                next.assignee_id = Some(actor.id.clone());
            }
            (InProgress, ProcessingEvent::RequestInfo) => next.status = NeedsInfo,
            (NeedsInfo, ProcessingEvent::Resume) => next.status = InProgress,
            (InProgress, ProcessingEvent::Reject) => {
                let reason = required_reason(payload.reason.as_deref())?;
                next.status = Rejected;
                next.rejection_reason = Some(reason.clone());
                comments = Some(reason);
            }
            (InProgress, ProcessingEvent::Complete) => {
                if before.approval_level.requires_approval() {
                    let detail = "approval is required before completion";
                    return Err(invalid(&before, attempted, detail));
                }
                next.status = Completed;
            }
            (Approved, ProcessingEvent::Complete) => next.status = Completed,
            (InProgress, ProcessingEvent::SendForApproval) => {
                if !before.approval_level.requires_approval() {
                    return Err(invalid(&before, attempted, "request does not require approval"));
                }
                next.status = PendingApproval;
                next.current_approval_step = Some(1);
            }
            _ => {
                return Err(invalid(&before, attempted, "event is not allowed from this status"));
            }
        }

        Ok(self.audit(&before, next, actor, attempted, now).with_comments(comments))
    }

    /// Returns the step the approver acts at.
    fn authorize_approval(
        &self,
        current: &Request,
        actor: &Actor,
        event: WorkflowEvent,
        expected_step: Option<u8>,
    ) -> Result<u8, WorkflowError> {
        if current.status != RequestStatus::PendingApproval {
            return Err(invalid(current, event, "request is not awaiting approval"));
        }
        let step = current
            .current_approval_step
            .filter(|step| (1..=current.required_steps()).contains(step))
            .ok_or_else(|| invalid(current, event, "approval step is out of range"))?;

        let required = current.required_steps();
        let out_of_route = expected_step.filter(|expected| !(1..=required).contains(expected));
        if let Some(expected) = out_of_route {
            return Err(WorkflowError::validation(
                "expected_step",
                format!("expected step {expected} is outside 1..={required}"),
            ));
        }

        match expected_step {
            Some(expected) if expected < step => {
                return Err(invalid(current, event, "approval step already advanced"));
            }
            Some(expected) if expected > step => {
                return Err(invalid(current, event, "approval step not reached yet"));
            }
            _ => {}
        }

        if !self.gate.can_approve_at_step(&actor.role, current.approval_level, step) {
            return Err(WorkflowError::Permission {
                actor_id: actor.id.clone(),
                action: format!("act on approval step {step}"),
                required: PermissionGate::required_capability_for_step(
                    current.approval_level,
                    step,
                ),
            });
        }
        Ok(step)
    }

    fn audit(
        &self,
        before: &Request,
        after: &Request,
        actor: &Actor,
        event: WorkflowEvent,
        now: DateTime<Utc>,
    ) -> AuditEntry {
        AuditEntry::new(
            before.id.clone(),
            AuditAction::Transition(event),
            Some(before.status),
            after.status,
            actor.id.clone(),
            now,
        )
    }
}

fn invalid(request: &Request, event: WorkflowEvent, detail: &str) -> WorkflowError {
    WorkflowError::InvalidTransition {
        request_id: request.id.clone(),
        status: request.status,
        event,
        detail: detail.to_owned(),
    }
}

fn required_reason(reason: Option<&str>) -> Result<String, WorkflowError> {
    match reason.map(str::trim) {
        Some(reason) if !reason.is_empty() => Ok(reason.to_owned()),
        _ => Err(WorkflowError::validation("reason", "a non-empty reason is required")),
    }
}

/// `REQ-YYYYMMDD-XXXXXX`, the suffix drawn from a fresh UUID.
pub fn request_number(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("REQ-{}-{}", now.format("%Y%m%d"), suffix.to_ascii_uppercase())
}
