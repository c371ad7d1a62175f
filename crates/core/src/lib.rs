pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod repository;
pub mod sla;
pub mod workflow;

pub use approvals::{
    ApprovalRequirement, ApprovalThresholds, Capability, CapabilityProvider, CapabilityTable,
    PermissionGate,
};
pub use audit::{AuditAction, AuditEntry, AuditEntryId, Decision};
pub use domain::{
    Actor, ActorId, ApprovalLevel, Comment, CommentId, NewRequest, Priority, Request, RequestId,
    RequestStatus, RequestType, Role,
};
pub use errors::{ApplicationError, ErrorCode, InterfaceError, WorkflowError};
pub use notify::{
    InMemoryNotifier, LogNotifier, NotificationEvent, NotificationKind, Notifier, NotifyError,
};
pub use repository::{RequestFilter, RequestRepository, SaveOutcome, StoreError, StoredRequest};
pub use sla::{SlaPolicy, SlaStatus};
pub use workflow::{
    ListFilter, ProcessingEvent, RequestMachine, RequestService, RequestSummary, RequestView,
    TransitionPayload, WorkflowCommand, WorkflowEvent,
};
