use thiserror::Error;

use crate::approvals::Capability;
use crate::domain::actor::ActorId;
use crate::domain::request::{RequestId, RequestStatus};
use crate::repository::StoreError;
use crate::workflow::states::WorkflowEvent;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("invalid `{field}`: {message}")]
    Validation { field: &'static str, message: String },
    #[error("cannot apply `{event}` to request {request_id} in status `{status}`: {detail}")]
    InvalidTransition {
        request_id: RequestId,
        status: RequestStatus,
        event: WorkflowEvent,
        detail: String,
    },
    /// Carries no request state so unauthorized callers learn nothing new.
    #[error("actor {actor_id} is not permitted to {action}")]
    Permission { actor_id: ActorId, action: String, required: Option<Capability> },
    #[error("request {request_id} was modified concurrently")]
    ConcurrencyConflict { request_id: RequestId },
    #[error("request {0} not found")]
    NotFound(RequestId),
}

impl WorkflowError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Permission { .. } => "permission",
            Self::ConcurrencyConflict { .. } => "concurrency_conflict",
            Self::NotFound(_) => "not_found",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    Validation,
    InvalidTransition,
    PermissionDenied,
    ConcurrencyConflict,
    NotFound,
    ServiceUnavailable,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::InvalidTransition => "invalid_transition",
            Self::PermissionDenied => "permission_denied",
            Self::ConcurrencyConflict => "concurrency_conflict",
            Self::NotFound => "not_found",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Internal => "internal_error",
        }
    }
}

/// Error as shown to API and CLI callers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{}: {message}", code.as_str())]
pub struct InterfaceError {
    pub code: ErrorCode,
    pub message: String,
    pub correlation_id: String,
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self.code {
            ErrorCode::Validation => {
                "The request could not be processed. Check inputs and try again."
            }
            ErrorCode::InvalidTransition => {
                "The request is not in a state that allows this action."
            }
            ErrorCode::PermissionDenied => "You are not allowed to perform this action.",
            ErrorCode::ConcurrencyConflict => {
                "The request was changed by someone else. Reload and try again."
            }
            ErrorCode::NotFound => "The request does not exist.",
            ErrorCode::ServiceUnavailable => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            ErrorCode::Internal => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let mut mapped = InterfaceError::from(self);
        mapped.correlation_id = correlation_id.into();
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let (code, message) = match value {
            ApplicationError::Workflow(error) => {
                let code = match &error {
                    WorkflowError::Validation { .. } => ErrorCode::Validation,
                    WorkflowError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
                    WorkflowError::Permission { .. } => ErrorCode::PermissionDenied,
                    WorkflowError::ConcurrencyConflict { .. } => ErrorCode::ConcurrencyConflict,
                    WorkflowError::NotFound(_) => ErrorCode::NotFound,
                };
                (code, error.to_string())
            }
            ApplicationError::Persistence(message) => (ErrorCode::ServiceUnavailable, message),
            ApplicationError::Configuration(message) => (ErrorCode::Internal, message),
        };
        Self { code, message, correlation_id: "unassigned".to_owned() }
    }
}
