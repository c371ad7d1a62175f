//! JSON routes over [`RequestService`].
//!
//! - `POST /api/v1/requests`                        create a request
//! - `GET  /api/v1/requests`                        list visible requests
//! - `GET  /api/v1/requests/{id}`                   fetch one request
//! - `POST /api/v1/requests/{id}/transitions`       processing events
//! - `POST /api/v1/requests/{id}/approve`           approve the current step
//! - `POST /api/v1/requests/{id}/reject-approval`   reject at the current step
//! - `POST /api/v1/requests/{id}/cancel`            requester cancellation
//! - `POST /api/v1/requests/{id}/comments`          add a comment
//! - `GET  /api/v1/requests/{id}/audit`             audit trail (staff only)
//!
//! Callers are identified by the `x-actor-id` and `x-actor-role` headers set
//! by the upstream authentication layer.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use opsdesk_core::audit::AuditEntry;
use opsdesk_core::domain::{Actor, Comment, NewRequest, RequestId, RequestStatus, RequestType};
use opsdesk_core::errors::{ApplicationError, ErrorCode, InterfaceError, WorkflowError};
use opsdesk_core::workflow::{
    ListFilter, ProcessingEvent, RequestService, RequestSummary, RequestView, TransitionPayload,
};

const ACTOR_ID_HEADER: &str = "x-actor-id";
const ACTOR_ROLE_HEADER: &str = "x-actor-role";
const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    service: Arc<RequestService>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn unauthenticated(correlation_id: String) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorBody {
                code: "unauthenticated".to_string(),
                message: format!(
                    "`{ACTOR_ID_HEADER}` and `{ACTOR_ROLE_HEADER}` headers are required"
                ),
                correlation_id,
            },
        }
    }

    fn validation(correlation_id: String, message: impl Into<String>) -> Self {
        Self::from(InterfaceError {
            code: ErrorCode::Validation,
            message: message.into(),
            correlation_id,
        })
    }

    fn from_application(error: ApplicationError, correlation_id: String) -> Self {
        Self::from(error.into_interface(correlation_id))
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::InvalidTransition => StatusCode::CONFLICT,
        ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorCode::ConcurrencyConflict => StatusCode::CONFLICT,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<InterfaceError> for ApiError {
    fn from(error: InterfaceError) -> Self {
        let status = status_for(error.code);
        // Backend detail stays in the logs.
        let message = match error.code {
            ErrorCode::ServiceUnavailable | ErrorCode::Internal => {
                error!(
                    event_name = "api.request.failed",
                    correlation_id = %error.correlation_id,
                    code = error.code.as_str(),
                    error = %error.message,
                    "request failed"
                );
                error.user_message().to_string()
            }
            _ => error.message,
        };
        Self {
            status,
            body: ErrorBody {
                code: error.code.as_str().to_string(),
                message,
                correlation_id: error.correlation_id,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub event: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    pub comments: Option<String>,
    pub expected_step: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectApprovalBody {
    pub reason: Option<String>,
    pub expected_step: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub content: String,
    #[serde(default)]
    pub is_internal: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub request_type: Option<String>,
    pub limit: Option<u32>,
}

pub fn router(service: Arc<RequestService>) -> Router {
    Router::new()
        .route("/api/v1/requests", post(create_request).get(list_requests))
        .route("/api/v1/requests/{id}", get(get_request))
        .route("/api/v1/requests/{id}/transitions", post(change_status))
        .route("/api/v1/requests/{id}/approve", post(approve))
        .route("/api/v1/requests/{id}/reject-approval", post(reject_approval))
        .route("/api/v1/requests/{id}/cancel", post(cancel))
        .route("/api/v1/requests/{id}/comments", post(add_comment))
        .route("/api/v1/requests/{id}/audit", get(audit_trail))
        .with_state(ApiState { service })
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Resolves the caller and a correlation id for the request.
fn caller(headers: &HeaderMap) -> ApiResult<(Actor, String)> {
    let correlation_id = correlation_id(headers);
    match (header_value(headers, ACTOR_ID_HEADER), header_value(headers, ACTOR_ROLE_HEADER)) {
        (Some(id), Some(role)) => Ok((Actor::new(id, role), correlation_id)),
        _ => {
            warn!(
                event_name = "api.request.unauthenticated",
                correlation_id = %correlation_id,
                "missing actor headers"
            );
            Err(ApiError::unauthenticated(correlation_id))
        }
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>, correlation_id: &str) -> ApiResult<T> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        ApiError::validation(correlation_id.to_string(), rejection.body_text())
    })
}

/// Like [`body`], for routes whose fields are all optional: an empty body
/// reads as the defaults.
fn optional_body<T>(payload: Result<Bytes, BytesRejection>, correlation_id: &str) -> ApiResult<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = payload.map_err(|rejection| {
        ApiError::validation(correlation_id.to_string(), rejection.body_text())
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|error| {
        ApiError::validation(correlation_id.to_string(), format!("invalid JSON body: {error}"))
    })
}

async fn create_request(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<NewRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RequestView>)> {
    let (actor, correlation_id) = caller(&headers)?;
    let new = body(payload, &correlation_id)?;
    let view = state
        .service
        .create_request(&actor, new)
        .await
        .map_err(|error| ApiError::from_application(error, correlation_id))?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_requests(
    State(state): State<ApiState>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<RequestSummary>>> {
    let (actor, correlation_id) = caller(&headers)?;
    let Query(query) = query.map_err(|rejection| {
        ApiError::validation(correlation_id.clone(), rejection.body_text())
    })?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(RequestStatus::parse(raw).ok_or_else(|| {
            ApiError::validation(correlation_id.clone(), format!("unknown status `{raw}`"))
        })?),
        None => None,
    };
    let request_type = match query.request_type.as_deref() {
        Some(raw) => Some(RequestType::parse(raw).ok_or_else(|| {
            ApiError::validation(correlation_id.clone(), format!("unknown request type `{raw}`"))
        })?),
        None => None,
    };

    let summaries = state
        .service
        .list_requests(&actor, ListFilter { status, request_type, limit: query.limit })
        .await
        .map_err(|error| ApiError::from_application(error, correlation_id))?;
    Ok(Json(summaries))
}

async fn get_request(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<RequestView>> {
    let (actor, correlation_id) = caller(&headers)?;
    state
        .service
        .get_request(&RequestId(id), &actor)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, correlation_id))
}

async fn change_status(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<TransitionBody>, JsonRejection>,
) -> ApiResult<Json<RequestView>> {
    let (actor, correlation_id) = caller(&headers)?;
    let request = body(payload, &correlation_id)?;
    let Some(event) = ProcessingEvent::parse(&request.event) else {
        let error =
            WorkflowError::validation("event", format!("unsupported event `{}`", request.event));
        return Err(ApiError::from_application(error.into(), correlation_id));
    };

    state
        .service
        .change_status(
            &RequestId(id),
            &actor,
            event,
            TransitionPayload { reason: request.reason, notes: request.notes },
        )
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, correlation_id))
}

async fn approve(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<RequestView>> {
    let (actor, correlation_id) = caller(&headers)?;
    let request: ApproveBody = optional_body(payload, &correlation_id)?;
    state
        .service
        .approve(&RequestId(id), &actor, request.comments, request.expected_step)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, correlation_id))
}

async fn reject_approval(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<RejectApprovalBody>, JsonRejection>,
) -> ApiResult<Json<RequestView>> {
    let (actor, correlation_id) = caller(&headers)?;
    let request = body(payload, &correlation_id)?;
    state
        .service
        .reject_approval(&RequestId(id), &actor, request.reason, request.expected_step)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, correlation_id))
}

async fn cancel(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<CancelBody>, JsonRejection>,
) -> ApiResult<Json<RequestView>> {
    let (actor, correlation_id) = caller(&headers)?;
    let request = body(payload, &correlation_id)?;
    state
        .service
        .cancel(&RequestId(id), &actor, request.reason)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, correlation_id))
}

async fn add_comment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<CommentBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let (actor, correlation_id) = caller(&headers)?;
    let request = body(payload, &correlation_id)?;
    let comment = state
        .service
        .add_comment(&RequestId(id), &actor, &request.content, request.is_internal)
        .await
        .map_err(|error| ApiError::from_application(error, correlation_id))?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn audit_trail(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let (actor, correlation_id) = caller(&headers)?;
    state
        .service
        .audit_trail(&RequestId(id), &actor)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, correlation_id))
}
