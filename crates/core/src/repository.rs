//! Storage port consumed by the request service.

use async_trait::async_trait;
use thiserror::Error;

use crate::audit::AuditEntry;
use crate::domain::actor::ActorId;
use crate::domain::comment::Comment;
use crate::domain::request::{Request, RequestId, RequestStatus, RequestType};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("duplicate record: {0}")]
    Duplicate(String),
}

/// A request together with the revision it was read at.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRequest {
    pub request: Request,
    pub version: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { version: i64 },
    /// Another writer committed first; nothing was written.
    Conflict,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub requester_id: Option<ActorId>,
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
    pub limit: Option<u32>,
}

impl RequestFilter {
    pub fn matches(&self, request: &Request) -> bool {
        self.requester_id.as_ref().map_or(true, |id| &request.requester_id == id)
            && self.status.map_or(true, |status| request.status == status)
            && self.request_type.map_or(true, |request_type| request.request_type == request_type)
    }
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Loads the request, its comments in creation order, and its version.
    async fn load(&self, id: &RequestId) -> Result<Option<StoredRequest>, StoreError>;

    /// Stores a brand-new request at version 1 together with its creation audit entry.
    async fn insert(&self, request: &Request, audit: &AuditEntry) -> Result<i64, StoreError>;

    /// Writes `request` and appends `audit` atomically, only if the stored
    /// version still equals `expected_version`.
    async fn save_if_version(
        &self,
        request: &Request,
        expected_version: i64,
        audit: &AuditEntry,
    ) -> Result<SaveOutcome, StoreError>;

    async fn append_comment(&self, comment: &Comment) -> Result<(), StoreError>;

    /// Newest first. Comments are not loaded.
    async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError>;

    /// Oldest first.
    async fn audit_trail(&self, id: &RequestId) -> Result<Vec<AuditEntry>, StoreError>;
}
