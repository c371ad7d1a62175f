use std::collections::HashMap;

use tokio::sync::RwLock;

use opsdesk_core::audit::AuditEntry;
use opsdesk_core::domain::{Comment, Request, RequestId};
use opsdesk_core::repository::{
    RequestFilter, RequestRepository, SaveOutcome, StoreError, StoredRequest,
};

#[derive(Default)]
struct State {
    requests: HashMap<String, StoredRequest>,
    comments: HashMap<String, Vec<Comment>>,
    audit: HashMap<String, Vec<AuditEntry>>,
    /// Insertion order, used to break `created_at` ties when listing.
    order: Vec<String>,
}

/// Process-local store. One lock covers every map so a save and its audit
/// entry become visible together.
#[derive(Default)]
pub struct InMemoryRequestRepository {
    state: RwLock<State>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn load(&self, id: &RequestId) -> Result<Option<StoredRequest>, StoreError> {
        let state = self.state.read().await;
        Ok(state.requests.get(&id.0).map(|stored| {
            let mut stored = stored.clone();
            stored.request.comments = state.comments.get(&id.0).cloned().unwrap_or_default();
            stored
        }))
    }

    async fn insert(&self, request: &Request, audit: &AuditEntry) -> Result<i64, StoreError> {
        let mut state = self.state.write().await;
        if state.requests.contains_key(&request.id.0) {
            return Err(StoreError::Duplicate(format!("request {}", request.id)));
        }
        if state
            .requests
            .values()
            .any(|stored| stored.request.request_number == request.request_number)
        {
            return Err(StoreError::Duplicate(format!("request number {}", request.request_number)));
        }

        let mut request = request.clone();
        request.comments.clear();
        state.order.push(request.id.0.clone());
        state.audit.entry(request.id.0.clone()).or_default().push(audit.clone());
        state.requests.insert(request.id.0.clone(), StoredRequest { request, version: 1 });
        Ok(1)
    }

    async fn save_if_version(
        &self,
        request: &Request,
        expected_version: i64,
        audit: &AuditEntry,
    ) -> Result<SaveOutcome, StoreError> {
        let mut state = self.state.write().await;
        let Some(stored) = state.requests.get_mut(&request.id.0) else {
            return Ok(SaveOutcome::Conflict);
        };
        if stored.version != expected_version {
            return Ok(SaveOutcome::Conflict);
        }

        let version = stored.version + 1;
        let mut next = request.clone();
        next.comments.clear();
        *stored = StoredRequest { request: next, version };
        state.audit.entry(request.id.0.clone()).or_default().push(audit.clone());
        Ok(SaveOutcome::Saved { version })
    }

    async fn append_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.requests.contains_key(&comment.request_id.0) {
            return Err(StoreError::Backend(format!(
                "comment references unknown request {}",
                comment.request_id
            )));
        }
        state.comments.entry(comment.request_id.0.clone()).or_default().push(comment.clone());
        Ok(())
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        let state = self.state.read().await;
        let mut matched: Vec<(usize, &Request)> = state
            .order
            .iter()
            .enumerate()
            .filter_map(|(position, id)| {
                state.requests.get(id).map(|stored| (position, &stored.request))
            })
            .filter(|(_, request)| filter.matches(request))
            .collect();
        matched.sort_by(|(left_pos, left), (right_pos, right)| {
            right.created_at.cmp(&left.created_at).then(right_pos.cmp(left_pos))
        });

        let limit = filter.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(matched.into_iter().take(limit).map(|(_, request)| request.clone()).collect())
    }

    async fn audit_trail(&self, id: &RequestId) -> Result<Vec<AuditEntry>, StoreError> {
        let state = self.state.read().await;
        let mut entries = state.audit.get(&id.0).cloned().unwrap_or_default();
        // Stable sort keeps append order for equal timestamps.
        entries.sort_by_key(|entry| entry.occurred_at);
        Ok(entries)
    }
}
