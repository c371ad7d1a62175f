use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::approvals::Capability;
use crate::audit::AuditEntry;
use crate::domain::actor::{Actor, ActorId};
use crate::domain::comment::{Comment, CommentId};
use crate::domain::request::{
    ApprovalLevel, NewRequest, Priority, Request, RequestId, RequestStatus, RequestType,
};
use crate::errors::{ApplicationError, WorkflowError};
use crate::notify::{NotificationEvent, NotificationKind, Notifier};
use crate::repository::{
    RequestFilter, RequestRepository, SaveOutcome, StoreError, StoredRequest,
};
use crate::sla::SlaStatus;
use crate::workflow::machine::{request_number, RequestMachine};
use crate::workflow::states::{ProcessingEvent, TransitionPayload, WorkflowCommand};

/// Full request as seen by one actor, with read-time derived fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: Request,
    pub required_steps: u8,
    pub sla_status: SlaStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestSummary {
    pub id: RequestId,
    pub request_number: String,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub priority: Priority,
    pub title: String,
    pub amount: Option<Decimal>,
    pub approval_level: ApprovalLevel,
    pub current_approval_step: Option<u8>,
    pub requester_id: ActorId,
    pub assignee_id: Option<ActorId>,
    pub sla_deadline: Option<DateTime<Utc>>,
    pub sla_status: SlaStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ListFilter {
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
    pub limit: Option<u32>,
}

/// Application facade over the request machine. Stateless between calls.
pub struct RequestService {
    machine: RequestMachine,
    repository: Arc<dyn RequestRepository>,
    notifier: Arc<dyn Notifier>,
}

impl RequestService {
    /// Attempts per transition: the first try plus one retry after a lost race.
    const MAX_ATTEMPTS: usize = 2;

    pub fn new(
        machine: RequestMachine,
        repository: Arc<dyn RequestRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { machine, repository, notifier }
    }

    pub fn machine(&self) -> &RequestMachine {
        &self.machine
    }

    pub async fn create_request(
        &self,
        actor: &Actor,
        new: NewRequest,
    ) -> Result<RequestView, ApplicationError> {
        let now = Utc::now();
        let (mut request, audit) = self.machine.open(actor, new, now).map_err(|error| {
            debug!(
                event_name = "workflow.request.create_rejected",
                actor_id = %actor.id,
                error_class = error.class(),
                error = %error,
                "request creation rejected"
            );
            error
        })?;

        // Request numbers carry a short random suffix; draw a fresh one once on collision.
        match self.repository.insert(&request, &audit).await {
            Err(StoreError::Duplicate(detail)) => {
                warn!(
                    event_name = "workflow.request.number_collision",
                    request_id = %request.id,
                    request_number = %request.request_number,
                    detail = %detail,
                    "request number already taken, drawing a new one"
                );
                request.request_number = request_number(now);
                self.repository.insert(&request, &audit).await?;
            }
            result => {
                result?;
            }
        }
        info!(
            event_name = "workflow.request.created",
            request_id = %request.id,
            request_number = %request.request_number,
            request_type = request.request_type.as_str(),
            approval_level = request.approval_level.as_str(),
            actor_id = %actor.id,
            "request created"
        );
        self.notify(&request, NotificationKind::Created, &actor.id, now);
        Ok(self.view(request, actor, now))
    }

    pub async fn change_status(
        &self,
        id: &RequestId,
        actor: &Actor,
        event: ProcessingEvent,
        payload: TransitionPayload,
    ) -> Result<RequestView, ApplicationError> {
        self.transition(id, actor, WorkflowCommand::Process { event, payload }).await
    }

    pub async fn approve(
        &self,
        id: &RequestId,
        actor: &Actor,
        comments: Option<String>,
        expected_step: Option<u8>,
    ) -> Result<RequestView, ApplicationError> {
        self.transition(id, actor, WorkflowCommand::Approve { comments, expected_step }).await
    }

    pub async fn reject_approval(
        &self,
        id: &RequestId,
        actor: &Actor,
        reason: Option<String>,
        expected_step: Option<u8>,
    ) -> Result<RequestView, ApplicationError> {
        self.transition(id, actor, WorkflowCommand::RejectApproval { reason, expected_step }).await
    }

    pub async fn cancel(
        &self,
        id: &RequestId,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<RequestView, ApplicationError> {
        self.transition(id, actor, WorkflowCommand::Cancel { reason }).await
    }

    pub async fn add_comment(
        &self,
        id: &RequestId,
        actor: &Actor,
        content: &str,
        is_internal: bool,
    ) -> Result<Comment, ApplicationError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(WorkflowError::validation("content", "comment must not be empty").into());
        }

        let stored = self.load_visible(id, actor).await?;
        if is_internal && !self.machine.gate().can_process(&actor.role) {
            return Err(WorkflowError::Permission {
                actor_id: actor.id.clone(),
                action: "post internal comments".to_owned(),
                required: Some(Capability::ProcessRequests),
            }
            .into());
        }

        let now = Utc::now();
        let comment = Comment {
            id: CommentId(Uuid::new_v4().to_string()),
            request_id: stored.request.id.clone(),
            author_id: actor.id.clone(),
            content: content.to_owned(),
            is_internal,
            created_at: now,
        };
        self.repository.append_comment(&comment).await?;
        info!(
            event_name = "workflow.comment.added",
            request_id = %comment.request_id,
            actor_id = %actor.id,
            is_internal,
            "comment added"
        );
        self.notify(&stored.request, NotificationKind::CommentAdded, &actor.id, now);
        Ok(comment)
    }

    pub async fn get_request(
        &self,
        id: &RequestId,
        actor: &Actor,
    ) -> Result<RequestView, ApplicationError> {
        let stored = self.load_visible(id, actor).await?;
        Ok(self.view(stored.request, actor, Utc::now()))
    }

    pub async fn list_requests(
        &self,
        actor: &Actor,
        filter: ListFilter,
    ) -> Result<Vec<RequestSummary>, ApplicationError> {
        let requester_id =
            if self.machine.gate().is_staff(&actor.role) { None } else { Some(actor.id.clone()) };
        let filter = RequestFilter {
            requester_id,
            status: filter.status,
            request_type: filter.request_type,
            limit: filter.limit,
        };

        let now = Utc::now();
        let requests = self.repository.list(&filter).await?;
        Ok(requests.into_iter().map(|request| self.summary(request, now)).collect())
    }

    pub async fn audit_trail(
        &self,
        id: &RequestId,
        actor: &Actor,
    ) -> Result<Vec<AuditEntry>, ApplicationError> {
        let stored = self.load_visible(id, actor).await?;
        if !self.machine.gate().is_staff(&actor.role) {
            return Err(WorkflowError::Permission {
                actor_id: actor.id.clone(),
                action: "view the audit trail".to_owned(),
                required: None,
            }
            .into());
        }
        Ok(self.repository.audit_trail(&stored.request.id).await?)
    }

    async fn transition(
        &self,
        id: &RequestId,
        actor: &Actor,
        command: WorkflowCommand,
    ) -> Result<RequestView, ApplicationError> {
        let mut pinned: Option<WorkflowCommand> = None;

        for attempt in 1..=Self::MAX_ATTEMPTS {
            let stored = self.load_visible(id, actor).await?;
            let seen_step = stored.request.current_approval_step;
            let command = pinned.get_or_insert_with(|| command.pinned_to_step(seen_step));
            let now = Utc::now();

            let outcome = match self.machine.apply(&stored.request, actor, command, now) {
                Ok(outcome) => outcome,
                Err(error) => {
                    debug!(
                        event_name = "workflow.transition.rejected",
                        request_id = %id,
                        actor_id = %actor.id,
                        event = command.event().as_str(),
                        error_class = error.class(),
                        attempt,
                        error = %error,
                        "transition rejected"
                    );
                    return Err(error.into());
                }
            };

            let saved = self
                .repository
                .save_if_version(&outcome.request, stored.version, &outcome.audit)
                .await?;
            match saved {
                SaveOutcome::Saved { version } => {
                    info!(
                        event_name = "workflow.transition.applied",
                        request_id = %id,
                        actor_id = %actor.id,
                        event = outcome.event.as_str(),
                        from = outcome.from.as_str(),
                        to = outcome.to.as_str(),
                        version,
                        "transition applied"
                    );
                    self.notify(
                        &outcome.request,
                        NotificationKind::Transitioned(outcome.event),
                        &actor.id,
                        now,
                    );
                    return Ok(self.view(outcome.request, actor, now));
                }
                SaveOutcome::Conflict => {
                    warn!(
                        event_name = "workflow.transition.conflict",
                        request_id = %id,
                        actor_id = %actor.id,
                        event = outcome.event.as_str(),
                        attempt,
                        "optimistic save lost a race"
                    );
                }
            }
        }

        Err(WorkflowError::ConcurrencyConflict { request_id: id.clone() }.into())
    }

    /// Unknown ids and requests the actor may not see are both `NotFound`.
    async fn load_visible(
        &self,
        id: &RequestId,
        actor: &Actor,
    ) -> Result<StoredRequest, ApplicationError> {
        let stored = self
            .repository
            .load(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(id.clone()))?;

        if stored.request.is_requester(&actor.id) || self.machine.gate().is_staff(&actor.role) {
            Ok(stored)
        } else {
            Err(WorkflowError::NotFound(id.clone()).into())
        }
    }

    fn view(&self, mut request: Request, actor: &Actor, now: DateTime<Utc>) -> RequestView {
        if !self.machine.gate().can_process(&actor.role) {
            request.comments.retain(|comment| !comment.is_internal);
        }
        let sla_status = self.machine.sla().classify_request(&request, now);
        RequestView { required_steps: request.required_steps(), sla_status, request }
    }

    fn summary(&self, request: Request, now: DateTime<Utc>) -> RequestSummary {
        let sla_status = self.machine.sla().classify_request(&request, now);
        RequestSummary {
            id: request.id,
            request_number: request.request_number,
            request_type: request.request_type,
            status: request.status,
            priority: request.priority,
            title: request.title,
            amount: request.amount,
            approval_level: request.approval_level,
            current_approval_step: request.current_approval_step,
            requester_id: request.requester_id,
            assignee_id: request.assignee_id,
            sla_deadline: request.sla_deadline,
            sla_status,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }

    fn notify(
        &self,
        request: &Request,
        kind: NotificationKind,
        actor_id: &ActorId,
        now: DateTime<Utc>,
    ) {
        let event = NotificationEvent {
            request_id: request.id.clone(),
            request_number: request.request_number.clone(),
            kind,
            actor_id: actor_id.clone(),
            status: request.status,
            occurred_at: now,
        };
        if let Err(error) = self.notifier.emit(event) {
            warn!(
                event_name = "notify.emit.failed",
                request_id = %request.id,
                kind = kind.as_str(),
                error = %error,
                "notification failed; transition already committed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::RwLock;

    use super::{ListFilter, RequestService};
    use crate::audit::AuditEntry;
    use crate::domain::actor::Actor;
    use crate::domain::comment::Comment;
    use crate::domain::request::{NewRequest, Request, RequestId, RequestStatus, RequestType};
    use crate::errors::{ApplicationError, WorkflowError};
    use crate::notify::{InMemoryNotifier, NotificationKind};
    use crate::repository::{
        RequestFilter, RequestRepository, SaveOutcome, StoreError, StoredRequest,
    };
    use crate::workflow::machine::RequestMachine;
    use crate::workflow::states::{ProcessingEvent, TransitionPayload};

    /// Store double that can inject a competing write before the next save.
    #[derive(Default)]
    struct RacingStore {
        rows: RwLock<HashMap<String, StoredRequest>>,
        comments: RwLock<Vec<Comment>>,
        audit: RwLock<Vec<AuditEntry>>,
        /// Number of upcoming saves that lose to a concurrent writer.
        lose_next: AtomicUsize,
        /// Applied to the stored row when a save is made to lose.
        competitor: RwLock<Option<Box<dyn Fn(&mut Request) + Send + Sync>>>,
        /// Number of upcoming inserts rejected as duplicates.
        duplicate_next: AtomicUsize,
    }

    #[async_trait]
    impl RequestRepository for RacingStore {
        async fn load(&self, id: &RequestId) -> Result<Option<StoredRequest>, StoreError> {
            let rows = self.rows.read().await;
            let comments = self.comments.read().await;
            Ok(rows.get(&id.0).cloned().map(|mut stored| {
                stored.request.comments =
                    comments.iter().filter(|comment| &comment.request_id == id).cloned().collect();
                stored
            }))
        }

        async fn insert(&self, request: &Request, audit: &AuditEntry) -> Result<i64, StoreError> {
            if self.duplicate_next.load(Ordering::SeqCst) > 0 {
                self.duplicate_next.fetch_sub(1, Ordering::SeqCst);
                let detail = format!("request number {}", request.request_number);
                return Err(StoreError::Duplicate(detail));
            }
            let stored = StoredRequest { request: request.clone(), version: 1 };
            self.rows.write().await.insert(request.id.0.clone(), stored);
            self.audit.write().await.push(audit.clone());
            Ok(1)
        }

        async fn save_if_version(
            &self,
            request: &Request,
            expected_version: i64,
            audit: &AuditEntry,
        ) -> Result<SaveOutcome, StoreError> {
            let mut rows = self.rows.write().await;
            let Some(stored) = rows.get_mut(&request.id.0) else {
                return Err(StoreError::Backend("missing row".to_owned()));
            };

            if self.lose_next.load(Ordering::SeqCst) > 0 {
                self.lose_next.fetch_sub(1, Ordering::SeqCst);
                if let Some(competitor) = self.competitor.read().await.as_ref() {
                    competitor(&mut stored.request);
                }
                stored.version += 1;
                return Ok(SaveOutcome::Conflict);
            }

            if stored.version != expected_version {
                return Ok(SaveOutcome::Conflict);
            }
            stored.request = request.clone();
            stored.request.comments.clear();
            stored.version += 1;
            self.audit.write().await.push(audit.clone());
            Ok(SaveOutcome::Saved { version: stored.version })
        }

        async fn append_comment(&self, comment: &Comment) -> Result<(), StoreError> {
            self.comments.write().await.push(comment.clone());
            Ok(())
        }

        async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
            Ok(self
                .rows
                .read()
                .await
                .values()
                .map(|stored| stored.request.clone())
                .filter(|request| filter.matches(request))
                .collect())
        }

        async fn audit_trail(&self, id: &RequestId) -> Result<Vec<AuditEntry>, StoreError> {
            let audit = self.audit.read().await;
            Ok(audit.iter().filter(|entry| &entry.request_id == id).cloned().collect())
        }
    }

    fn service(store: Arc<RacingStore>, notifier: InMemoryNotifier) -> RequestService {
        RequestService::new(RequestMachine::default(), store, Arc::new(notifier))
    }

    fn employee() -> Actor {
        Actor::new("emp-1", "employee")
    }

    fn accountant() -> Actor {
        Actor::new("acct-1", "accountant")
    }

    fn chief() -> Actor {
        Actor::new("chief-1", "chief_accountant")
    }

    fn payment(amount: i64) -> NewRequest {
        NewRequest {
            request_type: Some(RequestType::Payment),
            amount: Some(Decimal::from(amount)),
            title: "Supplier payment".to_owned(),
            ..NewRequest::default()
        }
    }

    async fn awaiting_approval(service: &RequestService, amount: i64) -> RequestId {
        let created = service.create_request(&employee(), payment(amount)).await.expect("created");
        let id = created.request.id;
        for event in [ProcessingEvent::StartProcessing, ProcessingEvent::SendForApproval] {
            service
                .change_status(&id, &accountant(), event, TransitionPayload::default())
                .await
                .expect("processed");
        }
        id
    }

    #[tokio::test]
    async fn colliding_request_number_is_redrawn_once() {
        let store = Arc::new(RacingStore::default());
        let service = service(store.clone(), InMemoryNotifier::default());

        store.duplicate_next.store(1, Ordering::SeqCst);
        let view =
            service.create_request(&employee(), payment(100)).await.expect("created on redraw");
        let stored = store.load(&view.request.id).await.expect("load").expect("row stored");
        assert_eq!(stored.request.request_number, view.request.request_number);

        store.duplicate_next.store(2, Ordering::SeqCst);
        let result = service.create_request(&employee(), payment(100)).await;
        assert!(matches!(result, Err(ApplicationError::Persistence(_))));
    }

    #[tokio::test]
    async fn lost_race_is_retried_once_against_fresh_state() {
        let store = Arc::new(RacingStore::default());
        let service = service(store.clone(), InMemoryNotifier::default());
        let created = service.create_request(&employee(), payment(100)).await.expect("created");

        store.lose_next.store(1, Ordering::SeqCst);
        let view = service
            .change_status(
                &created.request.id,
                &accountant(),
                ProcessingEvent::StartProcessing,
                TransitionPayload::default(),
            )
            .await
            .expect("retry succeeds");

        assert_eq!(view.request.status, RequestStatus::InProgress);
        let trail = store.audit_trail(&created.request.id).await.expect("trail");
        assert_eq!(trail.len(), 2);
    }

    #[tokio::test]
    async fn second_lost_race_surfaces_concurrency_conflict() {
        let store = Arc::new(RacingStore::default());
        let service = service(store.clone(), InMemoryNotifier::default());
        let created = service.create_request(&employee(), payment(100)).await.expect("created");

        store.lose_next.store(2, Ordering::SeqCst);
        let result = service
            .change_status(
                &created.request.id,
                &accountant(),
                ProcessingEvent::StartProcessing,
                TransitionPayload::default(),
            )
            .await;

        assert!(matches!(
            result,
            Err(ApplicationError::Workflow(WorkflowError::ConcurrencyConflict { .. }))
        ));
    }

    #[tokio::test]
    async fn racing_approver_sees_invalid_transition_after_reload() {
        let store = Arc::new(RacingStore::default());
        let service = service(store.clone(), InMemoryNotifier::default());
        let id = awaiting_approval(&service, 15_000_000).await;

        *store.competitor.write().await = Some(Box::new(|request: &mut Request| {
            request.current_approval_step = Some(2);
        }));
        store.lose_next.store(1, Ordering::SeqCst);

        let admin = Actor::new("admin-1", "admin");
        match service.approve(&id, &admin, None, None).await {
            Err(ApplicationError::Workflow(WorkflowError::InvalidTransition { detail, .. })) => {
                assert_eq!(detail, "approval step already advanced");
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }

        let view = service.get_request(&id, &admin).await.expect("view");
        assert_eq!(view.request.current_approval_step, Some(2));
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_the_transition() {
        let store = Arc::new(RacingStore::default());
        let service = service(store, InMemoryNotifier::failing());
        let id = awaiting_approval(&service, 3_000_000).await;

        let view =
            service.approve(&id, &chief(), Some("ok".to_owned()), Some(1)).await.expect("approved");
        assert_eq!(view.request.status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn committed_transitions_are_notified() {
        let notifier = InMemoryNotifier::default();
        let service = service(Arc::new(RacingStore::default()), notifier.clone());
        let id = awaiting_approval(&service, 3_000_000).await;

        let kinds: Vec<&str> = notifier.events().iter().map(|event| event.kind.as_str()).collect();
        assert_eq!(kinds, vec!["created", "start_processing", "send_for_approval"]);
        assert!(notifier.events().iter().all(|event| event.request_id == id));
        assert!(matches!(notifier.events()[0].kind, NotificationKind::Created));
    }

    #[tokio::test]
    async fn internal_comments_hidden_from_non_processors() {
        let service = service(Arc::new(RacingStore::default()), InMemoryNotifier::default());
        let created = service.create_request(&employee(), payment(100)).await.expect("created");
        let id = created.request.id;

        service
            .add_comment(&id, &accountant(), "checked bank statement", true)
            .await
            .expect("internal");
        service.add_comment(&id, &employee(), "invoice attached", false).await.expect("public");

        let for_requester = service.get_request(&id, &employee()).await.expect("requester view");
        assert_eq!(for_requester.request.comments.len(), 1);
        assert!(!for_requester.request.comments[0].is_internal);

        let for_accountant = service.get_request(&id, &accountant()).await.expect("staff view");
        assert_eq!(for_accountant.request.comments.len(), 2);

        let director = Actor::new("dir-1", "director");
        let for_director = service.get_request(&id, &director).await.expect("approver view");
        assert_eq!(for_director.request.comments.len(), 1);
    }

    #[tokio::test]
    async fn comment_rules() {
        let service = service(Arc::new(RacingStore::default()), InMemoryNotifier::default());
        let created = service.create_request(&employee(), payment(100)).await.expect("created");
        let id = created.request.id;

        assert!(matches!(
            service.add_comment(&id, &employee(), "   ", false).await,
            Err(ApplicationError::Workflow(WorkflowError::Validation { .. }))
        ));
        assert!(matches!(
            service.add_comment(&id, &employee(), "psst", true).await,
            Err(ApplicationError::Workflow(WorkflowError::Permission { .. }))
        ));
        let stranger = Actor::new("emp-2", "employee");
        assert!(matches!(
            service.add_comment(&id, &stranger, "hello", false).await,
            Err(ApplicationError::Workflow(WorkflowError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn visibility_of_requests_and_audit() {
        let service = service(Arc::new(RacingStore::default()), InMemoryNotifier::default());
        let mine = service.create_request(&employee(), payment(100)).await.expect("created");
        let other = Actor::new("emp-2", "employee");
        service.create_request(&other, payment(200)).await.expect("created");

        let own = service.list_requests(&employee(), ListFilter::default()).await.expect("list");
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, mine.request.id);

        let all = service.list_requests(&accountant(), ListFilter::default()).await.expect("list");
        assert_eq!(all.len(), 2);

        let completed =
            ListFilter { status: Some(RequestStatus::Completed), ..ListFilter::default() };
        let filtered = service
            .list_requests(&accountant(), completed)
            .await
            .expect("list");
        assert!(filtered.is_empty());

        assert!(matches!(
            service.get_request(&mine.request.id, &other).await,
            Err(ApplicationError::Workflow(WorkflowError::NotFound(_)))
        ));
        assert!(matches!(
            service.audit_trail(&mine.request.id, &employee()).await,
            Err(ApplicationError::Workflow(WorkflowError::Permission { .. }))
        ));
        let trail = service.audit_trail(&mine.request.id, &accountant()).await.expect("trail");
        assert_eq!(trail.len(), 1);
    }

    #[tokio::test]
    async fn view_serializes_flat_with_derived_fields() {
        let service = service(Arc::new(RacingStore::default()), InMemoryNotifier::default());
        let created =
            service.create_request(&employee(), payment(15_000_000)).await.expect("created");

        let json = serde_json::to_value(&created).expect("serialize");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["approval_level"], "executive");
        assert_eq!(json["required_steps"], 2);
        assert_eq!(json["sla_status"], "ok");
        assert!(json.get("request").is_none());
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let service = service(Arc::new(RacingStore::default()), InMemoryNotifier::default());
        let result = service.get_request(&RequestId("missing".to_owned()), &accountant()).await;
        assert!(matches!(result, Err(ApplicationError::Workflow(WorkflowError::NotFound(_)))));
    }
}
