use std::sync::Arc;

use rust_decimal::Decimal;

use opsdesk_core::audit::{AuditAction, Decision};
use opsdesk_core::domain::{
    Actor, ApprovalLevel, NewRequest, RequestId, RequestStatus, RequestType,
};
use opsdesk_core::errors::{ApplicationError, WorkflowError};
use opsdesk_core::notify::{InMemoryNotifier, NotificationKind};
use opsdesk_core::repository::RequestRepository;
use opsdesk_core::workflow::{
    ListFilter, ProcessingEvent, RequestMachine, RequestService, RequestView, TransitionPayload,
    WorkflowEvent,
};
use opsdesk_db::{
    connect_with_settings, migrations, InMemoryRequestRepository, SqlRequestRepository,
};

struct Harness {
    backend: &'static str,
    service: Arc<RequestService>,
    notifier: InMemoryNotifier,
    _dir: Option<tempfile::TempDir>,
}

async fn harnesses() -> Vec<Harness> {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("opsdesk.db").display());
    let pool = connect_with_settings(&url, 4, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");

    vec![
        harness("memory", Arc::new(InMemoryRequestRepository::default()), None),
        harness("sqlite", Arc::new(SqlRequestRepository::new(pool)), Some(dir)),
    ]
}

fn harness(
    backend: &'static str,
    repository: Arc<dyn RequestRepository>,
    dir: Option<tempfile::TempDir>,
) -> Harness {
    let notifier = InMemoryNotifier::default();
    let service =
        RequestService::new(RequestMachine::default(), repository, Arc::new(notifier.clone()));
    Harness { backend, service: Arc::new(service), notifier, _dir: dir }
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

fn director() -> Actor {
    Actor::new("dir-1", "director")
}

fn payment(amount: i64) -> NewRequest {
    NewRequest {
        request_type: Some(RequestType::Payment),
        amount: Some(Decimal::new(amount, 0)),
        title: "Vendor payout".to_string(),
        ..NewRequest::default()
    }
}

async fn process(
    harness: &Harness,
    id: &RequestId,
    event: ProcessingEvent,
) -> Result<RequestView, ApplicationError> {
    harness.service.change_status(id, &accountant(), event, TransitionPayload::default()).await
}

async fn submitted(harness: &Harness, amount: i64) -> RequestView {
    let created =
        harness.service.create_request(&employee(), payment(amount)).await.expect("create");
    let id = created.request.id.clone();
    process(harness, &id, ProcessingEvent::StartProcessing).await.expect("start");
    process(harness, &id, ProcessingEvent::SendForApproval).await.expect("send for approval")
}

#[tokio::test]
async fn single_step_payment_is_approved_by_chief_accountant() {
    for harness in harnesses().await {
        let pending = submitted(&harness, 3_000_000).await;
        let level = pending.request.approval_level;
        assert_eq!(level, ApprovalLevel::ChiefAccountant, "{}", harness.backend);
        assert_eq!(pending.required_steps, 1);
        assert_eq!(pending.request.current_approval_step, Some(1));

        let approved = harness
            .service
            .approve(&pending.request.id, &chief(), Some("ok".to_string()), None)
            .await
            .expect("approve");
        assert_eq!(approved.request.status, RequestStatus::Approved, "{}", harness.backend);

        let trail =
            harness.service.audit_trail(&pending.request.id, &chief()).await.expect("trail");
        let actions: Vec<AuditAction> = trail.iter().map(|entry| entry.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::Created,
                AuditAction::Transition(WorkflowEvent::StartProcessing),
                AuditAction::Transition(WorkflowEvent::SendForApproval),
                AuditAction::Transition(WorkflowEvent::Approve),
            ],
            "{}",
            harness.backend
        );
        let last = trail.last().expect("approval entry");
        assert_eq!(last.step, Some(1));
        assert_eq!(last.decision, Some(Decision::Approve));
    }
}

#[tokio::test]
async fn high_value_payment_needs_both_steps() {
    for harness in harnesses().await {
        let pending = submitted(&harness, 15_000_000).await;
        let id = pending.request.id.clone();
        assert_eq!(pending.request.approval_level, ApprovalLevel::Executive);
        assert_eq!(pending.required_steps, 2);

        let first = harness.service.approve(&id, &chief(), None, None).await.expect("step one");
        assert_eq!(first.request.status, RequestStatus::PendingApproval, "{}", harness.backend);
        assert_eq!(first.request.current_approval_step, Some(2));

        let denied = harness.service.approve(&id, &chief(), None, None).await;
        assert!(
            matches!(denied, Err(ApplicationError::Workflow(WorkflowError::Permission { .. }))),
            "{}: {denied:?}",
            harness.backend
        );

        let done = harness.service.approve(&id, &director(), None, None).await.expect("step two");
        assert_eq!(done.request.status, RequestStatus::Approved, "{}", harness.backend);

        let completed = process(&harness, &id, ProcessingEvent::Complete).await.expect("complete");
        assert_eq!(completed.request.status, RequestStatus::Completed);
        assert_eq!(completed.request.sla_deadline, None);
    }
}

#[tokio::test]
async fn reconciliation_completes_without_approval() {
    for harness in harnesses().await {
        let new = NewRequest {
            request_type: Some(RequestType::Reconciliation),
            title: "Reconcile March".to_string(),
            ..NewRequest::default()
        };
        let created = harness.service.create_request(&employee(), new).await.expect("create");
        let id = created.request.id.clone();
        assert_eq!(created.request.approval_level, ApprovalLevel::None);

        process(&harness, &id, ProcessingEvent::StartProcessing).await.expect("start");
        let done = process(&harness, &id, ProcessingEvent::Complete).await.expect("complete");

        assert_eq!(done.request.status, RequestStatus::Completed, "{}", harness.backend);
        assert_eq!(done.request.approval_level, ApprovalLevel::None);
        assert_eq!(done.request.current_approval_step, None);
    }
}

#[tokio::test]
async fn concurrent_approvals_at_same_step_let_exactly_one_through() {
    for harness in harnesses().await {
        let pending = submitted(&harness, 15_000_000).await;
        let id = pending.request.id.clone();
        let admin = Actor::new("admin-1", "admin");

        let (left, right) = tokio::join!(
            {
                let service = Arc::clone(&harness.service);
                let id = id.clone();
                tokio::spawn(async move { service.approve(&id, &chief(), None, Some(1)).await })
            },
            {
                let service = Arc::clone(&harness.service);
                let id = id.clone();
                let admin = admin.clone();
                tokio::spawn(async move { service.approve(&id, &admin, None, Some(1)).await })
            }
        );
        let results = [left.expect("join"), right.expect("join")];

        let successes = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(successes, 1, "{}: {results:?}", harness.backend);
        for result in &results {
            if let Err(error) = result {
                assert!(
                    matches!(
                        error,
                        ApplicationError::Workflow(
                            WorkflowError::ConcurrencyConflict { .. }
                                | WorkflowError::InvalidTransition { .. }
                        )
                    ),
                    "{}: unexpected loser error {error:?}",
                    harness.backend
                );
            }
        }

        let view = harness.service.get_request(&id, &admin).await.expect("reload");
        assert_eq!(view.request.current_approval_step, Some(2), "{}", harness.backend);
        assert_eq!(view.request.status, RequestStatus::PendingApproval);

        let approvals = harness
            .service
            .audit_trail(&id, &admin)
            .await
            .expect("trail")
            .into_iter()
            .filter(|entry| entry.action == AuditAction::Transition(WorkflowEvent::Approve))
            .count();
        assert_eq!(approvals, 1, "{}", harness.backend);
    }
}

#[tokio::test]
async fn requester_cannot_see_internal_comments_or_other_requests() {
    for harness in harnesses().await {
        let created =
            harness.service.create_request(&employee(), payment(500)).await.expect("create");
        let id = created.request.id.clone();

        let service = &harness.service;
        service.add_comment(&id, &employee(), "invoice attached", false).await.expect("public");
        service.add_comment(&id, &accountant(), "check vendor", true).await.expect("internal");

        let own = harness.service.get_request(&id, &employee()).await.expect("own view");
        assert_eq!(own.request.comments.len(), 1, "{}", harness.backend);
        let staff = harness.service.get_request(&id, &accountant()).await.expect("staff view");
        assert_eq!(staff.request.comments.len(), 2, "{}", harness.backend);

        let stranger = Actor::new("emp-2", "employee");
        let hidden = harness.service.get_request(&id, &stranger).await;
        assert!(matches!(hidden, Err(ApplicationError::Workflow(WorkflowError::NotFound(_)))));
        let listed =
            harness.service.list_requests(&stranger, ListFilter::default()).await.expect("list");
        assert!(listed.is_empty(), "{}", harness.backend);
    }
}

#[tokio::test]
async fn cancellation_is_limited_to_requester_while_pending() {
    for harness in harnesses().await {
        let created =
            harness.service.create_request(&employee(), payment(500)).await.expect("create");
        let id = created.request.id.clone();

        let missing_reason = harness.service.cancel(&id, &employee(), Some("  ".to_string())).await;
        assert!(matches!(
            missing_reason,
            Err(ApplicationError::Workflow(WorkflowError::Validation { .. }))
        ));

        let cancelled = harness
            .service
            .cancel(&id, &employee(), Some("duplicate".to_string()))
            .await
            .expect("cancel");
        assert_eq!(cancelled.request.status, RequestStatus::Cancelled, "{}", harness.backend);
        assert_eq!(cancelled.request.cancellation_reason.as_deref(), Some("duplicate"));

        let after = process(&harness, &id, ProcessingEvent::StartProcessing).await;
        assert!(matches!(
            after,
            Err(ApplicationError::Workflow(WorkflowError::InvalidTransition { .. }))
        ));

        let events = harness.notifier.events();
        let kinds: Vec<&str> = events.iter().map(|event| event.kind.as_str()).collect();
        assert_eq!(kinds.first().copied(), Some(NotificationKind::Created.as_str()));
        assert_eq!(kinds.len(), 2, "{}", harness.backend);
    }
}
