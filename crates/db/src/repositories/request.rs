use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tracing::debug;

use opsdesk_core::audit::{AuditAction, AuditEntry, AuditEntryId, Decision};
use opsdesk_core::domain::{
    ActorId, ApprovalLevel, Comment, CommentId, Priority, Request, RequestId, RequestStatus,
    RequestType,
};
use opsdesk_core::repository::{
    RequestFilter, RequestRepository, SaveOutcome, StoreError, StoredRequest,
};

use super::RepositoryError;
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, request_number, request_type, status, priority, title, \
     description, amount, approval_level, current_approval_step, requester_id, assignee_id, \
     sla_deadline, rejection_reason, cancellation_reason, metadata_json, version, created_at, \
     updated_at";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: &RequestId) -> Result<Option<StoredRequest>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let (mut request, version) = row_to_request(&row)?;
        let comment_rows = sqlx::query(
            "SELECT id, request_id, author_id, content, is_internal, created_at
             FROM request_comments WHERE request_id = ?
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;
        request.comments = comment_rows.iter().map(row_to_comment).collect::<Result<_, _>>()?;

        Ok(Some(StoredRequest { request, version }))
    }

    async fn create(&self, request: &Request, audit: &AuditEntry) -> Result<i64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "INSERT INTO requests ({REQUEST_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)"
        ))
        .bind(&request.id.0)
        .bind(&request.request_number)
        .bind(request.request_type.as_str())
        .bind(request.status.as_str())
        .bind(request.priority.as_str())
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.amount.map(|amount| amount.to_string()))
        .bind(request.approval_level.as_str())
        .bind(request.current_approval_step.map(i64::from))
        .bind(&request.requester_id.0)
        .bind(request.assignee_id.as_ref().map(|id| id.0.clone()))
        .bind(request.sla_deadline.map(encode_timestamp))
        .bind(&request.rejection_reason)
        .bind(&request.cancellation_reason)
        .bind(encode_metadata(&request.metadata)?)
        .bind(encode_timestamp(request.created_at))
        .bind(encode_timestamp(request.updated_at))
        .execute(&mut *tx)
        .await?;

        insert_audit(&mut tx, audit).await?;
        tx.commit().await?;
        Ok(1)
    }

    async fn update_if_version(
        &self,
        request: &Request,
        expected_version: i64,
        audit: &AuditEntry,
    ) -> Result<SaveOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE requests SET
                 status = ?,
                 priority = ?,
                 title = ?,
                 description = ?,
                 current_approval_step = ?,
                 assignee_id = ?,
                 sla_deadline = ?,
                 rejection_reason = ?,
                 cancellation_reason = ?,
                 metadata_json = ?,
                 updated_at = ?,
                 version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(request.status.as_str())
        .bind(request.priority.as_str())
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.current_approval_step.map(i64::from))
        .bind(request.assignee_id.as_ref().map(|id| id.0.clone()))
        .bind(request.sla_deadline.map(encode_timestamp))
        .bind(&request.rejection_reason)
        .bind(&request.cancellation_reason)
        .bind(encode_metadata(&request.metadata)?)
        .bind(encode_timestamp(request.updated_at))
        .bind(&request.id.0)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(
                event_name = "db.request.version_conflict",
                request_id = %request.id,
                expected_version,
                "request version moved on"
            );
            return Ok(SaveOutcome::Conflict);
        }

        insert_audit(&mut tx, audit).await?;
        tx.commit().await?;
        Ok(SaveOutcome::Saved { version: expected_version + 1 })
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO request_comments
                 (id, request_id, author_id, content, is_internal, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.id.0)
        .bind(&comment.request_id.0)
        .bind(&comment.author_id.0)
        .bind(&comment.content)
        .bind(comment.is_internal)
        .bind(encode_timestamp(comment.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn select(&self, filter: &RequestFilter) -> Result<Vec<Request>, RepositoryError> {
        let select = format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE 1 = 1");
        let mut builder = QueryBuilder::<Sqlite>::new(select);
        if let Some(requester_id) = &filter.requester_id {
            builder.push(" AND requester_id = ").push_bind(requester_id.0.clone());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(request_type) = filter.request_type {
            builder.push(" AND request_type = ").push_bind(request_type.as_str());
        }
        builder.push(" ORDER BY created_at DESC, rowid DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(|row| row_to_request(row).map(|(request, _)| request)).collect()
    }

    async fn select_audit(&self, id: &RequestId) -> Result<Vec<AuditEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, request_id, action, from_status, to_status, step, actor_id, decision,
                    comments, occurred_at
             FROM request_audit WHERE request_id = ?
             ORDER BY occurred_at ASC, rowid ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_audit).collect()
    }
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn load(&self, id: &RequestId) -> Result<Option<StoredRequest>, StoreError> {
        Ok(self.fetch(id).await?)
    }

    async fn insert(&self, request: &Request, audit: &AuditEntry) -> Result<i64, StoreError> {
        Ok(self.create(request, audit).await?)
    }

    async fn save_if_version(
        &self,
        request: &Request,
        expected_version: i64,
        audit: &AuditEntry,
    ) -> Result<SaveOutcome, StoreError> {
        Ok(self.update_if_version(request, expected_version, audit).await?)
    }

    async fn append_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        Ok(self.insert_comment(comment).await?)
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        Ok(self.select(filter).await?)
    }

    async fn audit_trail(&self, id: &RequestId) -> Result<Vec<AuditEntry>, StoreError> {
        Ok(self.select_audit(id).await?)
    }
}

async fn insert_audit(
    conn: &mut SqliteConnection,
    entry: &AuditEntry,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO request_audit (id, request_id, action, from_status, to_status, step,
                                    actor_id, decision, comments, occurred_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id.0)
    .bind(&entry.request_id.0)
    .bind(entry.action.as_str())
    .bind(entry.from_status.map(|status| status.as_str()))
    .bind(entry.to_status.as_str())
    .bind(entry.step.map(i64::from))
    .bind(&entry.actor_id.0)
    .bind(entry.decision.map(|decision| decision.as_str()))
    .bind(&entry.comments)
    .bind(encode_timestamp(entry.occurred_at))
    .execute(conn)
    .await?;
    Ok(())
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_request(row: &SqliteRow) -> Result<(Request, i64), RepositoryError> {
    let request_type: String = column(row, "request_type")?;
    let status: String = column(row, "status")?;
    let priority: String = column(row, "priority")?;
    let approval_level: String = column(row, "approval_level")?;
    let amount: Option<String> = column(row, "amount")?;
    let step: Option<i64> = column(row, "current_approval_step")?;
    let assignee_id: Option<String> = column(row, "assignee_id")?;
    let sla_deadline: Option<String> = column(row, "sla_deadline")?;
    let metadata_json: String = column(row, "metadata_json")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    let request = Request {
        id: RequestId(column(row, "id")?),
        request_number: column(row, "request_number")?,
        request_type: RequestType::parse(&request_type)
            .ok_or_else(|| decode_error("request_type", &request_type))?,
        status: RequestStatus::parse(&status).ok_or_else(|| decode_error("status", &status))?,
        priority: Priority::parse(&priority).ok_or_else(|| decode_error("priority", &priority))?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        amount: amount
            .map(|raw| Decimal::from_str(&raw).map_err(|_| decode_error("amount", &raw)))
            .transpose()?,
        approval_level: ApprovalLevel::parse(&approval_level)
            .ok_or_else(|| decode_error("approval_level", &approval_level))?,
        current_approval_step: step
            .map(|raw| {
                u8::try_from(raw)
                    .map_err(|_| decode_error("current_approval_step", &raw.to_string()))
            })
            .transpose()?,
        requester_id: ActorId(column(row, "requester_id")?),
        assignee_id: assignee_id.map(ActorId),
        sla_deadline: sla_deadline.map(|raw| parse_timestamp("sla_deadline", &raw)).transpose()?,
        rejection_reason: column(row, "rejection_reason")?,
        cancellation_reason: column(row, "cancellation_reason")?,
        metadata: serde_json::from_str::<BTreeMap<String, String>>(&metadata_json)
            .map_err(|e| RepositoryError::Decode(format!("metadata_json: {e}")))?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
        comments: Vec::new(),
    };
    let version: i64 = column(row, "version")?;
    Ok((request, version))
}

fn row_to_comment(row: &SqliteRow) -> Result<Comment, RepositoryError> {
    let created_at: String = column(row, "created_at")?;
    Ok(Comment {
        id: CommentId(column(row, "id")?),
        request_id: RequestId(column(row, "request_id")?),
        author_id: ActorId(column(row, "author_id")?),
        content: column(row, "content")?,
        is_internal: column(row, "is_internal")?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

fn row_to_audit(row: &SqliteRow) -> Result<AuditEntry, RepositoryError> {
    let action: String = column(row, "action")?;
    let from_status: Option<String> = column(row, "from_status")?;
    let to_status: String = column(row, "to_status")?;
    let step: Option<i64> = column(row, "step")?;
    let decision: Option<String> = column(row, "decision")?;
    let occurred_at: String = column(row, "occurred_at")?;

    Ok(AuditEntry {
        id: AuditEntryId(column(row, "id")?),
        request_id: RequestId(column(row, "request_id")?),
        action: AuditAction::parse(&action).ok_or_else(|| decode_error("action", &action))?,
        from_status: from_status
            .map(|raw| RequestStatus::parse(&raw).ok_or_else(|| decode_error("from_status", &raw)))
            .transpose()?,
        to_status: RequestStatus::parse(&to_status)
            .ok_or_else(|| decode_error("to_status", &to_status))?,
        step: step
            .map(|raw| u8::try_from(raw).map_err(|_| decode_error("step", &raw.to_string())))
            .transpose()?,
        actor_id: ActorId(column(row, "actor_id")?),
        decision: decision
            .map(|raw| Decision::parse(&raw).ok_or_else(|| decode_error("decision", &raw)))
            .transpose()?,
        comments: column(row, "comments")?,
        occurred_at: parse_timestamp("occurred_at", &occurred_at)?,
    })
}

fn decode_error(column: &str, value: &str) -> RepositoryError {
    RepositoryError::Decode(format!("unexpected {column} value `{value}`"))
}

/// Fixed-width UTC so lexicographic order matches time order.
fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| decode_error(column, value))
}

fn encode_metadata(metadata: &BTreeMap<String, String>) -> Result<String, RepositoryError> {
    serde_json::to_string(metadata)
        .map_err(|e| RepositoryError::Decode(format!("metadata_json: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, SubsecRound, TimeZone, Utc};
    use rust_decimal::Decimal;

    use opsdesk_core::audit::{AuditAction, AuditEntry, AuditEntryId, Decision};
    use opsdesk_core::domain::{
        Actor, ActorId, ApprovalLevel, Comment, CommentId, NewRequest, Priority, Request,
        RequestStatus, RequestType,
    };
    use opsdesk_core::repository::{RequestFilter, RequestRepository, SaveOutcome, StoreError};
    use opsdesk_core::workflow::{RequestMachine, WorkflowEvent};

    use super::SqlRequestRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlRequestRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlRequestRepository::new(pool)
    }

    fn open(amount: i64, requester: &str) -> (Request, AuditEntry) {
        let mut metadata = BTreeMap::new();
        metadata.insert("vendor".to_string(), "Acme LLC".to_string());
        let new = NewRequest {
            request_type: Some(RequestType::Payment),
            priority: Priority::Urgent,
            amount: Some(Decimal::new(amount * 100 + 55, 2)),
            title: "Wire transfer".to_string(),
            description: Some("Q1 settlement".to_string()),
            metadata,
        };
        RequestMachine::default()
            .open(&Actor::new(requester, "employee"), new, Utc::now())
            .expect("open")
    }

    #[tokio::test]
    async fn insert_and_load_round_trip() {
        let repo = setup().await;
        let (request, audit) = open(3_000_000, "emp-1");

        let version = repo.insert(&request, &audit).await.expect("insert");
        let stored = repo.load(&request.id).await.expect("load").expect("present");

        assert_eq!(version, 1);
        assert_eq!(stored.version, 1);
        assert_eq!(stored.request.amount, Some(Decimal::new(300_000_055, 2)));
        assert_eq!(stored.request.approval_level, ApprovalLevel::ChiefAccountant);
        assert_eq!(stored.request.metadata.get("vendor").map(String::as_str), Some("Acme LLC"));
        assert_eq!(stored.request.sla_deadline, request.sla_deadline.map(|d| d.trunc_subsecs(6)));
        assert_eq!(stored.request.priority, Priority::Urgent);
    }

    #[tokio::test]
    async fn stale_version_conflicts_without_appending_audit() {
        let repo = setup().await;
        let (request, audit) = open(100, "emp-1");
        repo.insert(&request, &audit).await.expect("insert");

        let mut next = request.clone();
        next.status = RequestStatus::InProgress;
        let transition = AuditEntry::new(
            request.id.clone(),
            AuditAction::Transition(WorkflowEvent::StartProcessing),
            Some(RequestStatus::Pending),
            RequestStatus::InProgress,
            request.requester_id.clone(),
            Utc::now(),
        );

        let first = repo.save_if_version(&next, 1, &transition).await.expect("save");
        assert_eq!(first, SaveOutcome::Saved { version: 2 });

        let replay = AuditEntry { id: AuditEntryId("other".into()), ..transition };
        let second = repo.save_if_version(&next, 1, &replay).await.expect("save");
        assert_eq!(second, SaveOutcome::Conflict);

        let trail = repo.audit_trail(&request.id).await.expect("trail");
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].action, AuditAction::Created);
        assert_eq!(trail[1].to_status, RequestStatus::InProgress);
    }

    #[tokio::test]
    async fn comments_load_in_creation_order() {
        let repo = setup().await;
        let (request, audit) = open(100, "emp-1");
        repo.insert(&request, &audit).await.expect("insert");

        let base = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).single().expect("time");
        for (index, internal) in [false, true, false].into_iter().enumerate() {
            let comment = Comment {
                id: CommentId(format!("c-{index}")),
                request_id: request.id.clone(),
                author_id: request.requester_id.clone(),
                content: format!("note {index}"),
                is_internal: internal,
                created_at: base + Duration::minutes(index as i64),
            };
            repo.append_comment(&comment).await.expect("comment");
        }

        let stored = repo.load(&request.id).await.expect("load").expect("present");
        let contents: Vec<&str> =
            stored.request.comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["note 0", "note 1", "note 2"]);
        assert!(stored.request.comments[1].is_internal);
    }

    #[tokio::test]
    async fn list_applies_filters_newest_first() {
        let repo = setup().await;
        let (first, first_audit) = open(100, "emp-1");
        repo.insert(&first, &first_audit).await.expect("insert");
        let (mut second, second_audit) = open(200, "emp-2");
        second.created_at = first.created_at + Duration::seconds(5);
        repo.insert(&second, &second_audit).await.expect("insert");

        let all = repo.list(&RequestFilter::default()).await.expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let by_requester = RequestFilter {
            requester_id: Some(first.requester_id.clone()),
            ..RequestFilter::default()
        };
        let mine = repo.list(&by_requester).await.expect("list");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, first.id);

        let confirmations = RequestFilter {
            request_type: Some(RequestType::Confirmation),
            ..RequestFilter::default()
        };
        let none = repo.list(&confirmations).await.expect("list");
        assert!(none.is_empty());

        let one = RequestFilter { limit: Some(1), ..RequestFilter::default() };
        let limited = repo.list(&one).await.expect("list");
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn approval_audit_fields_survive_storage() {
        let repo = setup().await;
        let (request, audit) = open(3_000_000, "emp-1");
        repo.insert(&request, &audit).await.expect("insert");

        let mut next = request.clone();
        next.status = RequestStatus::Approved;
        next.current_approval_step = Some(1);
        let entry = AuditEntry::new(
            request.id.clone(),
            AuditAction::Transition(WorkflowEvent::Approve),
            Some(RequestStatus::PendingApproval),
            RequestStatus::Approved,
            ActorId("chief-1".into()),
            Utc::now(),
        )
        .with_step(1, Decision::Approve)
        .with_comments(Some("looks right".into()));
        repo.save_if_version(&next, 1, &entry).await.expect("save");

        let trail = repo.audit_trail(&request.id).await.expect("trail");
        let last = trail.last().expect("entry");
        assert_eq!(last.step, Some(1));
        assert_eq!(last.decision, Some(Decision::Approve));
        assert_eq!(last.comments.as_deref(), Some("looks right"));
    }

    #[tokio::test]
    async fn duplicate_insert_is_reported() {
        let repo = setup().await;
        let (request, audit) = open(100, "emp-1");
        repo.insert(&request, &audit).await.expect("insert");

        let again = repo.insert(&request, &audit).await;
        assert!(matches!(again, Err(StoreError::Duplicate(_))));

        let (mut same_number, same_number_audit) = open(100, "emp-2");
        same_number.request_number = request.request_number.clone();
        let clash = repo.insert(&same_number, &same_number_audit).await;
        assert!(matches!(clash, Err(StoreError::Duplicate(_))));
    }
}
