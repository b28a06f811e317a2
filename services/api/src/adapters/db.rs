//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the store ports from the `lektor_core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use lektor_core::domain::{
    Identity, NewSubmission, Notification, NotificationKind, ReviewPatch, Submission,
    SubmissionStatus,
};
use lektor_core::ports::{
    IdentityProvider, NotificationFeed, NotificationStore, PortError, PortResult, SubmissionStore,
};
use sqlx::postgres::PgListener;
use sqlx::{FromRow, PgPool};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// The Postgres channel the notification trigger raises on every
/// insert/update; the payload is the recipient's user id.
const NOTIFY_CHANNEL: &str = "lektor_notifications";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter implementing the `SubmissionStore`,
/// `NotificationStore` and `IdentityProvider` ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn notifications_for(&self, user_id: Uuid) -> PortResult<Vec<Notification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            "SELECT id, user_id, kind, title, message, action_ref, read, read_at, created_at \
             FROM notifications WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}

/// Maps sqlx failures onto the port taxonomy. Connectivity problems are
/// `Transient` (retryable by the user); everything else is unexpected.
fn map_sqlx(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            PortError::Transient(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn status_to_str(status: SubmissionStatus) -> &'static str {
    match status {
        SubmissionStatus::Pending => "pending",
        SubmissionStatus::Done => "done",
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SubmissionRecord {
    id: Uuid,
    owner_id: Uuid,
    reviewer_id: Uuid,
    file_name: String,
    size: i64,
    storage_ref: String,
    status: String,
    notes: String,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl SubmissionRecord {
    fn to_domain(self) -> PortResult<Submission> {
        let status = match self.status.as_str() {
            "pending" => SubmissionStatus::Pending,
            "done" => SubmissionStatus::Done,
            other => {
                return Err(PortError::Unexpected(format!(
                    "unknown submission status '{}'",
                    other
                )))
            }
        };
        Ok(Submission {
            id: self.id,
            owner_id: self.owner_id,
            reviewer_id: self.reviewer_id,
            file_name: self.file_name,
            size: self.size,
            storage_ref: self.storage_ref,
            status,
            notes: self.notes,
            created_at: self.created_at,
            reviewed_at: self.reviewed_at,
        })
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    title: String,
    message: String,
    action_ref: Option<Uuid>,
    read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl NotificationRecord {
    fn to_domain(self) -> PortResult<Notification> {
        let kind = match self.kind.as_str() {
            "document_assigned" => NotificationKind::DocumentAssigned,
            "document_reviewed" => NotificationKind::DocumentReviewed,
            "new_message" => NotificationKind::Message,
            _ => NotificationKind::Other,
        };
        Ok(Notification {
            id: self.id,
            user_id: self.user_id,
            kind,
            title: self.title,
            message: self.message,
            action_ref: self.action_ref,
            read: self.read,
            read_at: self.read_at,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

const SUBMISSION_COLUMNS: &str =
    "id, owner_id, reviewer_id, file_name, size, storage_ref, status, notes, created_at, reviewed_at";

//=========================================================================================
// `SubmissionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SubmissionStore for PgStore {
    async fn get_submission(&self, id: Uuid) -> PortResult<Submission> {
        let record = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "SELECT {} FROM submissions WHERE id = $1",
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or_else(|| PortError::NotFound(format!("submission {} not found", id)))?;
        record.to_domain()
    }

    async fn create_submission(&self, new: NewSubmission) -> PortResult<Submission> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let record = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "INSERT INTO submissions (id, owner_id, reviewer_id, file_name, size, storage_ref, status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', '') \
             RETURNING {}",
            SUBMISSION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.owner_id)
        .bind(new.reviewer_id)
        .bind(&new.file_name)
        .bind(new.size)
        .bind(&new.storage_ref)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        // The reviewer learns about the assignment through the feed; the
        // notification trigger raises the NOTIFY for us.
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, message, action_ref) \
             VALUES ($1, $2, 'document_assigned', 'New document assigned', $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(new.reviewer_id)
        .bind(format!("\"{}\" was assigned to you for review.", new.file_name))
        .bind(record.id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        record.to_domain()
    }

    async fn query_by_owner(&self, user_id: Uuid) -> PortResult<Vec<Submission>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "SELECT {} FROM submissions WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
            SUBMISSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn query_by_reviewer(&self, user_id: Uuid) -> PortResult<Vec<Submission>> {
        let records = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "SELECT {} FROM submissions WHERE reviewer_id = $1 ORDER BY created_at DESC, id DESC",
            SUBMISSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn submit_review(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        patch: ReviewPatch,
    ) -> PortResult<Submission> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // The status guard lives in the WHERE clause: check and write are
        // one statement, so a concurrent reviewer cannot slip between
        // them. `reviewed_at` comes from the database clock, never ours.
        let updated = sqlx::query_as::<_, SubmissionRecord>(&format!(
            "UPDATE submissions SET status = 'done', notes = $2, reviewed_at = now() \
             WHERE id = $1 AND status = $3 \
             RETURNING {}",
            SUBMISSION_COLUMNS
        ))
        .bind(id)
        .bind(&patch.notes)
        .bind(status_to_str(expected))
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let record = match updated {
            Some(record) => record,
            None => {
                // Distinguish "lost the race" from "never existed".
                let exists = sqlx::query_scalar::<_, i64>(
                    "SELECT count(*) FROM submissions WHERE id = $1",
                )
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(map_sqlx)?;
                return if exists > 0 {
                    Err(PortError::InvalidTransition(format!(
                        "submission {} is already reviewed",
                        id
                    )))
                } else {
                    Err(PortError::NotFound(format!("submission {} not found", id)))
                };
            }
        };

        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, message, action_ref) \
             VALUES ($1, $2, 'document_reviewed', 'Your document was reviewed', $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(record.owner_id)
        .bind(format!("The review of \"{}\" is complete.", record.file_name))
        .bind(record.id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        record.to_domain()
    }
}

//=========================================================================================
// `NotificationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationStore for PgStore {
    async fn subscribe(&self, user_id: Uuid) -> PortResult<NotificationFeed> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(map_sqlx)?;
        listener.listen(NOTIFY_CHANNEL).await.map_err(map_sqlx)?;

        let (tx, rx) = mpsc::channel::<PortResult<Vec<Notification>>>(16);
        let store = self.clone();

        // Initial full result set, then one full re-query per NOTIFY that
        // targets this user. The task ends (dropping the listener) as
        // soon as the consumer goes away.
        tokio::spawn(async move {
            let initial = store.notifications_for(user_id).await;
            if tx.send(initial).await.is_err() {
                return;
            }
            loop {
                match listener.recv().await {
                    Ok(event) => {
                        if event.payload() != user_id.to_string() {
                            continue;
                        }
                        debug!(user_id = %user_id, "notification change received");
                        if tx.send(store.notifications_for(user_id).await).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "notification listener error");
                        if tx
                            .send(Err(PortError::Transient(e.to_string())))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn mark_read(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET read = true, read_at = now() WHERE id = $1 AND read = false",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        // Zero rows means already read or missing; both are harmless for
        // this idempotent write.
        if result.rows_affected() == 0 {
            debug!(notification_id = %id, "mark_read was a no-op");
        }
        Ok(())
    }
}

//=========================================================================================
// `IdentityProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityProvider for PgStore {
    async fn validate_session(&self, token: &str) -> PortResult<Identity> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT user_id, expires_at FROM auth_sessions WHERE id = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?
        .ok_or(PortError::Unauthenticated)?;

        if record.expires_at < Utc::now() {
            return Err(PortError::Unauthenticated);
        }
        Ok(Identity {
            user_id: record.user_id,
        })
    }

    async fn refresh_session(&self, token: &str) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE auth_sessions SET expires_at = now() + interval '30 days' \
             WHERE id = $1 AND expires_at > now()",
        )
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(PortError::Unauthenticated);
        }
        Ok(())
    }
}
