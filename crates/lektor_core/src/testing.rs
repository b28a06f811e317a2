//! crates/lektor_core/src/testing.rs
//!
//! In-memory implementations of the store ports, shared by the test
//! modules. They reproduce the store contracts the core relies on: the
//! status-guarded review update, created_at-descending query order, and
//! the push-the-whole-result-set subscription behavior.

use crate::domain::{
    NewSubmission, Notification, NotificationKind, ReviewPatch, Submission, SubmissionStatus,
};
use crate::ports::{
    NotificationFeed, NotificationStore, PortError, PortResult, SubmissionStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use tokio::sync::{mpsc, Barrier, Mutex};
use uuid::Uuid;

/// Builds a submission record the way the store would create it.
pub fn seed_submission(
    owner_id: Uuid,
    reviewer_id: Uuid,
    status: SubmissionStatus,
) -> Submission {
    let now = Utc::now();
    Submission {
        id: Uuid::new_v4(),
        owner_id,
        reviewer_id,
        file_name: "Business_Plan_2024.pdf".to_string(),
        size: 2_400_000,
        storage_ref: format!("uploads/{}", Uuid::new_v4()),
        status,
        notes: String::new(),
        created_at: now,
        reviewed_at: match status {
            SubmissionStatus::Done => Some(now),
            SubmissionStatus::Pending => None,
        },
    }
}

/// Builds a notification record the way a server-side process would.
pub fn seed_notification(user_id: Uuid, kind: NotificationKind, read: bool) -> Notification {
    let now = Utc::now();
    Notification {
        id: Uuid::new_v4(),
        user_id,
        kind,
        title: "Review update".to_string(),
        message: "Something happened to one of your documents.".to_string(),
        action_ref: Some(Uuid::new_v4()),
        read,
        read_at: if read { Some(now) } else { None },
        created_at: now,
    }
}

//=========================================================================================
// Submission store mock
//=========================================================================================

pub struct MockSubmissionStore {
    records: Mutex<Vec<Submission>>,
    calls: AtomicUsize,
    fail_owner: AtomicBool,
    fail_reviewer: AtomicBool,
    read_barrier: Mutex<Option<Arc<Barrier>>>,
}

impl MockSubmissionStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_owner: AtomicBool::new(false),
            fail_reviewer: AtomicBool::new(false),
            read_barrier: Mutex::new(None),
        }
    }

    pub async fn insert(&self, submission: Submission) -> Uuid {
        let id = submission.id;
        self.records.lock().await.push(submission);
        id
    }

    /// Number of port-method calls made against this store.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_owner_queries(&self) {
        self.fail_owner.store(true, Ordering::SeqCst);
    }

    pub fn fail_reviewer_queries(&self) {
        self.fail_reviewer.store(true, Ordering::SeqCst);
    }

    /// Arms a one-shot rendezvous in `get_submission` so two concurrent
    /// callers both read the Pending record before either write lands,
    /// leaving the conditional update to pick the single winner.
    pub async fn hold_reads_until_both_tasks_arrive(&self) {
        *self.read_barrier.lock().await = Some(Arc::new(Barrier::new(2)));
    }

    fn by_created_desc(mut items: Vec<Submission>) -> Vec<Submission> {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }
}

#[async_trait]
impl SubmissionStore for MockSubmissionStore {
    async fn get_submission(&self, id: Uuid) -> PortResult<Submission> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let barrier = self.read_barrier.lock().await.clone();
        if let Some(barrier) = barrier {
            if barrier.wait().await.is_leader() {
                self.read_barrier.lock().await.take();
            }
        }

        self.records
            .lock()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("submission {} not found", id)))
    }

    async fn create_submission(&self, new: NewSubmission) -> PortResult<Submission> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let submission = Submission {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            reviewer_id: new.reviewer_id,
            file_name: new.file_name,
            size: new.size,
            storage_ref: new.storage_ref,
            status: SubmissionStatus::Pending,
            notes: String::new(),
            created_at: Utc::now(),
            reviewed_at: None,
        };
        self.records.lock().await.push(submission.clone());
        Ok(submission)
    }

    async fn query_by_owner(&self, user_id: Uuid) -> PortResult<Vec<Submission>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_owner.load(Ordering::SeqCst) {
            return Err(PortError::Transient("owner query unavailable".to_string()));
        }
        let items = self
            .records
            .lock()
            .await
            .iter()
            .filter(|s| s.owner_id == user_id)
            .cloned()
            .collect();
        Ok(Self::by_created_desc(items))
    }

    async fn query_by_reviewer(&self, user_id: Uuid) -> PortResult<Vec<Submission>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reviewer.load(Ordering::SeqCst) {
            return Err(PortError::Transient(
                "reviewer query unavailable".to_string(),
            ));
        }
        let items = self
            .records
            .lock()
            .await
            .iter()
            .filter(|s| s.reviewer_id == user_id)
            .cloned()
            .collect();
        Ok(Self::by_created_desc(items))
    }

    async fn submit_review(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        patch: ReviewPatch,
    ) -> PortResult<Submission> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Check and write under one lock: the compare-and-swap the real
        // store performs in a single guarded UPDATE.
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| PortError::NotFound(format!("submission {} not found", id)))?;
        if record.status != expected {
            return Err(PortError::InvalidTransition(format!(
                "submission {} is already reviewed",
                id
            )));
        }
        record.status = SubmissionStatus::Done;
        record.notes = patch.notes;
        record.reviewed_at = Some(Utc::now());
        Ok(record.clone())
    }
}

//=========================================================================================
// Notification store mock
//=========================================================================================

type Snapshot = PortResult<Vec<Notification>>;

pub struct MockNotificationStore {
    records: StdMutex<Vec<Notification>>,
    subscribers: StdMutex<Vec<(Uuid, mpsc::UnboundedSender<Snapshot>)>>,
    mark_read_calls: StdMutex<HashMap<Uuid, usize>>,
    failures: StdMutex<HashMap<Uuid, PortError>>,
}

impl MockNotificationStore {
    pub fn new() -> Self {
        Self {
            records: StdMutex::new(Vec::new()),
            subscribers: StdMutex::new(Vec::new()),
            mark_read_calls: StdMutex::new(HashMap::new()),
            failures: StdMutex::new(HashMap::new()),
        }
    }

    /// Inserts a server-side notification and re-delivers the full set
    /// to every matching subscriber, as the live query would.
    pub fn seed(&self, notification: Notification) -> Uuid {
        let id = notification.id;
        let user_id = notification.user_id;
        self.records.lock().unwrap().push(notification);
        self.broadcast(user_id);
        id
    }

    pub fn fail_mark_read_for(&self, id: Uuid, error: PortError) {
        self.failures.lock().unwrap().insert(id, error);
    }

    pub fn mark_read_calls(&self, id: Uuid) -> usize {
        self.mark_read_calls.lock().unwrap().get(&id).copied().unwrap_or(0)
    }

    pub fn has_live_subscriber(&self) -> bool {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .any(|(_, tx)| !tx.is_closed())
    }

    /// Injects a transient feed error into every subscription.
    pub fn push_error(&self, error: PortError) {
        for (_, tx) in self.subscribers.lock().unwrap().iter() {
            let _ = tx.send(Err(error.clone()));
        }
    }

    fn snapshot_for(&self, user_id: Uuid) -> Vec<Notification> {
        let mut items: Vec<Notification> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        // created_at descending, id-stable tie-break: the store-imposed
        // order the engine preserves verbatim.
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }

    fn broadcast(&self, user_id: Uuid) {
        let snapshot = self.snapshot_for(user_id);
        for (uid, tx) in self.subscribers.lock().unwrap().iter() {
            if *uid == user_id {
                let _ = tx.send(Ok(snapshot.clone()));
            }
        }
    }
}

#[async_trait]
impl NotificationStore for MockNotificationStore {
    async fn subscribe(&self, user_id: Uuid) -> PortResult<NotificationFeed> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(self.snapshot_for(user_id)));
        self.subscribers.lock().unwrap().push((user_id, tx));

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn mark_read(&self, id: Uuid) -> PortResult<()> {
        *self.mark_read_calls.lock().unwrap().entry(id).or_insert(0) += 1;

        if let Some(error) = self.failures.lock().unwrap().get(&id) {
            return Err(error.clone());
        }

        let user_id = {
            let mut records = self.records.lock().unwrap();
            let record = records
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or_else(|| PortError::NotFound(format!("notification {} not found", id)))?;
            if !record.read {
                record.read = true;
                record.read_at = Some(Utc::now());
            }
            record.user_id
        };
        self.broadcast(user_id);
        Ok(())
    }
}
