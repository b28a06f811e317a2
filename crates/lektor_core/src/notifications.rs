//! crates/lektor_core/src/notifications.rs
//!
//! The notification sync engine. Keeps a live, read/unread-tracked view
//! of one user's notifications in step with server pushes, and exposes
//! the two client-side mutations (mark one read, mark all read).

use crate::domain::{Identity, Notification};
use crate::ports::{NotificationFeed, NotificationStore, PortResult};
use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// The current snapshot of a user's notification feed. Replaced
/// wholesale on every server push; never delta-patched.
#[derive(Debug, Clone, Default)]
pub struct NotificationView {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

impl NotificationView {
    fn from_batch(notifications: Vec<Notification>) -> Self {
        let unread_count = notifications.iter().filter(|n| !n.read).count();
        Self {
            notifications,
            unread_count,
        }
    }
}

/// The result of a mark-all batch. Partial failure is surfaced here
/// instead of being folded into a single error, so the caller can see
/// both what was marked and what was not.
#[derive(Debug, Clone)]
pub struct BatchReadOutcome {
    pub marked: usize,
    pub failed: Vec<Uuid>,
}

impl BatchReadOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A live notification subscription for one signed-in user.
///
/// Acquired with [`NotificationCenter::activate`] and released on every
/// teardown path: `deactivate` cancels the server-side listener, and
/// `Drop` does the same so an early-returning caller cannot leak it.
pub struct NotificationCenter {
    store: Arc<dyn NotificationStore>,
    user: Identity,
    view: Arc<watch::Sender<NotificationView>>,
    token: CancellationToken,
    sync_task: Option<JoinHandle<()>>,
}

impl NotificationCenter {
    /// Subscribes to the user's notification feed and starts the sync
    /// loop. The view starts empty and is replaced by the first push.
    pub async fn activate(
        store: Arc<dyn NotificationStore>,
        user: Identity,
    ) -> PortResult<Self> {
        let feed = store.subscribe(user.user_id).await?;
        let (tx, _rx) = watch::channel(NotificationView::default());
        let view = Arc::new(tx);
        let token = CancellationToken::new();

        let sync_task = tokio::spawn(sync_loop(
            feed,
            view.clone(),
            token.clone(),
            user.user_id,
        ));
        info!(user_id = %user.user_id, "notification subscription opened");

        Ok(Self {
            store,
            user,
            view,
            token,
            sync_task: Some(sync_task),
        })
    }

    /// The current snapshot.
    pub fn view(&self) -> NotificationView {
        self.view.borrow().clone()
    }

    /// A receiver that observes every replacement of the view; render
    /// loops await `changed()` on it.
    pub fn watch(&self) -> watch::Receiver<NotificationView> {
        self.view.subscribe()
    }

    /// Marks one notification read. Idempotent: an already-read entry in
    /// the local cache is a no-op and issues no store write. Otherwise
    /// the store write goes out and the local entry is flipped
    /// optimistically; the next full push is authoritative.
    pub async fn mark_as_read(&self, id: Uuid) -> PortResult<()> {
        let already_read = self
            .view
            .borrow()
            .notifications
            .iter()
            .any(|n| n.id == id && n.read);
        if already_read {
            return Ok(());
        }

        self.store.mark_read(id).await?;
        self.view.send_modify(|view| flip_read(view, id));
        Ok(())
    }

    /// Marks every currently-unread cached notification read, as one
    /// logical batch. Entries whose store write fails are left unread
    /// locally, so `unread_count` never falsely reports zero.
    pub async fn mark_all_as_read(&self) -> PortResult<BatchReadOutcome> {
        let unread: Vec<Uuid> = self
            .view
            .borrow()
            .notifications
            .iter()
            .filter(|n| !n.read)
            .map(|n| n.id)
            .collect();

        let mut outcome = BatchReadOutcome {
            marked: 0,
            failed: Vec::new(),
        };
        for id in unread {
            match self.store.mark_read(id).await {
                Ok(()) => {
                    self.view.send_modify(|view| flip_read(view, id));
                    outcome.marked += 1;
                }
                Err(e) => {
                    warn!(notification_id = %id, error = %e, "mark-read failed in batch");
                    outcome.failed.push(id);
                }
            }
        }
        Ok(outcome)
    }

    /// Cancels the subscription. Effective before the next view read:
    /// the sync loop observes the token at its next scheduling point and
    /// stops replacing the view.
    pub fn deactivate(&self) {
        self.token.cancel();
        info!(user_id = %self.user.user_id, "notification subscription closed");
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        // Every deactivation path releases the server-side listener,
        // including error paths that never called deactivate().
        self.token.cancel();
        if let Some(task) = self.sync_task.take() {
            task.abort();
        }
    }
}

/// Flips one cached entry to read and recomputes the unread count. The
/// locally stamped `read_at` is provisional; the server's value arrives
/// with the next push.
fn flip_read(view: &mut NotificationView, id: Uuid) {
    if let Some(n) = view.notifications.iter_mut().find(|n| n.id == id && !n.read) {
        n.read = true;
        n.read_at = Some(Utc::now());
    }
    view.unread_count = view.notifications.iter().filter(|n| !n.read).count();
}

/// Consumes the feed until cancelled or the feed ends. Every successful
/// push replaces the whole cache; a failed push keeps the previous view
/// rather than wiping it.
async fn sync_loop(
    mut feed: NotificationFeed,
    view: Arc<watch::Sender<NotificationView>>,
    token: CancellationToken,
    user_id: Uuid,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            item = feed.next() => match item {
                Some(Ok(batch)) => {
                    view.send_replace(NotificationView::from_batch(batch));
                }
                Some(Err(e)) => {
                    warn!(user_id = %user_id, error = %e, "notification push failed, keeping previous view");
                }
                None => {
                    info!(user_id = %user_id, "notification feed ended");
                    break;
                }
            },
        }
    }
}
