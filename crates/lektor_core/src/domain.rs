//! crates/lektor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the peer-review application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The lifecycle state of a submission. The only transition is
/// `Pending -> Done`, performed through the guarded review update;
/// it is never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStatus {
    Pending,
    Done,
}

/// A document uploaded for review.
///
/// `owner_id` and `reviewer_id` are immutable after creation; the
/// reviewer is matched externally at upload time. `reviewed_at` is set
/// exactly once, by the store, at the `Pending -> Done` transition.
/// Invariant: `reviewed_at.is_some()` iff `status == Done`.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub reviewer_id: Uuid,
    pub file_name: String,
    pub size: i64,
    /// Opaque pointer to the binary artifact in external storage.
    pub storage_ref: String,
    pub status: SubmissionStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// The fields a caller supplies when creating a submission. Status,
/// notes and timestamps are set by the store.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub owner_id: Uuid,
    pub reviewer_id: Uuid,
    pub file_name: String,
    pub size: i64,
    pub storage_ref: String,
}

/// The mutable part of the review transition. Applied together with
/// `status = Done` and a store-stamped `reviewed_at`.
#[derive(Debug, Clone)]
pub struct ReviewPatch {
    pub notes: String,
}

/// The category of a notification, as written by server-side processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    DocumentAssigned,
    DocumentReviewed,
    Message,
    Other,
}

/// A per-user notification record.
///
/// Created exclusively by server-side processes; the client only ever
/// flips `read`/`read_at` through the mark-read operation and never
/// deletes. Invariant: `read_at.is_some()` iff `read`.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Optional deep link to the submission this notification is about.
    pub action_ref: Option<Uuid>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The authenticated-user handle, threaded explicitly through every
/// entry point rather than read from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
}

/// The viewer's relationship to a submission, derived per request and
/// never stored. `None` is an access-denial signal, not an empty state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reviewer,
    Uploader,
    None,
}

/// Derives the viewer's role for a submission.
///
/// The Reviewer check deliberately precedes the Uploader check: if a
/// user were ever both, the Reviewer capability wins.
pub fn resolve_role(submission: &Submission, viewer: Uuid) -> Role {
    if submission.reviewer_id == viewer {
        Role::Reviewer
    } else if submission.owner_id == viewer {
        Role::Uploader
    } else {
        Role::None
    }
}

/// Abstract navigation intents the core hands to the outer router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavIntent {
    Dashboard,
    Login,
    Submission(Uuid),
}
