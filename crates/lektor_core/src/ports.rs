//! crates/lektor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{
    Identity, NewSubmission, Notification, ReviewPatch, Submission, SubmissionStatus,
};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by all port operations.
///
/// Partial failure of a batch (dashboard halves, mark-all) is not a
/// variant here; it is carried structurally by the callers so that the
/// surviving half of a batch is never suppressed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    /// No valid identity. Surfaced as a redirect to login, never as an
    /// in-page error.
    #[error("Not authenticated")]
    Unauthenticated,
    /// The caller exists but may not see or mutate the target. Distinct
    /// from `NotFound` so "exists but forbidden" is never reported as
    /// "does not exist".
    #[error("Not authorized")]
    Unauthorized,
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The guarded `Pending -> Done` update found the submission already
    /// reviewed. A retry after a lost race sees this, not a transport
    /// error.
    #[error("Already reviewed: {0}")]
    InvalidTransition(String),
    /// Rejected before any I/O (e.g. whitespace-only review notes).
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Network/store unavailable. Eligible for user-initiated retry;
    /// mutating operations are never auto-retried.
    #[error("Service temporarily unavailable: {0}")]
    Transient(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A live notification feed. Every server-side change matching the
/// subscription re-delivers the *entire* current result set, ordered by
/// `created_at` descending with an id-stable tie-break.
pub type NotificationFeed = Pin<Box<dyn Stream<Item = PortResult<Vec<Notification>>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The identity boundary. Credential issuance lives outside this core;
/// only session validation and renewal are consumed.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves a session token to an identity, or `Unauthenticated`.
    async fn validate_session(&self, token: &str) -> PortResult<Identity>;

    /// Extends the lifetime of a still-valid session token.
    async fn refresh_session(&self, token: &str) -> PortResult<()>;
}

/// The submission persistence boundary.
///
/// Query results keep the store-defined order (`created_at` descending);
/// callers never re-sort.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn get_submission(&self, id: Uuid) -> PortResult<Submission>;

    async fn create_submission(&self, new: NewSubmission) -> PortResult<Submission>;

    async fn query_by_owner(&self, user_id: Uuid) -> PortResult<Vec<Submission>>;

    async fn query_by_reviewer(&self, user_id: Uuid) -> PortResult<Vec<Submission>>;

    /// The guarded review transition: applies `patch`, `status = Done`
    /// and a store-stamped `reviewed_at` only if the stored status still
    /// equals `expected` at write time. A mismatch fails with
    /// `InvalidTransition` instead of overwriting, which is what makes
    /// two concurrent reviewers resolve to exactly one winner.
    async fn submit_review(
        &self,
        id: Uuid,
        expected: SubmissionStatus,
        patch: ReviewPatch,
    ) -> PortResult<Submission>;
}

/// The notification persistence boundary.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Opens a standing live query for one user's notifications. The
    /// returned feed must be dropped (or its consumer cancelled) to
    /// release the server-side listener.
    async fn subscribe(&self, user_id: Uuid) -> PortResult<NotificationFeed>;

    /// Sets `read = true` and `read_at = now` (store clock). Harmless
    /// if the notification is already read.
    async fn mark_read(&self, id: Uuid) -> PortResult<()>;
}
