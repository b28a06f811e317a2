//! crates/lektor_core/src/review.rs
//!
//! The submission lifecycle controller. Owns the `Pending -> Done`
//! transition and its authorization gate; every status/notes mutation in
//! the system funnels through `submit_review` here.

use crate::domain::{
    resolve_role, Identity, NewSubmission, ReviewPatch, Role, Submission, SubmissionStatus,
};
use crate::ports::{PortError, PortResult, SubmissionStore};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A submission together with the viewer's derived role. Returned only
/// when the role is not `None`.
#[derive(Debug, Clone)]
pub struct SubmissionView {
    pub submission: Submission,
    pub role: Role,
}

/// Coordinates reads and the guarded review transition against the
/// submission store.
#[derive(Clone)]
pub struct ReviewService {
    submissions: Arc<dyn SubmissionStore>,
}

impl ReviewService {
    pub fn new(submissions: Arc<dyn SubmissionStore>) -> Self {
        Self { submissions }
    }

    /// Fetches a submission and resolves the viewer's role.
    ///
    /// A viewer with role `None` gets `Unauthorized` and never sees the
    /// record's content; a missing id gets `NotFound`. The two are kept
    /// distinct deliberately.
    pub async fn load_submission(&self, id: Uuid, viewer: Identity) -> PortResult<SubmissionView> {
        let submission = self.submissions.get_submission(id).await?;
        match resolve_role(&submission, viewer.user_id) {
            Role::None => Err(PortError::Unauthorized),
            role => Ok(SubmissionView { submission, role }),
        }
    }

    /// Files the review and moves the submission `Pending -> Done`.
    ///
    /// Validation and authorization are resolved locally before any
    /// mutating I/O. The final status check is enforced again by the
    /// store's conditional update, so a concurrent reviewer loses with
    /// `InvalidTransition` rather than silently overwriting notes.
    pub async fn submit_review(
        &self,
        id: Uuid,
        reviewer: Identity,
        notes: &str,
    ) -> PortResult<Submission> {
        let notes = notes.trim();
        if notes.is_empty() {
            return Err(PortError::Validation(
                "review notes must not be empty".to_string(),
            ));
        }

        let submission = self.submissions.get_submission(id).await?;
        if resolve_role(&submission, reviewer.user_id) != Role::Reviewer {
            return Err(PortError::Unauthorized);
        }
        if submission.status == SubmissionStatus::Done {
            return Err(PortError::InvalidTransition(format!(
                "submission {} is already reviewed",
                id
            )));
        }

        let updated = self
            .submissions
            .submit_review(
                id,
                SubmissionStatus::Pending,
                ReviewPatch {
                    notes: notes.to_string(),
                },
            )
            .await?;

        // The owner's DocumentReviewed notification is created by the
        // store side of this transition; we neither block on nor poll
        // for its appearance.
        info!(submission_id = %id, reviewer_id = %reviewer.user_id, "review submitted");
        Ok(updated)
    }

    /// Records a new upload. The reviewer is matched externally; the
    /// caller passes the chosen reviewer id through.
    pub async fn create_submission(
        &self,
        owner: Identity,
        reviewer_id: Uuid,
        file_name: &str,
        size: i64,
        storage_ref: &str,
    ) -> PortResult<Submission> {
        let created = self
            .submissions
            .create_submission(NewSubmission {
                owner_id: owner.user_id,
                reviewer_id,
                file_name: file_name.to_string(),
                size,
                storage_ref: storage_ref.to_string(),
            })
            .await?;
        info!(submission_id = %created.id, owner_id = %owner.user_id, "submission created");
        Ok(created)
    }
}
