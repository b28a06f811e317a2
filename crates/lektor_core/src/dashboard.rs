//! crates/lektor_core/src/dashboard.rs
//!
//! The dashboard aggregator. Merges the "my documents" and "my
//! assignments" queries into one view, with independent status filters
//! per list.

use crate::domain::{Identity, Submission, SubmissionStatus};
use crate::ports::{PortError, SubmissionStore};
use std::sync::Arc;
use tracing::{error, warn};

/// Client-side status filter, applied after fetch. The documents filter
/// and the assignments filter never share state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Done,
}

impl StatusFilter {
    fn matches(self, submission: &Submission) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => submission.status == SubmissionStatus::Pending,
            StatusFilter::Done => submission.status == SubmissionStatus::Done,
        }
    }
}

/// One half of the dashboard. A failed query leaves `items` empty and
/// retains the typed failure, so the other half still renders.
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub items: Vec<Submission>,
    pub error: Option<PortError>,
}

impl Section {
    fn from_result(result: Result<Vec<Submission>, PortError>) -> Self {
        match result {
            Ok(items) => Section { items, error: None },
            Err(e) => Section {
                items: Vec::new(),
                error: Some(e),
            },
        }
    }

    /// Applies a status filter without re-sorting; the store-defined
    /// order (created_at descending) is the contract.
    pub fn filtered(&self, filter: StatusFilter) -> Vec<&Submission> {
        self.items.iter().filter(|s| filter.matches(s)).collect()
    }
}

/// The merged dashboard view for one user.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    /// Submissions the user uploaded.
    pub documents: Section,
    /// Submissions assigned to the user for review.
    pub assignments: Section,
}

#[derive(Clone)]
pub struct DashboardService {
    submissions: Arc<dyn SubmissionStore>,
}

impl DashboardService {
    pub fn new(submissions: Arc<dyn SubmissionStore>) -> Self {
        Self { submissions }
    }

    /// Loads both halves of the dashboard concurrently. Partial success
    /// is valid: one failing query never suppresses the other's results.
    ///
    /// A failed assignments query is logged as a warning only and
    /// rendered as "no assignments" (the lenient path); a failed
    /// documents query is a real error. Both retain the typed failure
    /// in their section.
    pub async fn load_dashboard(&self, user: Identity) -> Dashboard {
        let (documents, assignments) = futures::join!(
            self.submissions.query_by_owner(user.user_id),
            self.submissions.query_by_reviewer(user.user_id),
        );

        if let Err(e) = &documents {
            error!(user_id = %user.user_id, error = %e, "documents query failed");
        }
        if let Err(e) = &assignments {
            warn!(user_id = %user.user_id, error = %e, "assignments query failed, treating as no assignments");
        }

        Dashboard {
            documents: Section::from_result(documents),
            assignments: Section::from_result(assignments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_submission, MockSubmissionStore};
    use uuid::Uuid;

    #[tokio::test]
    async fn dashboard_splits_documents_and_assignments() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let store = Arc::new(MockSubmissionStore::new());
        store
            .insert(seed_submission(me, other, SubmissionStatus::Pending))
            .await;
        store
            .insert(seed_submission(me, other, SubmissionStatus::Done))
            .await;
        store
            .insert(seed_submission(other, me, SubmissionStatus::Pending))
            .await;

        let dashboard = DashboardService::new(store)
            .load_dashboard(Identity { user_id: me })
            .await;

        assert_eq!(dashboard.documents.items.len(), 2);
        assert_eq!(dashboard.assignments.items.len(), 1);
        assert!(dashboard.documents.error.is_none());
        assert!(dashboard.assignments.error.is_none());
    }

    #[tokio::test]
    async fn failed_assignments_query_does_not_suppress_documents() {
        let me = Uuid::new_v4();
        let store = Arc::new(MockSubmissionStore::new());
        store
            .insert(seed_submission(me, Uuid::new_v4(), SubmissionStatus::Pending))
            .await;
        store
            .insert(seed_submission(me, Uuid::new_v4(), SubmissionStatus::Done))
            .await;
        store.fail_reviewer_queries();

        let dashboard = DashboardService::new(store)
            .load_dashboard(Identity { user_id: me })
            .await;

        assert_eq!(dashboard.documents.items.len(), 2);
        assert!(dashboard.assignments.items.is_empty());
        assert!(matches!(
            dashboard.assignments.error,
            Some(PortError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn filters_are_independent_per_list() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let store = Arc::new(MockSubmissionStore::new());
        store
            .insert(seed_submission(me, other, SubmissionStatus::Pending))
            .await;
        store
            .insert(seed_submission(me, other, SubmissionStatus::Done))
            .await;
        store
            .insert(seed_submission(other, me, SubmissionStatus::Done))
            .await;

        let dashboard = DashboardService::new(store)
            .load_dashboard(Identity { user_id: me })
            .await;

        let pending_docs = dashboard.documents.filtered(StatusFilter::Pending);
        let done_assignments = dashboard.assignments.filtered(StatusFilter::Done);
        assert_eq!(pending_docs.len(), 1);
        assert_eq!(done_assignments.len(), 1);

        // Filtering one list leaves the other's unfiltered view intact.
        assert_eq!(dashboard.documents.filtered(StatusFilter::All).len(), 2);
        assert_eq!(dashboard.assignments.filtered(StatusFilter::All).len(), 1);
    }
}
