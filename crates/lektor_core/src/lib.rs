pub mod dashboard;
pub mod domain;
pub mod notifications;
pub mod ports;
pub mod review;

#[cfg(test)]
pub(crate) mod testing;

pub use dashboard::{Dashboard, DashboardService, Section, StatusFilter};
pub use domain::{
    resolve_role, Identity, NavIntent, NewSubmission, Notification, NotificationKind, ReviewPatch,
    Role, Submission, SubmissionStatus,
};
pub use notifications::{BatchReadOutcome, NotificationCenter, NotificationView};
pub use ports::{
    IdentityProvider, NotificationFeed, NotificationStore, PortError, PortResult, SubmissionStore,
};
pub use review::{ReviewService, SubmissionView};
