//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use lektor_core::dashboard::DashboardService;
use lektor_core::ports::{IdentityProvider, NotificationStore, SubmissionStore};
use lektor_core::review::ReviewService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub notifications: Arc<dyn NotificationStore>,
    pub reviews: ReviewService,
    pub dashboard: DashboardService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        submissions: Arc<dyn SubmissionStore>,
        notifications: Arc<dyn NotificationStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            identity,
            notifications,
            reviews: ReviewService::new(submissions.clone()),
            dashboard: DashboardService::new(submissions),
            config,
        }
    }
}
