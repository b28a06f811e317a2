pub mod middleware;
pub mod notifications_ws;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the main handlers to make them easily accessible
// to the binary that builds the web server router.
pub use middleware::require_auth;
pub use notifications_ws::notifications_ws_handler;
pub use rest::{
    create_submission_handler, dashboard_handler, get_submission_handler, submit_review_handler,
};
