//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for the live notification feed.

use chrono::{DateTime, Utc};
use lektor_core::domain::{NavIntent, Notification, NotificationKind};
use lektor_core::notifications::{BatchReadOutcome, NotificationView};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maps an abstract navigation intent from the core onto a client route.
/// The concrete router lives in the web client; these paths are its
/// contract.
pub fn nav_path(intent: NavIntent) -> String {
    match intent {
        NavIntent::Dashboard => "/dashboard".to_string(),
        NavIntent::Login => "/login".to_string(),
        NavIntent::Submission(id) => format!("/review?id={}", id),
    }
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Marks a single notification as read.
    MarkRead { id: Uuid },

    /// Marks every currently-unread notification as read.
    MarkAllRead,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full current notification list; replaces whatever the client
    /// holds. Sent on connect and after every server-side change.
    Snapshot {
        notifications: Vec<NotificationPayload>,
        unread_count: usize,
    },

    /// Reports the outcome of a mark-all batch, including the ids that
    /// could not be marked.
    MarkAllResult { marked: usize, failed: Vec<Uuid> },

    /// Reports a non-fatal error to the client.
    Error { message: String },
}

impl ServerMessage {
    pub fn snapshot(view: &NotificationView) -> Self {
        ServerMessage::Snapshot {
            notifications: view.notifications.iter().map(NotificationPayload::from).collect(),
            unread_count: view.unread_count,
        }
    }

    pub fn mark_all_result(outcome: &BatchReadOutcome) -> Self {
        ServerMessage::MarkAllResult {
            marked: outcome.marked,
            failed: outcome.failed.clone(),
        }
    }
}

/// The wire form of one notification.
#[derive(Serialize, Debug, Clone)]
pub struct NotificationPayload {
    pub id: Uuid,
    pub kind: &'static str,
    pub title: String,
    pub message: String,
    pub action_ref: Option<Uuid>,
    /// Client route for the deep link, when the notification points at
    /// a submission.
    pub action_url: Option<String>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        let kind = match n.kind {
            NotificationKind::DocumentAssigned => "document_assigned",
            NotificationKind::DocumentReviewed => "document_reviewed",
            NotificationKind::Message => "new_message",
            NotificationKind::Other => "other",
        };
        Self {
            id: n.id,
            kind,
            title: n.title.clone(),
            message: n.message.clone(),
            action_ref: n.action_ref,
            action_url: n.action_ref.map(|id| nav_path(NavIntent::Submission(id))),
            read: n.read,
            read_at: n.read_at,
            created_at: n.created_at,
        }
    }
}
