//! services/api/src/web/notifications_ws.rs
//!
//! The WebSocket entry point for the live notification feed. Each
//! connection activates a `NotificationCenter` for the authenticated
//! user, forwards every view change as a snapshot, and applies the
//! client's mark-read commands.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use lektor_core::domain::Identity;
use lektor_core::notifications::NotificationCenter;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn notifications_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, identity))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, identity: Identity) {
    info!("New notification feed connection for user: {}", identity.user_id);
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Activation Phase ---
    let center = match NotificationCenter::activate(app_state.notifications.clone(), identity).await
    {
        Ok(center) => center,
        Err(e) => {
            error!("Failed to activate notification center: {:?}", e);
            let err_msg = ServerMessage::Error {
                message: "Failed to open the notification feed.".to_string(),
            };
            let _ = send_message(&mut sender, &err_msg).await;
            return;
        }
    };
    let mut view_rx = center.watch();

    // --- 2. Main Loop ---
    // Every replacement of the view goes out as a snapshot; every client
    // text frame is a mark-read command.
    loop {
        tokio::select! {
            changed = view_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = ServerMessage::snapshot(&view_rx.borrow_and_update());
                if send_message(&mut sender, &snapshot).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_client_message(text.to_string(), &center, &mut sender).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client closed the notification feed.");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Notification feed socket error: {}", e);
                    break;
                }
            },
        }
    }

    // --- 3. Cleanup ---
    // Every exit path releases the subscription; Drop covers the rest.
    center.deactivate();
    info!("Notification feed connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_client_message(
    text: String,
    center: &NotificationCenter,
    sender: &mut SplitSink<WebSocket, Message>,
) {
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::MarkRead { id }) => {
            if let Err(e) = center.mark_as_read(id).await {
                warn!(notification_id = %id, "mark_read failed: {:?}", e);
                let err_msg = ServerMessage::Error {
                    message: format!("Could not mark notification as read: {}", e),
                };
                let _ = send_message(sender, &err_msg).await;
            }
        }
        Ok(ClientMessage::MarkAllRead) => match center.mark_all_as_read().await {
            Ok(outcome) => {
                if !outcome.is_complete() {
                    warn!(
                        failed = outcome.failed.len(),
                        "mark_all_read left some notifications unread"
                    );
                }
                let _ = send_message(sender, &ServerMessage::mark_all_result(&outcome)).await;
            }
            Err(e) => {
                let err_msg = ServerMessage::Error {
                    message: format!("Could not mark all notifications as read: {}", e),
                };
                let _ = send_message(sender, &err_msg).await;
            }
        },
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).unwrap();
    sender.send(Message::Text(json.into())).await
}
