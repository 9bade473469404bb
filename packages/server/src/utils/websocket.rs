use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::models::{
    chat::ChatMessage,
    notification::{Notification, Notifier},
};
use crate::state::{AppState, VenueEvent};

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Connections without an id only see group traffic and cannot chat.
    pub player_id: Option<String>,
}

/// Inbound chat frame.
#[derive(Debug, Deserialize)]
struct ChatFrame {
    content: String,
    #[serde(default)]
    player_name: Option<String>,
}

pub async fn handler(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, venue_id, params.player_id))
}

/// Whether a venue event goes out on this player's socket.
fn should_deliver(event: &VenueEvent, player_id: Option<&str>) -> bool {
    match event {
        VenueEvent::Notification(notification) => notification.is_visible_to(player_id),
        VenueEvent::Chat(_) => true,
    }
}

pub async fn handle_socket(
    ws: WebSocket,
    state: AppState,
    venue_id: String,
    player_id: Option<String>,
) {
    info!(venue = %venue_id, player = ?player_id, "websocket connected");
    let (mut sender, mut receiver) = ws.split();
    let mut events = state.subscribe(&venue_id);

    let send_player = player_id.clone();
    let send_venue = venue_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(venue = %send_venue, skipped, "websocket subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !should_deliver(&event, send_player.as_deref()) {
                continue;
            }
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to encode venue event");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_venue = venue_id.clone();
    let mut receive_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let Some(player_id) = player_id.as_deref() else {
                continue;
            };
            let frame = match serde_json::from_str::<ChatFrame>(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    recv_state.channels.publish(Notification::private(
                        &recv_venue,
                        player_id,
                        format!("Malformed message: {}", e),
                    ));
                    continue;
                }
            };
            relay_chat(&recv_state, &recv_venue, player_id, frame).await;
        }
    });

    // whichever side finishes first takes the other down with it
    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }
    info!(venue = %venue_id, "websocket disconnected");
}

async fn relay_chat(state: &AppState, venue_id: &str, player_id: &str, frame: ChatFrame) {
    // a venue without a live session has no speech restrictions
    let allowed = state
        .manager
        .can_speak(venue_id, player_id)
        .await
        .unwrap_or(true);
    if !allowed {
        debug!(venue = %venue_id, player = player_id, "chat suppressed");
        state.channels.publish(Notification::private(
            venue_id,
            player_id,
            "You cannot speak right now.",
        ));
        return;
    }
    let name = frame.player_name.unwrap_or_else(|| player_id.to_string());
    let message = ChatMessage::new(player_id.to_string(), name, frame.content);
    state.channels.send(venue_id, VenueEvent::Chat(message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_notifications_are_filtered() {
        let event = VenueEvent::Notification(Notification::private("v", "1", "secret"));
        assert!(should_deliver(&event, Some("1")));
        assert!(!should_deliver(&event, Some("2")));
        assert!(!should_deliver(&event, None));

        let event = VenueEvent::Notification(Notification::group("v", "hello"));
        assert!(should_deliver(&event, None));
    }
}
