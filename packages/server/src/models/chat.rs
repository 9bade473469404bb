use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat relayed between players of one venue over the websocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub player_id: String,
    pub player_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(player_id: String, player_name: String, content: String) -> Self {
        ChatMessage {
            message_id: uuid::Uuid::new_v4().to_string(),
            player_id,
            player_name,
            content,
            timestamp: Utc::now(),
        }
    }
}
