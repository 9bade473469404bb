use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::player::{PlayerId, VenueId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "player_id", rename_all = "snake_case")]
pub enum Recipient {
    /// Everyone in the venue.
    Group,
    /// A private message to one player.
    Player(PlayerId),
}

/// A selectable option attached to a message (a target, or a decision).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

impl ChoiceOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub venue_id: VenueId,
    pub recipient: Recipient,
    pub text: String,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn group(venue_id: &str, text: impl Into<String>) -> Self {
        Self::new(venue_id, Recipient::Group, text.into(), Vec::new())
    }

    pub fn private(venue_id: &str, player_id: &str, text: impl Into<String>) -> Self {
        Self::new(
            venue_id,
            Recipient::Player(player_id.to_string()),
            text.into(),
            Vec::new(),
        )
    }

    pub fn with_options(mut self, options: Vec<ChoiceOption>) -> Self {
        self.options = options;
        self
    }

    /// Whether `player_id` should see this notification.
    pub fn is_visible_to(&self, player_id: Option<&str>) -> bool {
        match &self.recipient {
            Recipient::Group => true,
            Recipient::Player(id) => player_id == Some(id.as_str()),
        }
    }

    fn new(venue_id: &str, recipient: Recipient, text: String, options: Vec<ChoiceOption>) -> Self {
        Notification {
            notification_id: uuid::Uuid::new_v4().to_string(),
            venue_id: venue_id.to_string(),
            recipient,
            text,
            options,
            timestamp: Utc::now(),
        }
    }
}

/// Outbound side of the transport. Delivery is fire-and-forget.
pub trait Notifier: Send + Sync {
    fn publish(&self, notification: Notification);
}
