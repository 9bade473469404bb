use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::models::{
    chat::ChatMessage,
    config::GameConfig,
    notification::{Notification, Notifier},
};
use crate::services::{
    session_manager::SessionManager,
    storage::{JsonFileStore, MemoryStore, ProfileLedger, SessionStore},
};
use crate::utils::config::ServerConfig;

const CHANNEL_CAPACITY: usize = 1000;

/// Everything pushed to a venue's websocket subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum VenueEvent {
    Notification(Notification),
    Chat(ChatMessage),
}

/// One broadcast channel per venue, created on first use.
#[derive(Default)]
pub struct VenueChannels {
    channels: Mutex<HashMap<String, broadcast::Sender<VenueEvent>>>,
}

impl VenueChannels {
    pub fn channel(&self, venue_id: &str) -> broadcast::Sender<VenueEvent> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(venue_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub fn send(&self, venue_id: &str, event: VenueEvent) {
        if self.channel(venue_id).send(event).is_err() {
            warn!(venue = %venue_id, "no subscribers, event dropped");
        }
    }
}

impl Notifier for VenueChannels {
    fn publish(&self, notification: Notification) {
        let venue_id = notification.venue_id.clone();
        self.send(&venue_id, VenueEvent::Notification(notification));
    }
}

#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
    pub channels: Arc<VenueChannels>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Picks the JSON store when a data directory is configured, memory otherwise.
    pub fn new(config: ServerConfig, game_config: GameConfig) -> Self {
        match config.data_dir.clone() {
            Some(dir) => {
                let store = Arc::new(JsonFileStore::new(dir));
                Self::with_store(config, game_config, store.clone(), store)
            }
            None => {
                let store = Arc::new(MemoryStore::new());
                Self::with_store(config, game_config, store.clone(), store)
            }
        }
    }

    pub fn with_store(
        config: ServerConfig,
        game_config: GameConfig,
        store: Arc<dyn SessionStore>,
        ledger: Arc<dyn ProfileLedger>,
    ) -> Self {
        let channels = Arc::new(VenueChannels::default());
        let manager = SessionManager::new(game_config, store, ledger, channels.clone());
        AppState {
            manager,
            channels,
            config: Arc::new(config),
        }
    }

    pub fn subscribe(&self, venue_id: &str) -> broadcast::Receiver<VenueEvent> {
        self.channels.channel(venue_id).subscribe()
    }

    pub fn is_admin(&self, player_id: &str) -> bool {
        self.config.is_admin(player_id)
    }
}
