use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::{
    history::{GameHistoryRecord, ProfileStats},
    session::Session,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored data is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Session snapshots and the append-only game history, keyed by venue.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, venue_id: &str, session: &Session) -> Result<(), StoreError>;
    async fn load(&self, venue_id: &str) -> Result<Option<Session>, StoreError>;
    /// Every saved snapshot, in no particular order.
    async fn load_all(&self) -> Result<Vec<Session>, StoreError>;
    async fn append_history(
        &self,
        venue_id: &str,
        record: &GameHistoryRecord,
    ) -> Result<(), StoreError>;
    async fn history(&self, venue_id: &str) -> Result<Vec<GameHistoryRecord>, StoreError>;
}

/// Per-player profile ledger, updated once per concluded game.
#[async_trait]
pub trait ProfileLedger: Send + Sync {
    async fn record_result(
        &self,
        player_id: &str,
        won: bool,
        reward: u64,
    ) -> Result<ProfileStats, StoreError>;
    async fn profile(&self, player_id: &str) -> Result<ProfileStats, StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Session>>,
    history: Mutex<HashMap<String, Vec<GameHistoryRecord>>>,
    profiles: Mutex<HashMap<String, ProfileStats>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, venue_id: &str, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .lock()
            .await
            .insert(venue_id.to_string(), session.clone());
        Ok(())
    }

    async fn load(&self, venue_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().await.get(venue_id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.sessions.lock().await.values().cloned().collect())
    }

    async fn append_history(
        &self,
        venue_id: &str,
        record: &GameHistoryRecord,
    ) -> Result<(), StoreError> {
        self.history
            .lock()
            .await
            .entry(venue_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn history(&self, venue_id: &str) -> Result<Vec<GameHistoryRecord>, StoreError> {
        Ok(self
            .history
            .lock()
            .await
            .get(venue_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProfileLedger for MemoryStore {
    async fn record_result(
        &self,
        player_id: &str,
        won: bool,
        reward: u64,
    ) -> Result<ProfileStats, StoreError> {
        let mut profiles = self.profiles.lock().await;
        let stats = profiles.entry(player_id.to_string()).or_default();
        stats.record(won, reward);
        Ok(*stats)
    }

    async fn profile(&self, player_id: &str) -> Result<ProfileStats, StoreError> {
        Ok(self
            .profiles
            .lock()
            .await
            .get(player_id)
            .copied()
            .unwrap_or_default())
    }
}

/// JSON files under a data directory:
/// `sessions/<venue>.json`, `history/<venue>.json`, `users/<player>.json`.
pub struct JsonFileStore {
    root: PathBuf,
    // serialises read-modify-write cycles on history and profile files
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path(&self, dir: &str, key: &str) -> PathBuf {
        self.root.join(dir).join(format!("{}.json", file_stem(key)))
    }

    async fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(value)?;
        // write-then-rename so a crash never leaves a torn file behind
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn save(&self, venue_id: &str, session: &Session) -> Result<(), StoreError> {
        Self::write(&self.path("sessions", venue_id), session).await
    }

    async fn load(&self, venue_id: &str) -> Result<Option<Session>, StoreError> {
        Self::read(&self.path("sessions", venue_id)).await
    }

    async fn load_all(&self) -> Result<Vec<Session>, StoreError> {
        let mut entries = match tokio::fs::read_dir(self.root.join("sessions")).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            // unreadable snapshots are skipped, the rest still load
            match Self::read::<Session>(&path).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable session"),
            }
        }
        Ok(sessions)
    }

    async fn append_history(
        &self,
        venue_id: &str,
        record: &GameHistoryRecord,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path("history", venue_id);
        let mut history: Vec<GameHistoryRecord> = Self::read(&path).await?.unwrap_or_default();
        history.push(record.clone());
        Self::write(&path, &history).await
    }

    async fn history(&self, venue_id: &str) -> Result<Vec<GameHistoryRecord>, StoreError> {
        Ok(Self::read(&self.path("history", venue_id))
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProfileLedger for JsonFileStore {
    async fn record_result(
        &self,
        player_id: &str,
        won: bool,
        reward: u64,
    ) -> Result<ProfileStats, StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path("users", player_id);
        let mut stats: ProfileStats = Self::read(&path).await?.unwrap_or_default();
        stats.record(won, reward);
        Self::write(&path, &stats).await?;
        Ok(stats)
    }

    async fn profile(&self, player_id: &str) -> Result<ProfileStats, StoreError> {
        Ok(Self::read(&self.path("users", player_id))
            .await?
            .unwrap_or_default())
    }
}

/// Keeps identities usable as file names without letting them escape the
/// data directory.
fn file_stem(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}
