use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard, OnceCell};
use tracing::{info, warn};

use crate::models::{
    config::GameConfig,
    error::GameError,
    game::Game,
    history::{GameHistoryRecord, ProfileStats},
    notification::Notifier,
    player::{PlayerId, VenueId},
    role::ActionKind,
    session::SessionView,
    vote::ExecutionDecision,
};
use crate::services::{
    session_task::{Reply, SessionCommand, SessionTask},
    storage::{ProfileLedger, SessionStore, StoreError},
};

struct SessionHandle {
    session_id: u64,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<VenueId, SessionHandle>,
    // a player belongs to at most one venue at a time
    players: HashMap<PlayerId, VenueId>,
}

pub(crate) struct Inner {
    registry: Mutex<Registry>,
    // saved games are brought back once, before the registry is first used
    restored: OnceCell<()>,
    next_session_id: AtomicU64,
    config: GameConfig,
    store: Arc<dyn SessionStore>,
    ledger: Arc<dyn ProfileLedger>,
    notifier: Arc<dyn Notifier>,
}

impl Inner {
    /// Forgets a finished session and releases its players.
    pub(crate) async fn retire(&self, venue_id: &str, session_id: u64) {
        let mut registry = self.registry.lock().await;
        let current = registry
            .sessions
            .get(venue_id)
            .is_some_and(|handle| handle.session_id == session_id);
        if current {
            registry.sessions.remove(venue_id);
            registry.players.retain(|_, venue| venue != venue_id);
            info!(venue = %venue_id, session = session_id, "session retired");
        }
    }

    /// Frees the players of a finished game whose session stays up.
    pub(crate) async fn release_players(&self, venue_id: &str) {
        self.registry
            .lock()
            .await
            .players
            .retain(|_, venue| venue != venue_id);
    }
}

/// Routes every operation for a venue onto that venue's command queue.
/// Sessions are created on first registration, restored from the store before
/// the registry is first used and retired once their game is over.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        config: GameConfig,
        store: Arc<dyn SessionStore>,
        ledger: Arc<dyn ProfileLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                restored: OnceCell::new(),
                next_session_id: AtomicU64::new(1),
                config,
                store,
                ledger,
                notifier,
            }),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.inner.config
    }

    pub async fn register(
        &self,
        venue_id: &str,
        player_id: &str,
        display_name: &str,
    ) -> Result<String, GameError> {
        let (commands, reserved) = {
            let mut registry = self.registry().await;
            if let Some(venue) = registry.players.get(player_id) {
                if venue != venue_id {
                    return Err(GameError::AlreadyRegistered);
                }
            }
            let commands = match live_sender(&mut registry, venue_id) {
                Some(commands) => commands,
                None => {
                    let game = Game::new(venue_id, self.inner.config.clone());
                    self.spawn_locked(&mut registry, game)
                }
            };
            // reserved before the session answers so a concurrent join for
            // another venue is refused
            let reserved = registry
                .players
                .insert(player_id.to_string(), venue_id.to_string())
                .is_none();
            (commands, reserved)
        };

        let (reply, response) = oneshot::channel();
        let result = send(
            &commands,
            SessionCommand::Register {
                player_id: player_id.to_string(),
                display_name: display_name.to_string(),
                reply,
            },
            response,
        )
        .await;

        if reserved && result.is_err() {
            self.release(venue_id, player_id).await;
        }
        result
    }

    pub async fn start(
        &self,
        venue_id: &str,
        requester_id: &str,
        authorized: bool,
    ) -> Result<String, GameError> {
        self.dispatch(venue_id, |reply| SessionCommand::Start {
            requester_id: requester_id.to_string(),
            authorized,
            reply,
        })
        .await
    }

    pub async fn submit_night_action(
        &self,
        venue_id: &str,
        actor_id: &str,
        target_id: &str,
        kind: Option<ActionKind>,
    ) -> Result<String, GameError> {
        self.dispatch(venue_id, |reply| SessionCommand::NightAction {
            actor_id: actor_id.to_string(),
            target_id: target_id.to_string(),
            kind,
            reply,
        })
        .await
    }

    pub async fn cast_vote(
        &self,
        venue_id: &str,
        voter_id: &str,
        target_id: &str,
    ) -> Result<String, GameError> {
        self.dispatch(venue_id, |reply| SessionCommand::Vote {
            voter_id: voter_id.to_string(),
            target_id: target_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn decide_execution(
        &self,
        venue_id: &str,
        requester_id: &str,
        target_id: &str,
        decision: ExecutionDecision,
        authorized: bool,
    ) -> Result<String, GameError> {
        self.dispatch(venue_id, |reply| SessionCommand::Execution {
            requester_id: requester_id.to_string(),
            target_id: target_id.to_string(),
            decision,
            authorized,
            reply,
        })
        .await
    }

    pub async fn force_end(
        &self,
        venue_id: &str,
        requester_id: &str,
        authorized: bool,
    ) -> Result<String, GameError> {
        self.dispatch(venue_id, |reply| SessionCommand::ForceEnd {
            requester_id: requester_id.to_string(),
            authorized,
            reply,
        })
        .await
    }

    pub async fn advance_phase(
        &self,
        venue_id: &str,
        requester_id: &str,
        authorized: bool,
    ) -> Result<String, GameError> {
        self.dispatch(venue_id, |reply| SessionCommand::Advance {
            requester_id: requester_id.to_string(),
            authorized,
            reply,
        })
        .await
    }

    pub async fn view(&self, venue_id: &str) -> Result<SessionView, GameError> {
        self.dispatch(venue_id, |reply| SessionCommand::View { reply }).await
    }

    pub async fn role_briefing(&self, venue_id: &str, player_id: &str) -> Result<String, GameError> {
        self.dispatch(venue_id, |reply| SessionCommand::RoleBriefing {
            player_id: player_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn can_speak(&self, venue_id: &str, player_id: &str) -> Result<bool, GameError> {
        self.dispatch(venue_id, |reply| SessionCommand::CanSpeak {
            player_id: player_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn venue_of(&self, player_id: &str) -> Option<VenueId> {
        self.registry().await.players.get(player_id).cloned()
    }

    /// Resumes every unfinished game found in the store. Runs once; later
    /// calls return immediately.
    pub async fn restore_saved_sessions(&self) {
        self.inner
            .restored
            .get_or_init(|| self.restore_from_store())
            .await;
    }

    pub async fn profile(&self, player_id: &str) -> Result<ProfileStats, StoreError> {
        self.inner.ledger.profile(player_id).await
    }

    pub async fn history(&self, venue_id: &str) -> Result<Vec<GameHistoryRecord>, StoreError> {
        self.inner.store.history(venue_id).await
    }

    async fn dispatch<T>(
        &self,
        venue_id: &str,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, GameError> {
        let commands = {
            let mut registry = self.registry().await;
            live_sender(&mut registry, venue_id).ok_or(GameError::SessionNotFound)?
        };
        let (reply, response) = oneshot::channel();
        send(&commands, command(reply), response).await
    }

    async fn registry(&self) -> MutexGuard<'_, Registry> {
        self.restore_saved_sessions().await;
        self.inner.registry.lock().await
    }

    async fn restore_from_store(&self) {
        // read before locking so no command waits on storage
        let sessions = match self.inner.store.load_all().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "failed to load saved sessions");
                return;
            }
        };

        let mut registry = self.inner.registry.lock().await;
        for session in sessions.into_iter().filter(|s| !s.is_blank()) {
            let venue_id = session.venue_id.clone();
            if registry.sessions.contains_key(&venue_id) {
                continue;
            }
            let seated_elsewhere = session.roster.iter().find(|p| {
                registry
                    .players
                    .get(&p.id)
                    .is_some_and(|venue| *venue != venue_id)
            });
            if let Some(player) = seated_elsewhere {
                warn!(
                    venue = %venue_id,
                    player = %player.id,
                    "player already seated in another saved game, session not restored"
                );
                continue;
            }

            info!(venue = %venue_id, phase = %session.phase, "restoring saved session");
            for player in session.roster.iter() {
                registry.players.insert(player.id.clone(), venue_id.clone());
            }
            let game = Game::from_snapshot(session, self.inner.config.clone());
            self.spawn_locked(&mut registry, game);
        }
    }

    fn spawn_locked(
        &self,
        registry: &mut Registry,
        game: Game,
    ) -> mpsc::UnboundedSender<SessionCommand> {
        let session_id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        let venue_id = game.session().venue_id.clone();
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = SessionTask::new(
            session_id,
            game,
            receiver,
            commands.downgrade(),
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.ledger),
            Arc::clone(&self.inner.notifier),
            Arc::downgrade(&self.inner),
        );
        tokio::spawn(task.run());
        registry.sessions.insert(
            venue_id,
            SessionHandle {
                session_id,
                commands: commands.clone(),
            },
        );
        commands
    }

    async fn release(&self, venue_id: &str, player_id: &str) {
        let mut registry = self.registry().await;
        if registry.players.get(player_id).map(String::as_str) == Some(venue_id) {
            registry.players.remove(player_id);
        }
    }
}

fn live_sender(
    registry: &mut Registry,
    venue_id: &str,
) -> Option<mpsc::UnboundedSender<SessionCommand>> {
    let handle = registry.sessions.get(venue_id)?;
    if !handle.commands.is_closed() {
        return Some(handle.commands.clone());
    }
    registry.sessions.remove(venue_id);
    None
}

async fn send<T>(
    commands: &mpsc::UnboundedSender<SessionCommand>,
    command: SessionCommand,
    response: oneshot::Receiver<Result<T, GameError>>,
) -> Result<T, GameError> {
    commands
        .send(command)
        .map_err(|_| GameError::SessionNotFound)?;
    // a session that stops before answering has been retired
    response.await.unwrap_or(Err(GameError::SessionNotFound))
}
