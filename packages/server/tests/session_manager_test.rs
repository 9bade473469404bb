use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use mafia_server::{
    models::{
        error::GameError,
        history::GameHistoryRecord,
        notification::Recipient,
        role::{ActionKind, Role, Team},
        session::{Phase, Session},
        vote::ExecutionDecision,
    },
    services::storage::{MemoryStore, ProfileLedger, SessionStore, StoreError},
    state::{AppState, VenueEvent},
    utils::{
        config::ServerConfig,
        test_setup::{setup_test_env, test_game_config},
    },
};

const VENUE: &str = "-100500";

fn state_with(store: Arc<MemoryStore>, auto_advance: bool) -> AppState {
    setup_test_env();
    AppState::with_store(
        ServerConfig::default(),
        test_game_config(auto_advance),
        store.clone(),
        store,
    )
}

/// Memory store whose snapshot saves can be switched off.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_saves: AtomicBool,
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn save(&self, venue_id: &str, session: &Session) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into());
        }
        self.inner.save(venue_id, session).await
    }

    async fn load(&self, venue_id: &str) -> Result<Option<Session>, StoreError> {
        self.inner.load(venue_id).await
    }

    async fn load_all(&self) -> Result<Vec<Session>, StoreError> {
        self.inner.load_all().await
    }

    async fn append_history(
        &self,
        venue_id: &str,
        record: &GameHistoryRecord,
    ) -> Result<(), StoreError> {
        self.inner.append_history(venue_id, record).await
    }

    async fn history(&self, venue_id: &str) -> Result<Vec<GameHistoryRecord>, StoreError> {
        self.inner.history(venue_id).await
    }
}

async fn register_players(state: &AppState, count: usize) {
    for i in 1..=count {
        let result = state
            .manager
            .register(VENUE, &i.to_string(), &format!("Player{}", i))
            .await;
        assert!(result.is_ok(), "registration failed: {:?}", result);
    }
}

/// Roles are drawn inside the session task; the saved snapshot tells us who got what.
async fn roles_by_player(state: &AppState, store: &MemoryStore) -> HashMap<Role, String> {
    // queued behind the save of the previous command
    state.manager.view(VENUE).await.unwrap();
    let session = store.load(VENUE).await.unwrap().expect("session saved");
    session
        .roster
        .iter()
        .map(|p| (p.role.expect("role assigned"), p.id.clone()))
        .collect()
}

#[tokio::test]
async fn test_mafia_wins_four_player_game() {
    let store = Arc::new(MemoryStore::new());
    let state = state_with(store.clone(), false);
    let mut events = state.subscribe(VENUE);
    register_players(&state, 4).await;

    state.manager.start(VENUE, "1", true).await.unwrap();
    assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Night);

    let roles = roles_by_player(&state, &store).await;
    assert_eq!(roles.len(), 4);
    let (don, mafia, doctor, detective) = (
        &roles[&Role::Don],
        &roles[&Role::Mafia],
        &roles[&Role::Doctor],
        &roles[&Role::Detective],
    );

    state
        .manager
        .submit_night_action(VENUE, don, detective, None)
        .await
        .unwrap();
    state
        .manager
        .submit_night_action(VENUE, mafia, detective, None)
        .await
        .unwrap();
    state
        .manager
        .submit_night_action(VENUE, doctor, mafia, None)
        .await
        .unwrap();
    // the last action resolves the night: mafia 2 against town 1
    state
        .manager
        .submit_night_action(VENUE, detective, don, Some(ActionKind::Check))
        .await
        .unwrap();

    // the finished session is retired once it has settled
    assert_eq!(
        state.manager.view(VENUE).await,
        Err(GameError::SessionNotFound)
    );
    assert_eq!(state.manager.venue_of(don).await, None);

    let mut morning = None;
    let mut rewards = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let VenueEvent::Notification(n) = event {
            if n.text.contains("was killed") {
                morning = Some(n.text.clone());
            }
            if n.text.starts_with("Game over!") {
                rewards.push(n);
            }
        }
    }
    let morning = morning.expect("morning report sent");
    assert!(morning.contains("Player"), "{}", morning);
    assert!(morning.contains(Role::Don.title()), "{}", morning);
    assert_eq!(rewards.len(), 4);
    assert!(rewards
        .iter()
        .all(|n| matches!(n.recipient, Recipient::Player(_))));

    assert_eq!(store.profile(don).await.unwrap().total_reward, 20);
    assert_eq!(store.profile(mafia).await.unwrap().games_won, 1);
    assert_eq!(store.profile(doctor).await.unwrap().total_reward, 10);
    assert_eq!(store.profile(detective).await.unwrap().games_won, 0);

    let history = store.history(VENUE).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].winning_team, Team::Mafia);
    assert!(!history[0].force_ended);

    let saved = store.load(VENUE).await.unwrap().unwrap();
    assert!(saved.is_blank());

    // the venue is free for a new game
    state.manager.register(VENUE, "1", "Player1").await.unwrap();
}

#[tokio::test]
async fn test_player_cannot_join_two_venues() {
    let state = state_with(Arc::new(MemoryStore::new()), false);
    state.manager.register("a", "1", "One").await.unwrap();

    assert_eq!(
        state.manager.register("b", "1", "One").await,
        Err(GameError::AlreadyRegistered)
    );
    assert_eq!(
        state.manager.register("a", "1", "One").await,
        Err(GameError::AlreadyRegistered)
    );
    assert_eq!(state.manager.venue_of("1").await.as_deref(), Some("a"));
    assert_eq!(state.manager.view("a").await.unwrap().players.len(), 1);
}

#[tokio::test]
async fn test_rejected_registration_releases_player() {
    let state = state_with(Arc::new(MemoryStore::new()), false);
    for i in 1..=8 {
        state
            .manager
            .register(VENUE, &i.to_string(), "P")
            .await
            .unwrap();
    }
    assert_eq!(
        state.manager.register(VENUE, "9", "Nine").await,
        Err(GameError::CapacityExceeded)
    );
    assert_eq!(state.manager.venue_of("9").await, None);
    state.manager.register("other", "9", "Nine").await.unwrap();
}

#[tokio::test]
async fn test_unknown_venue() {
    let state = state_with(Arc::new(MemoryStore::new()), false);
    assert_eq!(
        state.manager.start("nowhere", "1", true).await,
        Err(GameError::SessionNotFound)
    );
    assert_eq!(
        state.manager.cast_vote("nowhere", "1", "2").await,
        Err(GameError::SessionNotFound)
    );
}

#[tokio::test(start_paused = true)]
async fn test_timers_drive_the_phases() {
    let state = state_with(Arc::new(MemoryStore::new()), true);
    register_players(&state, 3).await;
    state.manager.start(VENUE, "1", true).await.unwrap();

    // nobody acts: the night passes quietly
    tokio::time::sleep(Duration::from_secs(31)).await;
    let view = state.manager.view(VENUE).await.unwrap();
    assert_eq!(view.phase, Phase::Day);
    assert!(view.players.iter().all(|p| p.alive));

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Vote);

    // no votes: indecision, next night
    tokio::time::sleep(Duration::from_secs(15)).await;
    let view = state.manager.view(VENUE).await.unwrap();
    assert_eq!(view.phase, Phase::Night);
    assert_eq!(view.day_number, 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_advance_cancels_the_old_timer() {
    let state = state_with(Arc::new(MemoryStore::new()), true);
    register_players(&state, 3).await;
    state.manager.start(VENUE, "1", true).await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    state.manager.advance_phase(VENUE, "1", false).await.unwrap();
    assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Day);

    // the night countdown would have expired here
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Day);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Vote);
}

#[tokio::test(start_paused = true)]
async fn test_pending_execution_waits_for_a_decision() {
    let store = Arc::new(MemoryStore::new());
    let state = state_with(store.clone(), true);
    register_players(&state, 5).await;
    state.manager.start(VENUE, "1", true).await.unwrap();
    let roles = roles_by_player(&state, &store).await;
    let suspect = &roles[&Role::Mafia];

    state.manager.advance_phase(VENUE, "1", true).await.unwrap();
    state.manager.advance_phase(VENUE, "1", true).await.unwrap();
    assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Vote);

    let voters: Vec<String> = (1..=5)
        .map(|i| i.to_string())
        .filter(|id| id != suspect)
        .collect();
    for voter in &voters {
        state.manager.cast_vote(VENUE, voter, suspect).await.unwrap();
    }
    let other = voters[0].clone();
    state.manager.cast_vote(VENUE, suspect, &other).await.unwrap();

    let view = state.manager.view(VENUE).await.unwrap();
    assert_eq!(view.awaiting_confirmation.as_deref(), Some(suspect.as_str()));

    // no countdown while the town decides
    tokio::time::sleep(Duration::from_secs(120)).await;
    let view = state.manager.view(VENUE).await.unwrap();
    assert_eq!(view.phase, Phase::Vote);
    assert!(view.awaiting_confirmation.is_some());

    state
        .manager
        .decide_execution(VENUE, &other, suspect, ExecutionDecision::Confirm, false)
        .await
        .unwrap();
    // one mafia left against three town players
    let view = state.manager.view(VENUE).await.unwrap();
    assert_eq!(view.phase, Phase::Night);
    assert_eq!(view.day_number, 2);
    assert!(!view.players.iter().find(|p| &p.id == suspect).unwrap().alive);
}

#[tokio::test]
async fn test_force_end_pays_everyone() {
    let store = Arc::new(MemoryStore::new());
    let state = state_with(store.clone(), false);
    register_players(&state, 3).await;
    state.manager.start(VENUE, "1", true).await.unwrap();

    assert_eq!(
        state.manager.force_end(VENUE, "2", false).await,
        Err(GameError::NotAuthorized)
    );
    state.manager.force_end(VENUE, "1", false).await.unwrap();
    assert_eq!(
        state.manager.view(VENUE).await,
        Err(GameError::SessionNotFound)
    );

    let history = store.history(VENUE).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].force_ended);
    assert_eq!(history[0].winning_team, Team::Town);
    for id in ["1", "2", "3"] {
        assert_eq!(store.profile(id).await.unwrap().games_played, 1);
    }
}

#[tokio::test]
async fn test_session_is_restored_from_the_store() {
    let store = Arc::new(MemoryStore::new());
    {
        let state = state_with(store.clone(), false);
        register_players(&state, 3).await;
        state.manager.start(VENUE, "1", true).await.unwrap();
        state.manager.advance_phase(VENUE, "1", true).await.unwrap();
        assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Day);
    }

    // a fresh manager over the same store picks the game back up
    let state = state_with(store.clone(), false);
    assert_eq!(state.manager.venue_of("2").await.as_deref(), Some(VENUE));
    let view = state.manager.view(VENUE).await.unwrap();
    assert_eq!(view.phase, Phase::Day);
    assert_eq!(view.players.len(), 3);
    assert_eq!(state.manager.venue_of("2").await.as_deref(), Some(VENUE));
    assert!(state.manager.role_briefing(VENUE, "2").await.is_ok());
}

#[tokio::test]
async fn test_saved_players_cannot_join_another_venue_after_restart() {
    let store = Arc::new(MemoryStore::new());
    {
        let state = state_with(store.clone(), false);
        register_players(&state, 3).await;
        state.manager.start(VENUE, "1", true).await.unwrap();
        state.manager.view(VENUE).await.unwrap();
    }

    // nothing has touched the saved venue yet
    let state = state_with(store.clone(), false);
    assert_eq!(
        state.manager.register("elsewhere", "1", "One").await,
        Err(GameError::AlreadyRegistered)
    );
    assert_eq!(state.manager.venue_of("1").await.as_deref(), Some(VENUE));
    assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Night);
    assert_eq!(
        state.manager.view("elsewhere").await,
        Err(GameError::SessionNotFound)
    );
}

#[tokio::test]
async fn test_finished_game_is_not_paid_twice_when_the_final_save_fails() {
    setup_test_env();
    let store = Arc::new(FlakyStore::default());
    let state = AppState::with_store(
        ServerConfig::default(),
        test_game_config(false),
        store.clone(),
        Arc::new(MemoryStore::new()),
    );
    register_players(&state, 3).await;
    state.manager.start(VENUE, "1", true).await.unwrap();
    state.manager.view(VENUE).await.unwrap();

    store.fail_saves.store(true, Ordering::SeqCst);
    state.manager.force_end(VENUE, "1", false).await.unwrap();
    // the mid-game snapshot is still on disk, so the session stays up as an empty lobby
    assert!(matches!(
        state.manager.force_end(VENUE, "1", false).await,
        Err(GameError::InvalidPhaseForAction { .. })
    ));
    assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Lobby);
    assert_eq!(state.manager.profile("1").await.unwrap().games_played, 1);
    assert_eq!(state.manager.history(VENUE).await.unwrap().len(), 1);
    assert_eq!(state.manager.venue_of("2").await, None);
    state.manager.register("other", "2", "Two").await.unwrap();

    // the next command saves the blank lobby and the session retires
    store.fail_saves.store(false, Ordering::SeqCst);
    state.manager.view(VENUE).await.unwrap();
    assert_eq!(
        state.manager.view(VENUE).await,
        Err(GameError::SessionNotFound)
    );
    assert!(store.load(VENUE).await.unwrap().unwrap().is_blank());
    assert_eq!(state.manager.profile("1").await.unwrap().games_played, 1);
}

#[tokio::test]
async fn test_blank_snapshot_is_not_restored() {
    let store = Arc::new(MemoryStore::new());
    store.save(VENUE, &Session::new(VENUE)).await.unwrap();
    let state = state_with(store, false);
    assert_eq!(
        state.manager.view(VENUE).await,
        Err(GameError::SessionNotFound)
    );
}

#[tokio::test]
async fn test_speech_policy() {
    let state = state_with(Arc::new(MemoryStore::new()), false);
    register_players(&state, 3).await;
    assert!(state.manager.can_speak(VENUE, "1").await.unwrap());
    assert!(state.manager.can_speak(VENUE, "stranger").await.unwrap());

    state.manager.start(VENUE, "1", true).await.unwrap();
    assert!(!state.manager.can_speak(VENUE, "1").await.unwrap());

    state.manager.advance_phase(VENUE, "1", true).await.unwrap();
    assert!(state.manager.can_speak(VENUE, "1").await.unwrap());
    assert!(!state.manager.can_speak(VENUE, "stranger").await.unwrap());

    // the vote keeps the daytime rules
    state.manager.advance_phase(VENUE, "1", true).await.unwrap();
    assert_eq!(state.manager.view(VENUE).await.unwrap().phase, Phase::Vote);
    assert!(state.manager.can_speak(VENUE, "1").await.unwrap());
    assert!(!state.manager.can_speak(VENUE, "stranger").await.unwrap());
}
