use dotenvy::dotenv;
use std::sync::Once;

use crate::models::config::GameConfig;
use crate::state::AppState;
use crate::utils::config::ServerConfig;

static INIT: Once = Once::new();

/// Loads `.env` and routes tracing output through the test harness once per
/// test binary.
pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("mafia_server=debug"))
            .with_test_writer()
            .try_init();
    });
}

/// Engine settings for tests: the defaults, with timers under test control.
pub fn test_game_config(auto_advance_phases: bool) -> GameConfig {
    GameConfig {
        auto_advance_phases,
        ..GameConfig::default()
    }
}

/// In-memory application state where everyone is an admin.
pub fn test_state(auto_advance_phases: bool) -> AppState {
    setup_test_env();
    AppState::new(
        ServerConfig::default(),
        test_game_config(auto_advance_phases),
    )
}
