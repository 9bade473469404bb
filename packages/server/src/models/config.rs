use std::env;
use std::time::Duration;

use super::session::Phase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub min_players: usize,
    pub max_players: usize,
    pub night_seconds: u64,
    pub day_seconds: u64,
    pub vote_seconds: u64,
    pub win_reward: u64,
    pub lose_reward: u64,
    // タイマーで自動的にフェーズを進めるかどうか
    pub auto_advance_phases: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 3,
            max_players: 8,
            night_seconds: 30,
            day_seconds: 45,
            vote_seconds: 15,
            win_reward: 20,
            lose_reward: 10,
            auto_advance_phases: true,
        }
    }
}

/// Smallest table that deals a don, a doctor and a detective.
pub const MIN_TABLE_SIZE: usize = 3;

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let min_players = env_number("MAFIA_MIN_PLAYERS")
            .unwrap_or(defaults.min_players)
            .max(MIN_TABLE_SIZE);
        let max_players = env_number("MAFIA_MAX_PLAYERS")
            .filter(|max| *max >= min_players)
            .unwrap_or(defaults.max_players.max(min_players));
        let night_seconds = env_number("MAFIA_NIGHT_SECONDS").unwrap_or(defaults.night_seconds);
        let day_seconds = env_number("MAFIA_DAY_SECONDS").unwrap_or(defaults.day_seconds);
        let vote_seconds = env_number("MAFIA_VOTE_SECONDS").unwrap_or(defaults.vote_seconds);
        let win_reward = env_number("MAFIA_WIN_REWARD").unwrap_or(defaults.win_reward);
        let lose_reward = env_number("MAFIA_LOSE_REWARD").unwrap_or(defaults.lose_reward);
        let auto_advance_phases = env::var("MAFIA_AUTO_ADVANCE_PHASES")
            .map(|v| v != "false")
            .unwrap_or(defaults.auto_advance_phases);

        Self {
            min_players,
            max_players,
            night_seconds,
            day_seconds,
            vote_seconds,
            win_reward,
            lose_reward,
            auto_advance_phases,
        }
    }

    /// Countdown for a timed phase. Lobby and Ended have none.
    pub fn phase_duration(&self, phase: Phase) -> Option<Duration> {
        let seconds = match phase {
            Phase::Night => self.night_seconds,
            Phase::Day => self.day_seconds,
            Phase::Vote => self.vote_seconds,
            Phase::Lobby | Phase::Ended => return None,
        };
        Some(Duration::from_secs(seconds))
    }

    pub fn reward_for(&self, won: bool) -> u64 {
        if won {
            self.win_reward
        } else {
            self.lose_reward
        }
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
