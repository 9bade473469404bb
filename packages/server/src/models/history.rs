use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    player::{Player, PlayerId},
    role::Team,
};

/// One concluded game, appended to the venue's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameHistoryRecord {
    pub game_id: String,
    pub timestamp: DateTime<Utc>,
    pub players: Vec<Player>,
    pub winning_team: Team,
    pub day_number: u32,
    #[serde(default)]
    pub force_ended: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reward {
    pub player_id: PlayerId,
    pub won: bool,
    pub amount: u64,
}

/// Everything the caller needs to settle a finished game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    pub record: GameHistoryRecord,
    pub rewards: Vec<Reward>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    #[serde(default)]
    pub games_played: u64,
    #[serde(default)]
    pub games_won: u64,
    #[serde(default)]
    pub total_reward: u64,
}

impl ProfileStats {
    pub fn record(&mut self, won: bool, amount: u64) {
        self.games_played += 1;
        if won {
            self.games_won += 1;
        }
        self.total_reward += amount;
    }

    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            self.games_won as f64 / self.games_played as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_record() {
        let mut stats = ProfileStats::default();
        assert_eq!(stats.win_rate(), 0.0);
        stats.record(true, 20);
        stats.record(false, 10);
        assert_eq!(stats.games_played, 2);
        assert_eq!(stats.games_won, 1);
        assert_eq!(stats.total_reward, 30);
        assert_eq!(stats.win_rate(), 50.0);
    }
}
