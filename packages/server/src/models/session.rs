use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    night::NightActions,
    player::{PlayerId, VenueId},
    role::Team,
    roster::{Roster, TeamCounts},
    vote::VoteBox,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Lobby, // 参加受付中
    Night, // 夜フェーズ
    Day,   // 議論フェーズ
    Vote,  // 投票フェーズ
    Ended, // ゲーム終了
}

impl Phase {
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Night | Phase::Day | Phase::Vote)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lobby => write!(f, "lobby"),
            Phase::Night => write!(f, "night"),
            Phase::Day => write!(f, "day"),
            Phase::Vote => write!(f, "vote"),
            Phase::Ended => write!(f, "ended"),
        }
    }
}

/// Identifies the phase a timer was armed for. A timer whose token no longer
/// matches the session is stale and must be ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseToken {
    pub phase: Phase,
    pub day_number: u32,
    pub epoch: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingExecution {
    pub target_id: PlayerId,
    pub votes: usize,
}

/// Full state of one venue's game. This is also the persisted snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub venue_id: VenueId,
    #[serde(default)]
    pub roster: Roster,
    #[serde(default = "lobby")]
    pub phase: Phase,
    #[serde(default = "first_day")]
    pub day_number: u32,
    #[serde(default)]
    pub night_actions: NightActions,
    #[serde(default)]
    pub votes: VoteBox,
    #[serde(default)]
    pub pending_execution: Option<PendingExecution>,
    #[serde(default)]
    pub winning_team: Option<Team>,
    #[serde(default)]
    pub admin_id: Option<PlayerId>,
    #[serde(default)]
    pub epoch: u64,
}

fn lobby() -> Phase {
    Phase::Lobby
}

fn first_day() -> u32 {
    1
}

impl Session {
    pub fn new(venue_id: impl Into<VenueId>) -> Self {
        Session {
            venue_id: venue_id.into(),
            roster: Roster::new(),
            phase: Phase::Lobby,
            day_number: 1,
            night_actions: NightActions::default(),
            votes: VoteBox::default(),
            pending_execution: None,
            winning_team: None,
            admin_id: None,
            epoch: 0,
        }
    }

    pub fn token(&self) -> PhaseToken {
        PhaseToken {
            phase: self.phase,
            day_number: self.day_number,
            epoch: self.epoch,
        }
    }

    /// Back to an empty lobby. The epoch keeps counting so timers armed for
    /// the previous game can never match the next one.
    pub fn reset(&mut self) {
        let epoch = self.epoch + 1;
        *self = Session::new(self.venue_id.clone());
        self.epoch = epoch;
    }

    /// Nothing worth keeping: an empty lobby.
    pub fn is_blank(&self) -> bool {
        self.phase == Phase::Lobby && self.roster.is_empty()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            venue_id: self.venue_id.clone(),
            phase: self.phase,
            day_number: self.day_number,
            players: self
                .roster
                .iter()
                .map(|p| PlayerView {
                    id: p.id.clone(),
                    display_name: p.display_name.clone(),
                    alive: p.alive,
                })
                .collect(),
            alive: self.roster.alive_by_team(),
            awaiting_confirmation: self
                .pending_execution
                .as_ref()
                .map(|pending| pending.target_id.clone()),
        }
    }
}

/// Public view of a session; never exposes roles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub venue_id: VenueId,
    pub phase: Phase,
    pub day_number: u32,
    pub players: Vec<PlayerView>,
    pub alive: TeamCounts,
    pub awaiting_confirmation: Option<PlayerId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub display_name: String,
    pub alive: bool,
}
