use serde::{Deserialize, Serialize};

/// Rejection of a single command. A session that returns one of these is left
/// exactly as it was before the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum GameError {
    #[error("The game has already reached the maximum number of players")]
    CapacityExceeded,
    #[error("You are already registered")]
    AlreadyRegistered,
    #[error("At least {min} players are required")]
    InsufficientPlayers { min: usize },
    #[error("You are not allowed to do that")]
    NotAuthorized,
    #[error("That is not possible during the {phase} phase")]
    InvalidPhaseForAction { phase: String },
    #[error("Unknown or unavailable target")]
    UnknownTarget,
    #[error("There is no active game here")]
    SessionNotFound,
}

impl GameError {
    pub fn invalid_phase(phase: impl std::fmt::Display) -> Self {
        GameError::InvalidPhaseForAction {
            phase: phase.to_string(),
        }
    }
}
