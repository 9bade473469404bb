use serde::{Deserialize, Serialize};

use super::role::{Role, Team};

/// Opaque identity handed to us by the transport.
pub type PlayerId = String;
/// Identity of the group a session is bound to.
pub type VenueId = String;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default = "alive_default")]
    pub alive: bool,
}

fn alive_default() -> bool {
    true
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role: None,
            alive: true,
        }
    }

    pub fn team(&self) -> Option<Team> {
        self.role.map(Role::team)
    }

    pub fn is_mafia(&self) -> bool {
        self.team() == Some(Team::Mafia)
    }

    /// Alive and holding a role that acts at night.
    pub fn is_active(&self) -> bool {
        self.alive && self.role.is_some_and(Role::has_night_action)
    }
}
