use std::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Town,
    Mafia,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Don,       // マフィアのボス
    Mafia,     // マフィア
    Doctor,    // 医者
    Detective, // 刑事
    Citizen,   // 市民
    Crazy,     // 狂人
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Kill,
    Heal,
    Check,
    Shoot,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Don,
        Role::Mafia,
        Role::Doctor,
        Role::Detective,
        Role::Citizen,
        Role::Crazy,
    ];

    pub fn team(self) -> Team {
        match self {
            Role::Don | Role::Mafia => Team::Mafia,
            Role::Doctor | Role::Detective | Role::Citizen | Role::Crazy => Team::Town,
        }
    }

    /// Night actions this role may submit. The first entry is the default
    /// when a submission omits the action kind.
    pub fn night_actions(self) -> &'static [ActionKind] {
        match self {
            Role::Don | Role::Mafia => &[ActionKind::Kill],
            Role::Doctor => &[ActionKind::Heal],
            Role::Detective => &[ActionKind::Check, ActionKind::Shoot],
            Role::Citizen | Role::Crazy => &[],
        }
    }

    pub fn has_night_action(self) -> bool {
        !self.night_actions().is_empty()
    }

    pub fn title(self) -> &'static str {
        match self {
            Role::Don => "🕴 Don",
            Role::Mafia => "🤵🏻 Mafia",
            Role::Doctor => "👨🏻‍⚕️ Doctor",
            Role::Detective => "🕵🏻‍♂️ Detective",
            Role::Citizen => "👫 Citizen",
            Role::Crazy => "🧌 Crazy",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::Don => "Head of the mafia. Every night you pick a player to eliminate.",
            Role::Mafia => {
                "Acts on the Don's orders at night. Takes over as Don when the Don dies."
            }
            Role::Doctor => {
                "Every night you pick one player to protect from death. On the first night you may protect yourself."
            }
            Role::Detective => {
                "Every night you either check a player's role or draw your gun and shoot."
            }
            Role::Citizen => {
                "No night action. Discuss in the morning and hang the mafia by vote."
            }
            Role::Crazy => "Sides with the town but has no night action. Nobody knows what you think.",
        }
    }

    /// Line broadcast to the venue when this role submits `kind`. Never names
    /// the actor or target.
    pub fn acknowledgement(self, kind: ActionKind) -> &'static str {
        match (self, kind) {
            (Role::Don, _) => "🕴 The Don has chosen a victim...",
            (Role::Mafia, _) => "🤵🏻 The mafia is loading its guns...",
            (Role::Doctor, _) => "👨🏻‍⚕️ The Doctor went out on the night shift...",
            (Role::Detective, ActionKind::Shoot) => "🕵🏻‍♂️ The Detective drew his gun...",
            (Role::Detective, _) => "🕵🏻‍♂️ The Detective went looking for villains!",
            _ => "Someone moved in the dark...",
        }
    }
}

impl Team {
    pub fn title(self) -> &'static str {
        match self {
            Team::Town => "👫 Town",
            Team::Mafia => "👥 Mafia",
        }
    }
}

/// Roles in play for a roster of `size`: thresholds unlock special roles,
/// the remaining seats are citizens.
pub fn lineup(size: usize) -> Vec<Role> {
    let mut roles = Vec::with_capacity(size);
    if size >= 3 {
        roles.extend([Role::Don, Role::Doctor, Role::Detective]);
    }
    if size >= 4 {
        roles.push(Role::Mafia);
    }
    if size >= 5 {
        roles.push(Role::Crazy);
    }
    while roles.len() < size {
        roles.push(Role::Citizen);
    }
    roles
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Kill => write!(f, "kill"),
            ActionKind::Heal => write!(f, "heal"),
            ActionKind::Check => write!(f, "check"),
            ActionKind::Shoot => write!(f, "shoot"),
        }
    }
}
