use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{
    player::PlayerId,
    role::{ActionKind, Role},
    roster::Roster,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightAction {
    pub target_id: PlayerId,
    pub kind: ActionKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeathCause {
    /// Killed by the mafia; carries the killer's role for the narrative.
    Killed { by: Role },
    Shot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Death {
    pub victim_id: PlayerId,
    pub victim_name: String,
    pub victim_role: Option<Role>,
    pub cause: DeathCause,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckResult {
    pub detective_id: PlayerId,
    pub target_name: String,
    pub target_role: Option<Role>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NightOutcome {
    pub deaths: Vec<Death>,
    /// Attacked players that survived thanks to a heal.
    pub saved: Vec<(String, Option<Role>)>,
    pub checks: Vec<CheckResult>,
}

impl NightOutcome {
    pub fn dead_ids(&self) -> HashSet<&str> {
        self.deaths.iter().map(|d| d.victim_id.as_str()).collect()
    }

    /// Narrative lines for the morning report.
    pub fn narrative(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for death in &self.deaths {
            let role = death
                .victim_role
                .map(|r| r.title())
                .unwrap_or("Stranger");
            match death.cause {
                DeathCause::Killed { by } => lines.push(format!(
                    "{} ({}) was killed tonight. The killer was the {}.",
                    death.victim_name, role, by
                )),
                DeathCause::Shot => lines.push(format!(
                    "{} ({}) was shot tonight.",
                    death.victim_name, role
                )),
            }
        }
        for (name, role) in &self.saved {
            lines.push(format!(
                "{} ({}) faced death tonight, but the {} was on duty.",
                name,
                role.map(|r| r.title()).unwrap_or("Stranger"),
                Role::Doctor
            ));
        }
        lines
    }
}

/// Pending night actions keyed by actor; the last submission wins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NightActions {
    actions: HashMap<PlayerId, NightAction>,
}

impl NightActions {
    pub fn submit(&mut self, actor_id: &str, target_id: &str, kind: ActionKind) {
        self.actions.insert(
            actor_id.to_string(),
            NightAction {
                target_id: target_id.to_string(),
                kind,
            },
        );
    }

    pub fn has_acted(&self, actor_id: &str) -> bool {
        self.actions.contains_key(actor_id)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Resolves the night against `roster` and marks the victims dead.
    /// The outcome only depends on the set of submitted actions, never on
    /// their submission order.
    pub fn resolve(&mut self, roster: &mut Roster) -> NightOutcome {
        let healed: HashSet<&str> = self
            .actions
            .values()
            .filter(|a| a.kind == ActionKind::Heal)
            .map(|a| a.target_id.as_str())
            .collect();

        // target -> killer roles, collected per target so that several
        // attackers on one victim still produce a single death
        let mut attacks: HashMap<&str, Vec<(Role, ActionKind)>> = HashMap::new();
        let mut checks = Vec::new();
        for (actor_id, action) in &self.actions {
            let Some(actor_role) = roster.get(actor_id).and_then(|p| p.role) else {
                continue;
            };
            match action.kind {
                ActionKind::Kill | ActionKind::Shoot => attacks
                    .entry(action.target_id.as_str())
                    .or_default()
                    .push((actor_role, action.kind)),
                ActionKind::Check => {
                    if let Some(target) = roster.get(&action.target_id) {
                        checks.push(CheckResult {
                            detective_id: actor_id.clone(),
                            target_name: target.display_name.clone(),
                            target_role: target.role,
                        });
                    }
                }
                ActionKind::Heal => {}
            }
        }

        let mut outcome = NightOutcome {
            checks,
            ..NightOutcome::default()
        };

        // walk the roster so narratives come out in seating order
        for player in roster.players() {
            let Some(attackers) = attacks.get(player.id.as_str()) else {
                continue;
            };
            if !player.alive {
                continue;
            }
            if healed.contains(player.id.as_str()) {
                outcome.saved.push((player.display_name.clone(), player.role));
                continue;
            }
            outcome.deaths.push(Death {
                victim_id: player.id.clone(),
                victim_name: player.display_name.clone(),
                victim_role: player.role,
                cause: killer_of(attackers),
            });
        }
        outcome.checks.sort_by(|a, b| a.detective_id.cmp(&b.detective_id));

        for death in &outcome.deaths {
            roster.kill(&death.victim_id);
        }
        self.actions.clear();
        outcome
    }
}

/// A mafia kill takes precedence over a shot in the narrative; among killers
/// the Don is named before a plain mafia.
fn killer_of(attackers: &[(Role, ActionKind)]) -> DeathCause {
    let killer = attackers
        .iter()
        .filter(|(_, kind)| *kind == ActionKind::Kill)
        .map(|(role, _)| *role)
        .min_by_key(|role| match role {
            Role::Don => 0,
            _ => 1,
        });
    match killer {
        Some(by) => DeathCause::Killed { by },
        None => DeathCause::Shot,
    }
}
