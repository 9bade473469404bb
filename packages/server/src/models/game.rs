use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};

use super::{
    config::GameConfig,
    error::GameError,
    history::{GameHistoryRecord, GameSummary, Reward},
    night::NightOutcome,
    notification::{ChoiceOption, Notification},
    player::Player,
    role::{ActionKind, Role, Team},
    session::{PendingExecution, Phase, PhaseToken, Session, SessionView},
    vote::{ExecutionDecision, VoteOutcome},
};

const INDECISION: &str = "The players could not decide. Nobody was hanged.";

/// The per-venue state machine. Every command validates fully before it
/// touches the session, so a rejected command leaves no trace.
///
/// Outbound messages pile up in an outbox and a finished game leaves a
/// [`GameSummary`]; the owner drains both after each command.
pub struct Game {
    session: Session,
    config: GameConfig,
    outbox: Vec<Notification>,
    summary: Option<GameSummary>,
}

impl Game {
    pub fn new(venue_id: &str, config: GameConfig) -> Self {
        Self::from_snapshot(Session::new(venue_id), config)
    }

    pub fn from_snapshot(session: Session, config: GameConfig) -> Self {
        Game {
            session,
            config,
            outbox: Vec::new(),
            summary: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn token(&self) -> PhaseToken {
        self.session.token()
    }

    pub fn view(&self) -> SessionView {
        self.session.view()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_summary(&mut self) -> Option<GameSummary> {
        self.summary.take()
    }

    /// Countdown to arm for the current phase, if any. Waiting for an
    /// execution decision has no timeout.
    pub fn timer_duration(&self) -> Option<Duration> {
        if !self.config.auto_advance_phases || self.session.pending_execution.is_some() {
            return None;
        }
        self.config.phase_duration(self.session.phase)
    }

    pub fn register(&mut self, player_id: &str, display_name: &str) -> Result<String, GameError> {
        self.require_phase(Phase::Lobby)?;
        self.session
            .roster
            .register(player_id, display_name, self.config.max_players)?;
        debug!(venue = %self.session.venue_id, player = player_id, "player registered");

        let names: Vec<&str> = self
            .session
            .roster
            .iter()
            .map(|p| p.display_name.as_str())
            .collect();
        self.group(format!(
            "{} joined the game.\nRegistered: {}",
            display_name,
            names.join(", ")
        ));
        Ok("Registration complete!".to_string())
    }

    pub fn start<R: Rng + ?Sized>(
        &mut self,
        requester_id: &str,
        authorized: bool,
        rng: &mut R,
    ) -> Result<String, GameError> {
        self.require_phase(Phase::Lobby)?;
        if !authorized {
            return Err(GameError::NotAuthorized);
        }
        self.session
            .roster
            .assign_roles(self.config.min_players, rng)?;

        self.session.admin_id = Some(requester_id.to_string());
        self.session.day_number = 1;
        self.session.winning_team = None;
        info!(
            venue = %self.session.venue_id,
            players = self.session.roster.len(),
            "game started"
        );

        let announcement = self.start_announcement();
        self.group(announcement.clone());
        let briefings: Vec<(String, String)> = self
            .session
            .roster
            .iter()
            .filter_map(|p| Some((p.id.clone(), briefing(p.role?))))
            .collect();
        for (player_id, text) in briefings {
            self.private(&player_id, text);
        }
        self.open_night();
        Ok(announcement)
    }

    pub fn submit_night_action(
        &mut self,
        actor_id: &str,
        target_id: &str,
        kind: Option<ActionKind>,
    ) -> Result<String, GameError> {
        self.require_phase(Phase::Night)?;
        let roster = &self.session.roster;
        let actor = roster
            .get_alive(actor_id)
            .filter(|p| p.is_active())
            .ok_or(GameError::NotAuthorized)?;
        let role = actor.role.ok_or(GameError::NotAuthorized)?;
        let kind = kind.unwrap_or(role.night_actions()[0]);
        if !role.night_actions().contains(&kind) {
            return Err(GameError::invalid_phase(self.session.phase));
        }
        let target = roster.get_alive(target_id).ok_or(GameError::UnknownTarget)?;
        if !is_selectable(actor, target, kind, self.session.day_number) {
            return Err(GameError::UnknownTarget);
        }

        self.session.night_actions.submit(actor_id, target_id, kind);
        debug!(venue = %self.session.venue_id, actor = actor_id, %kind, "night action recorded");
        let acknowledgement = role.acknowledgement(kind).to_string();
        self.group(acknowledgement.clone());

        let everyone_acted = self
            .session
            .roster
            .alive()
            .filter(|p| p.is_active())
            .all(|p| self.session.night_actions.has_acted(&p.id));
        if everyone_acted {
            self.resolve_night();
        }
        Ok(acknowledgement)
    }

    pub fn cast_vote(&mut self, voter_id: &str, target_id: &str) -> Result<String, GameError> {
        self.require_phase(Phase::Vote)?;
        if self.session.pending_execution.is_some() {
            return Err(GameError::invalid_phase("execution confirmation"));
        }
        let roster = &self.session.roster;
        roster.get_alive(voter_id).ok_or(GameError::NotAuthorized)?;
        if voter_id == target_id || roster.get_alive(target_id).is_none() {
            return Err(GameError::UnknownTarget);
        }

        self.session.votes.cast(voter_id, target_id);
        debug!(venue = %self.session.venue_id, voter = voter_id, "vote recorded");

        if self.session.votes.len() >= self.session.roster.alive().count() {
            self.close_vote();
        }
        Ok("Your vote has been recorded.".to_string())
    }

    pub fn decide_execution(
        &mut self,
        requester_id: &str,
        target_id: &str,
        decision: ExecutionDecision,
        authorized: bool,
    ) -> Result<String, GameError> {
        self.require_phase(Phase::Vote)?;
        let pending = self
            .session
            .pending_execution
            .clone()
            .ok_or_else(|| GameError::invalid_phase(Phase::Vote))?;
        let may_decide = authorized
            || self.is_admin(requester_id)
            || self.session.roster.get_alive(requester_id).is_some();
        if !may_decide {
            return Err(GameError::NotAuthorized);
        }
        if pending.target_id != target_id {
            return Err(GameError::UnknownTarget);
        }

        self.session.pending_execution = None;
        match decision {
            ExecutionDecision::Confirm => {
                let message = self.hang(target_id);
                Ok(message)
            }
            ExecutionDecision::Reject => {
                self.group(INDECISION);
                self.start_next_night();
                Ok(INDECISION.to_string())
            }
        }
    }

    /// Ends a running game in the town's favour regardless of the board.
    pub fn force_end(&mut self, requester_id: &str, authorized: bool) -> Result<String, GameError> {
        if !self.session.phase.is_active() {
            return Err(GameError::invalid_phase(self.session.phase));
        }
        if !(authorized || self.is_admin(requester_id)) {
            return Err(GameError::NotAuthorized);
        }
        info!(venue = %self.session.venue_id, requester = requester_id, "game force-ended");
        self.finish(Team::Town, true);
        Ok("The game is over! Every player received their reward.".to_string())
    }

    /// Moves on as if the current phase's timer had fired.
    pub fn advance_phase(&mut self, requester_id: &str, authorized: bool) -> Result<String, GameError> {
        if !self.session.phase.is_active() || self.session.pending_execution.is_some() {
            return Err(GameError::invalid_phase(self.session.phase));
        }
        if !(authorized || self.is_admin(requester_id)) {
            return Err(GameError::NotAuthorized);
        }
        let from = self.session.phase;
        self.on_timer(self.token());
        Ok(format!("Advanced from the {} phase", from))
    }

    /// Handles an expired countdown. Returns false for stale timers, which
    /// leave the session untouched.
    pub fn on_timer(&mut self, token: PhaseToken) -> bool {
        if token != self.token() {
            debug!(venue = %self.session.venue_id, ?token, "stale timer ignored");
            return false;
        }
        match self.session.phase {
            Phase::Night => self.resolve_night(),
            Phase::Day => self.open_vote(),
            Phase::Vote if self.session.pending_execution.is_none() => self.close_vote(),
            _ => return false,
        }
        true
    }

    pub fn role_briefing(&self, player_id: &str) -> Result<String, GameError> {
        let player = self
            .session
            .roster
            .get(player_id)
            .ok_or(GameError::SessionNotFound)?;
        let role = player
            .role
            .ok_or_else(|| GameError::invalid_phase(self.session.phase))?;
        Ok(briefing(role))
    }

    /// Night is silent; during the day only the living may talk.
    pub fn can_speak(&self, player_id: &str) -> bool {
        match self.session.phase {
            Phase::Lobby | Phase::Ended => true,
            Phase::Night => false,
            Phase::Day | Phase::Vote => self.session.roster.get_alive(player_id).is_some(),
        }
    }

    fn resolve_night(&mut self) {
        let outcome = self
            .session
            .night_actions
            .resolve(&mut self.session.roster);
        for check in &outcome.checks {
            let role = check.target_role.map(|r| r.title()).unwrap_or("Stranger");
            let text = format!("{} is the {}", check.target_name, role);
            self.private(&check.detective_id, text);
        }
        self.announce_successor();
        self.morning_report(&outcome);
        if !self.check_win() {
            self.transition(Phase::Day);
        }
    }

    fn open_vote(&mut self) {
        self.session.votes.clear();
        self.session.pending_execution = None;
        self.transition(Phase::Vote);
        self.group("Time to vote!\nWho do you think is the mafia?");

        let menus: Vec<(String, Vec<ChoiceOption>)> = self
            .session
            .roster
            .alive()
            .map(|voter| {
                let options = self
                    .session
                    .roster
                    .alive()
                    .filter(|p| p.id != voter.id)
                    .map(|p| ChoiceOption::new(p.id.clone(), p.display_name.clone()))
                    .collect();
                (voter.id.clone(), options)
            })
            .collect();
        for (voter_id, options) in menus {
            self.outbox.push(
                Notification::private(&self.session.venue_id, &voter_id, "Pick a player to vote for:")
                    .with_options(options),
            );
        }
    }

    fn close_vote(&mut self) {
        let outcome = self.session.votes.tally();
        self.session.votes.clear();
        match outcome {
            VoteOutcome::NoConsensus => {
                self.group(INDECISION);
                self.start_next_night();
            }
            VoteOutcome::PendingConfirmation { target_id, votes } => {
                let name = self
                    .session
                    .roster
                    .get(&target_id)
                    .map(|p| p.display_name.clone())
                    .unwrap_or_default();
                let options = vec![
                    ChoiceOption::new(format!("confirm:{}", target_id), format!("Hang {}", votes)),
                    ChoiceOption::new(format!("reject:{}", target_id), format!("Spare {}", votes)),
                ];
                self.session.pending_execution = Some(PendingExecution { target_id, votes });
                // the vote countdown must not fire while the town decides
                self.session.epoch += 1;
                self.outbox.push(
                    Notification::group(
                        &self.session.venue_id,
                        format!("Are you sure you want to hang {}?", name),
                    )
                    .with_options(options),
                );
            }
        }
    }

    fn hang(&mut self, target_id: &str) -> String {
        self.session.roster.kill(target_id);
        let message = match self.session.roster.get(target_id) {
            Some(player) => format!(
                "{} ({}) was hanged!",
                player.display_name,
                player.role.map(|r| r.title()).unwrap_or("Stranger")
            ),
            None => INDECISION.to_string(),
        };
        info!(venue = %self.session.venue_id, target = target_id, "player hanged");
        self.group(message.clone());
        self.announce_successor();
        if !self.check_win() {
            self.start_next_night();
        }
        message
    }

    fn start_next_night(&mut self) {
        self.session.day_number += 1;
        self.group("Night falls!\nOnly the brave go out on the streets tonight...");
        self.open_night();
    }

    fn open_night(&mut self) {
        self.session.night_actions.clear();
        self.session.votes.clear();
        self.session.pending_execution = None;
        self.transition(Phase::Night);

        let menus: Vec<(String, String, Vec<ChoiceOption>)> = self
            .session
            .roster
            .alive()
            .filter(|p| p.is_active())
            .map(|actor| {
                let kind = actor
                    .role
                    .map(|r| r.night_actions()[0])
                    .unwrap_or(ActionKind::Kill);
                let options = self
                    .session
                    .roster
                    .alive()
                    .filter(|target| is_selectable(actor, target, kind, self.session.day_number))
                    .map(|p| ChoiceOption::new(p.id.clone(), p.display_name.clone()))
                    .collect();
                let prompt = if actor.role == Some(Role::Detective) {
                    "Make your choice: check a player, or shoot."
                } else {
                    "Make your choice:"
                };
                (actor.id.clone(), prompt.to_string(), options)
            })
            .collect();
        for (actor_id, prompt, options) in menus {
            self.outbox.push(
                Notification::private(&self.session.venue_id, &actor_id, prompt).with_options(options),
            );
        }
    }

    /// Evaluates the board and finishes the game when a side has won.
    fn check_win(&mut self) -> bool {
        let counts = self.session.roster.alive_by_team();
        let winner = if counts.mafia == 0 {
            Team::Town
        } else if counts.mafia >= counts.town {
            Team::Mafia
        } else {
            return false;
        };
        self.finish(winner, false);
        true
    }

    fn finish(&mut self, winner: Team, force_ended: bool) {
        self.transition(Phase::Ended);
        self.session.winning_team = Some(winner);
        self.group(match winner {
            Team::Town => "🎉 The town wins! The mafia has been defeated!",
            Team::Mafia => "🎭 The mafia wins! The city is theirs!",
        });

        let rewards = self
            .session
            .roster
            .iter()
            .map(|p| {
                let won = p.team() == Some(winner);
                Reward {
                    player_id: p.id.clone(),
                    won,
                    amount: self.config.reward_for(won),
                }
            })
            .collect();
        let record = GameHistoryRecord {
            game_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            players: self.session.roster.players().to_vec(),
            winning_team: winner,
            day_number: self.session.day_number,
            force_ended,
        };
        info!(
            venue = %self.session.venue_id,
            winner = ?winner,
            days = self.session.day_number,
            "game finished"
        );
        self.summary = Some(GameSummary { record, rewards });
        self.session.reset();
    }

    fn announce_successor(&mut self) {
        let promoted = self
            .session
            .roster
            .promote_successor()
            .map(|p| p.id.clone());
        if let Some(player_id) = promoted {
            info!(venue = %self.session.venue_id, player = %player_id, "new don promoted");
            self.private(
                &player_id,
                format!("The Don is dead. You are the {} now.", Role::Don),
            );
        }
    }

    fn transition(&mut self, phase: Phase) {
        debug!(
            venue = %self.session.venue_id,
            from = %self.session.phase,
            to = %phase,
            day = self.session.day_number,
            "phase change"
        );
        self.session.phase = phase;
        self.session.epoch += 1;
    }

    fn morning_report(&mut self, outcome: &NightOutcome) {
        let lines = outcome.narrative();
        let events = if lines.is_empty() {
            "Nobody died tonight.".to_string()
        } else {
            lines.join("\n")
        };
        let counts = self.session.roster.alive_by_team();
        let text = format!(
            "Good morning!\nThe sun rises and dries the blood spilled on the sidewalks...\n☀️ Day: {}\n\n{}\n\nAlive players:\n{}\n\nOf them:\n\n{} - {}\n---------\n{} - {}\n\n🎪 Total: {}\n\nNow is the time to discuss the night's events...",
            self.session.day_number,
            events,
            self.session.roster.alive_listing(),
            Team::Town,
            counts.town,
            Team::Mafia,
            counts.mafia,
            counts.town + counts.mafia,
        );
        self.group(text);
    }

    fn start_announcement(&self) -> String {
        let roster = &self.session.roster;
        let counts = roster.alive_by_team();
        let in_play = |team: Team| {
            roster
                .iter()
                .filter_map(|p| p.role)
                .filter(|r| r.team() == team)
                .map(|r| r.title())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!(
            "The Mafia game has started!\n\nNight falls!\nOnly the brave go out on the streets. We will count heads in the morning...\n\nAlive players:\n{}\n\nOf them:\n\n{} - {}\n {}\n---------\n{} - {}\n {}\n\n🎪 Total: {}",
            roster.alive_listing(),
            Team::Town,
            counts.town,
            in_play(Team::Town),
            Team::Mafia,
            counts.mafia,
            in_play(Team::Mafia),
            roster.len(),
        )
    }

    fn require_phase(&self, phase: Phase) -> Result<(), GameError> {
        if self.session.phase == phase {
            Ok(())
        } else {
            Err(GameError::invalid_phase(self.session.phase))
        }
    }

    fn is_admin(&self, player_id: &str) -> bool {
        self.session.admin_id.as_deref() == Some(player_id)
    }

    fn group(&mut self, text: impl Into<String>) {
        let notification = Notification::group(&self.session.venue_id, text);
        self.outbox.push(notification);
    }

    fn private(&mut self, player_id: &str, text: impl Into<String>) {
        let notification = Notification::private(&self.session.venue_id, player_id, text);
        self.outbox.push(notification);
    }
}

fn briefing(role: Role) -> String {
    let mut text = format!("Your role: {}\n\n{}\n", role.title(), role.description());
    if role.has_night_action() {
        text.push_str("\nMake your choice:");
    }
    text
}

/// Who `actor` may pick at night: never a mafia teammate for the mafia, and
/// only the doctor may pick themselves, on the first night.
fn is_selectable(actor: &Player, target: &Player, kind: ActionKind, day_number: u32) -> bool {
    if !target.alive {
        return false;
    }
    if actor.id == target.id {
        return kind == ActionKind::Heal && day_number == 1;
    }
    !(actor.is_mafia() && target.is_mafia())
}
