use std::sync::{Arc, Weak};

use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{
    error::GameError,
    game::Game,
    history::GameSummary,
    notification::{Notification, Notifier},
    player::PlayerId,
    role::ActionKind,
    session::{PhaseToken, SessionView},
    vote::ExecutionDecision,
};
use crate::services::{
    session_manager::Inner,
    storage::{ProfileLedger, SessionStore},
};

pub type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Events applied to one session, strictly one at a time.
pub enum SessionCommand {
    Register {
        player_id: PlayerId,
        display_name: String,
        reply: Reply<String>,
    },
    Start {
        requester_id: PlayerId,
        authorized: bool,
        reply: Reply<String>,
    },
    NightAction {
        actor_id: PlayerId,
        target_id: PlayerId,
        kind: Option<ActionKind>,
        reply: Reply<String>,
    },
    Vote {
        voter_id: PlayerId,
        target_id: PlayerId,
        reply: Reply<String>,
    },
    Execution {
        requester_id: PlayerId,
        target_id: PlayerId,
        decision: ExecutionDecision,
        authorized: bool,
        reply: Reply<String>,
    },
    ForceEnd {
        requester_id: PlayerId,
        authorized: bool,
        reply: Reply<String>,
    },
    Advance {
        requester_id: PlayerId,
        authorized: bool,
        reply: Reply<String>,
    },
    View {
        reply: Reply<SessionView>,
    },
    RoleBriefing {
        player_id: PlayerId,
        reply: Reply<String>,
    },
    CanSpeak {
        player_id: PlayerId,
        reply: Reply<bool>,
    },
    TimerFired(PhaseToken),
}

/// Single writer for one venue: owns the [`Game`], its countdown and the
/// receiving end of the venue's command queue.
pub(crate) struct SessionTask {
    session_id: u64,
    game: Game,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    // weak so that pending timers never keep the queue open on their own
    timer_sender: mpsc::WeakUnboundedSender<SessionCommand>,
    timer: Option<JoinHandle<()>>,
    // the last save failed; retried on every command until it succeeds
    unsaved: bool,
    // the game is over but its blank lobby is not on disk yet
    finished: bool,
    rng: StdRng,
    store: Arc<dyn SessionStore>,
    ledger: Arc<dyn ProfileLedger>,
    notifier: Arc<dyn Notifier>,
    manager: Weak<Inner>,
}

impl SessionTask {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        session_id: u64,
        game: Game,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
        timer_sender: mpsc::WeakUnboundedSender<SessionCommand>,
        store: Arc<dyn SessionStore>,
        ledger: Arc<dyn ProfileLedger>,
        notifier: Arc<dyn Notifier>,
        manager: Weak<Inner>,
    ) -> Self {
        Self {
            session_id,
            game,
            commands,
            timer_sender,
            timer: None,
            unsaved: false,
            finished: false,
            rng: StdRng::from_entropy(),
            store,
            ledger,
            notifier,
            manager,
        }
    }

    pub(crate) async fn run(mut self) {
        let venue_id = self.venue_id();
        info!(venue = %venue_id, session = self.session_id, "session task started");
        // a restored session resumes its countdown from the start
        self.rearm();

        while let Some(command) = self.commands.recv().await {
            let before = self.game.token();
            let changed = self.apply(command);
            self.flush();

            if let Some(summary) = self.game.take_summary() {
                self.cancel_timer();
                self.settle(summary).await;
                self.finished = true;
                self.release_players().await;
            } else if self.game.token() != before {
                self.rearm();
            }
            if changed || self.unsaved || self.finished {
                self.persist().await;
            }
            // retire only once the finished game is off disk
            if self.finished && !self.unsaved {
                if self.game.session().is_blank() {
                    self.retire().await;
                    break;
                }
                self.finished = false;
            }
        }

        self.cancel_timer();
        info!(venue = %venue_id, session = self.session_id, "session task stopped");
    }

    /// Applies one command and answers its caller. Returns whether the
    /// session changed.
    fn apply(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Register {
                player_id,
                display_name,
                reply,
            } => respond(reply, self.game.register(&player_id, &display_name)),
            SessionCommand::Start {
                requester_id,
                authorized,
                reply,
            } => {
                let result = self.game.start(&requester_id, authorized, &mut self.rng);
                respond(reply, result)
            }
            SessionCommand::NightAction {
                actor_id,
                target_id,
                kind,
                reply,
            } => respond(
                reply,
                self.game.submit_night_action(&actor_id, &target_id, kind),
            ),
            SessionCommand::Vote {
                voter_id,
                target_id,
                reply,
            } => respond(reply, self.game.cast_vote(&voter_id, &target_id)),
            SessionCommand::Execution {
                requester_id,
                target_id,
                decision,
                authorized,
                reply,
            } => respond(
                reply,
                self.game
                    .decide_execution(&requester_id, &target_id, decision, authorized),
            ),
            SessionCommand::ForceEnd {
                requester_id,
                authorized,
                reply,
            } => respond(reply, self.game.force_end(&requester_id, authorized)),
            SessionCommand::Advance {
                requester_id,
                authorized,
                reply,
            } => respond(reply, self.game.advance_phase(&requester_id, authorized)),
            SessionCommand::View { reply } => {
                let _ = reply.send(Ok(self.game.view()));
                false
            }
            SessionCommand::RoleBriefing { player_id, reply } => {
                let _ = reply.send(self.game.role_briefing(&player_id));
                false
            }
            SessionCommand::CanSpeak { player_id, reply } => {
                let _ = reply.send(Ok(self.game.can_speak(&player_id)));
                false
            }
            SessionCommand::TimerFired(token) => self.game.on_timer(token),
        }
    }

    fn flush(&mut self) {
        for notification in self.game.take_notifications() {
            self.notifier.publish(notification);
        }
    }

    /// Replaces any running countdown with one for the current phase.
    fn rearm(&mut self) {
        self.cancel_timer();
        let Some(duration) = self.game.timer_duration() else {
            return;
        };
        let token = self.game.token();
        let sender = self.timer_sender.clone();
        debug!(venue = %self.game.session().venue_id, ?token, ?duration, "timer armed");
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender.send(SessionCommand::TimerFired(token));
            }
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    async fn persist(&mut self) {
        let session = self.game.session();
        match self.store.save(&session.venue_id, session).await {
            Ok(()) => self.unsaved = false,
            Err(e) => {
                // the in-memory session stays authoritative
                warn!(venue = %session.venue_id, error = %e, "failed to save session");
                self.unsaved = true;
            }
        }
    }

    /// Pays out rewards and records the finished game.
    async fn settle(&self, summary: GameSummary) {
        let venue_id = self.venue_id();
        for reward in &summary.rewards {
            match self
                .ledger
                .record_result(&reward.player_id, reward.won, reward.amount)
                .await
            {
                Ok(stats) => self.notifier.publish(Notification::private(
                    &venue_id,
                    &reward.player_id,
                    format!(
                        "Game over! You {}.\nReward: {} dollars\nTotal balance: {} dollars",
                        if reward.won { "won" } else { "lost" },
                        reward.amount,
                        stats.total_reward
                    ),
                )),
                Err(e) => warn!(
                    venue = %venue_id,
                    player = %reward.player_id,
                    error = %e,
                    "failed to record game result"
                ),
            }
        }
        if let Err(e) = self.store.append_history(&venue_id, &summary.record).await {
            warn!(venue = %venue_id, error = %e, "failed to append game history");
        }
    }

    async fn retire(&self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.retire(&self.venue_id(), self.session_id).await;
        }
    }

    async fn release_players(&self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.release_players(&self.venue_id()).await;
        }
    }

    fn venue_id(&self) -> String {
        self.game.session().venue_id.clone()
    }
}

fn respond(reply: Reply<String>, result: Result<String, GameError>) -> bool {
    let changed = result.is_ok();
    // the caller may have gone away; the command still happened
    let _ = reply.send(result);
    changed
}
