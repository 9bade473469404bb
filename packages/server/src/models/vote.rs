use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::player::PlayerId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOutcome {
    NoConsensus,
    PendingConfirmation { target_id: PlayerId, votes: usize },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionDecision {
    Confirm,
    Reject,
}

/// Day votes keyed by voter; a voter changing their mind overwrites the
/// earlier vote.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteBox {
    votes: HashMap<PlayerId, PlayerId>,
}

impl VoteBox {
    pub fn cast(&mut self, voter_id: &str, target_id: &str) {
        self.votes
            .insert(voter_id.to_string(), target_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn has_voted(&self, voter_id: &str) -> bool {
        self.votes.contains_key(voter_id)
    }

    pub fn clear(&mut self) {
        self.votes.clear();
    }

    /// Plurality over the submitted votes. A tie for first place is no
    /// consensus.
    pub fn tally(&self) -> VoteOutcome {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for target in self.votes.values() {
            *counts.entry(target.as_str()).or_default() += 1;
        }

        let Some(max) = counts.values().copied().max() else {
            return VoteOutcome::NoConsensus;
        };
        let mut leaders = counts.iter().filter(|(_, &count)| count == max);
        match (leaders.next(), leaders.next()) {
            (Some((target, _)), None) => VoteOutcome::PendingConfirmation {
                target_id: target.to_string(),
                votes: max,
            },
            _ => VoteOutcome::NoConsensus,
        }
    }
}
