use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use super::{
    error::GameError,
    player::Player,
    role::{lineup, Role, Team},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCounts {
    pub town: usize,
    pub mafia: usize,
}

/// Seating order is registration order and drives every listing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        player_id: &str,
        display_name: &str,
        max_players: usize,
    ) -> Result<(), GameError> {
        if self.contains(player_id) {
            return Err(GameError::AlreadyRegistered);
        }
        if self.players.len() >= max_players {
            return Err(GameError::CapacityExceeded);
        }
        self.players.push(Player::new(player_id, display_name));
        Ok(())
    }

    /// One-shot draw: shuffles the lineup for this roster size and deals it
    /// out in seating order.
    pub fn assign_roles<R: Rng + ?Sized>(
        &mut self,
        min_players: usize,
        rng: &mut R,
    ) -> Result<(), GameError> {
        if self.players.len() < min_players {
            return Err(GameError::InsufficientPlayers { min: min_players });
        }
        if self.players.iter().any(|p| p.role.is_some()) {
            return Err(GameError::invalid_phase("role assignment"));
        }

        let mut roles = lineup(self.players.len());
        roles.shuffle(rng);
        for (player, role) in self.players.iter_mut().zip(roles) {
            player.role = Some(role);
        }
        Ok(())
    }

    pub fn alive_by_team(&self) -> TeamCounts {
        let mut counts = TeamCounts::default();
        for player in self.players.iter().filter(|p| p.alive) {
            match player.team() {
                Some(Team::Mafia) => counts.mafia += 1,
                Some(Team::Town) => counts.town += 1,
                None => {}
            }
        }
        counts
    }

    /// Keeps a Don in charge: when no Don is alive, the first alive mafia in
    /// seating order takes the title. Returns the promoted player.
    pub fn promote_successor(&mut self) -> Option<&Player> {
        if self
            .players
            .iter()
            .any(|p| p.alive && p.role == Some(Role::Don))
        {
            return None;
        }
        let index = self
            .players
            .iter()
            .position(|p| p.alive && p.role == Some(Role::Mafia))?;
        self.players[index].role = Some(Role::Don);
        Some(&self.players[index])
    }

    pub fn kill(&mut self, player_id: &str) -> bool {
        match self.get_mut(player_id) {
            Some(player) if player.alive => {
                player.alive = false;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    fn get_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn get_alive(&self, player_id: &str) -> Option<&Player> {
        self.get(player_id).filter(|p| p.alive)
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.get(player_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.alive)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Numbered listing of alive players, used by the start and morning
    /// announcements.
    pub fn alive_listing(&self) -> String {
        self.alive()
            .enumerate()
            .map(|(i, p)| format!("{}. {}", i + 1, p.display_name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[cfg(test)]
    pub(crate) fn set_role(&mut self, player_id: &str, role: Role) {
        if let Some(player) = self.get_mut(player_id) {
            player.role = Some(role);
        }
    }
}
