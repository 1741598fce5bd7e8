use serde::{Deserialize, Serialize};

use crate::geometry::{Position, Zone};

/// Unique identifier for a connected participant.
pub type ParticipantId = u64;

/// Team index. `NO_TEAM` is the unteamed sentinel and never scores.
pub type TeamId = u8;

pub const NO_TEAM: TeamId = 0;

/// A participant as seen through the roster: team, liveness and position are
/// replicated by the transport and only read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub team: TeamId,
    pub alive: bool,
    pub position: Position,
    pub is_spectator: bool,
}

impl Participant {
    pub fn new(id: ParticipantId, team: TeamId) -> Self {
        Self {
            id,
            display_name: format!("Participant{id}"),
            team,
            alive: true,
            position: Position::default(),
            is_spectator: false,
        }
    }

    /// Spectators never count toward mustering or objectives.
    pub fn is_eligible(&self) -> bool {
        !self.is_spectator
    }

    pub fn has_team(&self) -> bool {
        self.team != NO_TEAM
    }

    /// Alive, eligible and inside `zone`.
    pub fn is_inside(&self, zone: &Zone) -> bool {
        self.alive && self.is_eligible() && zone.contains(&self.position)
    }
}

/// Currently connected participants, in join order.
///
/// Join order is significant: objective scans walk the roster front to back,
/// so the earliest joiner wins ties within a single tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_participants(participants: Vec<Participant>) -> Self {
        let mut roster = Self::new();
        for p in participants {
            roster.upsert(p);
        }
        roster
    }

    /// Insert a participant or replace the entry with the same id in place.
    /// Returns `true` if the participant was not previously present.
    pub fn upsert(&mut self, participant: Participant) -> bool {
        if let Some(existing) = self
            .participants
            .iter_mut()
            .find(|p| p.id == participant.id)
        {
            *existing = participant;
            false
        } else {
            tracing::debug!(participant = participant.id, team = participant.team, "Roster add");
            self.participants.push(participant);
            true
        }
    }

    pub fn remove(&mut self, id: ParticipantId) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(idx))
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    /// Eligible participants that are currently alive.
    pub fn living(&self) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(|p| p.alive && p.is_eligible())
    }

    pub fn eligible_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_eligible()).count()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_in_place_and_keeps_order() {
        let mut roster = Roster::new();
        assert!(roster.upsert(Participant::new(1, 1)));
        assert!(roster.upsert(Participant::new(2, 2)));

        let mut moved = Participant::new(1, 1);
        moved.position = Position::new(3.0, 0.0, 4.0);
        assert!(!roster.upsert(moved));

        let ids: Vec<_> = roster.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(roster.get(1).unwrap().position.x, 3.0);
    }

    #[test]
    fn living_skips_dead_and_spectators() {
        let mut dead = Participant::new(2, 1);
        dead.alive = false;
        let mut spectator = Participant::new(3, 0);
        spectator.is_spectator = true;
        let roster = Roster::from_participants(vec![Participant::new(1, 1), dead, spectator]);

        let living: Vec<_> = roster.living().map(|p| p.id).collect();
        assert_eq!(living, vec![1]);
        assert_eq!(roster.eligible_count(), 2);
    }

    #[test]
    fn remove_returns_participant() {
        let mut roster = Roster::from_participants(vec![Participant::new(7, 2)]);
        assert_eq!(roster.remove(7).map(|p| p.team), Some(2));
        assert!(roster.remove(7).is_none());
        assert!(roster.is_empty());
    }
}
