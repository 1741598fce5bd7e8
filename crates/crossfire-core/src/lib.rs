pub mod clock;
pub mod geometry;
pub mod match_state;
pub mod net;
pub mod participant;
pub mod settings;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::geometry::Position;
    use crate::participant::{Participant, ParticipantId, TeamId};
    use crate::settings::{MatchSettings, WinCondition};

    pub use crate::clock::ManualClock;

    /// Create `n` participants with sequential ids starting at 1, alternating
    /// between teams 1 and 2.
    pub fn make_participants(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant::new(i as ParticipantId + 1, (i % 2) as TeamId + 1))
            .collect()
    }

    /// A participant of `team` standing at `position`.
    pub fn participant_at(id: ParticipantId, team: TeamId, position: Position) -> Participant {
        Participant {
            position,
            ..Participant::new(id, team)
        }
    }

    /// Team match settings with the given win conditions.
    pub fn settings_with(
        win_condition: WinCondition,
        timer_seconds: i32,
        score_target: u16,
    ) -> MatchSettings {
        MatchSettings {
            teams: true,
            win_condition,
            timer_seconds,
            score_target,
            ..MatchSettings::lobby()
        }
    }
}
