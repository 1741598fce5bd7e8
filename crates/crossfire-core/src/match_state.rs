use serde::{Deserialize, Serialize};

/// Lifecycle state of the match. Exactly one value at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchState {
    #[default]
    NotPlaying,
    Mustering,
    Countdown,
    Playing,
}

impl MatchState {
    /// Whether the authority may move from `self` to `next`.
    ///
    /// The cycle is linear; `NotPlaying` is reachable from anywhere (forced
    /// termination), and re-entering `Playing` is allowed so a new authority
    /// can resume a running match.
    pub fn can_advance_to(self, next: MatchState) -> bool {
        matches!(
            (self, next),
            (MatchState::NotPlaying, MatchState::Mustering)
                | (MatchState::Mustering, MatchState::Countdown)
                | (MatchState::Countdown, MatchState::Playing)
                | (MatchState::Playing, MatchState::Playing)
                | (_, MatchState::NotPlaying)
        )
    }

    pub fn is_playing(self) -> bool {
        self == MatchState::Playing
    }
}

/// Which win condition ended a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    TimerExpired,
    ScoreReached,
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotPlaying => "not playing",
            Self::Mustering => "mustering",
            Self::Countdown => "countdown",
            Self::Playing => "playing",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_cycle_is_valid() {
        assert!(MatchState::NotPlaying.can_advance_to(MatchState::Mustering));
        assert!(MatchState::Mustering.can_advance_to(MatchState::Countdown));
        assert!(MatchState::Countdown.can_advance_to(MatchState::Playing));
        assert!(MatchState::Playing.can_advance_to(MatchState::NotPlaying));
    }

    #[test]
    fn shortcuts_are_rejected() {
        assert!(!MatchState::NotPlaying.can_advance_to(MatchState::Playing));
        assert!(!MatchState::NotPlaying.can_advance_to(MatchState::Countdown));
        assert!(!MatchState::Mustering.can_advance_to(MatchState::Playing));
        assert!(!MatchState::Playing.can_advance_to(MatchState::Mustering));
    }

    #[test]
    fn forced_termination_from_anywhere() {
        for state in [
            MatchState::NotPlaying,
            MatchState::Mustering,
            MatchState::Countdown,
            MatchState::Playing,
        ] {
            assert!(state.can_advance_to(MatchState::NotPlaying));
        }
    }
}
