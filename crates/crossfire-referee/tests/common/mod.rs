use crossfire_core::geometry::Position;
use crossfire_core::match_state::MatchState;
use crossfire_core::participant::{ParticipantId, TeamId};
use crossfire_core::settings::MatchSettings;
use crossfire_core::test_helpers::participant_at;

use crossfire_referee::arena::generate_arena;
use crossfire_referee::{Loopback, MatchEvent, RefereeConfig};

/// Simulation step in seconds. Exactly representable, so deadlines land on ticks.
pub const TICK: f64 = 0.5;

pub fn loopback() -> Loopback {
    Loopback::new(RefereeConfig::default(), generate_arena(2))
}

pub fn base_of(team: TeamId) -> Position {
    generate_arena(2)
        .base_for(team)
        .expect("generated arena has a base per team")
        .zone
        .center
}

pub fn flag_home(team: TeamId) -> Position {
    generate_arena(2)
        .flags
        .iter()
        .find(|f| f.home_team == team)
        .expect("generated arena has a flag per team")
        .home
}

pub fn control_point() -> Position {
    generate_arena(2).control_points[0].center
}

/// Connect a participant standing in their own base.
pub fn join_in_base(lb: &mut Loopback, id: ParticipantId, team: TeamId) {
    lb.join(participant_at(id, team, base_of(team)));
}

pub fn join_in_base_with_offset(lb: &mut Loopback, id: ParticipantId, team: TeamId, offset: f64) {
    lb.join_with_clock_offset(participant_at(id, team, base_of(team)), offset);
}

/// Request a match from `requester`, then tick through muster and countdown.
pub fn start_and_play(lb: &mut Loopback, requester: ParticipantId, settings: MatchSettings) {
    lb.with_session(requester, |s, _| s.start_match(settings));
    lb.step(TICK);
    assert_state(lb, MatchState::Countdown);
    lb.run_for(3.0, TICK);
    assert_state(lb, MatchState::Playing);
}

pub fn assert_state(lb: &Loopback, expected: MatchState) {
    for session in lb.sessions() {
        assert_eq!(
            session.state(),
            expected,
            "participant {} disagrees",
            session.local_id()
        );
    }
}

pub fn finished_events(events: &[MatchEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, MatchEvent::MatchFinished { .. }))
        .count()
}
