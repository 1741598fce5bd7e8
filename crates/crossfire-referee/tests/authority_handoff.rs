//! Authority hand-off: the match keeps going when its owner disconnects or
//! transfers ownership, and the new owner resumes from replicated state.

#[allow(dead_code)]
mod common;

use crossfire_core::match_state::{FinishReason, MatchState};
use crossfire_core::settings::WinCondition;
use crossfire_core::test_helpers::settings_with;
use crossfire_referee::{DropReason, MatchEvent};

use common::{
    TICK, assert_state, finished_events, flag_home, join_in_base, join_in_base_with_offset,
    loopback, start_and_play,
};

#[test]
fn new_authority_keeps_replicated_deadline() {
    let mut lb = loopback();
    join_in_base(&mut lb, 1, 1);
    join_in_base_with_offset(&mut lb, 2, 2, 1000.0);
    join_in_base_with_offset(&mut lb, 3, 1, -50.0);

    // Requested by a non-authority, so it travels to participant 1 first.
    start_and_play(&mut lb, 2, settings_with(WinCondition::TIMER, 120, 10));
    let started = lb.now();
    lb.with_session(1, |s, _| s.award_points(1, 3));

    lb.run_for(50.0, TICK);
    lb.leave(1);
    assert_eq!(lb.owner(), Some(2));
    assert_state(&lb, MatchState::Playing);

    let remaining = lb
        .with_session(2, |s, now| s.time_remaining(now))
        .flatten();
    assert_eq!(remaining, Some(70.0));
    for id in [2, 3] {
        assert_eq!(lb.session(id).unwrap().score(1), 3, "participant {id}");
    }

    lb.run_for(started + 120.0 - lb.now() - TICK, TICK);
    assert_state(&lb, MatchState::Playing);
    lb.step(TICK);
    assert_state(&lb, MatchState::NotPlaying);

    for id in [2, 3] {
        let events = lb.take_events(id);
        assert_eq!(finished_events(&events), 1, "participant {id}");
        assert!(events.iter().any(|e| matches!(
            e,
            MatchEvent::MatchFinished {
                reason: FinishReason::TimerExpired,
                winner: Some(1),
                ..
            }
        )));
    }
}

#[test]
fn handoff_during_countdown_restarts_countdown() {
    let mut lb = loopback();
    join_in_base(&mut lb, 1, 1);
    join_in_base(&mut lb, 2, 2);

    lb.with_session(1, |s, _| {
        s.start_match(settings_with(WinCondition::TIMER, 60, 10))
    });
    lb.step(TICK);
    assert_state(&lb, MatchState::Countdown);
    lb.run_for(1.0, TICK);

    lb.leave(1);
    assert_eq!(lb.owner(), Some(2));
    lb.run_for(2.5, TICK);
    assert_state(&lb, MatchState::Countdown);
    lb.step(TICK);
    assert_state(&lb, MatchState::Playing);
}

#[test]
fn handoff_during_muster_resumes_muster() {
    let mut lb = loopback();
    join_in_base(&mut lb, 1, 1);
    join_in_base(&mut lb, 2, 2);
    lb.move_to(2, flag_home(1));

    lb.with_session(1, |s, _| {
        s.start_match(settings_with(WinCondition::TIMER, 60, 10))
    });
    lb.run_for(2.0, TICK);
    assert_state(&lb, MatchState::Mustering);

    lb.leave(1);
    lb.run_for(2.0, TICK);
    assert_state(&lb, MatchState::Mustering);

    lb.move_to(2, common::base_of(2));
    lb.step(TICK);
    assert_state(&lb, MatchState::Countdown);
}

#[test]
fn explicit_transfer_does_not_stop_the_match() {
    let mut lb = loopback();
    join_in_base(&mut lb, 1, 1);
    join_in_base(&mut lb, 2, 2);
    start_and_play(&mut lb, 1, settings_with(WinCondition::TIMER, 30, 10));

    lb.run_for(10.0, TICK);
    lb.transfer(Some(2));
    assert!(!lb.session(1).unwrap().is_authority());
    assert!(!lb.session(1).unwrap().referee().is_driving());
    assert_state(&lb, MatchState::Playing);

    lb.run_for(19.5, TICK);
    assert_state(&lb, MatchState::Playing);
    lb.step(TICK);
    assert_state(&lb, MatchState::NotPlaying);
    assert_eq!(finished_events(&lb.take_events(1)), 1);
    assert_eq!(finished_events(&lb.take_events(2)), 1);
}

#[test]
fn carried_flag_drops_when_authority_changes() {
    let mut lb = loopback();
    join_in_base(&mut lb, 1, 1);
    join_in_base(&mut lb, 2, 2);
    join_in_base(&mut lb, 3, 1);
    start_and_play(&mut lb, 1, settings_with(WinCondition::TIMER, 300, 10));

    lb.move_to(2, flag_home(1));
    lb.step(TICK);
    for session in lb.sessions() {
        assert!(session.flags().iter().any(|f| f.holder() == Some(2)));
    }
    lb.take_events(3);

    lb.transfer(Some(3));
    for session in lb.sessions() {
        assert!(session.flags().iter().all(|f| f.holder().is_none()));
    }
    assert!(lb.take_events(3).iter().any(|e| matches!(
        e,
        MatchEvent::FlagDropped {
            holder: 2,
            reason: DropReason::AuthorityChanged,
            ..
        }
    )));
}
