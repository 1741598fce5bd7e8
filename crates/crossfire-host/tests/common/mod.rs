use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crossfire_core::geometry::Position;
use crossfire_core::match_state::MatchState;
use crossfire_core::participant::{Participant, ParticipantId, TeamId};
use crossfire_core::settings::MatchSettings;
use crossfire_core::test_helpers::participant_at;

use crossfire_host::{RouterHandle, SessionCommand, spawn_router};
use crossfire_referee::arena::{Arena, generate_arena};
use crossfire_referee::{MatchEvent, RefereeConfig};

/// Session tick used by every host test.
pub const TICK: Duration = Duration::from_millis(50);

pub struct TestHost {
    pub router: RouterHandle,
    pub arena: Arena,
    pub events: broadcast::Receiver<(ParticipantId, MatchEvent)>,
    pub task: JoinHandle<()>,
}

impl TestHost {
    pub fn new() -> Self {
        let arena = generate_arena(2);
        let (router, task) = spawn_router(RefereeConfig::default(), arena.clone(), TICK);
        let events = router.subscribe();
        Self {
            router,
            arena,
            events,
            task,
        }
    }

    pub fn in_base(&self, id: ParticipantId, team: TeamId) -> Participant {
        participant_at(id, team, self.base_of(team))
    }

    pub fn base_of(&self, team: TeamId) -> Position {
        self.arena
            .base_for(team)
            .expect("generated arena has a base per team")
            .zone
            .center
    }

    pub fn control_point(&self) -> Position {
        self.arena.control_points[0].center
    }

    pub fn join_in_base(&self, id: ParticipantId, team: TeamId) {
        self.router.join(self.in_base(id, team)).unwrap();
    }

    pub fn join_in_base_with_offset(&self, id: ParticipantId, team: TeamId, offset: f64) {
        self.router
            .join_with_clock_offset(self.in_base(id, team), offset)
            .unwrap();
    }

    /// Ask `requester` to start a match and wait until everyone is playing.
    pub async fn start_and_play(&self, requester: ParticipantId, settings: MatchSettings) {
        self.router
            .command(requester, SessionCommand::StartMatch(settings))
            .unwrap();
        sleep_secs(3.5).await;
    }

    pub async fn state_of(&self, id: ParticipantId) -> MatchState {
        self.router.snapshot(id).await.unwrap().state
    }

    pub async fn assert_state(&self, ids: &[ParticipantId], expected: MatchState) {
        for &id in ids {
            assert_eq!(self.state_of(id).await, expected, "participant {id}");
        }
    }

    /// Everything published since the last drain.
    pub fn drain_events(&mut self) -> Vec<(ParticipantId, MatchEvent)> {
        let mut out = Vec::new();
        while let Ok(e) = self.events.try_recv() {
            out.push(e);
        }
        out
    }
}

pub async fn sleep_secs(secs: f64) {
    tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

pub fn finished_for(events: &[(ParticipantId, MatchEvent)], id: ParticipantId) -> usize {
    events
        .iter()
        .filter(|(p, e)| *p == id && matches!(e, MatchEvent::MatchFinished { .. }))
        .count()
}
