use crossfire_core::match_state::{FinishReason, MatchState};
use crossfire_core::net::messages::{Envelope, RefereeMessage, Target};
use crossfire_core::participant::{ParticipantId, TeamId};
use crossfire_core::settings::MatchSettings;

/// Why a flag went back to unheld without being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    HolderDied,
    HolderLeft,
    AuthorityChanged,
    MatchEnded,
    /// Mirrored from the authority; the local participant does not know why.
    Remote,
}

/// Local notifications for whoever drives the session (UI, audio, logging).
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    StateChanged {
        from: MatchState,
        to: MatchState,
    },
    SettingsChanged(MatchSettings),
    MatchFinished {
        reason: FinishReason,
        winner: Option<TeamId>,
        scores: Vec<u32>,
    },
    TeamScored {
        team: TeamId,
        points: u32,
        total: u32,
    },
    /// The ledger was zeroed; local per-participant contribution counters
    /// should be cleared as well.
    ScoresReset,
    ControlPointCaptured {
        point: u8,
        team: TeamId,
    },
    FlagPickedUp {
        flag: u8,
        holder: ParticipantId,
    },
    FlagDropped {
        flag: u8,
        holder: ParticipantId,
        reason: DropReason,
    },
    FlagCaptured {
        flag: u8,
        holder: ParticipantId,
        team: TeamId,
    },
}

/// Messages and events produced while handling one call into the session.
#[derive(Debug, Default)]
pub struct Outbox {
    envelopes: Vec<Envelope>,
    events: Vec<MatchEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, target: Target, message: RefereeMessage) {
        self.envelopes.push(Envelope { target, message });
    }

    pub fn broadcast(&mut self, message: RefereeMessage) {
        self.send(Target::Everyone, message);
    }

    pub fn emit(&mut self, event: MatchEvent) {
        self.events.push(event);
    }

    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    pub fn events(&self) -> &[MatchEvent] {
        &self.events
    }

    pub fn take_envelopes(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.envelopes)
    }

    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.events)
    }
}
