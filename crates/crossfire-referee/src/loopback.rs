use crossfire_core::clock::{Clock, ManualClock};
use crossfire_core::geometry::Position;
use crossfire_core::net::messages::{Envelope, Target};
use crossfire_core::net::protocol::{decode_referee_message, encode_referee_message};
use crossfire_core::participant::{Participant, ParticipantId};

use crate::arena::Arena;
use crate::config::RefereeConfig;
use crate::events::MatchEvent;
use crate::session::MatchSession;

/// Delivery rounds per flush before giving up on a message storm.
const MAX_FLUSH_ROUNDS: usize = 64;

struct Member {
    session: MatchSession,
    /// Offset of this participant's clock from the shared simulated time.
    clock_offset: f64,
}

/// In-process stand-in for the network layer: one `MatchSession` per
/// participant, reliable in-order delivery through the wire codec, and
/// earliest-joiner authority election.
pub struct Loopback {
    config: RefereeConfig,
    arena: Arena,
    clock: ManualClock,
    members: Vec<Member>,
    /// Replicated roster truth, in join order.
    participants: Vec<Participant>,
    owner: Option<ParticipantId>,
    delivered: u64,
}

impl Loopback {
    pub fn new(config: RefereeConfig, arena: Arena) -> Self {
        Self {
            config,
            arena,
            clock: ManualClock::new(0.0),
            members: Vec::new(),
            participants: Vec::new(),
            owner: None,
            delivered: 0,
        }
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn owner(&self) -> Option<ParticipantId> {
        self.owner
    }

    /// Messages delivered so far, counting each recipient separately.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn session(&self, id: ParticipantId) -> Option<&MatchSession> {
        self.member_index(id).map(|i| &self.members[i].session)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &MatchSession> {
        self.members.iter().map(|m| &m.session)
    }

    pub fn join(&mut self, participant: Participant) {
        self.join_with_clock_offset(participant, 0.0);
    }

    /// Connect a participant whose clock reads `clock_offset` seconds ahead of
    /// the shared simulated time.
    pub fn join_with_clock_offset(&mut self, participant: Participant, clock_offset: f64) {
        let id = participant.id;
        let now = self.clock.now();
        if self.member_index(id).is_some() {
            tracing::debug!(participant = id, "Already connected");
            return;
        }
        if self.owner.is_none() {
            self.owner = Some(id);
        }

        let mut session = MatchSession::new(id, self.config.clone(), self.arena.clone());
        session.set_authority(self.owner, now + clock_offset);
        for p in &self.participants {
            session.participant_joined(p.clone(), now + clock_offset);
        }
        session.participant_joined(participant.clone(), now + clock_offset);

        for m in &mut self.members {
            m.session
                .participant_joined(participant.clone(), now + m.clock_offset);
        }
        self.participants.push(participant);
        self.members.push(Member {
            session,
            clock_offset,
        });
        self.flush();
    }

    /// Disconnect a participant. If they were the authority, the earliest
    /// remaining joiner takes over.
    pub fn leave(&mut self, id: ParticipantId) {
        let Some(idx) = self.member_index(id) else {
            return;
        };
        self.members.remove(idx);
        self.participants.retain(|p| p.id != id);
        for m in &mut self.members {
            m.session.participant_left(id);
        }
        if self.owner == Some(id) {
            let next = self.members.first().map(|m| m.session.local_id());
            tracing::info!(from = id, to = ?next, "Authority holder disconnected");
            self.transfer(next);
        } else {
            self.flush();
        }
    }

    pub fn transfer(&mut self, owner: Option<ParticipantId>) {
        self.owner = owner;
        let now = self.clock.now();
        for m in &mut self.members {
            m.session.set_authority(owner, now + m.clock_offset);
        }
        self.flush();
    }

    /// Change a participant's replicated fields and push them to every roster.
    pub fn update(&mut self, id: ParticipantId, change: impl FnOnce(&mut Participant)) {
        let Some(p) = self.participants.iter_mut().find(|p| p.id == id) else {
            return;
        };
        change(p);
        let p = p.clone();
        for m in &mut self.members {
            m.session.update_participant(p.clone());
        }
    }

    pub fn move_to(&mut self, id: ParticipantId, position: Position) {
        self.update(id, |p| p.position = position);
    }

    pub fn set_alive(&mut self, id: ParticipantId, alive: bool) {
        self.update(id, |p| p.alive = alive);
    }

    /// Run `action` against one participant's session, then deliver whatever
    /// it sent. The closure receives that participant's local time.
    pub fn with_session<R>(
        &mut self,
        id: ParticipantId,
        action: impl FnOnce(&mut MatchSession, f64) -> R,
    ) -> Option<R> {
        let idx = self.member_index(id)?;
        let member = &mut self.members[idx];
        let result = action(&mut member.session, self.clock.now() + member.clock_offset);
        self.flush();
        Some(result)
    }

    /// Advance simulated time by `dt` and tick every session.
    pub fn step(&mut self, dt: f64) {
        self.clock.advance(dt);
        let now = self.clock.now();
        for m in &mut self.members {
            m.session.tick(now + m.clock_offset, dt as f32);
        }
        self.flush();
    }

    pub fn run_for(&mut self, seconds: f64, dt: f64) {
        let steps = (seconds / dt).round() as u64;
        for _ in 0..steps {
            self.step(dt);
        }
    }

    pub fn take_events(&mut self, id: ParticipantId) -> Vec<MatchEvent> {
        self.member_index(id)
            .map(|i| self.members[i].session.take_events())
            .unwrap_or_default()
    }

    /// Deliver queued messages until every outbox is empty.
    pub fn flush(&mut self) {
        for _ in 0..MAX_FLUSH_ROUNDS {
            let mut outgoing = Vec::new();
            for m in &mut self.members {
                let from = m.session.local_id();
                outgoing.extend(m.session.take_outbound().into_iter().map(|e| (from, e)));
            }
            if outgoing.is_empty() {
                return;
            }
            for (from, envelope) in outgoing {
                self.deliver(from, envelope);
            }
        }
        tracing::warn!(rounds = MAX_FLUSH_ROUNDS, "Loopback flush did not settle");
    }

    fn deliver(&mut self, from: ParticipantId, envelope: Envelope) {
        let bytes = match encode_referee_message(&envelope.message) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(from, error = %e, "Failed to encode message");
                return;
            },
        };
        let message = match decode_referee_message(&bytes) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(from, error = %e, "Dropping undecodable message");
                return;
            },
        };

        let recipients: Vec<usize> = match envelope.target {
            Target::Everyone => (0..self.members.len())
                .filter(|&i| self.members[i].session.local_id() != from)
                .collect(),
            Target::Authority => self
                .owner
                .and_then(|owner| self.member_index(owner))
                .into_iter()
                .collect(),
            Target::Participant(id) => self.member_index(id).into_iter().collect(),
        };

        let now = self.clock.now();
        for idx in recipients {
            let member = &mut self.members[idx];
            member
                .session
                .receive(from, &message, now + member.clock_offset);
            self.delivered += 1;
        }
    }

    fn member_index(&self, id: ParticipantId) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.session.local_id() == id)
    }
}
