use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crossfire_core::clock::Clock;
use crossfire_core::match_state::MatchState;
use crossfire_core::net::messages::{ControlPointSyncMsg, FlagHolderMsg, RefereeMessage, Target};
use crossfire_core::net::protocol::{decode_referee_message, encode_referee_message};
use crossfire_core::participant::{Participant, ParticipantId, TeamId};
use crossfire_core::settings::MatchSettings;
use crossfire_referee::{MatchEvent, MatchSession};

use crate::clock::TokioClock;
use crate::error::HostError;

/// Commands sent from the router to one participant's session loop.
#[derive(Debug)]
pub enum SessionCommand {
    /// An encoded message from another participant.
    Deliver {
        from: ParticipantId,
        data: Bytes,
    },
    /// `seq` is the router's join sequence number for `participant`.
    ParticipantJoined {
        participant: Participant,
        seq: u64,
    },
    ParticipantLeft(ParticipantId),
    ParticipantUpdated(Participant),
    SetAuthority(Option<ParticipantId>),
    StartMatch(MatchSettings),
    EndMatch,
    AwardPoints {
        team: TeamId,
        points: u32,
    },
    RecordTag {
        shooter: ParticipantId,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Stop,
}

/// Output of a session loop, consumed by the router.
#[derive(Debug, Clone)]
pub enum SessionBroadcast {
    /// Encoded message ready to route. Uses `Bytes` for zero-copy fan-out.
    Outbound {
        from: ParticipantId,
        target: Target,
        data: Bytes,
        /// Highest join sequence number the sender had seen when it produced
        /// the message.
        roster_seq: u64,
    },
    Event {
        participant: ParticipantId,
        event: MatchEvent,
    },
    /// The loop has exited.
    Stopped { participant: ParticipantId },
}

/// Point-in-time view of a session, for observers and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub participant: ParticipantId,
    pub is_authority: bool,
    pub state: MatchState,
    pub settings: MatchSettings,
    pub scores: Vec<u32>,
    pub time_remaining: Option<f64>,
    pub control_points: Vec<ControlPointSyncMsg>,
    pub flags: Vec<FlagHolderMsg>,
}

impl SessionSnapshot {
    fn capture(session: &MatchSession, now: f64) -> Self {
        Self {
            participant: session.local_id(),
            is_authority: session.is_authority(),
            state: session.state(),
            settings: session.settings().clone(),
            scores: session.scores().to_vec(),
            time_remaining: session.time_remaining(now),
            control_points: session.control_points().iter().map(|cp| cp.snapshot()).collect(),
            flags: session.flags().iter().map(|f| f.snapshot()).collect(),
        }
    }
}

/// Spawn a participant's session loop as a tokio task. `roster_seq` is the
/// join sequence number of the newest participant already in the session's
/// roster. Returns the command sender and the task handle.
pub fn spawn_session(
    session: MatchSession,
    roster_seq: u64,
    clock: TokioClock,
    tick_interval: Duration,
    output: mpsc::UnboundedSender<SessionBroadcast>,
    cancel: CancellationToken,
) -> (mpsc::UnboundedSender<SessionCommand>, JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        let looped = SessionLoop {
            session,
            roster_seq,
            output,
        };
        looped.run(clock, tick_interval, cmd_rx, cancel).await;
    });
    (cmd_tx, handle)
}

struct SessionLoop {
    session: MatchSession,
    roster_seq: u64,
    output: mpsc::UnboundedSender<SessionBroadcast>,
}

impl SessionLoop {
    /// Tick the session at a fixed rate and apply commands between ticks.
    async fn run(
        mut self,
        clock: TokioClock,
        tick_interval: Duration,
        mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
        cancel: CancellationToken,
    ) {
        let participant = self.session.local_id();
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_tick = clock.now();

        // Anything queued while the session was being set up.
        self.flush();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let now = clock.now();
                    let dt = (now - last_tick).max(0.0) as f32;
                    last_tick = now;
                    self.session.tick(now, dt);
                }
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.apply(cmd, clock.now()) {
                        break;
                    }
                }
            }
            self.flush();
        }

        tracing::debug!(participant, "Session loop exited");
        let _ = self.output.send(SessionBroadcast::Stopped { participant });
    }

    /// Returns `false` when the loop should stop.
    fn apply(&mut self, cmd: SessionCommand, now: f64) -> bool {
        let session = &mut self.session;
        match cmd {
            SessionCommand::Deliver { from, data } => match decode_frame(&data) {
                Ok(message) => session.receive(from, &message, now),
                Err(e) => {
                    tracing::warn!(
                        participant = session.local_id(),
                        from,
                        error = %e,
                        "Dropping malformed frame"
                    );
                },
            },
            SessionCommand::ParticipantJoined { participant, seq } => {
                // Everything produced from here on already accounts for them.
                self.roster_seq = self.roster_seq.max(seq);
                session.participant_joined(participant, now);
            },
            SessionCommand::ParticipantLeft(id) => session.participant_left(id),
            SessionCommand::ParticipantUpdated(p) => session.update_participant(p),
            SessionCommand::SetAuthority(owner) => {
                session.set_authority(owner, now);
            },
            SessionCommand::StartMatch(settings) => session.start_match(settings),
            SessionCommand::EndMatch => session.end_match(),
            SessionCommand::AwardPoints { team, points } => session.award_points(team, points),
            SessionCommand::RecordTag { shooter } => session.record_tag(shooter),
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(SessionSnapshot::capture(session, now));
            },
            SessionCommand::Stop => return false,
        }
        true
    }

    /// Encode and forward everything the session produced since the last flush.
    fn flush(&mut self) {
        let from = self.session.local_id();
        for envelope in self.session.take_outbound() {
            match encode_frame(&envelope.message) {
                Ok(data) => {
                    let _ = self.output.send(SessionBroadcast::Outbound {
                        from,
                        target: envelope.target,
                        data,
                        roster_seq: self.roster_seq,
                    });
                },
                Err(e) => {
                    tracing::error!(participant = from, error = %e, "Failed to encode message");
                },
            }
        }
        for event in self.session.take_events() {
            let _ = self.output.send(SessionBroadcast::Event {
                participant: from,
                event,
            });
        }
    }
}

fn encode_frame(message: &RefereeMessage) -> Result<Bytes, HostError> {
    Ok(Bytes::from(encode_referee_message(message)?))
}

fn decode_frame(data: &[u8]) -> Result<RefereeMessage, HostError> {
    Ok(decode_referee_message(data)?)
}
