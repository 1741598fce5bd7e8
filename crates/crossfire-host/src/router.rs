use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crossfire_core::clock::Clock;
use crossfire_core::net::messages::Target;
use crossfire_core::participant::{Participant, ParticipantId};
use crossfire_referee::arena::Arena;
use crossfire_referee::{MatchEvent, MatchSession, RefereeConfig};

use crate::clock::TokioClock;
use crate::error::HostError;
use crate::session_loop::{SessionBroadcast, SessionCommand, SessionSnapshot, spawn_session};

/// Capacity of the match event fan-out. Slow subscribers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Commands accepted by the router task.
#[derive(Debug)]
pub enum RouterCommand {
    Join {
        participant: Participant,
        clock_offset: f64,
    },
    Leave(ParticipantId),
    /// Hand the authority to another participant, or to nobody.
    Transfer(Option<ParticipantId>),
    /// New replicated team, liveness or position for a participant.
    Update(Participant),
    /// Forward a command to one participant's session loop.
    Session {
        id: ParticipantId,
        cmd: SessionCommand,
    },
    Owner(oneshot::Sender<Option<ParticipantId>>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle for driving the router from other tasks.
#[derive(Debug, Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<RouterCommand>,
    events: broadcast::Sender<(ParticipantId, MatchEvent)>,
}

impl RouterHandle {
    fn send(&self, cmd: RouterCommand) -> Result<(), HostError> {
        self.tx.send(cmd).map_err(|_| HostError::RouterClosed)
    }

    pub fn join(&self, participant: Participant) -> Result<(), HostError> {
        self.join_with_clock_offset(participant, 0.0)
    }

    /// Connect a participant whose clock reads `clock_offset` seconds ahead of
    /// the host's.
    pub fn join_with_clock_offset(
        &self,
        participant: Participant,
        clock_offset: f64,
    ) -> Result<(), HostError> {
        self.send(RouterCommand::Join {
            participant,
            clock_offset,
        })
    }

    pub fn leave(&self, id: ParticipantId) -> Result<(), HostError> {
        self.send(RouterCommand::Leave(id))
    }

    pub fn transfer(&self, owner: Option<ParticipantId>) -> Result<(), HostError> {
        self.send(RouterCommand::Transfer(owner))
    }

    pub fn update(&self, participant: Participant) -> Result<(), HostError> {
        self.send(RouterCommand::Update(participant))
    }

    /// Run a session command on behalf of participant `id`.
    pub fn command(&self, id: ParticipantId, cmd: SessionCommand) -> Result<(), HostError> {
        self.send(RouterCommand::Session { id, cmd })
    }

    pub async fn snapshot(&self, id: ParticipantId) -> Result<SessionSnapshot, HostError> {
        let (reply, rx) = oneshot::channel();
        self.command(id, SessionCommand::Snapshot(reply))?;
        rx.await.map_err(|_| HostError::UnknownParticipant(id))
    }

    /// Current authority holder.
    pub async fn owner(&self) -> Result<Option<ParticipantId>, HostError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterCommand::Owner(reply))?;
        rx.await.map_err(|_| HostError::RouterClosed)
    }

    /// Match events from every session, tagged with the participant that saw them.
    pub fn subscribe(&self) -> broadcast::Receiver<(ParticipantId, MatchEvent)> {
        self.events.subscribe()
    }

    /// Stop every session loop and wait for them to exit.
    pub async fn shutdown(&self) -> Result<(), HostError> {
        let (reply, rx) = oneshot::channel();
        self.send(RouterCommand::Shutdown(reply))?;
        rx.await.map_err(|_| HostError::RouterClosed)
    }
}

struct Member {
    id: ParticipantId,
    /// Join sequence number.
    seq: u64,
    /// Authority whose late-join sync covers everything it broadcast before
    /// it learned of this member.
    synced_by: Option<ParticipantId>,
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Owns every session loop and stands in for the network: routes encoded
/// frames by `Target` and elects the earliest joiner as authority.
struct Router {
    config: RefereeConfig,
    arena: Arena,
    tick_interval: Duration,
    members: Vec<Member>,
    /// Replicated roster truth, in join order.
    participants: Vec<Participant>,
    owner: Option<ParticipantId>,
    next_seq: u64,
    output_tx: mpsc::UnboundedSender<SessionBroadcast>,
    events: broadcast::Sender<(ParticipantId, MatchEvent)>,
    cancel: CancellationToken,
}

/// Spawn the router task. Sessions are created as participants join.
pub fn spawn_router(
    config: RefereeConfig,
    arena: Arena,
    tick_interval: Duration,
) -> (RouterHandle, JoinHandle<()>) {
    let (tx, cmd_rx) = mpsc::unbounded_channel();
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let router = Router {
        config,
        arena,
        tick_interval,
        members: Vec::new(),
        participants: Vec::new(),
        owner: None,
        next_seq: 1,
        output_tx,
        events: events.clone(),
        cancel: CancellationToken::new(),
    };
    let task = tokio::spawn(run_router(router, cmd_rx, output_rx));
    (RouterHandle { tx, events }, task)
}

async fn run_router(
    mut router: Router,
    mut cmd_rx: mpsc::UnboundedReceiver<RouterCommand>,
    mut output_rx: mpsc::UnboundedReceiver<SessionBroadcast>,
) {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(RouterCommand::Shutdown(reply)) => {
                    router.shutdown().await;
                    let _ = reply.send(());
                    return;
                },
                Some(cmd) => router.apply(cmd),
                None => break,
            },
            Some(out) = output_rx.recv() => router.route(out),
        }
    }
    router.shutdown().await;
}

impl Router {
    fn apply(&mut self, cmd: RouterCommand) {
        match cmd {
            RouterCommand::Join {
                participant,
                clock_offset,
            } => self.join(participant, clock_offset),
            RouterCommand::Leave(id) => self.leave(id),
            RouterCommand::Transfer(owner) => self.transfer(owner),
            RouterCommand::Update(participant) => self.update(participant),
            RouterCommand::Session { id, cmd } => match self.member(id) {
                Some(member) => {
                    let _ = member.cmd_tx.send(cmd);
                },
                None => tracing::warn!(participant = id, "Command for unknown participant"),
            },
            RouterCommand::Owner(reply) => {
                let _ = reply.send(self.owner);
            },
            // Handled by the loop so it can await the session tasks.
            RouterCommand::Shutdown(_) => {},
        }
    }

    fn join(&mut self, participant: Participant, clock_offset: f64) {
        let id = participant.id;
        if self.member(id).is_some() {
            tracing::debug!(participant = id, "Already connected");
            return;
        }
        if self.owner.is_none() {
            self.owner = Some(id);
        }
        let seq = self.next_seq;
        self.next_seq += 1;

        let clock = TokioClock::with_offset(clock_offset);
        let now = clock.now();
        let mut session = MatchSession::new(id, self.config.clone(), self.arena.clone());
        session.set_authority(self.owner, now);
        for p in &self.participants {
            session.participant_joined(p.clone(), now);
        }
        session.participant_joined(participant.clone(), now);

        for m in &self.members {
            let _ = m.cmd_tx.send(SessionCommand::ParticipantJoined {
                participant: participant.clone(),
                seq,
            });
        }

        let cancel = self.cancel.child_token();
        let (cmd_tx, task) = spawn_session(
            session,
            seq,
            clock,
            self.tick_interval,
            self.output_tx.clone(),
            cancel.clone(),
        );
        self.participants.push(participant);
        self.members.push(Member {
            id,
            seq,
            synced_by: self.owner.filter(|&owner| owner != id),
            cmd_tx,
            task,
            cancel,
        });
        tracing::info!(participant = id, owner = ?self.owner, "Participant connected");
    }

    fn leave(&mut self, id: ParticipantId) {
        let Some(idx) = self.members.iter().position(|m| m.id == id) else {
            return;
        };
        let member = self.members.remove(idx);
        member.cancel.cancel();
        self.participants.retain(|p| p.id != id);
        for m in &self.members {
            let _ = m.cmd_tx.send(SessionCommand::ParticipantLeft(id));
        }
        tracing::info!(participant = id, "Participant disconnected");

        if self.owner == Some(id) {
            let next = self.members.first().map(|m| m.id);
            tracing::info!(from = id, to = ?next, "Authority holder disconnected");
            self.transfer(next);
        }
    }

    fn transfer(&mut self, owner: Option<ParticipantId>) {
        if let Some(id) = owner
            && self.member(id).is_none()
        {
            tracing::warn!(participant = id, "Ignoring transfer to unknown participant");
            return;
        }
        self.owner = owner;
        for m in &self.members {
            let _ = m.cmd_tx.send(SessionCommand::SetAuthority(owner));
        }
    }

    fn update(&mut self, participant: Participant) {
        let Some(slot) = self.participants.iter_mut().find(|p| p.id == participant.id) else {
            tracing::debug!(participant = participant.id, "Update for unknown participant");
            return;
        };
        *slot = participant.clone();
        for m in &self.members {
            let _ = m
                .cmd_tx
                .send(SessionCommand::ParticipantUpdated(participant.clone()));
        }
    }

    fn route(&mut self, out: SessionBroadcast) {
        match out {
            SessionBroadcast::Outbound {
                from,
                target,
                data,
                roster_seq,
            } => {
                // Frames queued by a session that has since disconnected.
                if self.member(from).is_none() {
                    tracing::debug!(from, "Dropping frame from departed participant");
                    return;
                }
                self.deliver(from, target, data, roster_seq);
            },
            SessionBroadcast::Event { participant, event } => {
                let _ = self.events.send((participant, event));
            },
            SessionBroadcast::Stopped { participant } => {
                tracing::debug!(participant, "Session stopped");
            },
        }
    }

    fn deliver(&self, from: ParticipantId, target: Target, data: Bytes, roster_seq: u64) {
        let send = |m: &Member| {
            let _ = m.cmd_tx.send(SessionCommand::Deliver {
                from,
                data: data.clone(),
            });
        };
        match target {
            // A broadcast the authority made before it saw a member join is
            // already folded into that member's late-join sync.
            Target::Everyone => self
                .members
                .iter()
                .filter(|m| m.id != from && (m.synced_by != Some(from) || roster_seq >= m.seq))
                .for_each(send),
            Target::Authority => match self.owner.and_then(|owner| self.member(owner)) {
                Some(m) => send(m),
                None => tracing::debug!(from, "No authority to deliver to"),
            },
            Target::Participant(id) => match self.member(id) {
                Some(m) => send(m),
                None => tracing::debug!(from, to = id, "Recipient not connected"),
            },
        }
    }

    fn member(&self, id: ParticipantId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        let tasks: Vec<_> = self.members.drain(..).map(|m| m.task).collect();
        let count = tasks.len();
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Session task failed");
            }
        }
        tracing::info!(sessions = count, "Router shut down");
    }
}
