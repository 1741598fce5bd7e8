use crossfire_core::match_state::MatchState;
use crossfire_core::net::messages::{Envelope, FlagClaimMsg, RefereeMessage, Target};
use crossfire_core::participant::{Participant, ParticipantId, Roster, TeamId};
use crossfire_core::settings::MatchSettings;

use crate::arena::Arena;
use crate::authority::{Authority, AuthorityChange};
use crate::config::RefereeConfig;
use crate::control_point::ControlPoint;
use crate::events::{DropReason, MatchEvent, Outbox};
use crate::flag::{Flag, FlagOutcome};
use crate::referee::MatchReferee;

/// Everything one participant knows about a match: the referee, objectives,
/// roster and authority, plus the outbox of messages and events produced by
/// the last calls.
///
/// The caller feeds in roster updates, ownership changes, inbound messages
/// and ticks, then drains `take_outbound` and `take_events`.
pub struct MatchSession {
    config: RefereeConfig,
    arena: Arena,
    authority: Authority,
    roster: Roster,
    referee: MatchReferee,
    control_points: Vec<ControlPoint>,
    flags: Vec<Flag>,
    /// Flags this (non-authority) participant has claimed and not yet heard back about.
    outstanding_claims: Vec<u8>,
    /// State seen at the end of the previous call, for leaving-`Playing` cleanup.
    observed_state: MatchState,
    outbox: Outbox,
}

impl MatchSession {
    pub fn new(local: ParticipantId, config: RefereeConfig, arena: Arena) -> Self {
        let control_points = arena
            .control_points
            .iter()
            .zip(0u8..)
            .map(|(zone, id)| ControlPoint::new(id, *zone))
            .collect();
        let flags = arena
            .flags
            .iter()
            .zip(0u8..)
            .map(|(spawn, id)| {
                Flag::new(
                    id,
                    spawn,
                    config.flag_pickup_radius,
                    config.flag_pickup_half_height,
                )
            })
            .collect();

        Self {
            referee: MatchReferee::new(&config),
            config,
            arena,
            authority: Authority::new(local, None),
            roster: Roster::new(),
            control_points,
            flags,
            outstanding_claims: Vec::new(),
            observed_state: MatchState::NotPlaying,
            outbox: Outbox::new(),
        }
    }

    pub fn local_id(&self) -> ParticipantId {
        self.authority.local()
    }

    pub fn is_authority(&self) -> bool {
        self.authority.is_local()
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn config(&self) -> &RefereeConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn referee(&self) -> &MatchReferee {
        &self.referee
    }

    pub fn control_points(&self) -> &[ControlPoint] {
        &self.control_points
    }

    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    pub fn state(&self) -> MatchState {
        self.referee.state()
    }

    pub fn settings(&self) -> &MatchSettings {
        self.referee.settings()
    }

    pub fn score(&self, team: TeamId) -> u32 {
        self.referee.score(team)
    }

    pub fn scores(&self) -> &[u32] {
        self.referee.scores()
    }

    pub fn time_remaining(&self, now: f64) -> Option<f64> {
        self.referee.time_remaining(now)
    }

    pub fn take_outbound(&mut self) -> Vec<Envelope> {
        self.outbox.take_envelopes()
    }

    pub fn take_events(&mut self) -> Vec<MatchEvent> {
        self.outbox.take_events()
    }

    pub fn start_match(&mut self, settings: MatchSettings) {
        self.referee
            .start_match(settings, &self.authority, &mut self.outbox);
        self.settle();
    }

    pub fn end_match(&mut self) {
        self.referee.end_match(&self.authority, &mut self.outbox);
        self.settle();
    }

    pub fn award_points(&mut self, team: TeamId, points: u32) {
        self.referee
            .award_points(team, points, &self.authority, &mut self.outbox);
        self.settle();
    }

    pub fn reset_scores(&mut self) {
        self.referee.reset_scores(&self.authority, &mut self.outbox);
    }

    /// Credit a tag to the shooter's team. Only counts while a match is running.
    pub fn record_tag(&mut self, shooter: ParticipantId) {
        if !self.state().is_playing() {
            tracing::debug!(shooter, "Ignoring tag outside a running match");
            return;
        }
        let Some(team) = self.roster.get(shooter).map(|p| p.team) else {
            tracing::debug!(shooter, "Ignoring tag from unknown participant");
            return;
        };
        let points = u32::from(self.settings().points_per_kill);
        self.award_points(team, points);
    }

    /// A participant connected. The authority brings them up to date.
    pub fn participant_joined(&mut self, participant: Participant, now: f64) {
        let id = participant.id;
        if !self.roster.upsert(participant) {
            return;
        }
        tracing::info!(participant = id, "Participant joined");
        if !self.authority.is_local() || id == self.authority.local() {
            return;
        }

        self.referee
            .handle_late_join(id, now, &self.authority, &mut self.outbox);
        let target = Target::Participant(id);
        for cp in &self.control_points {
            self.outbox
                .send(target, RefereeMessage::ControlPointSync(cp.snapshot()));
        }
        for flag in &self.flags {
            self.outbox
                .send(target, RefereeMessage::FlagHolder(flag.snapshot()));
        }
    }

    /// A participant disconnected. Any flag they carried goes home.
    pub fn participant_left(&mut self, id: ParticipantId) {
        if self.roster.remove(id).is_none() {
            return;
        }
        tracing::info!(participant = id, "Participant left");
        if !self.authority.is_local() {
            return;
        }
        for flag in &mut self.flags {
            if flag.holder() == Some(id) {
                flag.force_drop(DropReason::HolderLeft);
                self.outbox.emit(MatchEvent::FlagDropped {
                    flag: flag.id(),
                    holder: id,
                    reason: DropReason::HolderLeft,
                });
                self.outbox
                    .broadcast(RefereeMessage::FlagHolder(flag.snapshot()));
            }
        }
    }

    /// Replace a participant's replicated team, liveness or position.
    pub fn update_participant(&mut self, participant: Participant) {
        self.roster.upsert(participant);
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    /// Apply an ownership decision from the network layer.
    pub fn set_authority(&mut self, owner: Option<ParticipantId>, now: f64) -> AuthorityChange {
        let change = self.authority.set_owner(owner);
        match change {
            AuthorityChange::Gained => {
                tracing::info!(participant = self.authority.local(), "Became match authority");
                self.outstanding_claims.clear();
                for flag in &mut self.flags {
                    if let Some(holder) = flag.force_drop(DropReason::AuthorityChanged) {
                        self.outbox.emit(MatchEvent::FlagDropped {
                            flag: flag.id(),
                            holder,
                            reason: DropReason::AuthorityChanged,
                        });
                        self.outbox
                            .broadcast(RefereeMessage::FlagHolder(flag.snapshot()));
                    }
                }
                self.referee
                    .on_authority_gained(now, &self.authority, &mut self.outbox);
            },
            AuthorityChange::Lost => {
                tracing::info!(owner = ?owner, "Match authority handed over");
                self.referee.on_authority_lost();
            },
            AuthorityChange::Moved => {
                tracing::debug!(owner = ?owner, "Match authority moved");
                self.outstanding_claims.clear();
            },
            AuthorityChange::Unchanged => {},
        }
        self.settle();
        change
    }

    /// Apply a message from `from`.
    pub fn receive(&mut self, from: ParticipantId, message: &RefereeMessage, now: f64) {
        let mirror = !self.authority.is_local();
        match message {
            RefereeMessage::ControlPointSync(sync) if mirror => {
                if let Some(cp) = self
                    .control_points
                    .iter_mut()
                    .find(|cp| cp.id() == sync.point)
                    && let Some(team) = cp.apply_sync(sync)
                {
                    self.outbox.emit(MatchEvent::ControlPointCaptured {
                        point: sync.point,
                        team,
                    });
                }
            },
            RefereeMessage::FlagHolder(msg) if mirror => self.mirror_flag(msg.flag, msg.holder),
            RefereeMessage::FlagClaim(claim) if !mirror => self.resolve_claim(from, claim.flag),
            RefereeMessage::ControlPointSync(_)
            | RefereeMessage::FlagHolder(_)
            | RefereeMessage::FlagClaim(_) => {
                tracing::debug!(from, ?message, "Ignoring objective message");
            },
            _ => self
                .referee
                .receive(from, message, now, &self.authority, &mut self.outbox),
        }
        self.settle();
    }

    /// Advance the session to `now`, `dt` seconds after the previous tick.
    pub fn tick(&mut self, now: f64, dt: f32) {
        self.referee.tick(
            now,
            &self.authority,
            &self.roster,
            &self.arena,
            &mut self.outbox,
        );
        if self.state().is_playing() {
            if self.authority.is_local() {
                self.tick_objectives(dt);
            } else {
                self.claim_flags();
            }
        }
        self.settle();
    }

    /// Tear down to lobby defaults without notifying anyone.
    pub fn reset(&mut self) {
        self.referee.reset(&mut self.outbox);
        self.reset_objectives();
        self.observed_state = MatchState::NotPlaying;
    }

    fn tick_objectives(&mut self, dt: f32) {
        let threshold = self.config.capture_threshold_millis;
        let hold_points = u32::from(self.settings().points_per_second_holding_point);
        for i in 0..self.control_points.len() {
            if !self.state().is_playing() {
                return;
            }
            let cp = &mut self.control_points[i];
            let result = cp.tick(dt, &self.roster, threshold);
            let holder = cp.holding_team();
            if result.changed {
                self.outbox
                    .broadcast(RefereeMessage::ControlPointSync(cp.snapshot()));
            }
            if let Some(team) = result.captured_by {
                self.outbox.emit(MatchEvent::ControlPointCaptured {
                    point: cp.id(),
                    team,
                });
            }
            if result.held_seconds > 0 {
                self.referee.award_points(
                    holder,
                    hold_points * result.held_seconds,
                    &self.authority,
                    &mut self.outbox,
                );
            }
        }

        let capture_points = u32::from(self.settings().points_per_flag_capture);
        for i in 0..self.flags.len() {
            if !self.state().is_playing() {
                return;
            }
            let flag = &mut self.flags[i];
            let Some(outcome) = flag.tick(&self.roster, &self.arena) else {
                continue;
            };
            let id = flag.id();
            self.outbox
                .broadcast(RefereeMessage::FlagHolder(flag.snapshot()));
            match outcome {
                FlagOutcome::PickedUp(holder) => {
                    self.outbox.emit(MatchEvent::FlagPickedUp { flag: id, holder });
                },
                FlagOutcome::Dropped { holder, reason } => {
                    self.outbox.emit(MatchEvent::FlagDropped {
                        flag: id,
                        holder,
                        reason,
                    });
                },
                FlagOutcome::Captured { holder, team } => {
                    self.outbox.emit(MatchEvent::FlagCaptured {
                        flag: id,
                        holder,
                        team,
                    });
                    self.referee.award_points(
                        team,
                        capture_points,
                        &self.authority,
                        &mut self.outbox,
                    );
                },
            }
        }
    }

    /// Non-authority: ask for any flag the local avatar is standing on.
    fn claim_flags(&mut self) {
        let Some(me) = self.roster.get(self.authority.local()) else {
            return;
        };
        for flag in &self.flags {
            let id = flag.id();
            if flag.can_pick_up(me) {
                if !self.outstanding_claims.contains(&id) {
                    tracing::debug!(flag = id, "Claiming flag");
                    self.outstanding_claims.push(id);
                    self.outbox.send(
                        Target::Authority,
                        RefereeMessage::FlagClaim(FlagClaimMsg { flag: id }),
                    );
                }
            } else {
                self.outstanding_claims.retain(|&f| f != id);
            }
        }
    }

    fn resolve_claim(&mut self, from: ParticipantId, flag_id: u8) {
        if !self.state().is_playing() {
            tracing::debug!(from, flag = flag_id, "Ignoring flag claim outside a running match");
            return;
        }
        let (Some(flag), Some(claimant)) = (
            self.flags.iter_mut().find(|f| f.id() == flag_id),
            self.roster.get(from),
        ) else {
            tracing::debug!(from, flag = flag_id, "Ignoring claim for unknown flag or participant");
            return;
        };
        if flag.try_claim(claimant) {
            self.outbox.emit(MatchEvent::FlagPickedUp {
                flag: flag_id,
                holder: from,
            });
            self.outbox
                .broadcast(RefereeMessage::FlagHolder(flag.snapshot()));
        } else {
            tracing::debug!(from, flag = flag_id, holder = ?flag.holder(), "Rejected flag claim");
        }
    }

    fn mirror_flag(&mut self, flag_id: u8, holder: Option<ParticipantId>) {
        let Some(flag) = self.flags.iter_mut().find(|f| f.id() == flag_id) else {
            tracing::warn!(flag = flag_id, "Holder update for unknown flag");
            return;
        };
        self.outstanding_claims.retain(|&f| f != flag_id);
        let previous = flag.apply_holder(holder);
        match (previous, holder) {
            (None, Some(holder)) => {
                self.outbox
                    .emit(MatchEvent::FlagPickedUp { flag: flag_id, holder });
            },
            (Some(previous), None) => {
                self.outbox.emit(MatchEvent::FlagDropped {
                    flag: flag_id,
                    holder: previous,
                    reason: DropReason::Remote,
                });
            },
            (Some(previous), Some(holder)) if previous != holder => {
                self.outbox.emit(MatchEvent::FlagDropped {
                    flag: flag_id,
                    holder: previous,
                    reason: DropReason::Remote,
                });
                self.outbox
                    .emit(MatchEvent::FlagPickedUp { flag: flag_id, holder });
            },
            _ => {},
        }
    }

    /// Objectives only live while `Playing`; every participant clears them
    /// locally when the match stops.
    fn settle(&mut self) {
        let state = self.referee.state();
        if self.observed_state.is_playing() && !state.is_playing() {
            for flag in &mut self.flags {
                if let Some(holder) = flag.force_drop(DropReason::MatchEnded) {
                    self.outbox.emit(MatchEvent::FlagDropped {
                        flag: flag.id(),
                        holder,
                        reason: DropReason::MatchEnded,
                    });
                }
            }
            for cp in &mut self.control_points {
                cp.reset();
            }
            self.outstanding_claims.clear();
        }
        self.observed_state = state;
    }

    fn reset_objectives(&mut self) {
        for flag in &mut self.flags {
            flag.force_drop(DropReason::MatchEnded);
        }
        for cp in &mut self.control_points {
            cp.reset();
        }
        self.outstanding_claims.clear();
    }
}
