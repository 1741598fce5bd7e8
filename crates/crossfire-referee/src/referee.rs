use crossfire_core::match_state::{FinishReason, MatchState};
use crossfire_core::net::messages::{
    LateJoinSyncMsg, MatchFinishedMsg, MatchTimerMsg, PointsAwardedMsg, RefereeMessage,
    SettingsChangedMsg, StartMatchRequestMsg, StateChangedMsg, Target,
};
use crossfire_core::participant::{Participant, ParticipantId, Roster, TeamId};
use crossfire_core::settings::MatchSettings;

use crate::arena::Arena;
use crate::authority::Authority;
use crate::config::RefereeConfig;
use crate::events::{MatchEvent, Outbox};
use crate::ledger::ScoreLedger;

/// The lifecycle sequence the authority is currently driving.
///
/// At most one is active. Replacing or clearing it is the cancellation
/// mechanism: the authority reverts to `NotPlaying` whenever an active
/// sequence is cancelled.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    /// Waiting for every eligible participant to stand in their base.
    Muster,
    Countdown { ends_at: f64 },
    /// Match running; `ends_at` is set when the timer condition is enabled.
    Running { ends_at: Option<f64> },
}

/// Match lifecycle state machine, score ledger and win-condition evaluation.
///
/// Every participant holds one. Only the instance whose participant is the
/// current authority writes state; the others mirror what it broadcasts.
#[derive(Debug, Clone)]
pub struct MatchReferee {
    countdown_secs: f64,
    lobby: MatchSettings,
    state: MatchState,
    settings: MatchSettings,
    ledger: ScoreLedger,
    /// Deadline on the local clock, valid while `Playing` with a timer.
    time_match_ends: Option<f64>,
    stage: Option<Stage>,
}

impl MatchReferee {
    pub fn new(config: &RefereeConfig) -> Self {
        Self {
            countdown_secs: config.countdown_secs,
            lobby: config.lobby.clone(),
            state: MatchState::NotPlaying,
            settings: config.lobby.clone(),
            ledger: ScoreLedger::new(config.team_count),
            time_match_ends: None,
            stage: None,
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn score(&self, team: TeamId) -> u32 {
        self.ledger.get(team)
    }

    pub fn scores(&self) -> &[u32] {
        self.ledger.as_slice()
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    pub fn time_match_ends(&self) -> Option<f64> {
        self.time_match_ends
    }

    /// Seconds until the timer condition fires, while a timed match is running.
    pub fn time_remaining(&self, now: f64) -> Option<f64> {
        if !self.state.is_playing() {
            return None;
        }
        self.time_match_ends.map(|deadline| (deadline - now).max(0.0))
    }

    /// Whether this participant is currently driving a lifecycle sequence.
    pub fn is_driving(&self) -> bool {
        self.stage.is_some()
    }

    /// Begin a match with `settings`. Only effective from `NotPlaying`;
    /// non-authorities forward the request to the authority.
    pub fn start_match(
        &mut self,
        settings: MatchSettings,
        authority: &Authority,
        out: &mut Outbox,
    ) {
        if self.state != MatchState::NotPlaying {
            tracing::debug!(
                state = %self.state,
                "Ignoring start request, match already in progress"
            );
            return;
        }
        if !authority.is_local() {
            out.send(
                Target::Authority,
                RefereeMessage::StartMatchRequest(StartMatchRequestMsg { settings }),
            );
            return;
        }

        self.begin_sequence(Stage::Muster);
        self.set_settings(settings, out);
        self.set_state(MatchState::Mustering, authority, out);
    }

    /// Forced termination. Authority only.
    pub fn end_match(&mut self, authority: &Authority, out: &mut Outbox) {
        if !authority.is_local() {
            tracing::debug!("Ignoring end request from a non-authority");
            return;
        }
        if let Some(stage) = self.stage.take() {
            tracing::info!(?stage, "Match sequence cancelled by end request");
        }
        self.enter_not_playing(authority, out);
        self.reset_scores(authority, out);
    }

    /// Add points to a team and tell everyone. Ignored for team 0 or zero points.
    pub fn award_points(
        &mut self,
        team: TeamId,
        points: u32,
        authority: &Authority,
        out: &mut Outbox,
    ) {
        if !self.apply_award(team, points, out) {
            return;
        }
        out.broadcast(RefereeMessage::PointsAwarded(PointsAwardedMsg { team, points }));
        self.check_score_win(authority, out);
    }

    /// Zero the ledger everywhere. Authority only.
    pub fn reset_scores(&mut self, authority: &Authority, out: &mut Outbox) {
        if !authority.is_local() {
            tracing::debug!("Ignoring score reset from a non-authority");
            return;
        }
        self.ledger.reset();
        out.emit(MatchEvent::ScoresReset);
        out.broadcast(RefereeMessage::ScoresReset);
    }

    /// Bring a newly connected participant up to date: replicated state and
    /// settings, the ledger as deltas, and the deadline as seconds remaining.
    pub fn handle_late_join(
        &self,
        participant: ParticipantId,
        now: f64,
        authority: &Authority,
        out: &mut Outbox,
    ) {
        if !authority.is_local() || participant == authority.local() {
            return;
        }
        let target = Target::Participant(participant);
        out.send(
            target,
            RefereeMessage::StateChanged(StateChangedMsg { state: self.state }),
        );
        out.send(
            target,
            RefereeMessage::SettingsChanged(SettingsChangedMsg {
                settings: self.settings.clone(),
            }),
        );
        out.send(
            target,
            RefereeMessage::LateJoinSync(LateJoinSyncMsg {
                scores: self.ledger.as_slice().to_vec(),
                seconds_left: self.time_remaining(now),
            }),
        );
        tracing::debug!(participant, state = %self.state, "Sent late-join sync");
    }

    /// Advance whatever sequence the authority is driving.
    pub fn tick(
        &mut self,
        now: f64,
        authority: &Authority,
        roster: &Roster,
        arena: &Arena,
        out: &mut Outbox,
    ) {
        if !authority.is_local() {
            return;
        }
        let Some(stage) = self.stage else {
            return;
        };
        match stage {
            Stage::Muster => {
                let eligible = roster.eligible_count();
                let mustered = roster
                    .iter()
                    .filter(|p| p.is_eligible() && self.in_muster_position(p, arena))
                    .count();
                if mustered > 0 && mustered == eligible {
                    tracing::info!(mustered, "All participants in position");
                    self.stage = Some(Stage::Countdown {
                        ends_at: now + self.countdown_secs,
                    });
                    self.set_state(MatchState::Countdown, authority, out);
                }
            },
            Stage::Countdown { ends_at } => {
                if now >= ends_at {
                    self.run_match(now, authority, out);
                }
            },
            Stage::Running {
                ends_at: Some(deadline),
            } => {
                if now >= deadline {
                    self.finish(FinishReason::TimerExpired, None, authority, out);
                }
            },
            Stage::Running { ends_at: None } => {},
        }
    }

    /// Resume from the replicated state after becoming the authority.
    pub fn on_authority_gained(&mut self, now: f64, authority: &Authority, out: &mut Outbox) {
        tracing::info!(state = %self.state, "Authority gained, resuming match lifecycle");
        match self.state {
            MatchState::NotPlaying => self.stage = None,
            MatchState::Mustering => self.begin_sequence(Stage::Muster),
            MatchState::Countdown => self.begin_sequence(Stage::Countdown {
                ends_at: now + self.countdown_secs,
            }),
            MatchState::Playing => self.run_match(now, authority, out),
        }
    }

    /// Abandon the local sequence. The new authority owns the state now, so
    /// nothing is written back.
    pub fn on_authority_lost(&mut self) {
        if let Some(stage) = self.stage.take() {
            tracing::info!(?stage, "Authority lost, abandoning match sequence");
        }
    }

    /// Apply a message addressed to this participant.
    pub fn receive(
        &mut self,
        from: ParticipantId,
        message: &RefereeMessage,
        now: f64,
        authority: &Authority,
        out: &mut Outbox,
    ) {
        // Replicated values are written by the authority alone; a local
        // authority ignores stale writes from a previous owner.
        let mirror = !authority.is_local();
        match message {
            RefereeMessage::StateChanged(m) if mirror => self.mirror_state(m.state, out),
            RefereeMessage::SettingsChanged(m) if mirror => {
                if m.settings != self.settings {
                    self.settings = m.settings.clone();
                    out.emit(MatchEvent::SettingsChanged(self.settings.clone()));
                }
            },
            RefereeMessage::MatchTimer(m) if mirror => {
                self.time_match_ends = Some(now + m.seconds_left);
            },
            RefereeMessage::MatchFinished(m) if mirror => {
                out.emit(MatchEvent::MatchFinished {
                    reason: m.reason,
                    winner: m.winner,
                    scores: m.scores.clone(),
                });
            },
            RefereeMessage::ScoresReset if mirror => {
                self.ledger.reset();
                out.emit(MatchEvent::ScoresReset);
            },
            RefereeMessage::LateJoinSync(m) if mirror => self.apply_late_join(from, m, now, out),
            RefereeMessage::PointsAwarded(m) => {
                if self.apply_award(m.team, m.points, out) {
                    self.check_score_win(authority, out);
                }
            },
            RefereeMessage::StartMatchRequest(m) if !mirror => {
                tracing::debug!(from, "Start request received");
                self.start_match(m.settings.clone(), authority, out);
            },
            other => {
                tracing::debug!(from, message = ?other, "Referee ignoring message");
            },
        }
    }

    /// Back to lobby defaults without telling anyone, e.g. when the session
    /// is torn down.
    pub fn reset(&mut self, out: &mut Outbox) {
        self.stage = None;
        self.mirror_state(MatchState::NotPlaying, out);
        if self.settings != self.lobby {
            self.settings = self.lobby.clone();
            out.emit(MatchEvent::SettingsChanged(self.settings.clone()));
        }
        self.ledger.reset();
        self.time_match_ends = None;
    }

    fn in_muster_position(&self, participant: &Participant, arena: &Arena) -> bool {
        if self.settings.teams {
            arena.in_own_base(participant)
        } else {
            arena.in_any_base(participant)
        }
    }

    fn begin_sequence(&mut self, stage: Stage) {
        if let Some(previous) = self.stage.replace(stage) {
            tracing::debug!(?previous, next = ?stage, "Replacing match sequence");
        }
    }

    /// Enter (or resume) `Playing`. The match-start broadcast only happens for
    /// a genuinely new match, so a new authority resuming a running match
    /// keeps the deadline and scores everyone already has.
    fn run_match(&mut self, now: f64, authority: &Authority, out: &mut Outbox) {
        if self.state != MatchState::Playing {
            self.reset_scores(authority, out);
            self.time_match_ends = self
                .settings
                .has_timer()
                .then(|| now + self.settings.timer_duration());
            out.broadcast(RefereeMessage::SettingsChanged(SettingsChangedMsg {
                settings: self.settings.clone(),
            }));
            if let Some(deadline) = self.time_match_ends {
                out.broadcast(RefereeMessage::MatchTimer(MatchTimerMsg {
                    seconds_left: deadline - now,
                }));
            }
            self.set_state(MatchState::Playing, authority, out);
        } else if self.settings.has_timer() && self.time_match_ends.is_none() {
            tracing::warn!("Resumed a timed match without a replicated deadline, restarting timer");
            let deadline = now + self.settings.timer_duration();
            self.time_match_ends = Some(deadline);
            out.broadcast(RefereeMessage::MatchTimer(MatchTimerMsg {
                seconds_left: deadline - now,
            }));
        }

        let ends_at = if self.settings.has_timer() {
            self.time_match_ends
        } else {
            None
        };
        self.stage = Some(Stage::Running { ends_at });
        self.check_score_win(authority, out);
    }

    fn check_score_win(&mut self, authority: &Authority, out: &mut Outbox) {
        if !authority.is_local()
            || !self.settings.has_score_target()
            || !matches!(self.stage, Some(Stage::Running { .. }))
        {
            return;
        }
        let target = u32::from(self.settings.score_target).max(1);
        if let Some(team) = self.ledger.team_at_or_above(target) {
            self.finish(FinishReason::ScoreReached, Some(team), authority, out);
        }
    }

    /// End the running match exactly once: announce, then return to lobby.
    fn finish(
        &mut self,
        reason: FinishReason,
        winner: Option<TeamId>,
        authority: &Authority,
        out: &mut Outbox,
    ) {
        if self.stage.take().is_none() {
            return;
        }
        let winner = winner.or_else(|| self.ledger.leader());
        let scores = self.ledger.as_slice().to_vec();
        tracing::info!(?reason, ?winner, ?scores, "Match finished");
        out.emit(MatchEvent::MatchFinished {
            reason,
            winner,
            scores: scores.clone(),
        });
        out.broadcast(RefereeMessage::MatchFinished(MatchFinishedMsg {
            reason,
            winner,
            scores,
        }));
        self.enter_not_playing(authority, out);
    }

    fn enter_not_playing(&mut self, authority: &Authority, out: &mut Outbox) {
        self.time_match_ends = None;
        self.set_state(MatchState::NotPlaying, authority, out);
        self.set_settings(self.lobby.clone(), out);
    }

    /// Authority-side write of the replicated state.
    fn set_state(&mut self, next: MatchState, authority: &Authority, out: &mut Outbox) {
        if !authority.is_local() || next == self.state {
            return;
        }
        if !self.state.can_advance_to(next) {
            tracing::warn!(from = %self.state, to = %next, "Invalid match state transition");
            return;
        }
        let from = std::mem::replace(&mut self.state, next);
        tracing::info!(%from, to = %next, "Match state changed");
        out.emit(MatchEvent::StateChanged { from, to: next });
        out.broadcast(RefereeMessage::StateChanged(StateChangedMsg { state: next }));
    }

    fn set_settings(&mut self, settings: MatchSettings, out: &mut Outbox) {
        if settings == self.settings {
            return;
        }
        self.settings = settings;
        out.emit(MatchEvent::SettingsChanged(self.settings.clone()));
        out.broadcast(RefereeMessage::SettingsChanged(SettingsChangedMsg {
            settings: self.settings.clone(),
        }));
    }

    fn mirror_state(&mut self, next: MatchState, out: &mut Outbox) {
        if next == self.state {
            return;
        }
        let from = std::mem::replace(&mut self.state, next);
        if next == MatchState::NotPlaying {
            self.time_match_ends = None;
        }
        out.emit(MatchEvent::StateChanged { from, to: next });
    }

    fn apply_award(&mut self, team: TeamId, points: u32, out: &mut Outbox) -> bool {
        match self.ledger.award(team, points) {
            Some(total) => {
                tracing::debug!(team, points, total, "Points awarded");
                out.emit(MatchEvent::TeamScored {
                    team,
                    points,
                    total,
                });
                true
            },
            None => {
                tracing::debug!(team, points, "Ignoring award");
                false
            },
        }
    }

    fn apply_late_join(
        &mut self,
        from: ParticipantId,
        sync: &LateJoinSyncMsg,
        now: f64,
        out: &mut Outbox,
    ) {
        if let Err(e) = self.ledger.apply_deltas(&sync.scores) {
            tracing::warn!(from, error = %e, "Dropping malformed late-join sync");
            return;
        }
        for (team, &delta) in sync.scores.iter().enumerate().skip(1) {
            if delta > 0
                && let Ok(team) = TeamId::try_from(team)
            {
                out.emit(MatchEvent::TeamScored {
                    team,
                    points: delta,
                    total: self.ledger.get(team),
                });
            }
        }
        if let Some(seconds_left) = sync.seconds_left {
            self.time_match_ends = Some(now + seconds_left);
        }
    }
}
