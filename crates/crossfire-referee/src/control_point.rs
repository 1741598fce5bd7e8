use smallvec::SmallVec;

use crossfire_core::geometry::Zone;
use crossfire_core::net::messages::ControlPointSyncMsg;
use crossfire_core::participant::{NO_TEAM, Roster, TeamId};

/// Outcome of one control point tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointTick {
    /// Replicated fields changed and should be synced.
    pub changed: bool,
    pub captured_by: Option<TeamId>,
    /// Whole seconds the current holder has accrued this tick.
    pub held_seconds: u32,
}

/// A capture zone. The authority drives it once per fixed tick while a match
/// is running; everyone else applies the synced fields.
#[derive(Debug, Clone)]
pub struct ControlPoint {
    id: u8,
    zone: Zone,
    holding_team: TeamId,
    capturing_team: TeamId,
    millis_captured: f32,
    hold_timer: f32,
}

impl ControlPoint {
    pub fn new(id: u8, zone: Zone) -> Self {
        Self {
            id,
            zone,
            holding_team: NO_TEAM,
            capturing_team: NO_TEAM,
            millis_captured: 0.0,
            hold_timer: 0.0,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn holding_team(&self) -> TeamId {
        self.holding_team
    }

    pub fn capturing_team(&self) -> TeamId {
        self.capturing_team
    }

    pub fn millis_captured(&self) -> f32 {
        self.millis_captured
    }

    /// Nobody is contesting the holder.
    pub fn is_secure(&self) -> bool {
        self.capturing_team == self.holding_team
    }

    /// Distinct non-neutral teams with a living member inside, in roster order.
    fn teams_present(&self, roster: &Roster) -> SmallVec<[TeamId; 4]> {
        let mut teams = SmallVec::new();
        for p in roster.living() {
            if p.has_team() && !teams.contains(&p.team) && p.is_inside(&self.zone) {
                teams.push(p.team);
            }
        }
        teams
    }

    /// Advance capture progress by `dt` seconds.
    pub fn tick(&mut self, dt: f32, roster: &Roster, threshold_millis: f32) -> PointTick {
        let before = self.snapshot();
        let present = self.teams_present(roster);
        let mut result = PointTick::default();

        if self.is_secure()
            && let Some(&intruder) = present.iter().find(|&&t| t != self.holding_team)
        {
            self.capturing_team = intruder;
        }

        if !self.is_secure() {
            let step = dt * 1000.0;
            let capturer_inside = present.contains(&self.capturing_team);
            let contested = present.iter().any(|&t| t != self.capturing_team);

            if !capturer_inside {
                self.millis_captured = (self.millis_captured - step).max(0.0);
                if self.millis_captured <= 0.0 {
                    self.millis_captured = 0.0;
                    self.capturing_team = self.holding_team;
                }
            } else if !contested {
                self.millis_captured += step;
                if self.millis_captured >= threshold_millis {
                    tracing::info!(
                        point = self.id,
                        from = self.holding_team,
                        to = self.capturing_team,
                        "Control point captured"
                    );
                    self.holding_team = self.capturing_team;
                    self.millis_captured = 0.0;
                    self.hold_timer = 0.0;
                    result.captured_by = Some(self.holding_team);
                }
            }
        }

        if self.holding_team != NO_TEAM {
            self.hold_timer += dt;
            while self.hold_timer >= 1.0 {
                self.hold_timer -= 1.0;
                result.held_seconds += 1;
            }
        }

        result.changed = self.snapshot() != before;
        result
    }

    /// Back to neutral with no progress.
    pub fn reset(&mut self) {
        self.holding_team = NO_TEAM;
        self.capturing_team = NO_TEAM;
        self.millis_captured = 0.0;
        self.hold_timer = 0.0;
    }

    pub fn snapshot(&self) -> ControlPointSyncMsg {
        ControlPointSyncMsg {
            point: self.id,
            holding_team: self.holding_team,
            capturing_team: self.capturing_team,
            millis_captured: self.millis_captured,
        }
    }

    /// Mirror the authority's fields. Returns the new holder if it changed to
    /// a real team.
    pub fn apply_sync(&mut self, sync: &ControlPointSyncMsg) -> Option<TeamId> {
        let previous = self.holding_team;
        self.holding_team = sync.holding_team;
        self.capturing_team = sync.capturing_team;
        self.millis_captured = sync.millis_captured;
        (self.holding_team != previous && self.holding_team != NO_TEAM)
            .then_some(self.holding_team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossfire_core::geometry::Position;
    use crossfire_core::participant::Participant;
    use crossfire_core::test_helpers::participant_at;

    const THRESHOLD: f32 = 10_000.0;

    fn point() -> ControlPoint {
        ControlPoint::new(0, Zone::new(Position::default(), 2.0, 2.0))
    }

    fn inside(id: u64, team: TeamId) -> Participant {
        participant_at(id, team, Position::new(0.5, 0.0, 0.0))
    }

    fn outside(id: u64, team: TeamId) -> Participant {
        participant_at(id, team, Position::new(20.0, 0.0, 0.0))
    }

    fn run(cp: &mut ControlPoint, roster: &Roster, seconds: u32) -> Vec<PointTick> {
        (0..seconds).map(|_| cp.tick(1.0, roster, THRESHOLD)).collect()
    }

    #[test]
    fn neutral_point_is_captured_after_threshold() {
        let mut cp = point();
        let roster = Roster::from_participants(vec![inside(1, 1)]);

        let ticks = run(&mut cp, &roster, 9);
        assert_eq!(cp.holding_team(), NO_TEAM);
        assert_eq!(cp.capturing_team(), 1);
        assert_eq!(cp.millis_captured(), 9000.0);
        assert!(ticks.iter().all(|t| t.captured_by.is_none()));

        let last = cp.tick(1.0, &roster, THRESHOLD);
        assert_eq!(last.captured_by, Some(1));
        assert_eq!(cp.holding_team(), 1);
        assert_eq!(cp.millis_captured(), 0.0);
        assert!(cp.is_secure());
    }

    #[test]
    fn capture_then_decay_without_flip() {
        let mut cp = point();
        let mut roster = Roster::from_participants(vec![inside(1, 1), outside(2, 2)]);
        run(&mut cp, &roster, 10);
        assert_eq!(cp.holding_team(), 1);

        roster.upsert(outside(1, 1));
        roster.upsert(inside(2, 2));
        run(&mut cp, &roster, 4);
        assert_eq!(cp.capturing_team(), 2);
        assert_eq!(cp.millis_captured(), 4000.0);

        roster.upsert(outside(2, 2));
        run(&mut cp, &roster, 3);
        assert_eq!(cp.millis_captured(), 1000.0);
        assert!(!cp.is_secure());

        run(&mut cp, &roster, 1);
        assert_eq!(cp.millis_captured(), 0.0);
        assert_eq!(cp.holding_team(), 1);
        assert!(cp.is_secure());
    }

    #[test]
    fn stalemate_freezes_progress() {
        let mut cp = point();
        let mut roster = Roster::from_participants(vec![inside(1, 1)]);
        run(&mut cp, &roster, 3);
        assert_eq!(cp.millis_captured(), 3000.0);

        roster.upsert(inside(2, 2));
        let ticks = run(&mut cp, &roster, 5);
        assert_eq!(cp.millis_captured(), 3000.0);
        assert!(ticks.iter().all(|t| !t.changed));
    }

    #[test]
    fn holder_presence_blocks_intruder() {
        let mut cp = point();
        let mut roster = Roster::from_participants(vec![inside(1, 1)]);
        run(&mut cp, &roster, 10);

        roster.upsert(inside(2, 2));
        run(&mut cp, &roster, 20);
        assert_eq!(cp.holding_team(), 1);
        assert_eq!(cp.millis_captured(), 0.0);
    }

    #[test]
    fn dead_and_unteamed_participants_do_not_count() {
        let mut cp = point();
        let mut dead = inside(1, 1);
        dead.alive = false;
        let roster = Roster::from_participants(vec![dead, inside(2, NO_TEAM)]);
        run(&mut cp, &roster, 15);
        assert_eq!(cp.holding_team(), NO_TEAM);
        assert_eq!(cp.capturing_team(), NO_TEAM);
    }

    #[test]
    fn holder_accrues_whole_seconds() {
        let mut cp = point();
        let roster = Roster::from_participants(vec![inside(1, 1)]);
        run(&mut cp, &roster, 10);

        let held: u32 = (0..5)
            .map(|_| cp.tick(0.5, &roster, THRESHOLD).held_seconds)
            .sum();
        assert_eq!(held, 2);
    }

    #[test]
    fn sync_mirrors_holder() {
        let mut authority = point();
        let roster = Roster::from_participants(vec![inside(1, 2)]);
        run(&mut authority, &roster, 10);

        let mut mirror = point();
        assert_eq!(mirror.apply_sync(&authority.snapshot()), Some(2));
        assert_eq!(mirror.apply_sync(&authority.snapshot()), None);
        assert_eq!(mirror.holding_team(), 2);
    }

    #[test]
    fn reset_returns_to_neutral() {
        let mut cp = point();
        let roster = Roster::from_participants(vec![inside(1, 1)]);
        run(&mut cp, &roster, 12);
        cp.reset();
        assert_eq!(cp.snapshot(), point().snapshot());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn progress_stays_below_threshold(
                steps in proptest::collection::vec(
                    (any::<bool>(), any::<bool>(), 1u32..2000),
                    1..200,
                )
            ) {
                let mut cp = point();
                let mut roster = Roster::new();
                for (one_in, two_in, millis) in steps {
                    roster.upsert(if one_in { inside(1, 1) } else { outside(1, 1) });
                    roster.upsert(if two_in { inside(2, 2) } else { outside(2, 2) });
                    let before = cp.holding_team();
                    let result = cp.tick(millis as f32 / 1000.0, &roster, THRESHOLD);

                    prop_assert!(cp.millis_captured() >= 0.0);
                    prop_assert!(cp.millis_captured() < THRESHOLD);
                    if let Some(team) = result.captured_by {
                        prop_assert_ne!(team, before);
                        prop_assert!((team == 1 && one_in) || (team == 2 && two_in));
                    }
                }
            }
        }
    }
}
