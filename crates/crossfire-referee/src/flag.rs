use crossfire_core::geometry::Zone;
use crossfire_core::net::messages::FlagHolderMsg;
use crossfire_core::participant::{Participant, ParticipantId, Roster, TeamId};

use crate::arena::{Arena, FlagSpawn};
use crate::events::DropReason;

/// Something that happened to a flag during an authority tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOutcome {
    PickedUp(ParticipantId),
    Dropped {
        holder: ParticipantId,
        reason: DropReason,
    },
    Captured {
        holder: ParticipantId,
        team: TeamId,
    },
}

/// A capturable flag. The holder is written by the authority only.
#[derive(Debug, Clone)]
pub struct Flag {
    id: u8,
    home_team: TeamId,
    pickup: Zone,
    holder: Option<ParticipantId>,
}

impl Flag {
    pub fn new(id: u8, spawn: &FlagSpawn, pickup_radius: f32, pickup_half_height: f32) -> Self {
        Self {
            id,
            home_team: spawn.home_team,
            pickup: Zone::new(spawn.home, pickup_radius, pickup_half_height),
            holder: None,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn home_team(&self) -> TeamId {
        self.home_team
    }

    pub fn pickup_zone(&self) -> &Zone {
        &self.pickup
    }

    pub fn holder(&self) -> Option<ParticipantId> {
        self.holder
    }

    /// Unheld, and `participant` is a living, teamed opponent of the flag's
    /// home team standing in the pickup volume.
    pub fn can_pick_up(&self, participant: &Participant) -> bool {
        self.holder.is_none()
            && participant.has_team()
            && participant.team != self.home_team
            && participant.is_inside(&self.pickup)
    }

    /// Grant the flag to `participant` if the claim is still valid. The first
    /// valid claim wins; later ones fail because the flag is already held.
    pub fn try_claim(&mut self, participant: &Participant) -> bool {
        if !self.can_pick_up(participant) {
            return false;
        }
        self.holder = Some(participant.id);
        tracing::info!(flag = self.id, participant = participant.id, "Flag picked up");
        true
    }

    /// Authority tick: drop on death or disconnect, capture in the holder's
    /// own base, otherwise hand the flag to the first eligible participant in
    /// roster order.
    pub fn tick(&mut self, roster: &Roster, arena: &Arena) -> Option<FlagOutcome> {
        let Some(holder) = self.holder else {
            let claimant = roster.living().find(|p| self.can_pick_up(p))?;
            let id = claimant.id;
            self.try_claim(claimant);
            return Some(FlagOutcome::PickedUp(id));
        };

        match roster.get(holder) {
            None => self
                .force_drop(DropReason::HolderLeft)
                .map(|holder| FlagOutcome::Dropped {
                    holder,
                    reason: DropReason::HolderLeft,
                }),
            Some(p) if !p.alive => {
                self.force_drop(DropReason::HolderDied)
                    .map(|holder| FlagOutcome::Dropped {
                        holder,
                        reason: DropReason::HolderDied,
                    })
            },
            Some(p) if arena.in_own_base(p) => {
                self.holder = None;
                tracing::info!(
                    flag = self.id,
                    participant = holder,
                    team = p.team,
                    "Flag captured"
                );
                Some(FlagOutcome::Captured {
                    holder,
                    team: p.team,
                })
            },
            Some(_) => None,
        }
    }

    /// Return the flag home. Returns the previous holder, if any.
    pub fn force_drop(&mut self, reason: DropReason) -> Option<ParticipantId> {
        let holder = self.holder.take()?;
        tracing::info!(flag = self.id, participant = holder, ?reason, "Flag dropped");
        Some(holder)
    }

    pub fn snapshot(&self) -> FlagHolderMsg {
        FlagHolderMsg {
            flag: self.id,
            holder: self.holder,
        }
    }

    /// Mirror the authority's holder. Returns the previous holder.
    pub fn apply_holder(&mut self, holder: Option<ParticipantId>) -> Option<ParticipantId> {
        std::mem::replace(&mut self.holder, holder)
    }
}
