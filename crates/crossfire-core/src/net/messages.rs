use serde::{Deserialize, Serialize};

use crate::match_state::{FinishReason, MatchState};
use crate::participant::{ParticipantId, TeamId};
use crate::settings::MatchSettings;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Authority -> everyone (replicated lifecycle)
    StateChanged = 0x01,
    SettingsChanged = 0x02,
    MatchTimer = 0x03,
    MatchFinished = 0x04,

    // Score ledger
    PointsAwarded = 0x10,
    ScoresReset = 0x11,
    LateJoinSync = 0x12,

    // Anyone -> authority
    StartMatchRequest = 0x20,

    // Objectives
    ControlPointSync = 0x30,
    FlagHolder = 0x31,
    FlagClaim = 0x32,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::StateChanged),
            0x02 => Some(Self::SettingsChanged),
            0x03 => Some(Self::MatchTimer),
            0x04 => Some(Self::MatchFinished),
            0x10 => Some(Self::PointsAwarded),
            0x11 => Some(Self::ScoresReset),
            0x12 => Some(Self::LateJoinSync),
            0x20 => Some(Self::StartMatchRequest),
            0x30 => Some(Self::ControlPointSync),
            0x31 => Some(Self::FlagHolder),
            0x32 => Some(Self::FlagClaim),
            _ => None,
        }
    }
}

/// Who a message is addressed to. The sender has always applied the message
/// locally already, so `Everyone` never loops back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Everyone,
    Authority,
    Participant(ParticipantId),
}

/// An outbound message and its destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target: Target,
    pub message: RefereeMessage,
}

/// Every message the referee and its objectives exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum RefereeMessage {
    StateChanged(StateChangedMsg),
    SettingsChanged(SettingsChangedMsg),
    MatchTimer(MatchTimerMsg),
    MatchFinished(MatchFinishedMsg),
    PointsAwarded(PointsAwardedMsg),
    ScoresReset,
    LateJoinSync(LateJoinSyncMsg),
    StartMatchRequest(StartMatchRequestMsg),
    ControlPointSync(ControlPointSyncMsg),
    FlagHolder(FlagHolderMsg),
    FlagClaim(FlagClaimMsg),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateChangedMsg {
    pub state: MatchState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsChangedMsg {
    pub settings: MatchSettings,
}

/// Deadline of the running match, relative to the moment it was sent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchTimerMsg {
    pub seconds_left: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchFinishedMsg {
    pub reason: FinishReason,
    pub winner: Option<TeamId>,
    pub scores: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointsAwardedMsg {
    pub team: TeamId,
    pub points: u32,
}

/// Catch-up payload for a participant connecting mid-match. `scores` are
/// deltas to add to the receiver's ledger, one per team slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateJoinSyncMsg {
    pub scores: Vec<u32>,
    pub seconds_left: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartMatchRequestMsg {
    pub settings: MatchSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPointSyncMsg {
    pub point: u8,
    pub holding_team: TeamId,
    pub capturing_team: TeamId,
    pub millis_captured: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagHolderMsg {
    pub flag: u8,
    pub holder: Option<ParticipantId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagClaimMsg {
    pub flag: u8,
}
