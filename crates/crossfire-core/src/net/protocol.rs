use serde::{Deserialize, Serialize};

use super::messages::{
    ControlPointSyncMsg, FlagClaimMsg, FlagHolderMsg, LateJoinSyncMsg, MatchFinishedMsg,
    MatchTimerMsg, MessageType, PointsAwardedMsg, RefereeMessage, SettingsChangedMsg,
    StartMatchRequestMsg, StateChangedMsg,
};

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024;

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `RefereeMessage` to wire format.
pub fn encode_referee_message(msg: &RefereeMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        RefereeMessage::StateChanged(m) => encode_message(MessageType::StateChanged, m),
        RefereeMessage::SettingsChanged(m) => encode_message(MessageType::SettingsChanged, m),
        RefereeMessage::MatchTimer(m) => encode_message(MessageType::MatchTimer, m),
        RefereeMessage::MatchFinished(m) => encode_message(MessageType::MatchFinished, m),
        RefereeMessage::PointsAwarded(m) => encode_message(MessageType::PointsAwarded, m),
        RefereeMessage::ScoresReset => encode_message(MessageType::ScoresReset, &()),
        RefereeMessage::LateJoinSync(m) => encode_message(MessageType::LateJoinSync, m),
        RefereeMessage::StartMatchRequest(m) => {
            encode_message(MessageType::StartMatchRequest, m)
        },
        RefereeMessage::ControlPointSync(m) => encode_message(MessageType::ControlPointSync, m),
        RefereeMessage::FlagHolder(m) => encode_message(MessageType::FlagHolder, m),
        RefereeMessage::FlagClaim(m) => encode_message(MessageType::FlagClaim, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    let Some(&first) = data.first() else {
        return Err(ProtocolError::EmptyMessage);
    };
    MessageType::from_byte(first).ok_or(ProtocolError::UnknownMessageType(first))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `RefereeMessage`.
pub fn decode_referee_message(data: &[u8]) -> Result<RefereeMessage, ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }
    let msg = match decode_message_type(data)? {
        MessageType::StateChanged => {
            RefereeMessage::StateChanged(decode_payload::<StateChangedMsg>(data)?)
        },
        MessageType::SettingsChanged => {
            RefereeMessage::SettingsChanged(decode_payload::<SettingsChangedMsg>(data)?)
        },
        MessageType::MatchTimer => {
            RefereeMessage::MatchTimer(decode_payload::<MatchTimerMsg>(data)?)
        },
        MessageType::MatchFinished => {
            RefereeMessage::MatchFinished(decode_payload::<MatchFinishedMsg>(data)?)
        },
        MessageType::PointsAwarded => {
            RefereeMessage::PointsAwarded(decode_payload::<PointsAwardedMsg>(data)?)
        },
        MessageType::ScoresReset => {
            decode_payload::<()>(data)?;
            RefereeMessage::ScoresReset
        },
        MessageType::LateJoinSync => {
            RefereeMessage::LateJoinSync(decode_payload::<LateJoinSyncMsg>(data)?)
        },
        MessageType::StartMatchRequest => {
            RefereeMessage::StartMatchRequest(decode_payload::<StartMatchRequestMsg>(data)?)
        },
        MessageType::ControlPointSync => {
            RefereeMessage::ControlPointSync(decode_payload::<ControlPointSyncMsg>(data)?)
        },
        MessageType::FlagHolder => {
            RefereeMessage::FlagHolder(decode_payload::<FlagHolderMsg>(data)?)
        },
        MessageType::FlagClaim => RefereeMessage::FlagClaim(decode_payload::<FlagClaimMsg>(data)?),
    };
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_state::{FinishReason, MatchState};
    use crate::settings::{MatchSettings, WinCondition};

    fn roundtrip(msg: RefereeMessage) {
        let encoded = encode_referee_message(&msg).unwrap();
        let decoded = decode_referee_message(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_state_and_settings() {
        roundtrip(RefereeMessage::StateChanged(StateChangedMsg {
            state: MatchState::Countdown,
        }));
        roundtrip(RefereeMessage::SettingsChanged(SettingsChangedMsg {
            settings: MatchSettings {
                teams: true,
                win_condition: WinCondition::TIMER | WinCondition::REACH_SCORE,
                ..MatchSettings::lobby()
            },
        }));
    }

    #[test]
    fn roundtrip_match_finished() {
        roundtrip(RefereeMessage::MatchFinished(MatchFinishedMsg {
            reason: FinishReason::ScoreReached,
            winner: Some(1),
            scores: vec![0, 15, 4],
        }));
    }

    #[test]
    fn roundtrip_scores_reset_without_payload_struct() {
        roundtrip(RefereeMessage::ScoresReset);
    }

    #[test]
    fn roundtrip_late_join_sync() {
        roundtrip(RefereeMessage::LateJoinSync(LateJoinSyncMsg {
            scores: vec![0, 3, 9],
            seconds_left: Some(42.5),
        }));
        roundtrip(RefereeMessage::LateJoinSync(LateJoinSyncMsg {
            scores: vec![0, 0, 0],
            seconds_left: None,
        }));
    }

    #[test]
    fn flag_claim_wire_bytes() {
        // type byte, fixarray(1), fixint(2)
        let encoded =
            encode_referee_message(&RefereeMessage::FlagClaim(FlagClaimMsg { flag: 2 })).unwrap();
        assert_eq!(encoded, vec![0x32, 0x91, 0x02]);
    }

    #[test]
    fn decode_empty_fails() {
        assert!(matches!(
            decode_referee_message(&[]),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn decode_unknown_type_fails() {
        assert!(matches!(
            decode_referee_message(&[0xEE, 0x90]),
            Err(ProtocolError::UnknownMessageType(0xEE))
        ));
    }

    #[test]
    fn decode_truncated_payload_fails() {
        let mut encoded = encode_referee_message(&RefereeMessage::LateJoinSync(LateJoinSyncMsg {
            scores: vec![1, 2, 3],
            seconds_left: Some(1.0),
        }))
        .unwrap();
        encoded.truncate(3);
        assert!(matches!(
            decode_referee_message(&encoded),
            Err(ProtocolError::DeserializeError(_))
        ));
    }

    #[test]
    fn oversized_frame_rejected() {
        let data = vec![0x01; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            decode_referee_message(&data),
            Err(ProtocolError::PayloadTooLarge(_))
        ));
    }
}
