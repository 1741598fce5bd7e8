use crossfire_core::net::protocol::ProtocolError;
use crossfire_core::participant::ParticipantId;

#[derive(Debug)]
pub enum HostError {
    /// A configuration value is out of range.
    Config(String),
    Protocol(ProtocolError),
    UnknownParticipant(ParticipantId),
    /// The router task has exited.
    RouterClosed,
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(m) => write!(f, "invalid configuration: {m}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::UnknownParticipant(id) => write!(f, "unknown participant {id}"),
            Self::RouterClosed => write!(f, "router has shut down"),
        }
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtocolError> for HostError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}
