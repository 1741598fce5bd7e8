use crossfire_core::participant::ParticipantId;

/// Result of an ownership update, seen from the local participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityChange {
    /// The local participant just became the owner.
    Gained,
    /// The local participant was the owner and no longer is.
    Lost,
    /// Ownership moved between two remote participants (or to nobody).
    Moved,
    Unchanged,
}

/// Tracks which participant currently owns the match.
///
/// Election happens outside this crate; `set_owner` is fed whatever the
/// network layer decided and reports how that affects the local participant.
#[derive(Debug, Clone)]
pub struct Authority {
    local: ParticipantId,
    owner: Option<ParticipantId>,
}

impl Authority {
    pub fn new(local: ParticipantId, owner: Option<ParticipantId>) -> Self {
        Self { local, owner }
    }

    pub fn local(&self) -> ParticipantId {
        self.local
    }

    pub fn owner(&self) -> Option<ParticipantId> {
        self.owner
    }

    /// Whether the local participant is the authority.
    pub fn is_local(&self) -> bool {
        self.owner == Some(self.local)
    }

    pub fn set_owner(&mut self, owner: Option<ParticipantId>) -> AuthorityChange {
        if owner == self.owner {
            return AuthorityChange::Unchanged;
        }
        let was_local = self.is_local();
        self.owner = owner;
        match (was_local, self.is_local()) {
            (false, true) => AuthorityChange::Gained,
            (true, false) => AuthorityChange::Lost,
            _ => AuthorityChange::Moved,
        }
    }
}
