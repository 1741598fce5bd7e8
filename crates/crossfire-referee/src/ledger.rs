use crossfire_core::participant::{NO_TEAM, TeamId};

/// Errors applying a replicated score payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    LengthMismatch { expected: usize, got: usize },
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthMismatch { expected, got } => {
                write!(f, "score payload has {got} slots, expected {expected}")
            },
        }
    }
}

impl std::error::Error for LedgerError {}

/// Per-team scores indexed by team id. Slot 0 belongs to `NO_TEAM` and is
/// never scored. Scores only grow until the next reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreLedger {
    scores: Vec<u32>,
}

impl ScoreLedger {
    /// A zeroed ledger with `team_count` real teams plus the sentinel slot.
    pub fn new(team_count: u8) -> Self {
        Self {
            scores: vec![0; usize::from(team_count) + 1],
        }
    }

    /// Add `points` to `team`. Returns the new total, or `None` when the award
    /// is ignored (team 0, zero points, or an unknown team).
    pub fn award(&mut self, team: TeamId, points: u32) -> Option<u32> {
        if team == NO_TEAM || points == 0 {
            return None;
        }
        let slot = self.scores.get_mut(usize::from(team))?;
        *slot = slot.saturating_add(points);
        Some(*slot)
    }

    /// Add every slot of `deltas` to the ledger. The whole payload is rejected
    /// if its length differs from the ledger's.
    pub fn apply_deltas(&mut self, deltas: &[u32]) -> Result<(), LedgerError> {
        if deltas.len() != self.scores.len() {
            return Err(LedgerError::LengthMismatch {
                expected: self.scores.len(),
                got: deltas.len(),
            });
        }
        for (slot, delta) in self.scores.iter_mut().zip(deltas).skip(1) {
            *slot = slot.saturating_add(*delta);
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.scores.iter_mut().for_each(|s| *s = 0);
    }

    pub fn get(&self, team: TeamId) -> u32 {
        self.scores.get(usize::from(team)).copied().unwrap_or(0)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.scores.iter().map(|&s| u64::from(s)).sum()
    }

    /// First team whose score has reached `target`.
    pub fn team_at_or_above(&self, target: u32) -> Option<TeamId> {
        self.scores
            .iter()
            .enumerate()
            .skip(1)
            .find(|&(_, &score)| score >= target)
            .and_then(|(team, _)| TeamId::try_from(team).ok())
    }

    /// The team with the strictly highest score, if there is one.
    pub fn leader(&self) -> Option<TeamId> {
        let mut best: Option<(usize, u32)> = None;
        let mut tied = false;
        for (team, &score) in self.scores.iter().enumerate().skip(1) {
            match best {
                Some((_, top)) if score == top => tied = true,
                Some((_, top)) if score < top => {},
                _ => {
                    best = Some((team, score));
                    tied = false;
                },
            }
        }
        match best {
            Some((team, score)) if !tied && score > 0 => TeamId::try_from(team).ok(),
            _ => None,
        }
    }
}
