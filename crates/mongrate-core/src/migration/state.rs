use crate::error::RollbackOutcome;

/// Progress of one (unit, database) pair through a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    /// Not yet looked at.
    Pending,
    /// Ledger already has an entry; nothing to do.
    Skipped,
    /// Execute is in flight.
    Running,
    /// Executed and written to the ledger.
    Recorded,
    /// Execute failed; rollback is in flight.
    RollingBack,
    /// Rollback succeeded. Fatal for the run.
    AbortedClean,
    /// Rollback failed too. Fatal for the run.
    AbortedDirty,
}

impl PairState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Skipped => "skipped",
            Self::Running => "running",
            Self::Recorded => "recorded",
            Self::RollingBack => "rolling_back",
            Self::AbortedClean => "aborted_clean",
            Self::AbortedDirty => "aborted_dirty",
        }
    }

    /// No further transitions follow.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Skipped | Self::Recorded | Self::AbortedClean | Self::AbortedDirty
        )
    }

    /// The whole run must stop.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::AbortedClean | Self::AbortedDirty)
    }

    /// Terminal state reached after a rollback attempt.
    pub fn after_rollback(outcome: &RollbackOutcome) -> Self {
        if outcome.is_clean() {
            Self::AbortedClean
        } else {
            Self::AbortedDirty
        }
    }
}

impl std::fmt::Display for PairState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!PairState::Pending.is_terminal());
        assert!(!PairState::Running.is_terminal());
        assert!(!PairState::RollingBack.is_terminal());
        assert!(PairState::Skipped.is_terminal());
        assert!(PairState::Recorded.is_terminal());
        assert!(PairState::AbortedDirty.is_aborted());
        assert!(!PairState::Recorded.is_aborted());
    }

    #[test]
    fn test_after_rollback() {
        assert_eq!(
            PairState::after_rollback(&RollbackOutcome::Clean),
            PairState::AbortedClean
        );
        assert_eq!(
            PairState::after_rollback(&RollbackOutcome::Dirty("x".into())),
            PairState::AbortedDirty
        );
    }
}
