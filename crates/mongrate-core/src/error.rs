use std::fmt;

use thiserror::Error;

/// Process exit status for a failed migration (rollback attempted).
pub const EXIT_MIGRATION_FAILED: u8 = 1;

/// Process exit status when the data store never became reachable.
///
/// This is `-1` truncated to an unsigned status byte.
pub const EXIT_CONNECTIVITY_FAILED: u8 = 255;

/// Core error type for MONGRATE operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data store unreachable after {attempts} attempt(s): {message}")]
    Connectivity { attempts: u32, message: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Migration {unit} failed for database {database}: {message} ({rollback})")]
    Execution {
        unit: String,
        database: String,
        message: String,
        rollback: RollbackOutcome,
    },

    #[error("Rollback error: {0}")]
    Rollback(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MigrateError {
    /// Process exit status this error terminates the run with.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Connectivity { .. } => EXIT_CONNECTIVITY_FAILED,
            _ => EXIT_MIGRATION_FAILED,
        }
    }
}

impl From<serde_json::Error> for MigrateError {
    fn from(e: serde_json::Error) -> Self {
        MigrateError::Serialization(e.to_string())
    }
}

/// Result of the compensating rollback after a failed execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// Rollback completed.
    Clean,
    /// Rollback itself failed; the message is the rollback error.
    Dirty(String),
}

impl RollbackOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "rolled back"),
            Self::Dirty(e) => write!(f, "rollback failed: {}", e),
        }
    }
}

/// Result type alias using MigrateError.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = MigrateError::Connectivity {
            attempts: 5,
            message: "connection refused".into(),
        };
        assert_eq!(err.exit_code(), EXIT_CONNECTIVITY_FAILED);

        let err = MigrateError::Execution {
            unit: "/migrations/001.json".into(),
            database: "billing".into(),
            message: "boom".into(),
            rollback: RollbackOutcome::Dirty("still boom".into()),
        };
        assert_eq!(err.exit_code(), EXIT_MIGRATION_FAILED);

        assert_eq!(
            MigrateError::Config("missing".into()).exit_code(),
            EXIT_MIGRATION_FAILED
        );
    }

    #[test]
    fn test_execution_message_mentions_rollback() {
        let err = MigrateError::Execution {
            unit: "a.json".into(),
            database: "shop".into(),
            message: "duplicate key".into(),
            rollback: RollbackOutcome::Clean,
        };
        let msg = err.to_string();
        assert!(msg.contains("a.json"));
        assert!(msg.contains("shop"));
        assert!(msg.contains("rolled back"));
    }
}
