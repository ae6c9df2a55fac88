//! Utilities handed to every migration body.
//!
//! Units receive an [`ExecutionContext`] by reference instead of reaching for
//! globals, so a test can run a unit against a frozen clock.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::{MigrateError, Result};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that never advances.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Shared capabilities available to migration bodies.
#[derive(Clone)]
pub struct ExecutionContext {
    clock: Arc<dyn Clock>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Create a context backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create a context backed by the given clock.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
        }
    }

    /// A fresh time-ordered identifier: UUIDv7 as 32 lowercase hex characters.
    pub fn uuid(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }

    /// Current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current time as RFC 3339 with millisecond precision, e.g. `2024-05-01T10:00:00.000Z`.
    pub fn now_iso(&self) -> String {
        self.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
    pub fn parse_time(&self, value: &str) -> Result<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
            return Ok(ts.with_timezone(&Utc));
        }

        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(|| MigrateError::Command(format!("invalid timestamp: {}", value)))
    }

    /// Hash a password into an Argon2 PHC string.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| MigrateError::Internal(format!("Failed to hash password: {}", e)))
    }

    /// Check a password against a PHC string produced by [`Self::hash_password`].
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| MigrateError::Internal(format!("Invalid password hash: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frozen() -> ExecutionContext {
        ExecutionContext::with_clock(FixedClock(
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_uuid_is_hyphenless_and_unique() {
        let ctx = ExecutionContext::new();
        let a = ctx.uuid();
        let b = ctx.uuid();
        assert_eq!(a.len(), 32);
        assert!(!a.contains('-'));
        assert_ne!(a, b);
    }

    #[test]
    fn test_fixed_clock() {
        let ctx = frozen();
        assert_eq!(ctx.now_iso(), "2024-05-01T10:00:00.000Z");
        assert_eq!(ctx.now(), ctx.now());
    }

    #[test]
    fn test_parse_time() {
        let ctx = frozen();
        assert_eq!(ctx.parse_time("2024-05-01T10:00:00Z").unwrap(), ctx.now());
        assert_eq!(
            ctx.parse_time("2024-05-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
        assert!(ctx.parse_time("yesterday").is_err());
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let ctx = ExecutionContext::new();
        let hash = ctx.hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(ctx.verify_password("s3cret", &hash).unwrap());
        assert!(!ctx.verify_password("wrong", &hash).unwrap());
    }
}
