//! Credential records and the per-identity account state
//!
//! A credential record is the persisted state backing one identity's authentication status:
//!
//! | Field                | Type               | Description                                              |
//! | -------------------- | ------------------ | -------------------------------------------------------- |
//! | `identity`           | `Identity`         | Normalized (trimmed, lower-cased) email, the lookup key. |
//! | `password_hash`      | `String`           | Salted Argon2 PHC string. Never serialized.              |
//! | `failed_login_count` | `u32`              | Consecutive failed attempts in the current window.       |
//! | `locked_until`       | `Option<DateTime>` | Temporary lockout expiry.                                |
//! | `is_blocked`         | `bool`             | Administrator-imposed block, never cleared by time.      |
//! | `blocked_reason`     | `Option<String>`   | Audit reason recorded with the block.                    |
//! | `blocked_at`         | `Option<DateTime>` | When the current block was first applied.                |
//! | `role`               | `Role`             | `user`, `admin` or `superadmin`.                         |
//! | `created_at`         | `DateTime`         | When the record was provisioned.                         |
//! | `updated_at`         | `DateTime`         | When the record was last written.                        |
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, validation::validate_email};

/// The unique login key for an account.
///
/// Identities compare case-insensitively; the stored form is always trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Normalize a raw identity for lookups without validating its format.
    ///
    /// Lookups must accept anything a caller types so that malformed input is
    /// indistinguishable from an unknown account.
    pub fn normalize(raw: &str) -> Self {
        Identity(raw.trim().to_lowercase())
    }

    /// Normalize and validate an identity for provisioning.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let identity = Self::normalize(raw);
        validate_email(&identity.0)?;
        Ok(identity)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authorization role attached to an account. The guard returns it but never decides on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Whether the role may perform administrative account actions.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

/// The persisted credential state for one identity.
#[derive(Clone, Serialize)]
pub struct CredentialRecord {
    pub identity: Identity,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub failed_login_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub is_blocked: bool,
    pub blocked_reason: Option<String>,
    pub blocked_at: Option<DateTime<Utc>>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Whether the temporary lockout is in force at `now`.
    ///
    /// An expired `locked_until` is treated as unlocked without requiring a write.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// The state machine view of this record at `now`. A block takes precedence over a lock.
    pub fn state_at(&self, now: DateTime<Utc>) -> AccountState {
        if self.is_blocked {
            return AccountState::Blocked {
                reason: self.blocked_reason.clone(),
                since: self.blocked_at,
            };
        }

        match self.locked_until {
            Some(until) if until > now => AccountState::Locked { until },
            _ => AccountState::Active,
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("identity", &self.identity)
            .field("password_hash", &"[redacted]")
            .field("failed_login_count", &self.failed_login_count)
            .field("locked_until", &self.locked_until)
            .field("is_blocked", &self.is_blocked)
            .field("blocked_reason", &self.blocked_reason)
            .field("blocked_at", &self.blocked_at)
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// A credential to insert at provisioning time. The hash must already be computed.
#[derive(Clone)]
pub struct NewCredential {
    pub identity: Identity,
    pub password_hash: String,
    pub role: Role,
}

/// Result of atomically recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    /// The counter after the update. Zero when this attempt tripped the lockout.
    pub failed_login_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
    /// Set only when this write applied the lock. A lock that was already active
    /// when the write ran leaves it false.
    pub newly_locked: bool,
}

/// Parameters for recording a failed attempt in a single conditional write.
#[derive(Debug, Clone, Copy)]
pub struct FailedAttempt {
    /// Counter value at which the account becomes locked.
    pub threshold: u32,
    pub attempted_at: DateTime<Utc>,
    /// Lock expiry to apply if this attempt reaches the threshold.
    pub lock_until: DateTime<Utc>,
}

/// Per-identity authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AccountState {
    Active,
    Locked {
        until: DateTime<Utc>,
    },
    Blocked {
        reason: Option<String>,
        since: Option<DateTime<Utc>>,
    },
}

/// Read-only status report for operators.
#[derive(Debug, Clone, Serialize)]
pub struct AccountStatus {
    pub identity: Identity,
    pub role: Role,
    pub failed_login_count: u32,
    #[serde(flatten)]
    pub state: AccountState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord {
            identity: Identity::normalize("a@x.com"),
            password_hash: "$argon2id$not-a-real-hash".to_string(),
            failed_login_count: 0,
            locked_until: None,
            is_blocked: false,
            blocked_reason: None,
            blocked_at: None,
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_identity_normalization() {
        let identity = Identity::normalize("  A@X.Com ");
        assert_eq!(identity.as_str(), "a@x.com");
        assert_eq!(identity, Identity::normalize("a@x.com"));
        assert!(Identity::normalize("   ").is_empty());
    }

    #[test]
    fn test_identity_parse_validates() {
        assert_eq!(Identity::parse("Admin@CTF.example").unwrap().as_str(), "admin@ctf.example");
        assert!(Identity::parse("not an email").is_err());
        assert!(Identity::parse("").is_err());
    }

    #[test]
    fn test_role_round_trip_strings() {
        assert_eq!("superadmin".parse::<Role>().unwrap(), Role::Superadmin);
        assert_eq!(" Admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::User);
        assert!(Role::Admin.is_admin());
        assert!(Role::Superadmin.is_admin());
        assert!(!Role::User.is_admin());
        assert_eq!(serde_json::to_string(&Role::Superadmin).unwrap(), "\"superadmin\"");
    }

    #[test]
    fn test_lock_is_time_bounded() {
        let now = Utc::now();
        let mut record = record();

        record.locked_until = Some(now + Duration::minutes(15));
        assert!(record.is_locked_at(now));
        assert_eq!(
            record.state_at(now),
            AccountState::Locked {
                until: now + Duration::minutes(15)
            }
        );

        // Lock expiry is inclusive: at `until` the account is active again
        assert!(!record.is_locked_at(now + Duration::minutes(15)));
        assert_eq!(
            record.state_at(now + Duration::minutes(16)),
            AccountState::Active
        );
    }

    #[test]
    fn test_block_overrides_lock() {
        let now = Utc::now();
        let mut record = record();
        record.locked_until = Some(now + Duration::minutes(5));
        record.is_blocked = true;
        record.blocked_reason = Some("flag sharing".to_string());

        assert!(matches!(
            record.state_at(now),
            AccountState::Blocked { reason: Some(_), .. }
        ));
    }

    #[test]
    fn test_password_hash_never_leaks() {
        let record = record();
        let debug = format!("{record:?}");
        assert!(!debug.contains("argon2"));
        assert!(debug.contains("[redacted]"));

        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("password_hash"));
    }
}
