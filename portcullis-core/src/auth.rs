//! Authentication decisions
//!
//! A verification attempt always produces an [`AuthOutcome`]. Infrastructure failures are
//! folded into [`RejectReason::InternalError`] so that no error path can be mistaken for
//! an acceptance.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::credential::{Identity, Role};

/// Generic message shared by unknown identities and wrong passwords.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";

/// Message for administrator-blocked accounts.
pub const BLOCKED_MESSAGE: &str = "Account blocked, contact an administrator";

/// Message for infrastructure failures.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";

/// Internal reason code for a rejected attempt.
///
/// `UnknownIdentity` and `BadPassword` are distinguishable here for auditing but share
/// one caller-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnknownIdentity,
    BadPassword,
    Locked,
    Blocked,
    InternalError,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::UnknownIdentity => "unknown_identity",
            RejectReason::BadPassword => "bad_password",
            RejectReason::Locked => "locked",
            RejectReason::Blocked => "blocked",
            RejectReason::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedLogin {
    pub identity: Identity,
    pub role: Role,
}

/// A rejected verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    /// Set only for [`RejectReason::Locked`].
    pub retry_after: Option<DateTime<Utc>>,
}

impl Rejection {
    pub fn new(reason: RejectReason) -> Self {
        Self {
            reason,
            retry_after: None,
        }
    }

    pub fn locked(until: DateTime<Utc>) -> Self {
        Self {
            reason: RejectReason::Locked,
            retry_after: Some(until),
        }
    }

    /// The message shown to the caller.
    pub fn public_message(&self) -> String {
        match self.reason {
            RejectReason::UnknownIdentity | RejectReason::BadPassword => {
                INVALID_CREDENTIALS_MESSAGE.to_string()
            }
            RejectReason::Locked => match self.retry_after {
                Some(until) => format!(
                    "Account locked, retry after {}",
                    until.to_rfc3339_opts(SecondsFormat::Secs, true)
                ),
                None => "Account locked".to_string(),
            },
            RejectReason::Blocked => BLOCKED_MESSAGE.to_string(),
            RejectReason::InternalError => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }

    /// Whole seconds until the lockout expires, if locked.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        self.retry_after
            .map(|until| (until - Utc::now()).num_seconds().max(0))
    }
}

/// The result of `verify_credentials`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted(AcceptedLogin),
    Rejected(Rejection),
}

impl AuthOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, AuthOutcome::Accepted(_))
    }

    pub fn rejection_reason(&self) -> Option<RejectReason> {
        match self {
            AuthOutcome::Accepted(_) => None,
            AuthOutcome::Rejected(rejection) => Some(rejection.reason),
        }
    }
}

impl From<Rejection> for AuthOutcome {
    fn from(rejection: Rejection) -> Self {
        AuthOutcome::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_enumeration_resistant_messages() {
        let unknown = Rejection::new(RejectReason::UnknownIdentity);
        let bad_password = Rejection::new(RejectReason::BadPassword);

        assert_eq!(unknown.public_message(), bad_password.public_message());
        assert_eq!(unknown.public_message(), "Invalid credentials");
        assert_ne!(unknown.reason, bad_password.reason);
    }

    #[test]
    fn test_locked_message_names_the_expiry() {
        let until = Utc.with_ymd_and_hms(2026, 10, 17, 12, 30, 0).unwrap();
        let rejection = Rejection::locked(until);

        assert_eq!(
            rejection.public_message(),
            "Account locked, retry after 2026-10-17T12:30:00Z"
        );
    }

    #[test]
    fn test_blocked_and_internal_messages_are_distinct() {
        let blocked = Rejection::new(RejectReason::Blocked).public_message();
        let internal = Rejection::new(RejectReason::InternalError).public_message();

        assert_ne!(blocked, INVALID_CREDENTIALS_MESSAGE);
        assert_ne!(internal, INVALID_CREDENTIALS_MESSAGE);
        assert_ne!(blocked, internal);
    }

    #[test]
    fn test_retry_after_seconds() {
        let rejection = Rejection::locked(Utc::now() + Duration::minutes(15));
        let seconds = rejection.retry_after_seconds().unwrap();
        assert!(seconds > 890 && seconds <= 900);

        let expired = Rejection::locked(Utc::now() - Duration::minutes(1));
        assert_eq!(expired.retry_after_seconds(), Some(0));

        assert_eq!(
            Rejection::new(RejectReason::BadPassword).retry_after_seconds(),
            None
        );
    }

    #[test]
    fn test_outcome_helpers() {
        let accepted = AuthOutcome::Accepted(AcceptedLogin {
            identity: Identity::normalize("a@x.com"),
            role: Role::User,
        });
        assert!(accepted.is_accepted());
        assert_eq!(accepted.rejection_reason(), None);

        let rejected: AuthOutcome = Rejection::new(RejectReason::Blocked).into();
        assert!(!rejected.is_accepted());
        assert_eq!(rejected.rejection_reason(), Some(RejectReason::Blocked));
    }
}
