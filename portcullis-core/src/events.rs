use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    auth::RejectReason,
    credential::{Identity, Role},
    error::EventError,
};

/// Reason why an account lock was cleared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnlockReason {
    /// Account was unlocked via an administrator password reset
    PasswordReset,
    /// Lockout period expired and the next verification cleared it
    LockoutExpired,
}

/// Audit events emitted by the account guard
///
/// Events carry internal reason codes, including the distinction between unknown
/// identities and wrong passwords that is hidden from callers.
#[derive(Debug, Clone)]
pub enum GuardEvent {
    AccountProvisioned {
        identity: Identity,
        role: Role,
        timestamp: DateTime<Utc>,
    },

    LoginSucceeded {
        identity: Identity,
        timestamp: DateTime<Utc>,
    },

    /// Emitted for every rejected verification.
    LoginFailed {
        identity: Identity,
        reason: RejectReason,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an account becomes locked due to too many failed attempts.
    ///
    /// This is a security-critical event that should trigger alerts.
    AccountLocked {
        identity: Identity,
        /// Number of failed attempts that triggered the lockout
        failed_attempts: u32,
        locked_until: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    AccountUnlocked {
        identity: Identity,
        reason: UnlockReason,
        timestamp: DateTime<Utc>,
    },

    AccountBlocked {
        identity: Identity,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    AccountUnblocked {
        identity: Identity,
        timestamp: DateTime<Utc>,
    },

    PasswordReset {
        identity: Identity,
        timestamp: DateTime<Utc>,
    },
}

impl GuardEvent {
    pub fn identity(&self) -> &Identity {
        match self {
            GuardEvent::AccountProvisioned { identity, .. }
            | GuardEvent::LoginSucceeded { identity, .. }
            | GuardEvent::LoginFailed { identity, .. }
            | GuardEvent::AccountLocked { identity, .. }
            | GuardEvent::AccountUnlocked { identity, .. }
            | GuardEvent::AccountBlocked { identity, .. }
            | GuardEvent::AccountUnblocked { identity, .. }
            | GuardEvent::PasswordReset { identity, .. } => identity,
        }
    }
}

/// A trait for handling events emitted by the event bus
///
/// # Examples
///
/// ```
/// # use portcullis_core::events::{GuardEvent, EventHandler};
/// # use portcullis_core::error::EventError;
/// # use async_trait::async_trait;
/// struct AuditLog;
///
/// #[async_trait]
/// impl EventHandler for AuditLog {
///     async fn handle_event(&self, event: &GuardEvent) -> Result<(), EventError> {
///         println!("{}", event.identity());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &GuardEvent) -> Result<(), EventError>;
}

/// Event bus that fans events out to every registered handler
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an event handler with the event bus
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers, stopping at the first failure
    pub async fn emit(&self, event: &GuardEvent) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        call_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: &GuardEvent) -> Result<(), EventError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringEventHandler;

    #[async_trait]
    impl EventHandler for ErroringEventHandler {
        async fn handle_event(&self, _event: &GuardEvent) -> Result<(), EventError> {
            Err(EventError::HandlerError("audit sink unavailable".into()))
        }
    }

    fn login_failed() -> GuardEvent {
        GuardEvent::LoginFailed {
            identity: Identity::normalize("a@x.com"),
            reason: RejectReason::BadPassword,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        let event_bus = EventBus::default();
        event_bus
            .emit(&login_failed())
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let event_bus = EventBus::default();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        event_bus
            .register(Arc::new(CountingHandler {
                call_count: count1.clone(),
            }))
            .await;
        event_bus
            .register(Arc::new(CountingHandler {
                call_count: count2.clone(),
            }))
            .await;

        event_bus.emit(&login_failed()).await.unwrap();

        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_bus_error_propagation() {
        let event_bus = EventBus::default();
        event_bus.register(Arc::new(ErroringEventHandler)).await;

        let result = event_bus.emit(&login_failed()).await;
        assert!(matches!(result, Err(EventError::HandlerError(_))));
    }

    #[test]
    fn test_event_identity() {
        let event = GuardEvent::AccountBlocked {
            identity: Identity::normalize("B@X.com"),
            reason: None,
            timestamp: Utc::now(),
        };
        assert_eq!(event.identity().as_str(), "b@x.com");
    }
}
