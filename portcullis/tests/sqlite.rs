//! End-to-end login scenarios against SQLite storage

#![cfg(feature = "sqlite")]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use portcullis::{
    AccountState, AuthError, Error, EventError, EventHandler, GuardEvent, JwtConfig,
    LoginOutcome, Portcullis, PortcullisBuilder, RejectReason, Role, SqliteRepositoryProvider,
};
use sqlx::SqlitePool;

const TEST_HS256_SECRET: &[u8] = b"this_is_a_test_secret_key_for_hs256_jwt_tokens_not_for_prod";
const PASSWORD: &str = "correct-horse-battery";
const WRONG: &str = "definitely-wrong";

async fn setup() -> (Portcullis<SqliteRepositoryProvider>, SqlitePool) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to SQLite");

    let portcullis = PortcullisBuilder::new()
        .with_sqlite_pool(pool.clone())
        .with_jwt(JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec()))
        .apply_migrations(true)
        .build()
        .await
        .expect("Failed to build Portcullis");

    portcullis
        .provision_account("player@ctf.example", PASSWORD, Role::User)
        .await
        .expect("Failed to provision account");

    (portcullis, pool)
}

#[derive(Default)]
struct LockCounter {
    count: AtomicUsize,
}

#[async_trait]
impl EventHandler for LockCounter {
    async fn handle_event(&self, event: &GuardEvent) -> Result<(), EventError> {
        if matches!(event, GuardEvent::AccountLocked { .. }) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn denied_reason(outcome: &LoginOutcome) -> Option<RejectReason> {
    match outcome {
        LoginOutcome::Granted { .. } => None,
        LoginOutcome::Denied(rejection) => Some(rejection.reason),
    }
}

async fn expire_lock(pool: &SqlitePool, identity: &str) {
    sqlx::query("UPDATE credentials SET locked_until = ? WHERE identity = ?")
        .bind(Utc::now().timestamp() - 1)
        .bind(identity)
        .execute(pool)
        .await
        .expect("Failed to rewind lock");
}

#[tokio::test]
async fn test_login_issues_verifiable_token() {
    let (portcullis, _pool) = setup().await;

    let outcome = portcullis.login("Player@CTF.example", PASSWORD).await;
    let LoginOutcome::Granted {
        identity,
        role,
        token,
    } = outcome
    else {
        panic!("expected login to be granted, got {outcome:?}");
    };

    assert_eq!(identity.as_str(), "player@ctf.example");
    assert_eq!(role, Role::User);

    let claims = portcullis.verify_token(&token.token).unwrap();
    assert_eq!(claims.sub, "player@ctf.example");
    assert_eq!(claims.role, Role::User);
}

#[tokio::test]
async fn test_four_failures_then_success() {
    let (portcullis, _pool) = setup().await;

    for _ in 0..4 {
        let outcome = portcullis.login("player@ctf.example", WRONG).await;
        assert_eq!(denied_reason(&outcome), Some(RejectReason::BadPassword));
    }

    let outcome = portcullis.login("player@ctf.example", PASSWORD).await;
    assert!(matches!(outcome, LoginOutcome::Granted { .. }));

    let status = portcullis.account_status("player@ctf.example").await.unwrap();
    assert_eq!(status.failed_login_count, 0);
    assert_eq!(status.state, AccountState::Active);
}

#[tokio::test]
async fn test_lockout_and_expiry() {
    let (portcullis, pool) = setup().await;

    for _ in 0..4 {
        portcullis.login("player@ctf.example", WRONG).await;
    }

    let LoginOutcome::Denied(rejection) = portcullis.login("player@ctf.example", WRONG).await
    else {
        panic!("fifth failure must be denied");
    };
    assert_eq!(rejection.reason, RejectReason::Locked);
    assert!(rejection.retry_after.unwrap() > Utc::now());
    assert!(rejection.public_message().starts_with("Account locked, retry after "));

    let outcome = portcullis.login("player@ctf.example", PASSWORD).await;
    assert_eq!(denied_reason(&outcome), Some(RejectReason::Locked));

    expire_lock(&pool, "player@ctf.example").await;

    let outcome = portcullis.login("player@ctf.example", PASSWORD).await;
    assert!(matches!(outcome, LoginOutcome::Granted { .. }));

    let status = portcullis.account_status("player@ctf.example").await.unwrap();
    assert_eq!(status.state, AccountState::Active);
    assert_eq!(status.failed_login_count, 0);
}

#[tokio::test]
async fn test_block_then_unblock() {
    let (portcullis, _pool) = setup().await;

    portcullis
        .admin_set_blocked("player@ctf.example", true, Some("flag sharing"))
        .await
        .unwrap();
    portcullis
        .admin_set_blocked("player@ctf.example", true, Some("flag sharing"))
        .await
        .unwrap();

    let outcome = portcullis.login("player@ctf.example", PASSWORD).await;
    assert_eq!(denied_reason(&outcome), Some(RejectReason::Blocked));

    let status = portcullis.account_status("player@ctf.example").await.unwrap();
    assert!(matches!(status.state, AccountState::Blocked { .. }));
    assert_eq!(status.failed_login_count, 0);

    portcullis
        .admin_set_blocked("player@ctf.example", false, None)
        .await
        .unwrap();

    let outcome = portcullis.login("player@ctf.example", PASSWORD).await;
    assert!(matches!(outcome, LoginOutcome::Granted { .. }));
}

#[tokio::test]
async fn test_unknown_identity_is_indistinguishable() {
    let (portcullis, _pool) = setup().await;

    let LoginOutcome::Denied(unknown) = portcullis.login("ghost@ctf.example", WRONG).await else {
        panic!("unknown identity must be denied");
    };
    let LoginOutcome::Denied(bad) = portcullis.login("player@ctf.example", WRONG).await else {
        panic!("wrong password must be denied");
    };

    assert_eq!(unknown.reason, RejectReason::UnknownIdentity);
    assert_eq!(bad.reason, RejectReason::BadPassword);
    assert_eq!(unknown.public_message(), bad.public_message());
}

#[tokio::test]
async fn test_reset_password_unlocks() {
    let (portcullis, _pool) = setup().await;
    for _ in 0..5 {
        portcullis.login("player@ctf.example", WRONG).await;
    }

    portcullis
        .reset_password("player@ctf.example", "a-brand-new-password")
        .await
        .unwrap();

    let outcome = portcullis
        .login("player@ctf.example", "a-brand-new-password")
        .await;
    assert!(matches!(outcome, LoginOutcome::Granted { .. }));
}

#[tokio::test]
async fn test_admin_operations_on_unknown_identity() {
    let (portcullis, _pool) = setup().await;

    let err = portcullis
        .admin_set_blocked("ghost@ctf.example", true, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::AccountNotFound)));

    let err = portcullis
        .provision_account("player@ctf.example", PASSWORD, Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::AccountAlreadyExists)));
}

#[tokio::test]
async fn test_concurrent_failures_lock_exactly_once() {
    let (portcullis, _pool) = setup().await;
    let locks = Arc::new(LockCounter::default());
    portcullis.event_bus().register(locks.clone()).await;
    let portcullis = Arc::new(portcullis);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let portcullis = portcullis.clone();
            tokio::spawn(async move { portcullis.login("player@ctf.example", WRONG).await })
        })
        .collect();

    let mut locked = 0;
    for handle in handles {
        if denied_reason(&handle.await.unwrap()) == Some(RejectReason::Locked) {
            locked += 1;
        }
    }

    // Five failures reach the threshold; every later attempt sees the lock
    assert_eq!(locked, 4);
    assert_eq!(locks.count.load(Ordering::SeqCst), 1);

    let status = portcullis.account_status("player@ctf.example").await.unwrap();
    assert!(matches!(status.state, AccountState::Locked { .. }));
}
