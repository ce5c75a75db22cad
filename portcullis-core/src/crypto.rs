//! Password hashing and verification
//!
//! Passwords are stored as salted Argon2 PHC strings produced by the `password-auth`
//! crate, which also performs the constant-time comparison on verification.
//!
//! Argon2 is deliberately expensive, so both operations run on Tokio's blocking pool
//! rather than on the async worker threads serving other requests.
//!
//! See: <https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html>

use std::sync::LazyLock;

use crate::{Error, error::CryptoError};

/// Hash verified when an identity does not exist, so that unknown identities cost the
/// same as wrong passwords.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| password_auth::generate_hash("portcullis-timing-equalizer"));

/// Hash a password with a fresh random salt.
pub async fn hash_password(password: &str) -> Result<String, Error> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || password_auth::generate_hash(password))
        .await
        .map_err(|e| Error::Crypto(CryptoError::PasswordHash(format!("hashing task failed: {e}"))))
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` for a mismatch or an unparseable hash; `Err` only when the
/// blocking task itself could not complete.
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || password_auth::verify_password(password, &hash).is_ok())
        .await
        .map_err(|e| {
            Error::Crypto(CryptoError::PasswordHash(format!(
                "verification task failed: {e}"
            )))
        })
}

/// Burn the same amount of work as a real verification and discard the result.
pub async fn verify_against_dummy(password: &str) {
    let password = password.to_owned();
    // The first call also initializes the dummy hash, which must stay off the async threads
    let _ = tokio::task::spawn_blocking(move || {
        password_auth::verify_password(password, &DUMMY_HASH).is_ok()
    })
    .await;
}
