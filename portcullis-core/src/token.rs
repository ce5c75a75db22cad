//! Access tokens issued after a successful login
//!
//! The guard only decides; signing is delegated to a [`TokenIssuer`]. The bundled
//! [`JwtTokenIssuer`] produces stateless HS256 JSON Web Tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    credential::{Identity, Role},
    error::CryptoError,
};

/// Default token lifetime in hours.
pub const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 24;

/// Signing configuration for [`JwtTokenIssuer`].
#[derive(Clone)]
pub struct JwtConfig {
    secret_key: Vec<u8>,
    /// Issuer claim
    pub issuer: Option<String>,
    /// How long an issued token stays valid
    pub lifetime: Duration,
}

impl JwtConfig {
    /// Create a new JWT configuration with HS256 algorithm
    pub fn new_hs256(secret_key: Vec<u8>) -> Self {
        Self {
            secret_key,
            issuer: None,
            lifetime: Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS),
        }
    }

    /// Set the issuer claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret_key)
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret_key)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret_key", &"[redacted]")
            .field("issuer", &self.issuer)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (the normalized identity)
    pub sub: String,
    pub role: Role,
    /// Issued at time (as UTC timestamp)
    pub iat: i64,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl TokenClaims {
    pub fn identity(&self) -> Identity {
        Identity::normalize(&self.sub)
    }
}

/// A signed token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies access tokens for accepted logins.
pub trait TokenIssuer: Send + Sync + 'static {
    fn issue(&self, identity: &Identity, role: Role) -> Result<IssuedToken, Error>;

    fn verify(&self, token: &str) -> Result<TokenClaims, Error>;
}

pub struct JwtTokenIssuer {
    config: JwtConfig,
}

impl JwtTokenIssuer {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, identity: &Identity, role: Role) -> Result<IssuedToken, Error> {
        let now = Utc::now();
        let expires_at = now + self.config.lifetime;

        let claims = TokenClaims {
            sub: identity.as_str().to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.config.encoding_key(),
        )
        .map_err(|e| CryptoError::JwtSigning(format!("Failed to encode JWT: {e}")))?;

        Ok(IssuedToken { token, expires_at })
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, Error> {
        let token_data = decode::<TokenClaims>(
            token,
            &self.config.decoding_key(),
            &self.config.validation(),
        )
        .map_err(|e| CryptoError::JwtVerification(format!("JWT validation failed: {e}")))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_HS256_SECRET: &[u8] = b"test_secret_key_for_hs256_jwt_tokens_not_for_production_use";

    fn issuer() -> JwtTokenIssuer {
        JwtTokenIssuer::new(JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec()))
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let identity = Identity::normalize("admin@ctf.example");

        let issued = issuer.issue(&identity, Role::Admin).unwrap();
        let claims = issuer.verify(&issued.token).unwrap();

        assert_eq!(claims.identity(), identity);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
        assert_eq!(claims.iss, None);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issued = issuer()
            .issue(&Identity::normalize("a@x.com"), Role::User)
            .unwrap();

        let other = JwtTokenIssuer::new(JwtConfig::new_hs256(b"another-secret".to_vec()));
        let err = other.verify(&issued.token).unwrap_err();
        assert!(matches!(err, Error::Crypto(CryptoError::JwtVerification(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec())
            .with_lifetime(Duration::seconds(-120));
        let issuer = JwtTokenIssuer::new(config);

        let issued = issuer
            .issue(&Identity::normalize("a@x.com"), Role::User)
            .unwrap();
        assert!(issuer.verify(&issued.token).is_err());
    }

    #[test]
    fn test_issuer_claim_is_checked() {
        let signer = JwtTokenIssuer::new(
            JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec()).with_issuer("portcullis"),
        );
        let issued = signer
            .issue(&Identity::normalize("a@x.com"), Role::User)
            .unwrap();
        assert_eq!(
            signer.verify(&issued.token).unwrap().iss.as_deref(),
            Some("portcullis")
        );

        let other_issuer = JwtTokenIssuer::new(
            JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec()).with_issuer("someone-else"),
        );
        assert!(other_issuer.verify(&issued.token).is_err());
    }

    #[test]
    fn test_garbage_token() {
        assert!(issuer().verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec()));
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("test_secret"));
    }
}
