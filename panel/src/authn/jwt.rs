//! HS256 bearer token verification

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::AuthError;

/// Secret used when none is configured
pub const DEV_SECRET: &str = "dev_secret_change_me";

/// Claims carried by panel user tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(default)]
    pub user_id: Option<i64>,

    #[serde(default)]
    pub username: Option<String>,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,
}

impl UserClaims {
    /// Claims valid for `ttl_secs` from now
    pub fn new(user_id: i64, username: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            user_id: Some(user_id),
            username: Some(username.into()),
            exp: Utc::now().timestamp() + ttl_secs,
        }
    }
}

/// Verifies (and for tooling, issues) HS256 tokens
#[derive(Debug)]
pub struct TokenVerifier {
    secret: SecretString,
}

impl TokenVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verify signature and expiry of a raw token
    pub fn verify(&self, token: &str) -> Result<UserClaims, AuthError> {
        let key = DecodingKey::from_secret(self.secret.expose_secret().as_bytes());
        let validation = Validation::new(Algorithm::HS256);

        decode::<UserClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Sign `claims`
    pub fn issue(&self, claims: &UserClaims) -> Result<String, AuthError> {
        let key = EncodingKey::from_secret(self.secret.expose_secret().as_bytes());
        encode(&Header::new(Algorithm::HS256), claims, &key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
