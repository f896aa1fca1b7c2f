use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::SessionTokens;
use crate::constants::KDF_CONTEXT_SESSION_KEY;
use crate::error::AuthError;
use crate::types::UserId;

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Stateless HS256 session tokens.
///
/// The HMAC key is derived from the configured secret with BLAKE3, so rotating
/// the secret invalidates every outstanding token.
pub struct SessionSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionSigner {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let key = blake3::derive_key(KDF_CONTEXT_SESSION_KEY, secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            validation,
            ttl,
        }
    }

    fn issue_with_expiry(&self, user_id: UserId, exp: i64) -> Result<String, AuthError> {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat: Utc::now().timestamp(),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }
}

impl SessionTokens for SessionSigner {
    fn issue(&self, user_id: UserId) -> Result<String, AuthError> {
        let exp = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Signing("session expiry out of range".into()))?;
        self.issue_with_expiry(user_id, exp.timestamp())
    }

    fn resolve(&self, token: &str) -> Result<UserId, AuthError> {
        let data = decode::<SessionClaims>(token.trim(), &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })?;

        let id = Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(UserId(id))
    }
}
