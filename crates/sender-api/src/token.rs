use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use sender_types::api::Claims;

/// Lifetime of an access token.
pub const TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid token")]
pub struct InvalidToken;

/// HS256 signing and verification keys derived from the shared secret.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // An elapsed expiry is final.
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, user_id: Uuid, epoch: i64) -> anyhow::Result<String> {
        self.issue_at(user_id, epoch, Utc::now())
    }

    pub fn issue_at(&self, user_id: Uuid, epoch: i64, now: DateTime<Utc>) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id,
            epoch,
            iat: now.timestamp() as usize,
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?;
        Ok(token)
    }

    /// Check signature, algorithm and expiry. Any failure collapses to `InvalidToken`.
    pub fn verify(&self, token: &str) -> Result<Claims, InvalidToken> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = ?e.kind(), "token rejected");
                InvalidToken
            })
    }
}
