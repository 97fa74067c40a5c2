//! Signed bearer tokens for the owner session.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token encode error: {0}")]
    Encode(String),
    #[error("token is invalid or expired")]
    Invalid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mint a session token for the given subject, valid for 24 hours.
pub fn mint(secret: &str, subject: &str) -> Result<String, TokenError> {
    mint_with_ttl(secret, subject, TOKEN_TTL_HOURS)
}

fn mint_with_ttl(secret: &str, subject: &str, ttl_hours: i64) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(ttl_hours)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Encode(e.to_string()))
}

/// Verify a session token and return its claims.
pub fn verify(secret: &str, token: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| TokenError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_and_verify_round_trip() {
        let token = mint("secret", "081234567890").unwrap();
        let claims = verify("secret", &token).unwrap();
        assert_eq!(claims.sub, "081234567890");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = mint("secret", "081234567890").unwrap();
        assert!(matches!(verify("other", &token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let token = mint("secret", "081234567890").unwrap();
        let tampered = format!("{}x", token);
        assert!(matches!(
            verify("secret", &tampered),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Expired an hour ago, well past the default leeway.
        let token = mint_with_ttl("secret", "081234567890", -1).unwrap();
        assert!(matches!(verify("secret", &token), Err(TokenError::Invalid)));
    }
}
