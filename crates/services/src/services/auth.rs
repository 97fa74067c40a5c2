//! Owner login against the single configured credential pair.

use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils::token::{self, Claims, TokenError};

static MOBILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{8,15}$").expect("mobile regex must compile"));

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("mobile number must be 8-15 digits with an optional leading +")]
    MalformedMobile,
    #[error("mobile number or password is incorrect")]
    InvalidCredentials,
    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginRequest {
    pub mobile: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginResponse {
    pub token: String,
}

/// There is exactly one owner account, configured at boot.
pub struct AuthService {
    owner_mobile: String,
    owner_password: SecretString,
    token_secret: SecretString,
}

impl AuthService {
    pub fn new(
        owner_mobile: String,
        owner_password: SecretString,
        token_secret: SecretString,
    ) -> Self {
        Self {
            owner_mobile,
            owner_password,
            token_secret,
        }
    }

    /// Exchange the owner credential pair for a bearer token.
    pub fn login(&self, mobile: &str, password: &str) -> Result<String, AuthError> {
        if !MOBILE_RE.is_match(mobile) {
            return Err(AuthError::MalformedMobile);
        }
        if mobile != self.owner_mobile || password != self.owner_password.expose_secret() {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(token::mint(self.token_secret.expose_secret(), mobile)?)
    }

    /// Validate a bearer token presented on a protected route.
    pub fn verify(&self, bearer: &str) -> Result<Claims, AuthError> {
        Ok(token::verify(self.token_secret.expose_secret(), bearer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(
            "081234567890".to_string(),
            SecretString::from("hunter2".to_string()),
            SecretString::from("test-secret".to_string()),
        )
    }

    #[test]
    fn test_login_round_trip() {
        let auth = service();
        let token = auth.login("081234567890", "hunter2").unwrap();
        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.sub, "081234567890");
    }

    #[test]
    fn test_wrong_credentials_rejected() {
        let auth = service();
        assert!(matches!(
            auth.login("081234567890", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("089999999999", "hunter2"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_malformed_mobile_rejected() {
        let auth = service();
        for mobile in ["123", "12345678901234567", "08-1234-5678", "not a number", ""] {
            assert!(
                matches!(auth.login(mobile, "hunter2"), Err(AuthError::MalformedMobile)),
                "expected {:?} to be malformed",
                mobile
            );
        }
    }

    #[test]
    fn test_international_prefix_accepted() {
        let auth = AuthService::new(
            "+6281234567890".to_string(),
            SecretString::from("hunter2".to_string()),
            SecretString::from("test-secret".to_string()),
        );
        assert!(auth.login("+6281234567890", "hunter2").is_ok());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let auth = service();
        assert!(matches!(
            auth.verify("not-a-token"),
            Err(AuthError::Token(TokenError::Invalid))
        ));
    }
}
