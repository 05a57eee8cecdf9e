//! Access and refresh credential issuance and verification.
//!
//! The access token embeds the user id and role and is trusted for its
//! (short) lifetime; role changes do not retroactively invalidate it.
//! The refresh token embeds the user id only and is additionally
//! persisted on the user record so it can be revoked server-side.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::models::Role;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
    #[error("Token encoding failed: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Unknown role in token: {0}")]
    UnknownRole(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Expiry, seconds since epoch
    pub exp: i64,
    /// Role at issuance time
    pub role: String,
    /// User id
    pub sub: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub exp: i64,
    pub sub: String,
}

/// Issue a short-lived access token embedding user id and role.
pub fn issue_access_token(
    secret: &str,
    user_id: &str,
    role: Role,
    ttl_seconds: u64,
) -> Result<String, TokenError> {
    let claims = AccessClaims {
        exp: (Utc::now() + chrono::Duration::seconds(ttl_seconds as i64)).timestamp(),
        role: role.as_str().to_string(),
        sub: user_id.to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(TokenError::Encoding)
}

/// Issue a long-lived refresh token embedding the user id only.
pub fn issue_refresh_token(
    secret: &str,
    user_id: &str,
    ttl_seconds: u64,
) -> Result<String, TokenError> {
    let claims = RefreshClaims {
        exp: (Utc::now() + chrono::Duration::seconds(ttl_seconds as i64)).timestamp(),
        sub: user_id.to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(TokenError::Encoding)
}

// Expiry is exact; the default 60s leeway would keep expired access
// tokens alive past their configured lifetime.
fn strict_validation() -> Validation {
    let mut validation = Validation::default();
    validation.leeway = 0;
    validation
}

/// Verify an access token, returning the user id and role it embeds.
pub fn verify_access_token(secret: &str, token: &str) -> Result<(String, Role), TokenError> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &strict_validation(),
    )
    .map_err(map_jwt_error)?;

    let role = Role::parse(&data.claims.role)
        .ok_or_else(|| TokenError::UnknownRole(data.claims.role.clone()))?;
    Ok((data.claims.sub, role))
}

/// Verify a refresh token, returning the user id it embeds.
pub fn verify_refresh_token(secret: &str, token: &str) -> Result<String, TokenError> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &strict_validation(),
    )
    .map_err(map_jwt_error)?;
    Ok(data.claims.sub)
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn access_token_round_trip() {
        let token = issue_access_token(SECRET, "u1", Role::Mod, 120).unwrap();
        let (user_id, role) = verify_access_token(SECRET, &token).unwrap();
        assert_eq!(user_id, "u1");
        assert_eq!(role, Role::Mod);
    }

    #[test]
    fn refresh_token_round_trip() {
        let token = issue_refresh_token(SECRET, "u2", 3600).unwrap();
        let user_id = verify_refresh_token(SECRET, &token).unwrap();
        assert_eq!(user_id, "u2");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issue_access_token(SECRET, "u1", Role::User, 120).unwrap();
        assert!(verify_access_token("other-secret", &token).is_err());
    }

    #[test]
    fn expired_access_token_rejected() {
        let token = issue_access_token(SECRET, "u1", Role::User, 0).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(matches!(
            verify_access_token(SECRET, &token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        // A refresh token lacks the role claim and must not verify as access.
        let token = issue_refresh_token(SECRET, "u1", 3600).unwrap();
        assert!(verify_access_token(SECRET, &token).is_err());
    }
}
