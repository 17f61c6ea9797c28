//! Stateless bearer tokens: HS256 JWTs carrying the account identity and
//! role, with a fixed lifetime baked in at issuance.

use axum::http::{HeaderMap, header};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::users::Role;

/// Fixed token lifetime.
pub const TOKEN_TTL_MINUTES: i64 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("missing bearer token")]
    Missing,

    #[error("token has expired")]
    Expired,

    #[error("token signature is invalid")]
    BadSignature,

    #[error("token is malformed")]
    Malformed,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Self-contained claim bundle embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id
    pub sub: i32,

    pub username: String,

    pub role: Role,

    /// Expiry as a unix timestamp
    pub exp: i64,
}

/// Issue a signed token for an authenticated account.
pub fn issue(
    user_id: i32,
    username: &str,
    role: Role,
    signing_key: &str,
) -> Result<String, TokenError> {
    let exp = (Utc::now() + Duration::minutes(TOKEN_TTL_MINUTES)).timestamp();
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        exp,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(signing_key.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Verify signature and expiry, returning the embedded claims.
pub fn verify(token: &str, signing_key: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is exact, no clock leeway.
    validation.leeway = 0;

    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(signing_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        _ => TokenError::Malformed,
    })
}

/// Pull the token out of an `Authorization: Bearer <token>` header. An
/// absent header or one without the prefix is treated the same way.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, TokenError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::Missing)?;

    let token = value.strip_prefix("Bearer ").ok_or(TokenError::Missing)?;

    if token.trim().is_empty() {
        return Err(TokenError::Missing);
    }

    Ok(token.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "test-signing-key";

    #[test]
    fn test_issue_verify_round_trip() {
        let token = issue(7, "alice", Role::User, KEY).unwrap();
        let claims = verify(&token, KEY).unwrap();

        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::User);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims {
            sub: 1,
            username: "alice".to_string(),
            role: Role::User,
            exp: (Utc::now() - Duration::minutes(5)).timestamp(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(KEY.as_bytes()),
        )
        .unwrap();

        assert_eq!(verify(&token, KEY), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = issue(1, "alice", Role::Admin, KEY).unwrap();
        assert_eq!(verify(&token, "other-key"), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(verify("not.a.jwt", KEY), Err(TokenError::Malformed));
        assert_eq!(verify("", KEY), Err(TokenError::Malformed));
    }

    #[test]
    fn test_bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), Err(TokenError::Missing));

        headers.insert(header::AUTHORIZATION, "token-without-prefix".parse().unwrap());
        assert_eq!(bearer_token(&headers), Err(TokenError::Missing));

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), Err(TokenError::Missing));

        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }
}
