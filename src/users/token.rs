use crate::types::ApiError;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use sha2::Sha256;

/// Claims carried by every issued token: the user id and an expiry in
/// seconds since the epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub id: i32,
    pub exp: i64,
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|_| ApiError::Internal)
}

pub fn issue(user_id: i32, secret: &str, ttl: Duration) -> Result<String, ApiError> {
    let claims = Claims {
        id: user_id,
        exp: (Utc::now() + ttl).timestamp(),
    };
    let token = claims.sign_with_key(&signing_key(secret)?)?;
    Ok(token)
}

/// Checks the signature and the expiry. Any failure is reported as
/// `Unauthorized`.
pub fn decode(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let claims: Claims = token
        .verify_with_key(&signing_key(secret)?)
        .map_err(|_| ApiError::Unauthorized)?;
    if claims.exp <= Utc::now().timestamp() {
        return Err(ApiError::Unauthorized);
    }
    Ok(claims)
}

/// Strips the `Token ` (or `Bearer `) scheme from an `Authorization` header.
pub fn from_header(header: &str) -> Option<&str> {
    let header = header.trim();
    header
        .strip_prefix("Token ")
        .or_else(|| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
