//! Token Types
//!
//! The token set shared by every protected API of a session.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

#[cfg(feature = "jwt")]
use crate::error::TokenError;

/// Authentication token plus its expiry, replaced as one unit.
///
/// Deserializes from the `{ "jwtToken": ..., "jwtTokenExpiry": ... }` shape
/// returned by login and refresh endpoints.
#[derive(Clone, Deserialize)]
pub struct TokenSet {
    #[serde(rename = "jwtToken")]
    token: SecretString,
    #[serde(rename = "jwtTokenExpiry")]
    expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Create new token set.
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: SecretString::new(token.into()),
            expires_at,
        }
    }

    /// Build a token set from a raw JWT, taking the expiry from its `exp` claim.
    ///
    /// The signature is not verified: the token is only inspected, never trusted.
    #[cfg(feature = "jwt")]
    pub fn from_jwt(token: impl Into<String>) -> Result<Self, TokenError> {
        use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};

        #[derive(Deserialize)]
        struct ExpiryClaim {
            exp: Option<i64>,
        }

        let token = token.into();
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<ExpiryClaim>(&token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::MissingRequiredClaim(_) => TokenError::MissingExpiry,
                _ => TokenError::InvalidToken {
                    message: e.to_string(),
                },
            })?;

        let exp = data.claims.exp.ok_or(TokenError::MissingExpiry)?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(exp, 0).ok_or_else(|| TokenError::InvalidToken {
                message: format!("exp claim out of range: {}", exp),
            })?;

        Ok(Self::new(token, expires_at))
    }

    /// Get token value.
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// Get expiration time.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if token is expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Check if the remaining lifetime at `now` is shorter than `window`.
    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        match self.remaining_lifetime(now) {
            Some(remaining) => remaining < window,
            None => true,
        }
    }

    /// Get remaining lifetime, or `None` once expired.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now).to_std().ok()
    }

    /// Format as Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl PartialEq for TokenSet {
    fn eq(&self, other: &Self) -> bool {
        self.token.expose_secret() == other.token.expose_secret()
            && self.expires_at == other.expires_at
    }
}

impl Eq for TokenSet {}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_token_set_parsing() {
        let json = r#"{
            "jwtToken": "header.payload.signature",
            "jwtTokenExpiry": "2030-01-01T00:00:00Z"
        }"#;

        let token_set: TokenSet = serde_json::from_str(json).unwrap();
        assert_eq!(token_set.token(), "header.payload.signature");
        assert_eq!(token_set.expires_at().to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let check_interval = Duration::from_millis(60_000);

        let soon = TokenSet::new("a", now + ChronoDuration::milliseconds(30_000));
        assert!(soon.expires_within(check_interval, now));

        let later = TokenSet::new("b", now + ChronoDuration::milliseconds(120_000));
        assert!(!later.expires_within(check_interval, now));

        let expired = TokenSet::new("c", now - ChronoDuration::seconds(1));
        assert!(expired.expires_within(check_interval, now));
        assert!(expired.is_expired(now));
        assert_eq!(expired.remaining_lifetime(now), None);
    }

    #[test]
    fn test_debug_redacts_token() {
        let token_set = TokenSet::new("super-secret", Utc::now());
        let debug = format!("{:?}", token_set);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_authorization_header() {
        let token_set = TokenSet::new("abc", Utc::now());
        assert_eq!(token_set.authorization_header(), "Bearer abc");
    }

    #[cfg(feature = "jwt")]
    #[test]
    fn test_from_jwt_reads_exp_claim() {
        use jsonwebtoken::{encode, EncodingKey, Header};

        #[derive(serde::Serialize)]
        struct Claims {
            sub: String,
            exp: i64,
        }

        let exp = Utc::now().timestamp() + 3600;
        let jwt = encode(
            &Header::default(),
            &Claims {
                sub: "user@example.com".to_string(),
                exp,
            },
            &EncodingKey::from_secret(b"signing-key"),
        )
        .unwrap();

        let token_set = TokenSet::from_jwt(jwt.clone()).unwrap();
        assert_eq!(token_set.token(), jwt);
        assert_eq!(token_set.expires_at().timestamp(), exp);
    }

    #[cfg(feature = "jwt")]
    #[test]
    fn test_from_jwt_rejects_garbage() {
        assert!(TokenSet::from_jwt("not-a-jwt").is_err());
    }
}
