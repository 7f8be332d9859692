use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::UserId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TokenError {
    #[error("token must have three dot-separated segments, found {0}")]
    Segments(usize),

    #[error("token payload is not valid base64")]
    Encoding,

    #[error("token payload is not valid JSON: {0}")]
    Payload(String),
}

//
// ─── ROLE ─────────────────────────────────────────────────────────────────────
//

/// Role claim carried by the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    School,
    Instructor,
    Student,
    Other(String),
}

impl Role {
    /// Maps a raw role claim to a `Role`, ignoring case and a `ROLE_` prefix.
    #[must_use]
    pub fn from_claim(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lowered = trimmed.to_ascii_lowercase();
        let name = lowered.strip_prefix("role_").unwrap_or(&lowered);
        match name {
            "admin" => Self::Admin,
            "school" => Self::School,
            "instructor" | "teacher" => Self::Instructor,
            "student" | "user" => Self::Student,
            _ => Self::Other(trimmed.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::School => "school",
            Role::Instructor => "instructor",
            Role::Student => "student",
            Role::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── CLAIMS ───────────────────────────────────────────────────────────────────
//

/// The subset of the token payload the client reads.
///
/// The signature is not verified on the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: Option<i64>,
    pub role: Option<String>,
    pub sub: Option<String>,
    pub uid: Option<UserId>,
}

impl TokenClaims {
    /// Decodes the middle segment of a `header.payload.signature` token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` when the token is not three segments, the payload
    /// is not base64, or the decoded bytes are not a JSON object.
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        if segments.len() != 3 {
            return Err(TokenError::Segments(segments.len()));
        }

        let payload = segments[1].trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| STANDARD_NO_PAD.decode(payload))
            .map_err(|_| TokenError::Encoding)?;

        let value: Value =
            serde_json::from_slice(&bytes).map_err(|err| TokenError::Payload(err.to_string()))?;
        Self::from_payload(&value)
    }

    /// Reads the claims out of a decoded payload.
    ///
    /// Only `exp` decides expiry. The other claims are read best-effort: a
    /// claim with an unexpected JSON type counts as absent.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Payload` when the payload is not a JSON object.
    pub fn from_payload(payload: &Value) -> Result<Self, TokenError> {
        let Value::Object(map) = payload else {
            return Err(TokenError::Payload("expected a JSON object".to_owned()));
        };

        let uid = ["uid", "userId", "user_id"]
            .iter()
            .find_map(|key| map.get(*key).and_then(claim_id));

        Ok(Self {
            exp: map.get("exp").and_then(claim_seconds),
            role: map.get("role").and_then(first_text),
            sub: map.get("sub").and_then(claim_text),
            uid,
        })
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.role.as_deref().map(Role::from_claim)
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }

    /// True when there is no expiry claim or it is not in the future.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => exp <= now.timestamp(),
            None => true,
        }
    }
}

// `exp` is an integer in practice, but some issuers emit floats or strings.
fn claim_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|secs| secs.is_finite())
                .map(|secs| secs.trunc() as i64)
        }),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn claim_text(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) if !raw.trim().is_empty() => Some(raw.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A single string, or the first usable entry of an array of them.
fn first_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(claim_text),
        other => claim_text(other),
    }
}

fn claim_id(value: &Value) -> Option<UserId> {
    match value {
        Value::Number(n) => n.as_u64().map(UserId::new),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

//
// ─── TOKEN ────────────────────────────────────────────────────────────────────
//

/// Opaque bearer credential attached to outgoing requests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// # Errors
    ///
    /// See [`TokenClaims::decode`].
    pub fn claims(&self) -> Result<TokenClaims, TokenError> {
        TokenClaims::decode(&self.0)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_token_expired(&self.0, now)
    }
}

// Never print credentials into logs.
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<{} bytes>)", self.0.len())
    }
}

/// Expiry check that treats any decode failure as expired.
#[must_use]
pub fn is_token_expired(token: &str, now: DateTime<Utc>) -> bool {
    TokenClaims::decode(token).map_or(true, |claims| claims.is_expired_at(now))
}
