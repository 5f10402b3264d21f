use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role tag carried by every token
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims shared by access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub kind: TokenKind,
    pub jti: String,
    pub iat: i64, // Issued at timestamp (standard JWT claim)
    pub exp: i64, // Expiration timestamp (standard JWT claim)
}

/// A single signed credential
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub token_string: String,
    pub jti: String,
    pub subject: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One access and one refresh token minted together for the same subject and instant
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPair {
    pub access: Token,
    pub refresh: Token,
}

impl TokenPair {
    pub fn subject(&self) -> Uuid {
        self.access.subject
    }
}

/// Response body of a successful renewal
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RenewalResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<&TokenPair> for RenewalResponse {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access.token_string.clone(),
            refresh_token: pair.refresh.token_string.clone(),
        }
    }
}

/// Response body of a logout
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LogoutResponse {
    pub revoked_refresh_tokens: u64,
}
