use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role granted to a user
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Database model for the users table
#[derive(Debug, Clone, PartialEq)]
pub struct UserModel {
    pub id: Uuid,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub email: String, // Normalized: trimmed, lowercase
    pub password_hash: String, // Argon2 PHC string, never the plaintext
    pub passport: String,
    pub inn: String,
    pub snils: String,
    pub birthday: NaiveDate,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Canonical form used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
