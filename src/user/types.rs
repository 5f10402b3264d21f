use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{Role, UserModel};
use crate::shared::AppError;
use crate::token::TokenPair;
use crate::transport::Validate;

const MIN_PASSWORD_LEN: usize = 8;

/// Request payload for POST /auth
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

impl Validate for AuthRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation(
                "email and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request payload for POST /register
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub last_name: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub email: String,
    pub password: String,
    pub passport: String,
    pub inn: String,
    pub snils: String,
    pub birthday: NaiveDate,
    #[serde(default)]
    pub role: Role,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("last_name", &self.last_name)?;
        require_non_empty("first_name", &self.first_name)?;
        if !is_plausible_email(&self.email) {
            return Err(AppError::Validation("email is not a valid address".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        require_document_number("passport", &self.passport)?;
        require_document_number("inn", &self.inn)?;
        require_document_number("snils", &self.snils)?;
        if self.birthday > Utc::now().date_naive() {
            return Err(AppError::Validation(
                "birthday must not be in the future".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

// Document numbers are digit groups, optionally separated by spaces or dashes.
fn require_document_number(field: &str, value: &str) -> Result<(), AppError> {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    let only_digits_and_separators = value
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-');
    if digits == 0 || !only_digits_and_separators {
        return Err(AppError::Validation(format!(
            "{field} must contain digits only"
        )));
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Non-secret view of a user, returned by /register and /me
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub email: String,
    pub passport: String,
    pub inn: String,
    pub snils: String,
    pub birthday: NaiveDate,
    pub role: Role,
}

impl From<&UserModel> for UserProfile {
    fn from(user: &UserModel) -> Self {
        Self {
            id: user.id,
            last_name: user.last_name.clone(),
            first_name: user.first_name.clone(),
            middle_name: user.middle_name.clone(),
            email: user.email.clone(),
            passport: user.passport.clone(),
            inn: user.inn.clone(),
            snils: user.snils.clone(),
            birthday: user.birthday,
            role: user.role,
        }
    }
}

/// Response for POST /auth: the user's email and every field of the issued pair
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub email: String,
    pub access_token: String,
    pub access_token_issued_at: DateTime<Utc>,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_issued_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl AuthResponse {
    pub fn new(user: &UserModel, pair: &TokenPair) -> Self {
        Self {
            email: user.email.clone(),
            access_token: pair.access.token_string.clone(),
            access_token_issued_at: pair.access.issued_at,
            access_token_expires_at: pair.access.expires_at,
            refresh_token: pair.refresh.token_string.clone(),
            refresh_token_issued_at: pair.refresh.issued_at,
            refresh_token_expires_at: pair.refresh.expires_at,
        }
    }
}
