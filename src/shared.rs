use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::config::{CookieSettings, TokenSettings};
use crate::token::{
    generators::{Clock, SystemClock, TokenIdGenerator, UuidTokenIdGenerator},
    issuer::TokenIssuer,
    keys::SigningKeys,
    repository::RefreshTokenRepository,
    validator::TokenValidator,
};
use crate::user::repository::UserRepository;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub user_repository: Arc<dyn UserRepository + Send + Sync>,
    pub refresh_token_repository: Arc<dyn RefreshTokenRepository + Send + Sync>,
    pub issuer: Arc<TokenIssuer>,
    pub validator: Arc<TokenValidator>,
    pub clock: Arc<dyn Clock>,
    pub cookie: CookieSettings,
}

impl AppState {
    pub fn new(
        tokens: &TokenSettings,
        cookie: CookieSettings,
        user_repository: Arc<dyn UserRepository + Send + Sync>,
        refresh_token_repository: Arc<dyn RefreshTokenRepository + Send + Sync>,
    ) -> Self {
        Self::with_clock(
            tokens,
            cookie,
            user_repository,
            refresh_token_repository,
            Arc::new(SystemClock),
            Arc::new(UuidTokenIdGenerator),
        )
    }

    /// Same as [`AppState::new`] with an explicit time source and token id generator
    pub fn with_clock(
        tokens: &TokenSettings,
        cookie: CookieSettings,
        user_repository: Arc<dyn UserRepository + Send + Sync>,
        refresh_token_repository: Arc<dyn RefreshTokenRepository + Send + Sync>,
        clock: Arc<dyn Clock>,
        token_ids: Arc<dyn TokenIdGenerator>,
    ) -> Self {
        // Loaded once; issuer and validator share the same read-only key material.
        let keys = Arc::new(SigningKeys::from_settings(tokens));

        let issuer = Arc::new(TokenIssuer::new(
            Arc::clone(&keys),
            tokens.access_ttl,
            tokens.refresh_ttl,
            Arc::clone(&clock),
            token_ids,
            Arc::clone(&refresh_token_repository),
        ));
        let validator = Arc::new(TokenValidator::new(keys, tokens.leeway, Arc::clone(&clock)));

        Self {
            user_repository,
            refresh_token_repository,
            issuer,
            validator,
            clock,
            cookie,
        }
    }
}

#[derive(Error, Debug, strum_macros::IntoStaticStr)]
pub enum AppError {
    #[error("{0}")]
    #[strum(serialize = "ValidationError")]
    Validation(String),

    #[error("invalid email or password")]
    #[strum(serialize = "InvalidCredentials")]
    InvalidCredentials,

    #[error("{0}")]
    #[strum(serialize = "DuplicateIdentity")]
    DuplicateIdentity(String),

    #[error("{0}")]
    #[strum(serialize = "MissingCredential")]
    MissingCredential(String),

    #[error("{0}")]
    #[strum(serialize = "InvalidRefreshToken")]
    InvalidRefreshToken(String),

    #[error("Unauthorized: {0}")]
    #[strum(serialize = "Unauthorized")]
    Unauthorized(String),

    #[error("Token issuance failed: {0}")]
    #[strum(serialize = "IssuanceError")]
    Issuance(String),

    #[error("Database error: {0}")]
    #[strum(serialize = "InternalError")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    #[strum(serialize = "NotFound")]
    NotFound(String),

    #[error("Internal server error")]
    #[strum(serialize = "InternalError")]
    Internal,
}

impl AppError {
    /// Category tag sent to clients in the `error` field
    pub fn category(&self) -> &'static str {
        self.into()
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::MissingCredential(_)
            | AppError::InvalidRefreshToken(_)
            | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::DuplicateIdentity(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Issuance(_) | AppError::DatabaseError(_) | AppError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let text = match &self {
            // Internal causes stay in the logs.
            AppError::Issuance(_) | AppError::DatabaseError(_) | AppError::Internal => {
                error!(error = %self, "Request failed with internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.category(),
            "text": text,
        }));

        (status, body).into_response()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories_and_status_codes() {
        let cases = [
            (AppError::Validation("x".into()), "ValidationError", 400),
            (AppError::InvalidCredentials, "InvalidCredentials", 401),
            (AppError::DuplicateIdentity("x".into()), "DuplicateIdentity", 409),
            (AppError::MissingCredential("x".into()), "MissingCredential", 401),
            (AppError::InvalidRefreshToken("x".into()), "InvalidRefreshToken", 401),
            (AppError::Issuance("x".into()), "IssuanceError", 500),
            (AppError::DatabaseError("x".into()), "InternalError", 500),
        ];

        for (error, category, status) in cases {
            assert_eq!(error.category(), category);
            assert_eq!(error.status_code().as_u16(), status);
        }
    }

    #[tokio::test]
    async fn test_internal_errors_hide_detail() {
        let response = AppError::Issuance("key material unavailable".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "IssuanceError");
        assert_eq!(json["text"], "internal server error");
    }
}
