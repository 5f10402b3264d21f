use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{types::TokenKind, validator::ExpiryPolicy};
use crate::shared::{AppError, AppState};

/// Identity established by the access token gate, available to handlers as
/// `Extension<AccessContext>`
#[derive(Debug, Clone, PartialEq)]
pub struct AccessContext {
    pub subject: Uuid,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Access token gate for protected routes: rejects any request without a valid, unexpired
/// `Authorization: Bearer` access token before the handler runs.
/// Usage: .route_layer(middleware::from_fn_with_state(app_state.clone(), token::require_access_token))
pub async fn require_access_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, req, next, ExpiryPolicy::Enforce).await
}

/// Gate for the renewal route. Same checks as [`require_access_token`] except that an elapsed
/// access token is still accepted, since renewing it is the purpose of the call.
pub async fn require_session(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authenticate(&state, req, next, ExpiryPolicy::AllowExpired).await
}

#[instrument(skip(state, req, next))]
async fn authenticate(
    state: &AppState,
    mut req: Request,
    next: Next,
    expiry: ExpiryPolicy,
) -> Result<Response, AppError> {
    info!("Access token gate triggered for request {}", req.uri());

    let token = bearer_token(req.headers()).ok_or_else(|| {
        warn!("Missing or malformed Authorization header");
        AppError::Unauthorized("missing bearer access token".to_string())
    })?;

    let claims = state
        .validator
        .validate_with(&token, TokenKind::Access, expiry)
        .map_err(|rejection| AppError::Unauthorized(format!("access token rejected: {rejection}")))?;

    let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or_else(|| {
        AppError::Unauthorized("access token rejected: malformed".to_string())
    })?;

    info!(subject = %claims.sub, "Access token accepted, adding context to request");

    req.extensions_mut().insert(AccessContext {
        subject: claims.sub,
        access_token: token,
        expires_at,
    });

    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
