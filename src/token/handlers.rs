use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    middleware::AccessContext,
    renewal::SessionRenewal,
    types::{LogoutResponse, RenewalResponse},
};
use crate::shared::{AppError, AppState};
use crate::transport::{clear_refresh_cookie, refresh_cookie, ApiResponse, RefreshCookie};

/// HTTP handler for renewing a session
///
/// GET /update_access_token
/// Behind the session gate. Reads the refresh token from its cookie, rotates it and returns
/// the new pair; the new refresh token also replaces the cookie.
#[instrument(name = "update_access_token", skip(state, access, refresh))]
pub async fn update_access_token(
    State(state): State<AppState>,
    Extension(access): Extension<AccessContext>,
    refresh: RefreshCookie,
) -> Result<(HeaderMap, Json<ApiResponse<RenewalResponse>>), AppError> {
    info!(subject = %access.subject, "Renewing access token");

    let renewal = SessionRenewal::new(
        Arc::clone(&state.issuer),
        Arc::clone(&state.validator),
        Arc::clone(&state.refresh_token_repository),
        Arc::clone(&state.clock),
    );
    let pair = renewal.renew(access.subject, refresh.as_deref()).await?;

    let mut headers = HeaderMap::new();
    let cookie = refresh_cookie(&state.cookie, &pair.refresh.token_string).map_err(|e| {
        warn!(error = %e, "Failed to encode refresh cookie");
        AppError::Internal
    })?;
    headers.insert(SET_COOKIE, cookie);

    info!(subject = %access.subject, "Access token renewed");
    Ok((headers, Json(ApiResponse::ok(RenewalResponse::from(&pair)))))
}

/// HTTP handler for ending every session of the caller
///
/// POST /logout
#[instrument(name = "logout", skip(state, access))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(access): Extension<AccessContext>,
) -> Result<(HeaderMap, Json<ApiResponse<LogoutResponse>>), AppError> {
    let revoked = state
        .refresh_token_repository
        .revoke_subject(access.subject, state.clock.now())
        .await?;

    // Always clear the cookie, even if nothing was left to revoke.
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = clear_refresh_cookie(&state.cookie) {
        headers.insert(SET_COOKIE, cookie);
    }

    info!(subject = %access.subject, revoked, "Logged out");
    Ok((
        headers,
        Json(ApiResponse::ok(LogoutResponse {
            revoked_refresh_tokens: revoked,
        })),
    ))
}
