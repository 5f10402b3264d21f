use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    service::UserService,
    types::{AuthRequest, AuthResponse, RegisterRequest, UserProfile},
};
use crate::shared::{AppError, AppState};
use crate::token::AccessContext;
use crate::transport::{refresh_cookie, ApiResponse, ValidatedJson};

/// HTTP handler for authenticating with email and password
///
/// POST /auth
/// Returns the access token and the full pair in the body; the refresh token is also set as
/// an HttpOnly cookie.
#[instrument(name = "authenticate", skip(state, request))]
pub async fn authenticate(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<AuthRequest>,
) -> Result<(HeaderMap, Json<ApiResponse<AuthResponse>>), AppError> {
    info!("Authenticating user");

    let service = UserService::new(
        Arc::clone(&state.user_repository),
        Arc::clone(&state.issuer),
    );
    let (user, pair) = service.authenticate(request).await?;

    let mut headers = HeaderMap::new();
    let cookie = refresh_cookie(&state.cookie, &pair.refresh.token_string).map_err(|e| {
        warn!(error = %e, "Failed to encode refresh cookie");
        AppError::Internal
    })?;
    headers.insert(SET_COOKIE, cookie);

    info!(user_id = %user.id, "Authentication succeeded");
    Ok((headers, Json(ApiResponse::ok(AuthResponse::new(&user, &pair)))))
}

/// HTTP handler for registering a new user
///
/// POST /register
/// Returns the stored profile, without any password material
#[instrument(name = "register", skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    info!("Registering user");

    let service = UserService::new(
        Arc::clone(&state.user_repository),
        Arc::clone(&state.issuer),
    );
    let user = service.register(request).await?;

    Ok(Json(ApiResponse::ok(UserProfile::from(&user))))
}

/// HTTP handler returning the caller's profile
///
/// GET /me
#[instrument(name = "me", skip(state, access))]
pub async fn me(
    State(state): State<AppState>,
    Extension(access): Extension<AccessContext>,
) -> Result<Json<ApiResponse<UserProfile>>, AppError> {
    let service = UserService::new(
        Arc::clone(&state.user_repository),
        Arc::clone(&state.issuer),
    );
    let user = service.get_user(access.subject).await?;

    Ok(Json(ApiResponse::ok(UserProfile::from(&user))))
}
