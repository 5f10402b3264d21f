use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::shared::AppState;
use crate::token::{self, require_access_token, require_session};
use crate::user;

/// Body of the unauthenticated diagnostic route
pub const DIAGNOSTIC_RESPONSE: &str = "krp";

/// Assembles every route with its gate, plus CORS and request tracing
pub fn build_router(state: AppState, cors_allowed_origin: &str) -> Router {
    // Renewal accepts an expired access token; it only needs to prove who the caller is.
    let renewal = Router::new()
        .route("/update_access_token", get(token::update_access_token))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let protected = Router::new()
        .route("/me", get(user::me))
        .route("/logout", post(token::logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_access_token,
        ));

    Router::new()
        .route("/auth", post(user::authenticate))
        .route("/register", post(user::register))
        .route("/test", get(diagnostic))
        .merge(renewal)
        .merge(protected)
        .layer(cors_layer(cors_allowed_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn diagnostic() -> Json<&'static str> {
    Json(DIAGNOSTIC_RESPONSE)
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            HeaderName::from_static("x-csrf-token"),
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true);

    match HeaderValue::from_str(allowed_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(error = %e, origin = %allowed_origin, "Invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}
