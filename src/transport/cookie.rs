//! The refresh token's transport channel.
//!
//! The server writes the `refresh_token` cookie on authentication and on every renewal; the
//! client returns it unmodified. The cookie is `HttpOnly` so the refresh token is never
//! readable by scripts.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{InvalidHeaderValue, COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
};
use std::convert::Infallible;

use crate::config::CookieSettings;

pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Refresh token as returned by the client, if the cookie was present
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshCookie(pub Option<String>);

impl RefreshCookie {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RefreshCookie
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(read_cookie(&parts.headers, REFRESH_COOKIE_NAME)))
    }
}

/// `Set-Cookie` value delivering `token` to the client
pub fn refresh_cookie(
    settings: &CookieSettings,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(settings, token, settings.max_age_seconds)
}

/// `Set-Cookie` value removing the refresh token from the client
pub fn clear_refresh_cookie(settings: &CookieSettings) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(settings, "", 0)
}

fn build_cookie(
    settings: &CookieSettings,
    value: &str,
    max_age_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={value}; Max-Age={max_age_seconds}; Path=/; Domain={}; HttpOnly; SameSite=Lax",
        settings.domain
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}
