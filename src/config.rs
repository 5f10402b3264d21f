use chrono::Duration;
use rand::RngCore;
use std::net::SocketAddr;
use thiserror::Error;
use tracing::warn;

const DEFAULT_ACCESS_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;
const DEFAULT_LEEWAY_SECONDS: i64 = 30;
const MAX_LEEWAY_SECONDS: i64 = 60;
const MAX_TTL_DAYS: i64 = 36_500;
// 60*60*60*60*24: the refresh cookie outlives any refresh token it carries.
const DEFAULT_COOKIE_MAX_AGE_SECONDS: i64 = 311_040_000;
const DEFAULT_CLEANUP_INTERVAL_SECONDS: u64 = 30 * 60;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("JWT_SECRET is set but empty")]
    EmptySecret,

    #[error("access token TTL ({access}s) must be shorter than refresh token TTL ({refresh}s)")]
    TtlOrdering { access: i64, refresh: i64 },
}

/// Lifetimes and signing material for token pairs
#[derive(Clone)]
pub struct TokenSettings {
    secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Tolerated skew between the issuing and verifying clocks
    pub leeway: Duration,
}

impl TokenSettings {
    pub fn new(
        secret: impl Into<Vec<u8>>,
        access_ttl: Duration,
        refresh_ttl: Duration,
        leeway: Duration,
    ) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if access_ttl >= refresh_ttl {
            return Err(ConfigError::TtlOrdering {
                access: access_ttl.num_seconds(),
                refresh: refresh_ttl.num_seconds(),
            });
        }
        let leeway = leeway.clamp(Duration::zero(), Duration::seconds(MAX_LEEWAY_SECONDS));

        Ok(Self {
            secret,
            access_ttl,
            refresh_ttl,
            leeway,
        })
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway", &self.leeway)
            .finish()
    }
}

/// Attributes of the `refresh_token` cookie
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub domain: String,
    pub secure: bool,
    pub max_age_seconds: i64,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            domain: "localhost".to_string(),
            secure: false,
            max_age_seconds: DEFAULT_COOKIE_MAX_AGE_SECONDS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    pub cors_allowed_origin: String,
    pub database_url: Option<String>,
    pub cleanup_interval: std::time::Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            cors_allowed_origin: "http://localhost:8081".to_string(),
            database_url: None,
            cleanup_interval: std::time::Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECONDS),
        }
    }
}

/// Process-wide configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tokens: TokenSettings,
    pub cookie: CookieSettings,
    pub server: ServerSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = match lookup("JWT_SECRET") {
            Some(secret) => secret.into_bytes(),
            None => {
                warn!("JWT_SECRET not set, generating an ephemeral signing secret");
                let mut secret = vec![0u8; 64];
                rand::rng().fill_bytes(&mut secret);
                secret
            }
        };

        let access_minutes = parse_or(&lookup, "ACCESS_TOKEN_TTL_MINUTES", DEFAULT_ACCESS_TTL_MINUTES)?;
        let refresh_days = parse_or(&lookup, "REFRESH_TOKEN_TTL_DAYS", DEFAULT_REFRESH_TTL_DAYS)?;
        let leeway_seconds = parse_or(&lookup, "TOKEN_LEEWAY_SECONDS", DEFAULT_LEEWAY_SECONDS)?;

        let tokens = TokenSettings::new(
            secret,
            positive_ttl("ACCESS_TOKEN_TTL_MINUTES", access_minutes, Duration::try_minutes)?,
            positive_ttl("REFRESH_TOKEN_TTL_DAYS", refresh_days, Duration::try_days)?,
            Duration::seconds(leeway_seconds.clamp(0, MAX_LEEWAY_SECONDS)),
        )?;

        let defaults = CookieSettings::default();
        let cookie = CookieSettings {
            domain: lookup("REFRESH_COOKIE_DOMAIN").unwrap_or(defaults.domain),
            secure: parse_or(&lookup, "REFRESH_COOKIE_SECURE", defaults.secure)?,
            max_age_seconds: parse_or(
                &lookup,
                "REFRESH_COOKIE_MAX_AGE_SECONDS",
                defaults.max_age_seconds,
            )?,
        };

        let defaults = ServerSettings::default();
        let server = ServerSettings {
            bind_addr: parse_or(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN")
                .unwrap_or(defaults.cors_allowed_origin),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            cleanup_interval: std::time::Duration::from_secs(parse_or(
                &lookup,
                "TOKEN_CLEANUP_INTERVAL_SECONDS",
                DEFAULT_CLEANUP_INTERVAL_SECONDS,
            )?),
        };

        Ok(Self {
            tokens,
            cookie,
            server,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

// Zero, negative and unrepresentable lifetimes are rejected at startup.
fn positive_ttl(
    name: &'static str,
    amount: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration, ConfigError> {
    to_duration(amount)
        .filter(|ttl| *ttl > Duration::zero() && *ttl <= Duration::days(MAX_TTL_DAYS))
        .ok_or(ConfigError::InvalidValue {
            name,
            value: amount.to_string(),
        })
}
