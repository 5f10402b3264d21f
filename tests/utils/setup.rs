use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use tokenpair::{
    build_router,
    config::{CookieSettings, TokenSettings},
    token::{
        generators::{ManualClock, UuidTokenIdGenerator},
        repository::InMemoryRefreshTokenRepository,
    },
    user::repository::InMemoryUserRepository,
    AppState,
};

pub const TEST_PASSWORD: &str = "correct horse battery";
const TEST_SECRET: &str = "integration-test-secret";
const TEST_ORIGIN: &str = "http://localhost:8081";

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub users: Arc<InMemoryUserRepository>,
    pub refresh_tokens: Arc<InMemoryRefreshTokenRepository>,
}

pub struct TestAppBuilder {
    start: DateTime<Utc>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        }
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn build(self) -> TestApp {
        let clock = Arc::new(ManualClock::new(self.start));
        let users = Arc::new(InMemoryUserRepository::new());
        let refresh_tokens = Arc::new(InMemoryRefreshTokenRepository::new());

        let settings = TokenSettings::new(
            TEST_SECRET,
            self.access_ttl,
            self.refresh_ttl,
            Duration::seconds(30),
        )
        .unwrap();

        let state = AppState::with_clock(
            &settings,
            CookieSettings::default(),
            users.clone(),
            refresh_tokens.clone(),
            clock.clone(),
            Arc::new(UuidTokenIdGenerator),
        );

        TestApp {
            router: build_router(state, TEST_ORIGIN),
            clock,
            users,
            refresh_tokens,
        }
    }
}
