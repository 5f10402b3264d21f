use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Mutex;
use uuid::Uuid;

/// Source of the current instant for issuing and validating tokens
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start.trunc_subsecs(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Trait for generating token identifiers (`jti`)
pub trait TokenIdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// UUID v4 based token id generator
pub struct UuidTokenIdGenerator;

impl TokenIdGenerator for UuidTokenIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
