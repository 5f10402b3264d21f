use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::types::Token;

/// A rotated token presented again within this long of its rotation lost a race with the
/// rotation rather than being replayed.
pub const ROTATION_CONTENTION_WINDOW_SECONDS: i64 = 5;

/// Database model for the refresh_tokens table
///
/// One row per refresh token ever issued. A row is spent once `spent_at` is set: either it was
/// rotated (`replaced_by` points at its successor) or it was revoked (`replaced_by` is null).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct RefreshTokenRecord {
    pub jti: String,
    pub subject: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub spent_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<String>,
}

/// Result of attempting to rotate a refresh token
#[derive(Debug, Clone, PartialEq)]
pub enum RotationOutcome {
    /// The token was unspent; it is now spent and its replacement is stored
    Rotated,
    /// The token was rotated by a concurrent request moments ago
    Contended,
    /// The token was already rotated once. Presenting it again indicates theft.
    Reused(RefreshTokenRecord),
    /// The token was revoked (logout or reuse detection)
    Revoked,
    /// The token's record has passed its expiry
    Expired,
    /// No record with this id belongs to the subject
    NotFound,
}

impl RefreshTokenRecord {
    pub fn from_token(token: &Token) -> Self {
        Self {
            jti: token.jti.clone(),
            subject: token.subject,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
            spent_at: None,
            replaced_by: None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_spent(&self) -> bool {
        self.spent_at.is_some()
    }

    /// Why this record cannot be rotated by `subject` at `now`, or `Rotated` if it can
    pub fn rotation_outcome(&self, subject: Uuid, now: DateTime<Utc>) -> RotationOutcome {
        if self.subject != subject {
            return RotationOutcome::NotFound;
        }
        match (self.spent_at, &self.replaced_by) {
            (Some(spent_at), Some(_))
                if now - spent_at < Duration::seconds(ROTATION_CONTENTION_WINDOW_SECONDS) =>
            {
                RotationOutcome::Contended
            }
            (Some(_), Some(_)) => RotationOutcome::Reused(self.clone()),
            (Some(_), None) => RotationOutcome::Revoked,
            (None, _) if self.is_expired_at(now) => RotationOutcome::Expired,
            (None, _) => RotationOutcome::Rotated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subject: Uuid) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            jti: "jti-1".to_string(),
            subject,
            issued_at: now,
            expires_at: now + Duration::days(7),
            spent_at: None,
            replaced_by: None,
        }
    }

    #[test]
    fn test_fresh_record_can_rotate() {
        let subject = Uuid::new_v4();
        let record = record(subject);
        assert_eq!(
            record.rotation_outcome(subject, Utc::now()),
            RotationOutcome::Rotated
        );
        assert!(!record.is_spent());
    }

    #[test]
    fn test_rotated_record_is_reused() {
        let subject = Uuid::new_v4();
        let mut record = record(subject);
        let spent_at = Utc::now();
        record.spent_at = Some(spent_at);
        record.replaced_by = Some("jti-2".to_string());

        let later = spent_at + Duration::seconds(ROTATION_CONTENTION_WINDOW_SECONDS);
        assert!(matches!(
            record.rotation_outcome(subject, later),
            RotationOutcome::Reused(_)
        ));
    }

    #[test]
    fn test_just_rotated_record_is_contended() {
        let subject = Uuid::new_v4();
        let mut record = record(subject);
        let spent_at = Utc::now();
        record.spent_at = Some(spent_at);
        record.replaced_by = Some("jti-2".to_string());

        assert_eq!(
            record.rotation_outcome(subject, spent_at),
            RotationOutcome::Contended
        );
        // A loser whose clock read predates the winner's write.
        assert_eq!(
            record.rotation_outcome(subject, spent_at - Duration::seconds(1)),
            RotationOutcome::Contended
        );
        assert_eq!(
            record.rotation_outcome(subject, spent_at + Duration::seconds(4)),
            RotationOutcome::Contended
        );
    }

    #[test]
    fn test_revoked_record_is_never_contended() {
        let subject = Uuid::new_v4();
        let mut record = record(subject);
        record.spent_at = Some(Utc::now());

        assert_eq!(
            record.rotation_outcome(subject, Utc::now()),
            RotationOutcome::Revoked
        );
    }

    #[test]
    fn test_expired_at_boundary() {
        let subject = Uuid::new_v4();
        let record = record(subject);

        assert_eq!(
            record.rotation_outcome(subject, record.expires_at),
            RotationOutcome::Expired
        );
    }

    #[test]
    fn test_other_subject_is_not_found() {
        let record = record(Uuid::new_v4());
        assert_eq!(
            record.rotation_outcome(Uuid::new_v4(), Utc::now()),
            RotationOutcome::NotFound
        );
    }
}
