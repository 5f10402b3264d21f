use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::{RefreshTokenRecord, RotationOutcome};
use crate::shared::AppError;

/// Trait for refresh token state operations
#[async_trait]
pub trait RefreshTokenRepository {
    async fn store(&self, record: &RefreshTokenRecord) -> Result<(), AppError>;
    async fn find(&self, jti: &str) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Atomically marks `spent_jti` as spent and stores `replacement` in its place.
    ///
    /// The check that the token is still unspent and the write that spends it are one step:
    /// of any number of concurrent calls with the same `spent_jti`, at most one returns
    /// `Rotated`; the losers get `Contended`. Any other outcome leaves the store untouched.
    async fn rotate(
        &self,
        spent_jti: &str,
        subject: Uuid,
        replacement: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, AppError>;

    /// Spends every unspent refresh token of `subject`, returns how many were revoked
    async fn revoke_subject(&self, subject: Uuid, now: DateTime<Utc>) -> Result<u64, AppError>;

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

/// In-memory implementation of RefreshTokenRepository for development and testing
pub struct InMemoryRefreshTokenRepository {
    records: Mutex<HashMap<String, RefreshTokenRecord>>,
}

impl Default for InMemoryRefreshTokenRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current number of records, spent or not
    pub fn record_count(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, RefreshTokenRecord>>, AppError> {
        self.records
            .lock()
            .map_err(|_| AppError::DatabaseError("refresh token store poisoned".to_string()))
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    #[instrument(skip(self, record))]
    async fn store(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        debug!(jti = %record.jti, subject = %record.subject, "Storing refresh token in memory");

        let mut records = self.lock()?;
        if records.contains_key(&record.jti) {
            warn!(jti = %record.jti, "Refresh token already exists in memory");
            return Err(AppError::DatabaseError(
                "Refresh token already exists".to_string(),
            ));
        }
        records.insert(record.jti.clone(), record.clone());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, jti: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self.lock()?.get(jti).cloned())
    }

    #[instrument(skip(self, replacement))]
    async fn rotate(
        &self,
        spent_jti: &str,
        subject: Uuid,
        replacement: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, AppError> {
        debug!(jti = %spent_jti, subject = %subject, "Attempting to rotate refresh token atomically");

        // Check and write under one lock acquisition.
        let mut records = self.lock()?;

        let outcome = match records.get(spent_jti) {
            Some(record) => record.rotation_outcome(subject, now),
            None => RotationOutcome::NotFound,
        };
        if outcome != RotationOutcome::Rotated {
            debug!(jti = %spent_jti, outcome = ?outcome, "Refresh token cannot be rotated");
            return Ok(outcome);
        }
        if records.contains_key(&replacement.jti) {
            return Err(AppError::DatabaseError(
                "Replacement refresh token already exists".to_string(),
            ));
        }

        if let Some(record) = records.get_mut(spent_jti) {
            record.spent_at = Some(now);
            record.replaced_by = Some(replacement.jti.clone());
        }
        records.insert(replacement.jti.clone(), replacement.clone());

        debug!(jti = %spent_jti, replaced_by = %replacement.jti, "Refresh token rotated in memory");
        Ok(RotationOutcome::Rotated)
    }

    #[instrument(skip(self))]
    async fn revoke_subject(&self, subject: Uuid, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut records = self.lock()?;
        let mut revoked = 0;
        for record in records
            .values_mut()
            .filter(|r| r.subject == subject && r.spent_at.is_none())
        {
            record.spent_at = Some(now);
            revoked += 1;
        }

        debug!(subject = %subject, revoked, "Revoked refresh tokens in memory");
        Ok(revoked)
    }

    #[instrument(skip(self))]
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut records = self.lock()?;
        let initial_count = records.len();

        records.retain(|_, record| !record.is_expired_at(now));

        let removed_count = initial_count - records.len();
        debug!(
            expired_tokens_removed = removed_count,
            "Expired refresh tokens cleaned up from memory"
        );
        Ok(removed_count as u64)
    }
}

/// PostgreSQL implementation of the refresh token repository
pub struct PostgresRefreshTokenRepository {
    pool: PgPool,
}

impl PostgresRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS refresh_tokens (
                jti TEXT PRIMARY KEY,
                subject UUID NOT NULL,
                issued_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                spent_at TIMESTAMPTZ,
                replaced_by TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS refresh_tokens_subject_idx ON refresh_tokens (subject)",
        )
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }
}

fn database_error(e: sqlx::Error) -> AppError {
    warn!(error = %e, "Refresh token query failed");
    AppError::DatabaseError(e.to_string())
}

const SELECT_RECORD: &str = "SELECT jti, subject, issued_at, expires_at, spent_at, replaced_by \
                             FROM refresh_tokens WHERE jti = $1";

#[async_trait]
impl RefreshTokenRepository for PostgresRefreshTokenRepository {
    #[instrument(skip(self, record))]
    async fn store(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        debug!(jti = %record.jti, subject = %record.subject, "Storing refresh token in database");

        sqlx::query(
            "INSERT INTO refresh_tokens (jti, subject, issued_at, expires_at, spent_at, replaced_by) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.jti)
        .bind(record.subject)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(record.spent_at)
        .bind(&record.replaced_by)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, jti: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        sqlx::query_as::<_, RefreshTokenRecord>(SELECT_RECORD)
            .bind(jti)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)
    }

    #[instrument(skip(self, replacement))]
    async fn rotate(
        &self,
        spent_jti: &str,
        subject: Uuid,
        replacement: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> Result<RotationOutcome, AppError> {
        debug!(jti = %spent_jti, subject = %subject, "Attempting to rotate refresh token in database");

        let mut tx = self.pool.begin().await.map_err(database_error)?;

        // Conditional update: a concurrent rotation of the same row blocks here and then
        // re-evaluates the predicate against the committed spent_at.
        let updated = sqlx::query(
            "UPDATE refresh_tokens SET spent_at = $3, replaced_by = $4 \
             WHERE jti = $1 AND subject = $2 AND spent_at IS NULL AND expires_at > $3",
        )
        .bind(spent_jti)
        .bind(subject)
        .bind(now)
        .bind(&replacement.jti)
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

        if updated.rows_affected() == 0 {
            let existing = sqlx::query_as::<_, RefreshTokenRecord>(SELECT_RECORD)
                .bind(spent_jti)
                .fetch_optional(&mut *tx)
                .await
                .map_err(database_error)?;
            tx.rollback().await.map_err(database_error)?;

            let outcome = match existing {
                // A blocked update that lost to a concurrent rotation sees the winner's
                // spent_at and reads back as contention, not reuse.
                Some(record) => match record.rotation_outcome(subject, now) {
                    RotationOutcome::Rotated => RotationOutcome::Contended,
                    other => other,
                },
                None => RotationOutcome::NotFound,
            };
            debug!(jti = %spent_jti, outcome = ?outcome, "Refresh token cannot be rotated");
            return Ok(outcome);
        }

        sqlx::query(
            "INSERT INTO refresh_tokens (jti, subject, issued_at, expires_at, spent_at, replaced_by) \
             VALUES ($1, $2, $3, $4, NULL, NULL)",
        )
        .bind(&replacement.jti)
        .bind(replacement.subject)
        .bind(replacement.issued_at)
        .bind(replacement.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

        tx.commit().await.map_err(database_error)?;

        debug!(jti = %spent_jti, replaced_by = %replacement.jti, "Refresh token rotated in database");
        Ok(RotationOutcome::Rotated)
    }

    #[instrument(skip(self))]
    async fn revoke_subject(&self, subject: Uuid, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET spent_at = $2 WHERE subject = $1 AND spent_at IS NULL",
        )
        .bind(subject)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        let rows_affected = result.rows_affected();
        debug!(
            expired_tokens_removed = rows_affected,
            "Expired refresh tokens cleaned up"
        );
        Ok(rows_affected)
    }
}
