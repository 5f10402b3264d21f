use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    generators::Clock,
    issuer::TokenIssuer,
    models::{RefreshTokenRecord, RotationOutcome},
    repository::RefreshTokenRepository,
    types::{TokenKind, TokenPair},
    validator::TokenValidator,
};
use crate::shared::AppError;

/// Stages of a single renewal attempt, reported in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RenewalStage {
    Start,
    Extracted,
    Validated,
    Rotated,
    Rejected,
}

/// Exchanges a refresh token for a brand-new token pair, spending the old refresh token
pub struct SessionRenewal {
    issuer: Arc<TokenIssuer>,
    validator: Arc<TokenValidator>,
    repository: Arc<dyn RefreshTokenRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
}

impl SessionRenewal {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        validator: Arc<TokenValidator>,
        repository: Arc<dyn RefreshTokenRepository + Send + Sync>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            issuer,
            validator,
            repository,
            clock,
        }
    }

    /// Rotates `refresh_token` on behalf of `subject`, the identity already established by
    /// the access token gate.
    #[instrument(skip(self, refresh_token))]
    pub async fn renew(
        &self,
        subject: Uuid,
        refresh_token: Option<&str>,
    ) -> Result<TokenPair, AppError> {
        info!(stage = %RenewalStage::Start, "Starting token renewal");

        let refresh_token = match refresh_token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(reject(AppError::MissingCredential(
                    "refresh token cookie is missing".to_string(),
                )))
            }
        };
        info!(stage = %RenewalStage::Extracted, "Refresh token extracted");

        let claims = self
            .validator
            .validate(refresh_token, TokenKind::Refresh)
            .map_err(|rejection| {
                reject(AppError::InvalidRefreshToken(format!(
                    "refresh token rejected: {rejection}"
                )))
            })?;

        if claims.sub != subject {
            warn!(
                access_subject = %subject,
                refresh_subject = %claims.sub,
                "Refresh token belongs to a different subject"
            );
            return Err(reject(AppError::InvalidRefreshToken(
                "refresh token does not belong to this session".to_string(),
            )));
        }
        info!(stage = %RenewalStage::Validated, jti = %claims.jti, "Refresh token validated");

        // Sign first so that the spend and the replacement are written as one unit.
        let replacement = self.issuer.mint(subject)?;
        let now = self.clock.now();

        let outcome = self
            .repository
            .rotate(
                &claims.jti,
                subject,
                &RefreshTokenRecord::from_token(&replacement.refresh),
                now,
            )
            .await?;

        match outcome {
            RotationOutcome::Rotated => {
                info!(
                    stage = %RenewalStage::Rotated,
                    subject = %subject,
                    spent_jti = %claims.jti,
                    new_jti = %replacement.refresh.jti,
                    "Token pair rotated"
                );
                Ok(replacement)
            }
            RotationOutcome::Contended => {
                // Lost to a concurrent rotation of the same token; the winner's pair stays valid.
                info!(subject = %subject, jti = %claims.jti, "Refresh token rotated concurrently");
                Err(reject(AppError::InvalidRefreshToken(
                    "refresh token has already been used".to_string(),
                )))
            }
            RotationOutcome::Reused(record) => {
                let revoked = self.repository.revoke_subject(subject, now).await?;
                warn!(
                    subject = %subject,
                    jti = %record.jti,
                    replaced_by = ?record.replaced_by,
                    revoked,
                    "Spent refresh token presented again, revoked all sessions of subject"
                );
                Err(reject(AppError::InvalidRefreshToken(
                    "refresh token has already been used".to_string(),
                )))
            }
            RotationOutcome::Revoked => Err(reject(AppError::InvalidRefreshToken(
                "refresh token has been revoked".to_string(),
            ))),
            RotationOutcome::Expired => Err(reject(AppError::InvalidRefreshToken(
                "refresh token has expired".to_string(),
            ))),
            RotationOutcome::NotFound => Err(reject(AppError::InvalidRefreshToken(
                "refresh token is not recognized".to_string(),
            ))),
        }
    }
}

fn reject(error: AppError) -> AppError {
    warn!(stage = %RenewalStage::Rejected, error = %error, "Token renewal rejected");
    error
}
