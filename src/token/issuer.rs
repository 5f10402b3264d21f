use chrono::{DateTime, Duration, SubsecRound, Utc};
use jsonwebtoken::{encode, Header};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{
    generators::{Clock, TokenIdGenerator},
    keys::SigningKeys,
    models::RefreshTokenRecord,
    repository::RefreshTokenRepository,
    types::{Token, TokenClaims, TokenKind, TokenPair},
};
use crate::shared::AppError;

/// Mints access/refresh token pairs
pub struct TokenIssuer {
    keys: Arc<SigningKeys>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
    token_ids: Arc<dyn TokenIdGenerator>,
    repository: Arc<dyn RefreshTokenRepository + Send + Sync>,
}

impl TokenIssuer {
    pub fn new(
        keys: Arc<SigningKeys>,
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Arc<dyn Clock>,
        token_ids: Arc<dyn TokenIdGenerator>,
        repository: Arc<dyn RefreshTokenRepository + Send + Sync>,
    ) -> Self {
        Self {
            keys,
            access_ttl,
            refresh_ttl,
            clock,
            token_ids,
            repository,
        }
    }

    /// Issues a new pair for `subject` and records its refresh token as unspent
    #[instrument(skip(self))]
    pub async fn issue(&self, subject: Uuid) -> Result<TokenPair, AppError> {
        let pair = self.mint(subject)?;
        self.repository
            .store(&RefreshTokenRecord::from_token(&pair.refresh))
            .await?;

        info!(
            subject = %subject,
            refresh_jti = %pair.refresh.jti,
            access_expires_at = %pair.access.expires_at,
            refresh_expires_at = %pair.refresh.expires_at,
            "Issued token pair"
        );
        Ok(pair)
    }

    /// Signs a new pair without touching refresh token state.
    ///
    /// Both tokens share one issuance instant. Callers that hand the pair out must persist
    /// the refresh record, either through [`TokenIssuer::issue`] or as the replacement of a
    /// rotation.
    #[instrument(skip(self))]
    pub fn mint(&self, subject: Uuid) -> Result<TokenPair, AppError> {
        // JWT timestamps have second precision; keep the pair's timestamps identical to its claims.
        let issued_at = self.clock.now().trunc_subsecs(0);

        let access = self.sign(subject, TokenKind::Access, issued_at, self.access_ttl)?;
        let refresh = self.sign(subject, TokenKind::Refresh, issued_at, self.refresh_ttl)?;

        debug!(subject = %subject, issued_at = %issued_at, "Minted token pair");
        Ok(TokenPair { access, refresh })
    }

    fn sign(
        &self,
        subject: Uuid,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Token, AppError> {
        let expires_at = issued_at.checked_add_signed(ttl).ok_or_else(|| {
            debug!(kind = %kind, "Token expiry is out of range");
            AppError::Issuance("token expiry is out of range".to_string())
        })?;
        let jti = self.token_ids.generate();

        let claims = TokenClaims {
            sub: subject,
            kind,
            jti: jti.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token_string = encode(
            &Header::new(self.keys.algorithm),
            &claims,
            &self.keys.encoding,
        )
        .map_err(|e| {
            debug!(error = %e, kind = %kind, "Failed to encode JWT token");
            AppError::Issuance(e.to_string())
        })?;

        Ok(Token {
            kind,
            token_string,
            jti,
            subject,
            issued_at,
            expires_at,
        })
    }
}
