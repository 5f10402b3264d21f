use chrono::Duration;
use jsonwebtoken::{decode, errors::ErrorKind, Validation};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{
    generators::Clock,
    keys::SigningKeys,
    types::{TokenClaims, TokenKind},
};

/// Why a presented token was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TokenRejection {
    Malformed,
    BadSignature,
    Expired,
    WrongKind,
    IssuedInFuture,
}

/// Whether an elapsed `exp` rejects the token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    Enforce,
    /// Signature, kind and issuance are still checked
    AllowExpired,
}

/// Verifies presented tokens. Fails closed: any defect rejects the whole token.
pub struct TokenValidator {
    keys: Arc<SigningKeys>,
    leeway: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(keys: Arc<SigningKeys>, leeway: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            keys,
            leeway,
            clock,
        }
    }

    /// Claims of a valid, unexpired token of the `expected` kind; `claims.sub` is its subject
    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, TokenRejection> {
        self.validate_with(token, expected, ExpiryPolicy::Enforce)
    }

    #[instrument(skip(self, token))]
    pub fn validate_with(
        &self,
        token: &str,
        expected: TokenKind,
        expiry: ExpiryPolicy,
    ) -> Result<TokenClaims, TokenRejection> {
        let result = self.check(token, expected, expiry);
        match &result {
            Ok(claims) => debug!(subject = %claims.sub, kind = %claims.kind, "Token accepted"),
            Err(rejection) => warn!(reason = %rejection, expected = %expected, "Token rejected"),
        }
        result
    }

    fn check(
        &self,
        token: &str,
        expected: TokenKind,
        expiry: ExpiryPolicy,
    ) -> Result<TokenClaims, TokenRejection> {
        // Expiry is checked below against the injected clock, with an exclusive bound.
        let mut validation = Validation::new(self.keys.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let claims = decode::<TokenClaims>(token, &self.keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                _ => TokenRejection::Malformed,
            })?;

        if claims.kind != expected {
            return Err(TokenRejection::WrongKind);
        }

        let now = self.clock.now().timestamp();
        // The issuer's clock may run slightly ahead of ours.
        if claims.iat > now + self.leeway.num_seconds() {
            return Err(TokenRejection::IssuedInFuture);
        }
        if claims.exp <= claims.iat {
            return Err(TokenRejection::Malformed);
        }
        if expiry == ExpiryPolicy::Enforce && now >= claims.exp {
            return Err(TokenRejection::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::generators::{ManualClock, UuidTokenIdGenerator};
    use crate::token::issuer::TokenIssuer;
    use crate::token::repository::InMemoryRefreshTokenRepository;
    use uuid::Uuid;
    use rstest::rstest;

    struct Fixture {
        clock: Arc<ManualClock>,
        issuer: TokenIssuer,
        validator: TokenValidator,
    }

    fn fixture_with_secrets(issuer_secret: &[u8], validator_secret: &[u8]) -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let issuer = TokenIssuer::new(
            Arc::new(SigningKeys::from_secret(issuer_secret)),
            Duration::minutes(15),
            Duration::days(7),
            clock.clone(),
            Arc::new(UuidTokenIdGenerator),
            Arc::new(InMemoryRefreshTokenRepository::new()),
        );
        let validator = TokenValidator::new(
            Arc::new(SigningKeys::from_secret(validator_secret)),
            Duration::seconds(30),
            clock.clone(),
        );
        Fixture {
            clock,
            issuer,
            validator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_secrets(b"validator-test-secret", b"validator-test-secret")
    }

    #[test]
    fn test_access_token_valid_after_issuance() {
        let f = fixture();
        let subject = Uuid::new_v4();
        let pair = f.issuer.mint(subject).unwrap();

        let access = f
            .validator
            .validate(&pair.access.token_string, TokenKind::Access)
            .unwrap();
        assert_eq!(access.sub, subject);
        let claims = f
            .validator
            .validate(&pair.refresh.token_string, TokenKind::Refresh)
            .unwrap();
        assert_eq!(claims.sub, subject);
        assert_eq!(claims.jti, pair.refresh.jti);
    }

    #[rstest]
    #[case(Duration::minutes(15) - Duration::seconds(1), true)]
    #[case(Duration::minutes(15), false)]
    #[case(Duration::minutes(15) + Duration::seconds(1), false)]
    fn test_access_token_expiry_boundary(#[case] elapsed: Duration, #[case] valid: bool) {
        let f = fixture();
        let pair = f.issuer.mint(Uuid::new_v4()).unwrap();

        f.clock.advance(elapsed);

        let result = f.validator.validate(&pair.access.token_string, TokenKind::Access);
        assert_eq!(result.is_ok(), valid);
        if !valid {
            assert_eq!(result.unwrap_err(), TokenRejection::Expired);
        }
    }

    #[test]
    fn test_allow_expired_policy() {
        let f = fixture();
        let pair = f.issuer.mint(Uuid::new_v4()).unwrap();
        f.clock.advance(Duration::hours(1));

        let result = f.validator.validate_with(
            &pair.access.token_string,
            TokenKind::Access,
            ExpiryPolicy::AllowExpired,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let f = fixture();
        let pair = f.issuer.mint(Uuid::new_v4()).unwrap();

        assert_eq!(
            f.validator
                .validate(&pair.refresh.token_string, TokenKind::Access)
                .unwrap_err(),
            TokenRejection::WrongKind
        );
        assert_eq!(
            f.validator
                .validate(&pair.access.token_string, TokenKind::Refresh)
                .unwrap_err(),
            TokenRejection::WrongKind
        );
    }

    #[rstest]
    #[case("")]
    #[case("invalid.token.here")]
    #[case("not-a-jwt")]
    fn test_malformed_rejected(#[case] token: &str) {
        let f = fixture();
        assert_eq!(
            f.validator.validate(token, TokenKind::Access).unwrap_err(),
            TokenRejection::Malformed
        );
    }

    #[test]
    fn test_bad_signature_rejected() {
        let f = fixture_with_secrets(b"issuer-secret", b"other-secret");
        let pair = f.issuer.mint(Uuid::new_v4()).unwrap();

        assert_eq!(
            f.validator
                .validate(&pair.access.token_string, TokenKind::Access)
                .unwrap_err(),
            TokenRejection::BadSignature
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let f = fixture();
        let pair = f.issuer.mint(Uuid::new_v4()).unwrap();
        let other = f.issuer.mint(Uuid::new_v4()).unwrap();

        // Splice another token's payload under this token's signature.
        let parts: Vec<&str> = pair.access.token_string.split('.').collect();
        let other_parts: Vec<&str> = other.access.token_string.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);

        assert_eq!(
            f.validator.validate(&forged, TokenKind::Access).unwrap_err(),
            TokenRejection::BadSignature
        );
    }

    #[test]
    fn test_clock_skew_tolerated_for_issuance() {
        let f = fixture();
        let pair = f.issuer.mint(Uuid::new_v4()).unwrap();

        // Verifier 20s behind the issuer: inside the 30s leeway.
        f.clock.advance(Duration::seconds(-20));
        assert!(f
            .validator
            .validate(&pair.access.token_string, TokenKind::Access)
            .is_ok());

        // 60s behind: outside.
        f.clock.advance(Duration::seconds(-40));
        assert_eq!(
            f.validator
                .validate(&pair.access.token_string, TokenKind::Access)
                .unwrap_err(),
            TokenRejection::IssuedInFuture
        );
    }
}
