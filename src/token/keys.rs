use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

use crate::config::TokenSettings;

/// HMAC key material shared by the issuer and the validator
pub struct SigningKeys {
    pub(super) encoding: EncodingKey,
    pub(super) decoding: DecodingKey,
    pub(super) algorithm: Algorithm,
}

impl SigningKeys {
    pub fn from_settings(settings: &TokenSettings) -> Self {
        Self::from_secret(settings.secret())
    }

    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
        }
    }
}
