use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    models::{normalize_email, UserModel},
    password,
    repository::UserRepository,
    types::{AuthRequest, RegisterRequest},
};
use crate::shared::AppError;
use crate::token::{TokenIssuer, TokenPair};

/// Credential checks, registration and authentication
pub struct UserService {
    repository: Arc<dyn UserRepository + Send + Sync>,
    issuer: Arc<TokenIssuer>,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository + Send + Sync>,
        issuer: Arc<TokenIssuer>,
    ) -> Self {
        Self { repository, issuer }
    }

    /// Returns the user owning `email` if `candidate` is their password.
    ///
    /// Unknown email and wrong password fail identically, and take comparable time.
    #[instrument(skip(self, email, candidate))]
    pub async fn verify_credentials(
        &self,
        email: &str,
        candidate: &str,
    ) -> Result<UserModel, AppError> {
        let user = self.repository.find_by_email(&normalize_email(email)).await?;
        let candidate = candidate.to_owned();

        let verified = match user {
            Some(user) => {
                let hash = user.password_hash.clone();
                let matches =
                    blocking(move || password::verify_password(&candidate, &hash)).await?;
                matches.then_some(user)
            }
            None => {
                blocking(move || password::verify_against_dummy(&candidate)).await?;
                None
            }
        };

        verified.ok_or_else(|| {
            warn!("Credential verification failed");
            AppError::InvalidCredentials
        })
    }

    /// Persists a new user from a validated registration request
    #[instrument(skip(self, request))]
    pub async fn create_user(&self, request: RegisterRequest) -> Result<UserModel, AppError> {
        let plaintext = request.password;
        let password_hash = blocking(move || password::hash_password(&plaintext)).await??;

        let user = UserModel {
            id: Uuid::new_v4(),
            last_name: request.last_name.trim().to_string(),
            first_name: request.first_name.trim().to_string(),
            middle_name: request
                .middle_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            email: normalize_email(&request.email),
            password_hash,
            passport: request.passport.trim().to_string(),
            inn: request.inn.trim().to_string(),
            snils: request.snils.trim().to_string(),
            birthday: request.birthday,
            role: request.role,
            created_at: Utc::now(),
        };

        self.repository.create_user(&user).await?;
        Ok(user)
    }

    /// Verifies credentials and issues a token pair for the user
    #[instrument(skip(self, request))]
    pub async fn authenticate(
        &self,
        request: AuthRequest,
    ) -> Result<(UserModel, TokenPair), AppError> {
        let user = self
            .verify_credentials(&request.email, &request.password)
            .await?;
        let pair = self.issuer.issue(user.id).await?;

        info!(user_id = %user.id, "User authenticated");
        Ok((user, pair))
    }

    /// Registers a user. Does not issue tokens; the client authenticates separately.
    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserModel, AppError> {
        let user = self.create_user(request).await?;
        info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> Result<UserModel, AppError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))
    }
}

// Argon2 is CPU-bound; keep it off the async workers.
async fn blocking<F, T>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        warn!(error = %e, "Blocking password task failed");
        AppError::Internal
    })
}
