use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::{Role, UserModel};
use crate::shared::AppError;

/// Trait for user persistence operations
#[async_trait]
pub trait UserRepository {
    /// Fails with `DuplicateIdentity` if the email is already registered
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserModel>, AppError>;
}

/// In-memory implementation of UserRepository for development and testing
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<Uuid, UserModel>>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current number of users in the repository
    pub fn user_count(&self) -> usize {
        self.users.lock().map(|u| u.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, UserModel>>, AppError> {
        self.users
            .lock()
            .map_err(|_| AppError::DatabaseError("user store poisoned".to_string()))
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self, user))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        debug!(user_id = %user.id, "Creating user in memory");

        // Uniqueness check and insert under one lock.
        let mut users = self.lock()?;
        if users.values().any(|existing| existing.email == user.email) {
            warn!(user_id = %user.id, "Email already registered in memory");
            return Err(AppError::DuplicateIdentity(
                "email is already registered".to_string(),
            ));
        }
        if users.contains_key(&user.id) {
            return Err(AppError::DatabaseError("User already exists".to_string()));
        }
        users.insert(user.id, user.clone());

        debug!(user_id = %user.id, "User created successfully in memory");
        Ok(())
    }

    #[instrument(skip(self, email))]
    async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, AppError> {
        let users = self.lock()?;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserModel>, AppError> {
        Ok(self.lock()?.get(&id).cloned())
    }
}

/// PostgreSQL implementation of the user repository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                last_name TEXT NOT NULL,
                first_name TEXT NOT NULL,
                middle_name TEXT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                passport TEXT NOT NULL,
                inn TEXT NOT NULL,
                snils TEXT NOT NULL,
                birthday DATE NOT NULL,
                role TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create users table");
            AppError::DatabaseError(e.to_string())
        })?;
        Ok(())
    }
}

const SELECT_USER: &str = "SELECT id, last_name, first_name, middle_name, email, password_hash, \
                           passport, inn, snils, birthday, role, created_at FROM users";

fn user_from_row(row: &PgRow) -> Result<UserModel, AppError> {
    let role: String = row.get("role");
    let role = Role::from_str(&role).map_err(|_| {
        warn!(role = %role, "Unknown role stored in database");
        AppError::DatabaseError(format!("unknown role: {role}"))
    })?;

    Ok(UserModel {
        id: row.get("id"),
        last_name: row.get("last_name"),
        first_name: row.get("first_name"),
        middle_name: row.get("middle_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        passport: row.get("passport"),
        inn: row.get("inn"),
        snils: row.get("snils"),
        birthday: row.get("birthday"),
        role,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        debug!(user_id = %user.id, "Creating user in database");

        sqlx::query(
            "INSERT INTO users (id, last_name, first_name, middle_name, email, password_hash, \
             passport, inn, snils, birthday, role, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(user.id)
        .bind(&user.last_name)
        .bind(&user.first_name)
        .bind(&user.middle_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.passport)
        .bind(&user.inn)
        .bind(&user.snils)
        .bind(user.birthday)
        .bind(user.role.to_string())
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                warn!(user_id = %user.id, "Email already registered in database");
                AppError::DuplicateIdentity("email is already registered".to_string())
            }
            _ => {
                warn!(error = %e, "Failed to create user in database");
                AppError::DatabaseError(e.to_string())
            }
        })?;

        debug!(user_id = %user.id, "User created successfully in database");
        Ok(())
    }

    #[instrument(skip(self, email))]
    async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, AppError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch user by email");
                AppError::DatabaseError(e.to_string())
            })?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserModel>, AppError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, user_id = %id, "Failed to fetch user by id");
                AppError::DatabaseError(e.to_string())
            })?;

        row.as_ref().map(user_from_row).transpose()
    }
}
