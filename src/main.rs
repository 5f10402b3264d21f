use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenpair::{
    build_router,
    config::AppConfig,
    token::{
        cleanup_task::{start_cleanup_task, CleanupConfig},
        generators::{Clock, SystemClock},
        repository::{
            InMemoryRefreshTokenRepository, PostgresRefreshTokenRepository,
            RefreshTokenRepository,
        },
    },
    user::repository::{InMemoryUserRepository, PostgresUserRepository, UserRepository},
    AppState,
};

type Repositories = (
    Arc<dyn UserRepository + Send + Sync>,
    Arc<dyn RefreshTokenRepository + Send + Sync>,
);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokenpair=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting token pair authentication service");

    let config = AppConfig::from_env()?;
    let (user_repository, refresh_token_repository) = repositories(&config).await?;

    let app_state = AppState::new(
        &config.tokens,
        config.cookie.clone(),
        user_repository,
        Arc::clone(&refresh_token_repository),
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    tokio::spawn(start_cleanup_task(
        refresh_token_repository,
        clock,
        CleanupConfig {
            cleanup_interval: config.server.cleanup_interval,
        },
    ));

    let app = build_router(app_state, &config.server.cors_allowed_origin);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr).await?;
    info!(addr = %config.server.bind_addr, "Server running");
    axum::serve(listener, app).await?;
    Ok(())
}

/// PostgreSQL when DATABASE_URL is set, in-memory otherwise
async fn repositories(config: &AppConfig) -> Result<Repositories, Box<dyn std::error::Error>> {
    match &config.server.database_url {
        Some(database_url) => {
            let pool = sqlx::PgPool::connect(database_url).await?;

            let users = PostgresUserRepository::new(pool.clone());
            users.ensure_schema().await?;
            let refresh_tokens = PostgresRefreshTokenRepository::new(pool);
            refresh_tokens.ensure_schema().await?;

            info!("Using PostgreSQL repositories");
            Ok((Arc::new(users), Arc::new(refresh_tokens)))
        }
        None => {
            info!("DATABASE_URL not set, using in-memory repositories");
            Ok((
                Arc::new(InMemoryUserRepository::new()),
                Arc::new(InMemoryRefreshTokenRepository::new()),
            ))
        }
    }
}
