// Library crate for the token pair authentication service
// This file exposes the public API for the binary and integration tests

pub mod app;
pub mod config;
pub mod shared;
pub mod token;
pub mod transport;
pub mod user;

// Re-export commonly used types for easier access in tests
pub use app::build_router;
pub use config::AppConfig;
pub use shared::{AppError, AppState};
pub use token::{TokenIssuer, TokenKind, TokenPair, TokenValidator};
pub use transport::ApiResponse;
