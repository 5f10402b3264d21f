// Public API - what other modules can use
pub use handlers::{logout, update_access_token};
pub use issuer::TokenIssuer;
pub use middleware::{require_access_token, require_session, AccessContext};
pub use renewal::SessionRenewal;
pub use types::{Token, TokenClaims, TokenKind, TokenPair};
pub use validator::{TokenRejection, TokenValidator};

pub mod cleanup_task;
pub mod generators;
mod handlers;
pub mod issuer;
pub mod keys;
mod middleware;
pub mod models;
pub mod renewal;
pub mod repository;
pub mod types;
pub mod validator;
