// Public API - what other modules can use
pub use handlers::{authenticate, me, register};
pub use models::{Role, UserModel};
pub use service::UserService;

// Internal modules
mod handlers;
pub mod models;
mod password;
pub mod repository;
pub mod service;
pub mod types;
