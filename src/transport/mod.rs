// HTTP transport glue shared by all handlers
pub mod cookie;
pub mod extract;

pub use cookie::{clear_refresh_cookie, refresh_cookie, RefreshCookie, REFRESH_COOKIE_NAME};
pub use extract::{Validate, ValidatedJson};

use serde::{Deserialize, Serialize};

/// Envelope of every successful response: `{"status": "ok", "data": ...}`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "ok".to_string(),
            data,
        }
    }
}
