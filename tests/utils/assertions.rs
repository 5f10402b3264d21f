use axum::http::StatusCode;

use super::actions::TestResponse;

// ============================================================================
// Response Assertions
// ============================================================================

impl TestResponse {
    /// Asserts a 200 with the success envelope
    pub fn assert_ok(&self) -> &Self {
        assert_eq!(self.status, StatusCode::OK, "unexpected body: {}", self.body);
        assert_eq!(self.body["status"], "ok");
        self
    }

    /// Asserts a failure with the given status and error category
    pub fn assert_error(&self, status: StatusCode, category: &str) -> &Self {
        assert_eq!(self.status, status, "unexpected body: {}", self.body);
        assert_eq!(self.body["error"], category, "unexpected body: {}", self.body);
        assert!(self.body["text"].is_string());
        self
    }

    pub fn assert_no_password(&self) -> &Self {
        let data = &self.body["data"];
        assert!(data.get("password").is_none());
        assert!(data.get("password_hash").is_none());
        self
    }
}
