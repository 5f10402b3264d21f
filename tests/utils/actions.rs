use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        HeaderMap, Request, StatusCode,
    },
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use super::setup::{TestApp, TEST_PASSWORD};

/// Status, headers and parsed JSON body of one response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn set_cookie(&self) -> Option<String> {
        self.headers
            .get(SET_COOKIE)
            .map(|value| value.to_str().unwrap().to_string())
    }

    pub fn data_str(&self, field: &str) -> String {
        self.body["data"][field]
            .as_str()
            .unwrap_or_else(|| panic!("missing string field data.{field} in {}", self.body))
            .to_string()
    }
}

// ============================================================================
// Action Helpers
// ============================================================================

impl TestApp {
    /// Send a request through the full router
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    pub async fn register(&self, email: &str) -> TestResponse {
        self.post_json(
            "/register",
            json!({
                "last_name": "Liddell",
                "first_name": "Alice",
                "middle_name": "Pleasance",
                "email": email,
                "password": TEST_PASSWORD,
                "passport": "4510 123456",
                "inn": "500100732259",
                "snils": "112-233-445 95",
                "birthday": "1990-05-04",
                "role": "user"
            }),
        )
        .await
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> TestResponse {
        self.post_json("/auth", json!({ "email": email, "password": password }))
            .await
    }

    /// Register then authenticate, returning the `/auth` response
    pub async fn sign_up_and_login(&self, email: &str) -> TestResponse {
        self.register(email).await.assert_ok();
        let response = self.authenticate(email, TEST_PASSWORD).await;
        response.assert_ok();
        response
    }

    pub async fn renew(&self, access_token: &str, refresh_token: Option<&str>) -> TestResponse {
        let mut request = Request::builder()
            .method("GET")
            .uri("/update_access_token")
            .header(AUTHORIZATION, format!("Bearer {access_token}"));
        if let Some(refresh_token) = refresh_token {
            request = request.header(COOKIE, format!("theme=dark; refresh_token={refresh_token}"));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn me(&self, access_token: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("GET")
                .uri("/me")
                .header(AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn logout(&self, access_token: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/logout")
                .header(AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn diagnostic(&self) -> TestResponse {
        self.send(Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
    }
}
