use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::shared::AppError;

/// Field-level checks run after a request body is decoded
pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;
}

/// JSON body that decoded and passed [`Validate`]. Any failure becomes `AppError::Validation`
/// so malformed input gets the same error shape as every other failure.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            debug!(error = %rejection.body_text(), "Failed to decode request body");
            AppError::Validation(rejection.body_text())
        })?;

        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header::CONTENT_TYPE};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    impl Validate for Named {
        fn validate(&self) -> Result<(), AppError> {
            if self.name.is_empty() {
                return Err(AppError::Validation("name must not be empty".to_string()));
            }
            Ok(())
        }
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let ValidatedJson(named) =
            ValidatedJson::<Named>::from_request(json_request(r#"{"name":"alice"}"#), &())
                .await
                .unwrap();
        assert_eq!(named.name, "alice");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let result = ValidatedJson::<Named>::from_request(json_request("{"), &()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_failed_validation() {
        let result =
            ValidatedJson::<Named>::from_request(json_request(r#"{"name":""}"#), &()).await;
        assert!(matches!(result, Err(AppError::Validation(msg)) if msg.contains("empty")));
    }
}
