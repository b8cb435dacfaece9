use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::database::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Batch of {count} ad ids exceeds the limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            AppError::BatchTooLarge { .. } => "BATCH_TOO_LARGE",
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        AppError::InternalError(Box::new(error))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload { .. } | AppError::BatchTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({
            "success": false,
            "code": self.code(),
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let malformed = AppError::MalformedPayload("adId is required".to_string());
        assert_eq!(malformed.into_response().status(), StatusCode::BAD_REQUEST);

        let too_large = AppError::BatchTooLarge {
            count: 101,
            limit: 100,
        };
        assert_eq!(too_large.code(), "BATCH_TOO_LARGE");
        assert_eq!(too_large.into_response().status(), StatusCode::BAD_REQUEST);

        let internal = AppError::from(StoreError::Rejected {
            table: "wallet_topups",
            status: 503,
            body: String::new(),
        });
        assert_eq!(
            internal.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
