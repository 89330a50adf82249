// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("BSON error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("Transaction not found")]
    TransactionNotFound,

    #[error("Invoice not found")]
    InvoiceNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed webhook payload: {0}")]
    MalformedWebhook(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MongoDB(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Bson(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::TransactionNotFound => {
                (StatusCode::NOT_FOUND, "Transaction not found".to_string())
            }
            AppError::InvoiceNotFound => {
                (StatusCode::NOT_FOUND, "Invoice not found".to_string())
            }
            AppError::ValidationError(_) => {
                (StatusCode::BAD_REQUEST, "Validation failed".to_string())
            }
            AppError::GatewayError(_) => {
                (StatusCode::BAD_GATEWAY, "Payment gateway error".to_string())
            }
            AppError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "Invalid webhook signature".to_string())
            }
            AppError::MalformedWebhook(_) => {
                (StatusCode::BAD_REQUEST, "Malformed webhook payload".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string(),
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

// Manual From implementations
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(format!("JSON parsing error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::GatewayError(format!("HTTP request failed: {}", err))
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::GatewayError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn response_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn unknown_transaction_is_a_full_not_found_envelope() {
        let (status, body) = response_json(AppError::TransactionNotFound).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Transaction not found");
        assert_eq!(body["success"], false);
        // Complete envelope, never a partial record
        assert!(body["message"].is_string());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn bad_webhook_signature_is_unauthorized() {
        let (status, body) = response_json(AppError::InvalidSignature).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid webhook signature");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn gateway_failures_map_to_a_generic_bad_gateway() {
        let (status, body) =
            response_json(AppError::gateway("Link fetch failed: 500")).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Payment gateway error");
    }
}
