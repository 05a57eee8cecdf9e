//! Response envelope and error mapping.
//!
//! Every response carries `success` and a human-readable `message`;
//! validation failures additionally enumerate per-field issues. Domain
//! errors from the service layer are converted here so handlers can
//! use `?` throughout.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::accounts::AccountError;
use crate::lifecycle::{FieldIssue, LifecycleError};
use crate::promotion::PromotionError;
use crate::storage::StorageError;

/// The `{ success, message, ... }` body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Envelope {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Map::new(),
        }
    }

    /// Attach a named payload field.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.to_string(), value);
        self
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug)]
pub enum ApiError {
    Auth(String),
    Conflict(String),
    Forbidden(String),
    Internal(String),
    NotFound(String),
    Validation {
        message: String,
        issues: Vec<FieldIssue>,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Validation { message, issues } if !issues.is_empty() => {
                json!({ "success": false, "message": message, "errors": issues })
            }
            ApiError::Internal(detail) => {
                // Log the detail; the caller gets a generic message.
                tracing::error!(error = %detail, "Internal error");
                json!({ "success": false, "message": "Internal server error" })
            }
            ApiError::Auth(message)
            | ApiError::Conflict(message)
            | ApiError::Forbidden(message)
            | ApiError::NotFound(message)
            | ApiError::Validation { message, .. } => {
                json!({ "success": false, "message": message })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Blob(e) => ApiError::Internal(e.to_string()),
            LifecycleError::Conflict(m) => ApiError::Conflict(m),
            LifecycleError::Forbidden(m) => ApiError::Forbidden(m),
            LifecycleError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            LifecycleError::Storage(e) => ApiError::Internal(e.to_string()),
            LifecycleError::Validation(issues) => ApiError::Validation {
                message: "Validation failed".to_string(),
                issues,
            },
        }
    }
}

impl From<PromotionError> for ApiError {
    fn from(e: PromotionError) -> Self {
        match e {
            PromotionError::Conflict(m) => ApiError::Conflict(m),
            PromotionError::NotFound => ApiError::NotFound("User not found".to_string()),
            PromotionError::Storage(e) => ApiError::Internal(e.to_string()),
            PromotionError::Validation(m) => ApiError::validation(m),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::AccountDeactivated => ApiError::Forbidden(e.to_string()),
            AccountError::Conflict(m) => ApiError::Conflict(m),
            AccountError::EmailNotVerified => ApiError::Forbidden(e.to_string()),
            AccountError::Forbidden(m) => ApiError::Forbidden(m),
            AccountError::InvalidCredentials => ApiError::Auth(e.to_string()),
            AccountError::InvalidOtp => ApiError::validation(e.to_string()),
            // A dead refresh token means the session cannot be revived;
            // only a new login can.
            AccountError::InvalidSession => ApiError::Forbidden(e.to_string()),
            AccountError::NotFound => ApiError::NotFound(e.to_string()),
            AccountError::Password(e) => ApiError::Internal(e.to_string()),
            AccountError::Storage(e) => ApiError::Internal(e.to_string()),
            AccountError::Token(e) => ApiError::Internal(e.to_string()),
            AccountError::Validation(m) => ApiError::validation(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_flattens_payload() {
        let body =
            serde_json::to_value(Envelope::ok("Fetched").with("count", 3)).unwrap();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("Fetched"));
        assert_eq!(body["count"], json!(3));
    }

    #[test]
    fn dead_refresh_session_is_forbidden() {
        let err: ApiError = AccountError::InvalidSession.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn validation_error_carries_issues() {
        let err = ApiError::Validation {
            message: "Validation failed".to_string(),
            issues: vec![FieldIssue {
                field: "title",
                message: "too short".to_string(),
            }],
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
