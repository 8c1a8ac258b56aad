//! Unified error handling with the `success` response envelope.

use std::sync::OnceLock;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Set once at startup; error detail is only attached to 500s when true.
static EXPOSE_DETAILS: OnceLock<bool> = OnceLock::new();

/// Allow internal error detail in responses (development environments only).
pub fn expose_error_details(enabled: bool) {
    let _ = EXPOSE_DETAILS.set(enabled);
}

fn details_exposed() -> bool {
    EXPOSE_DETAILS.get().copied().unwrap_or(false)
}

/// Error detail in the API response envelope.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A single failed input constraint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Consistent JSON envelope for all API responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wrap a successful result in the envelope.
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            errors: None,
        })
    }

    /// Wrap a successful result together with a human-readable message.
    pub fn with_message(data: T, message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message.to_string()),
            data: Some(data),
            error: None,
            errors: None,
        })
    }

    /// Wrap an error in the envelope.
    pub fn error(code: &str, message: &str) -> Json<Self> {
        Json(Self {
            success: false,
            message: Some(message.to_string()),
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
                detail: None,
            }),
            errors: None,
        })
    }
}

/// Application error type mapping to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation failed")]
    InvalidInput(Vec<FieldError>),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Check if this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{field} is invalid")),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::InvalidInput(fields)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut field_errors = None;
        let mut detail = None;

        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::InvalidInput(errors) => {
                field_errors = Some(errors.clone());
                (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    "Validation failed".to_string(),
                )
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Access token required".to_string(),
            ),
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Token expired".to_string(),
            ),
            AppError::InvalidToken => (
                StatusCode::FORBIDDEN,
                "INVALID_TOKEN",
                "Invalid token".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                if details_exposed() {
                    detail = Some(format!("{e:?}"));
                }
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                if details_exposed() {
                    detail = Some(msg.clone());
                }
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()> {
            success: false,
            message: Some(message.clone()),
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message,
                detail,
            }),
            errors: field_errors,
        };

        (status, Json(body)).into_response()
    }
}

/// Fallback for unmatched routes.
pub async fn route_not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        ApiResponse::error("NOT_FOUND", "Route not found"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn api_response_success() {
        let response = ApiResponse::success("hello");
        let json = serde_json::to_value(&response.0).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "hello");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn api_response_error() {
        let response = ApiResponse::<()>::error("NOT_FOUND", "Item not found");
        let json = serde_json::to_value(&response.0).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Item not found");
    }

    #[test]
    fn app_error_is_not_found() {
        let err = AppError::NotFound("application".to_string());
        assert!(err.is_not_found());
        assert!(!AppError::TokenExpired.is_not_found());
    }

    #[test]
    fn app_error_display() {
        let err = AppError::Validation("notes are required".to_string());
        assert_eq!(err.to_string(), "Validation error: notes are required");
    }

    #[test]
    fn app_error_from_sqlx() {
        let sqlx_err = sqlx::Error::RowNotFound;
        let err: AppError = sqlx_err.into();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::InvalidToken.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::TokenExpired.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidInput(vec![]).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[derive(Validate)]
    struct Contact {
        #[validate(email(message = "Valid email is required"))]
        email: String,
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
    }

    #[test]
    fn validation_errors_become_field_list() {
        let contact = Contact {
            email: "nope".to_string(),
            name: String::new(),
        };
        let err: AppError = contact.validate().unwrap_err().into();
        match err {
            AppError::InvalidInput(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].field, "email");
                assert_eq!(fields[0].message, "Valid email is required");
                assert_eq!(fields[1].field, "name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
