use crate::core::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Standard JSON envelope returned by wrapped routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation succeeded
    pub success: bool,
    /// Response payload (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error summary (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// HTTP status the envelope is sent with
    #[serde(skip)]
    pub status: StatusCode,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            status: StatusCode::OK,
        }
    }

    /// Create an error response
    pub fn fail(status: StatusCode, error: impl Into<String>, message: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            message,
            status,
        }
    }

    /// Unexpected failure; the original message travels in `message`
    pub fn internal(message: impl Into<String>) -> Self {
        Self::fail(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            Some(message.into()),
        )
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> From<AuthError> for ApiResponse<T> {
    fn from(err: AuthError) -> Self {
        Self::fail(err.status_code(), err.to_string(), None)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let response = ApiResponse::ok(json!({"id": "u1"})).with_message("loaded");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "data": {"id": "u1"}, "message": "loaded"})
        );
    }

    #[test]
    fn test_internal_shape() {
        let response: ApiResponse<()> = ApiResponse::internal("db exploded");
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "error": "Internal server error",
                "message": "db exploded"
            })
        );
    }

    #[test]
    fn test_from_auth_error() {
        let response: ApiResponse<()> = AuthError::TenantAccess("P2".into()).into();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert!(!response.success);
    }
}
