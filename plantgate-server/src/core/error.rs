use crate::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Authentication and authorization failures raised by every layer of the gate
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable bearer token on the request
    #[error("Authentication required")]
    MissingToken,

    /// Token rejected, identity lookup failed, or profile missing
    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        #[source]
        source: Option<StoreError>,
    },

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Identity resolved but lacks the required role or permission
    #[error("Insufficient permissions: {0}")]
    Authorization(String),

    /// Identity resolved but the requested plant is outside its scope
    #[error("Plant access denied: {0}")]
    TenantAccess(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Identity store could not answer a strict check
    #[error("Identity lookup failed: {0}")]
    Lookup(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Authentication failure with a message and no underlying cause
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// Authentication failure caused by the identity store
    pub fn authentication_from(message: impl Into<String>, source: StoreError) -> Self {
        Self::Authentication {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken
            | Self::Authentication { .. }
            | Self::TokenExpired
            | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) | Self::TenantAccess(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Lookup(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code carried in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "AUTH_REQUIRED",
            Self::Authentication { .. } => "AUTH_FAILED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidToken(_) => "TOKEN_INVALID",
            Self::Authorization(_) => "AUTH_INSUFFICIENT",
            Self::TenantAccess(_) => "TENANT_ACCESS_DENIED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Lookup(_) => "LOOKUP_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for every kind that maps to 401
    pub fn is_authentication(&self) -> bool {
        self.status_code() == StatusCode::UNAUTHORIZED
    }
}

/// Implement IntoResponse for Axum integration
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for gate operations
pub type Result<T> = std::result::Result<T, AuthError>;
