//! Axum extractors for identity placed on the request by [`enforce`]
//!
//! [`enforce`]: super::enforce

use super::middleware::{
    ACCESSIBLE_PLANTS_HEADER, USER_ID_HEADER, USER_PLANT_HEADER, USER_ROLE_HEADER,
};
use crate::core::{AuthError, AuthResult, UserContext, UserRole};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};
use serde::Serialize;

/// Extract AuthResult from request extensions
///
/// Present on every route behind a guard. A missing value means the guard
/// was not installed, which is reported as an internal error.
pub struct AuthResultExtractor(pub AuthResult);

impl<S> FromRequestParts<S> for AuthResultExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthResult>()
            .cloned()
            .map(Self)
            .ok_or_else(|| AuthError::Internal("AuthResult not found in request extensions".into()))
    }
}

/// Extract UserContext from request extensions (plant-scoped guards only)
pub struct UserContextExtractor(pub UserContext);

impl<S> FromRequestParts<S> for UserContextExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserContext>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                AuthError::Internal("UserContext not found in request extensions".into())
            })
    }
}

/// Identity as published in the `x-user-*` request headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityHeaders {
    pub user_id: String,
    pub role: UserRole,
    pub plant_id: Option<String>,
    pub accessible_plants: Option<Vec<String>>,
}

impl IdentityHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let user_id = text(USER_ID_HEADER)
            .ok_or_else(|| AuthError::authentication("identity headers missing"))?
            .to_string();
        let role = text(USER_ROLE_HEADER)
            .ok_or_else(|| AuthError::authentication("identity headers missing"))?
            .parse::<UserRole>()
            .map_err(AuthError::InvalidRequest)?;
        let accessible_plants = text(ACCESSIBLE_PLANTS_HEADER)
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()
            .map_err(|e| AuthError::InvalidRequest(format!("{}: {}", ACCESSIBLE_PLANTS_HEADER, e)))?;

        Ok(Self {
            user_id,
            role,
            plant_id: text(USER_PLANT_HEADER).map(str::to_string),
            accessible_plants,
        })
    }
}

impl<S> FromRequestParts<S> for IdentityHeaders
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}
