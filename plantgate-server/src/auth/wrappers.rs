//! Inline authentication for individual handlers
//!
//! Where a route needs the caller's profile or tenant context rather than
//! just a pass/fail gate, the handler body runs inside one of these
//! wrappers. Authentication happens once, the business closure receives the
//! resolved identity, and every outcome ends up in an [`ApiResponse`].

use super::AuthState;
use crate::core::{AdminRoleKind, AuthError, AuthResult, Profile, UserContext};
use crate::protocol::ApiResponse;
use axum::http::HeaderMap;
use serde::Serialize;
use std::future::Future;
use tracing::{error, warn};

async fn authenticate(state: &AuthState, headers: &HeaderMap) -> Result<AuthResult, AuthError> {
    let token = state.tokens.extract(headers)?;
    state.service.authenticate(&token).await
}

async fn load_profile(state: &AuthState, user_id: &str) -> Result<Profile, AuthError> {
    state
        .service
        .profile(user_id)
        .await?
        .ok_or_else(|| AuthError::NotFound("Profile not found".to_string()))
}

/// Map a handler outcome onto the envelope
fn finish<T>(outcome: anyhow::Result<T>) -> ApiResponse<T> {
    match outcome {
        Ok(data) => ApiResponse::ok(data),
        Err(err) => match err.downcast::<AuthError>() {
            Ok(auth_err) => {
                warn!("Handler rejected request: {}", auth_err);
                auth_err.into()
            }
            Err(err) => {
                error!("Handler failed: {:#}", err);
                ApiResponse::internal(err.to_string())
            }
        },
    }
}

fn reject<T>(err: AuthError) -> ApiResponse<T> {
    warn!("Wrapped route rejected request: {}", err);
    err.into()
}

/// Run `handler` with the caller's profile
pub async fn with_user_auth<T, F, Fut>(
    state: &AuthState,
    headers: &HeaderMap,
    handler: F,
) -> ApiResponse<T>
where
    T: Serialize,
    F: FnOnce(Profile) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let state = state.scoped();

    let auth = match authenticate(&state, headers).await {
        Ok(auth) => auth,
        Err(err) => return reject(err),
    };

    match load_profile(&state, &auth.user.id).await {
        Ok(profile) => finish(handler(profile).await),
        Err(err) => reject(err),
    }
}

/// Run `handler` with the caller's profile once an admin grant is confirmed
///
/// Without `required_role` any grant qualifies; with `plant_id` the grant
/// must be global or scoped to that plant.
pub async fn with_admin_auth<T, F, Fut>(
    state: &AuthState,
    headers: &HeaderMap,
    required_role: Option<AdminRoleKind>,
    plant_id: Option<&str>,
    handler: F,
) -> ApiResponse<T>
where
    T: Serialize,
    F: FnOnce(Profile) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let state = state.scoped();

    let auth = match authenticate(&state, headers).await {
        Ok(auth) => auth,
        Err(err) => return reject(err),
    };

    if !state
        .service
        .has_admin_role(&auth.user.id, required_role, plant_id)
        .await
    {
        return reject(AuthError::Authorization("Admin access required".to_string()));
    }

    match load_profile(&state, &auth.user.id).await {
        Ok(profile) => finish(handler(profile).await),
        Err(err) => reject(err),
    }
}

/// Run `handler` with the caller's tenant context
pub async fn with_context_auth<T, F, Fut>(
    state: &AuthState,
    headers: &HeaderMap,
    handler: F,
) -> ApiResponse<T>
where
    T: Serialize,
    F: FnOnce(UserContext) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let state = state.scoped();

    let auth = match authenticate(&state, headers).await {
        Ok(auth) => auth,
        Err(err) => return reject(err),
    };

    let context = match state.service.get_user_context(&auth.user.id).await {
        Ok(Some(context)) => context,
        Ok(None) => return reject(AuthError::NotFound("User context not found".to_string())),
        Err(err) => return reject(err),
    };

    finish(handler(context).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use crate::config::AuthConfig;
    use crate::core::AdminRole;
    use crate::store::MemoryIdentityStore;
    use axum::http::{HeaderValue, StatusCode};
    use std::sync::Arc;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    fn state() -> (MemoryIdentityStore, AuthState) {
        let store = MemoryIdentityStore::new();
        store
            .add_plant("P1", true)
            .add_plant("P2", true)
            .add_user("pm", "pm@example.com", "tok-pm")
            .add_profile(Profile {
                id: "pm".to_string(),
                email: Some("pm@example.com".to_string()),
                first_name: Some("Pat".to_string()),
                last_name: Some("Morgan".to_string()),
                plant_id: Some("P1".to_string()),
                job_title: None,
            })
            .grant("pm", AdminRole::scoped(AdminRoleKind::PlantManager, "P1"))
            .add_user("ghost", "ghost@example.com", "tok-ghost");

        let state = AuthState::new(
            AuthService::new(Arc::new(store.clone())),
            &AuthConfig::default(),
        );
        (store, state)
    }

    #[tokio::test]
    async fn test_user_auth_passes_profile() {
        let (_, state) = state();
        let response = with_user_auth(&state, &bearer("tok-pm"), |profile| async move {
            Ok(profile.first_name)
        })
        .await;

        assert!(response.success);
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.data, Some(Some("Pat".to_string())));
    }

    #[tokio::test]
    async fn test_user_auth_without_token() {
        let (store, state) = state();
        let response =
            with_user_auth(&state, &HeaderMap::new(), |_| async { Ok(()) }).await;

        assert!(!response.success);
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_500() {
        let (_, state) = state();
        let response: ApiResponse<()> =
            with_user_auth(&state, &bearer("tok-pm"), |_| async {
                Err(anyhow::anyhow!("enrollment table unavailable"))
            })
            .await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.error.as_deref(), Some("Internal server error"));
        assert_eq!(
            response.message.as_deref(),
            Some("enrollment table unavailable")
        );
    }

    #[tokio::test]
    async fn test_handler_auth_error_keeps_status() {
        let (_, state) = state();
        let response: ApiResponse<()> =
            with_user_auth(&state, &bearer("tok-pm"), |_| async {
                Err(AuthError::TenantAccess("plant P2".to_string()).into())
            })
            .await;

        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_auth_plant_matching() {
        let (_, state) = state();
        let pm = Some(AdminRoleKind::PlantManager);

        let ok = with_admin_auth(&state, &bearer("tok-pm"), pm, Some("P1"), |p| async move {
            Ok(p.id)
        })
        .await;
        assert_eq!(ok.data.as_deref(), Some("pm"));

        let denied: ApiResponse<String> =
            with_admin_auth(&state, &bearer("tok-pm"), pm, Some("P2"), |p| async move {
                Ok(p.id)
            })
            .await;
        assert_eq!(denied.status, StatusCode::FORBIDDEN);
        assert_eq!(denied.error.as_deref(), Some("Insufficient permissions: Admin access required"));
    }

    #[tokio::test]
    async fn test_context_auth() {
        let (_, state) = state();
        let response = with_context_auth(&state, &bearer("tok-pm"), |ctx| async move {
            Ok(ctx.accessible_plants)
        })
        .await;
        assert_eq!(response.data, Some(vec!["P1".to_string()]));

        // ghost has a session but no profile: authentication itself fails
        let response = with_context_auth(&state, &bearer("tok-ghost"), |ctx| async move {
            Ok(ctx.user_id)
        })
        .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrapper_reuses_lookups() {
        let (store, state) = state();
        with_admin_auth(&state, &bearer("tok-pm"), None, None, |_| async { Ok(()) }).await;

        // user, profile, admin_roles
        assert_eq!(store.calls(), 3);
    }
}
