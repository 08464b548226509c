use crate::auth::{
    AuthResultExtractor, AuthService, AuthState, IdentityHeaders, UserContextExtractor,
    with_admin_auth, with_context_auth, with_user_auth,
};
use crate::core::{AdminRoleKind, AuthError, AuthUser, Permission, Profile, TokenPair, UserContext};
use crate::protocol::ApiResponse;
use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthState,
}

impl AppState {
    pub fn new(auth: AuthState) -> Self {
        Self { auth }
    }
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "plantgate",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// POST /auth/refresh
pub async fn refresh_session(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResponse<TokenPair> {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => return AuthError::InvalidRequest(rejection.body_text()).into(),
    };
    if req.refresh_token.trim().is_empty() {
        return AuthError::InvalidRequest("refresh_token is required".to_string()).into();
    }

    match state.auth.service.refresh_token(&req.refresh_token).await {
        Ok(pair) => ApiResponse::ok(pair),
        Err(err) => err.into(),
    }
}

/// GET /api/me
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse<Profile> {
    with_user_auth(&state.auth, &headers, |profile| async move { Ok(profile) }).await
}

/// GET /api/me/context
pub async fn me_context(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse<UserContext> {
    with_context_auth(&state.auth, &headers, |context| async move { Ok(context) }).await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    #[serde(flatten)]
    pub identity: IdentityHeaders,
    pub permissions: Vec<Permission>,
}

/// GET /api/me/identity
///
/// Reads what the guard published in the identity headers, as a proxied
/// service behind the gate would.
pub async fn me_identity(
    identity: IdentityHeaders,
    AuthResultExtractor(auth): AuthResultExtractor,
) -> ApiResponse<IdentityView> {
    ApiResponse::ok(IdentityView {
        identity,
        permissions: auth.user.permissions,
    })
}

/// Guarded routes that only echo the caller back
pub async fn caller(AuthResultExtractor(auth): AuthResultExtractor) -> ApiResponse<AuthUser> {
    ApiResponse::ok(auth.user)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantsOverview {
    pub user_id: String,
    pub plants: Vec<String>,
}

/// GET /api/admin/plants
pub async fn admin_plants(
    AuthResultExtractor(auth): AuthResultExtractor,
    Extension(service): Extension<AuthService>,
) -> ApiResponse<PlantsOverview> {
    let user_id = auth.user.id;
    let plants = async {
        let roles = service.admin_roles(&user_id).await?;
        service.get_accessible_plants(&user_id, &roles).await
    }
    .await;

    match plants {
        Ok(plants) => ApiResponse::ok(PlantsOverview { user_id, plants }),
        Err(err) => err.into(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantView {
    pub plant_id: String,
    pub user_id: String,
    pub home_plant: bool,
    pub accessible_plants: Vec<String>,
}

/// Plant-scoped routes
pub async fn plant_view(
    Path(plant_id): Path<String>,
    UserContextExtractor(context): UserContextExtractor,
) -> ApiResponse<PlantView> {
    ApiResponse::ok(PlantView {
        home_plant: context.is_home_plant(&plant_id),
        plant_id,
        user_id: context.user_id,
        accessible_plants: context.accessible_plants,
    })
}

#[derive(Debug, Deserialize)]
pub struct AdminCheckQuery {
    pub role: Option<String>,
    pub plant_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCheck {
    pub user_id: String,
    pub role: Option<AdminRoleKind>,
    pub plant_id: Option<String>,
}

/// GET /api/admin/check
pub async fn admin_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminCheckQuery>,
) -> ApiResponse<AdminCheck> {
    let role = match query.role.as_deref().map(str::parse::<AdminRoleKind>).transpose() {
        Ok(role) => role,
        Err(msg) => return AuthError::InvalidRequest(msg).into(),
    };
    let plant_id = query.plant_id;
    let echoed = plant_id.clone();

    with_admin_auth(
        &state.auth,
        &headers,
        role,
        plant_id.as_deref(),
        |profile| async move {
            Ok(AdminCheck {
                user_id: profile.id,
                role,
                plant_id: echoed,
            })
        },
    )
    .await
}
