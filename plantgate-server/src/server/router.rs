use super::handlers::{self, AppState};
use crate::auth::{self, AuthGuard, enforce};
use crate::core::Permission;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{MethodRouter, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Put `route` behind `guard`
fn guarded(route: MethodRouter<AppState>, guard: AuthGuard) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(guard, enforce))
}

/// Create the Axum router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let gate = &state.auth;

    Router::new()
        // Public
        .route("/health", get(handlers::health_check))
        .route("/auth/refresh", post(handlers::refresh_session))
        // Wrapped handlers
        .route("/api/me", get(handlers::me))
        .route("/api/me/context", get(handlers::me_context))
        .route("/api/admin/check", get(handlers::admin_check))
        // Guarded routes
        .route(
            "/api/me/identity",
            guarded(get(handlers::me_identity), auth::require_auth(gate)),
        )
        .route(
            "/api/admin/overview",
            guarded(get(handlers::caller), auth::require_admin(gate)),
        )
        .route(
            "/api/admin/users",
            guarded(
                get(handlers::caller),
                auth::require_permission(gate, Permission::ManageUsers),
            ),
        )
        .route(
            "/api/admin/plants",
            guarded(get(handlers::admin_plants), auth::require_org_admin(gate)),
        )
        .route(
            "/api/courses/manage",
            guarded(get(handlers::caller), auth::require_admin_or_instructor(gate)),
        )
        .route(
            "/api/hr",
            guarded(get(handlers::caller), auth::require_hr_admin(gate)),
        )
        // Plant-scoped routes
        .route(
            "/api/plants/{plant_id}/access",
            guarded(get(handlers::plant_view), auth::require_plant_access(gate)),
        )
        .route(
            "/api/plants/{plant_id}/manage",
            guarded(get(handlers::plant_view), auth::require_plant_manager(gate)),
        )
        .route(
            "/api/plants/{plant_id}/admin",
            guarded(
                get(handlers::plant_view),
                auth::require_admin_with_plant_access(gate),
            ),
        )
        .route(
            "/api/plants/{plant_id}/own",
            guarded(get(handlers::plant_view), auth::require_own_plant(gate)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
