// Supabase Store Tests
// Runs SupabaseStore against a fake GoTrue/PostgREST server

use axum::{
    Json, Router,
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use plantgate_server::auth::AuthService;
use plantgate_server::config::IdentityStoreConfig;
use plantgate_server::{
    AdminRole, AdminRoleKind, IdentityStore, StoreError, SupabaseStore, UserRole,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

const ANON_KEY: &str = "anon-key";
const SERVICE_KEY: &str = "service-key";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn has_service_credentials(headers: &HeaderMap) -> bool {
    header(headers, "apikey") == Some(SERVICE_KEY)
        && header(headers, "authorization") == Some("Bearer service-key")
}

async fn auth_user(headers: HeaderMap) -> Response {
    if header(&headers, "apikey") != Some(ANON_KEY) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match header(&headers, "authorization") {
        Some("Bearer good-token") => Json(json!({
            "id": "u1",
            "aud": "authenticated",
            "email": "u1@plants.example",
            "role": "authenticated"
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"msg": "invalid JWT"})),
        )
            .into_response(),
    }
}

async fn auth_token(Query(query): Query<HashMap<String, String>>, Json(body): Json<Value>) -> Response {
    if query.get("grant_type").map(String::as_str) != Some("refresh_token") {
        return StatusCode::UNPROCESSABLE_ENTITY.into_response();
    }
    if body["refresh_token"] == "rt-1" {
        Json(json!({
            "access_token": "new-access",
            "refresh_token": "rt-2",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1_900_000_000
        }))
        .into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant"})),
        )
            .into_response()
    }
}

async fn profiles(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    if !has_service_credentials(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match query.get("id").map(String::as_str) {
        Some("eq.u1") => Json(json!([{
            "id": "u1",
            "email": "u1@plants.example",
            "first_name": "Uma",
            "last_name": null,
            "plant_id": "P1",
            "job_title": "Line Lead"
        }]))
        .into_response(),
        Some("eq.broken") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!([])).into_response(),
    }
}

async fn admin_roles(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    if !has_service_credentials(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match query.get("user_id").map(String::as_str) {
        Some("eq.u1") => Json(json!([
            {"role": "plant_manager", "plant_id": "P1"},
            {"role": "superuser", "plant_id": null}
        ]))
        .into_response(),
        _ => Json(json!([])).into_response(),
    }
}

async fn plants(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    if !has_service_credentials(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    assert_eq!(query.get("is_active").map(String::as_str), Some("eq.true"));
    Json(json!([{"id": "P1"}, {"id": "P2"}])).into_response()
}

async fn spawn_fake_supabase() -> String {
    let router = Router::new()
        .route("/auth/v1/user", get(auth_user))
        .route("/auth/v1/token", post(auth_token))
        .route("/rest/v1/profiles", get(profiles))
        .route("/rest/v1/admin_roles", get(admin_roles))
        .route("/rest/v1/plants", get(plants));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://127.0.0.1:{}", port)
}

async fn store() -> SupabaseStore {
    let config = IdentityStoreConfig {
        url: spawn_fake_supabase().await,
        anon_key: ANON_KEY.to_string(),
        service_role_key: SERVICE_KEY.to_string(),
        timeout_secs: 5,
    };
    SupabaseStore::new(&config).unwrap()
}

#[tokio::test]
async fn test_get_user() {
    let store = store().await;

    let user = store.get_user("good-token").await.unwrap();
    assert_eq!(user.id, "u1");
    assert_eq!(user.email.as_deref(), Some("u1@plants.example"));

    let err = store.get_user("bad-token").await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized));
}

#[tokio::test]
async fn test_refresh_session() {
    let store = store().await;

    let pair = store.refresh_session("rt-1").await.unwrap();
    assert_eq!(pair.access_token, "new-access");
    assert_eq!(pair.refresh_token, "rt-2");
    assert_eq!(pair.expires_at.unwrap().timestamp(), 1_900_000_000);

    let err = store.refresh_session("used").await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized));
}

#[tokio::test]
async fn test_get_profile() {
    let store = store().await;

    let profile = store.get_profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.first_name.as_deref(), Some("Uma"));
    assert_eq!(profile.plant_id.as_deref(), Some("P1"));
    assert_eq!(profile.last_name, None);

    assert!(store.get_profile("nobody").await.unwrap().is_none());

    let err = store.get_profile("broken").await.unwrap_err();
    assert!(matches!(err, StoreError::Http(_)));
}

#[tokio::test]
async fn test_unknown_grant_roles_skipped() {
    let store = store().await;

    let grants = store.get_admin_roles("u1").await.unwrap();
    assert_eq!(
        grants,
        vec![AdminRole::scoped(AdminRoleKind::PlantManager, "P1")]
    );
    assert!(store.get_admin_roles("u2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_active_plants() {
    let store = store().await;
    assert_eq!(
        store.list_active_plants().await.unwrap(),
        vec!["P1".to_string(), "P2".to_string()]
    );
}

#[tokio::test]
async fn test_unreachable_store() {
    let config = IdentityStoreConfig {
        url: "http://127.0.0.1:1".to_string(),
        anon_key: ANON_KEY.to_string(),
        service_role_key: String::new(),
        timeout_secs: 1,
    };
    let store = SupabaseStore::new(&config).unwrap();

    let err = store.get_profile("u1").await.unwrap_err();
    assert!(matches!(err, StoreError::Http(_)));
}

#[tokio::test]
async fn test_authenticate_through_supabase() {
    let service = AuthService::new(Arc::new(store().await));

    let auth = service.authenticate("good-token").await.unwrap();
    assert!(auth.is_authenticated);
    assert_eq!(auth.user.id, "u1");
    assert_eq!(auth.user.role, UserRole::PlantManager);
    assert_eq!(auth.user.plant_id.as_deref(), Some("P1"));

    let context = service.get_user_context("u1").await.unwrap().unwrap();
    assert_eq!(context.accessible_plants, vec!["P1".to_string()]);

    let err = service.authenticate("bad-token").await.unwrap_err();
    assert_eq!(err.code(), "AUTH_FAILED");
}
