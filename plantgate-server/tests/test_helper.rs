//! Shared fixtures for integration tests: a seeded in-memory identity store
//! and a gate server bound to an ephemeral port

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use plantgate_server::auth::{AuthService, AuthState};
use plantgate_server::config::AuthConfig;
use plantgate_server::{
    AdminRole, AdminRoleKind, AppState, MemoryIdentityStore, Profile, create_router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;

pub const PM_TOKEN: &str = "tok-pm";
pub const HR_TOKEN: &str = "tok-hr";
pub const DEV_TOKEN: &str = "tok-dev";
pub const EMPLOYEE_TOKEN: &str = "tok-emp";
pub const GHOST_TOKEN: &str = "tok-ghost";
pub const PM_REFRESH: &str = "rt-pm";

fn profile(id: &str, first: &str, plant: Option<&str>) -> Profile {
    Profile {
        id: id.to_string(),
        email: Some(format!("{}@plants.example", id)),
        first_name: Some(first.to_string()),
        last_name: None,
        plant_id: plant.map(str::to_string),
        job_title: None,
    }
}

/// Five active plants (P1..P5), one inactive (P6), and:
/// - `pm`: plant_manager scoped to P1, home P1
/// - `hr`: global hr_admin, home P2
/// - `dev`: global dev_admin, no home plant
/// - `emp`: no grants, home P3
/// - `ghost`: valid session, no profile
pub fn seeded_store() -> MemoryIdentityStore {
    let store = MemoryIdentityStore::new();
    for plant in ["P1", "P2", "P3", "P4", "P5"] {
        store.add_plant(plant, true);
    }
    store.add_plant("P6", false);

    store
        .add_user("pm", "pm@plants.example", PM_TOKEN)
        .add_refresh_token("pm", PM_REFRESH)
        .add_profile(profile("pm", "Pat", Some("P1")))
        .grant("pm", AdminRole::scoped(AdminRoleKind::PlantManager, "P1"));

    store
        .add_user("hr", "hr@plants.example", HR_TOKEN)
        .add_profile(profile("hr", "Harper", Some("P2")))
        .grant("hr", AdminRole::global(AdminRoleKind::HrAdmin));

    store
        .add_user("dev", "dev@plants.example", DEV_TOKEN)
        .add_profile(profile("dev", "Devon", None))
        .grant("dev", AdminRole::global(AdminRoleKind::DevAdmin));

    store
        .add_user("emp", "emp@plants.example", EMPLOYEE_TOKEN)
        .add_profile(profile("emp", "Emery", Some("P3")));

    store.add_user("ghost", "ghost@plants.example", GHOST_TOKEN);

    store
}

/// Spawn the gate on 127.0.0.1 with `store` behind it
pub async fn spawn_test_server(store: MemoryIdentityStore) -> String {
    let auth = AuthState::new(
        AuthService::new(Arc::new(store)),
        &AuthConfig::default(),
    );
    let router = create_router(AppState::new(auth));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let base_url = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });

    // Give server time to start
    sleep(Duration::from_millis(50)).await;

    base_url
}

/// Seeded store plus a running server
pub async fn spawn_seeded_server() -> (String, MemoryIdentityStore) {
    let store = seeded_store();
    let base_url = spawn_test_server(store.clone()).await;
    (base_url, store)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Unsigned JWT-shaped token whose payload carries `exp`
pub fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"pm","exp":{}}}"#, exp));
    format!("{}.{}.signature", header, payload)
}
