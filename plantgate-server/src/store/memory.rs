use super::{IdentityStore, StoreError};
use crate::core::{AdminRole, Profile, StoreUser, TokenPair};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

#[derive(Default)]
struct Tables {
    /// access token -> user
    sessions: HashMap<String, StoreUser>,
    /// refresh token -> user id
    refresh_tokens: HashMap<String, String>,
    profiles: HashMap<String, Profile>,
    admin_roles: HashMap<String, Vec<AdminRole>>,
    /// (plant id, active) in insertion order
    plants: Vec<(String, bool)>,
    next_session: u64,
}

/// In-process identity store
///
/// Holds the same tables the Supabase backend exposes and counts every
/// query it answers, so callers can assert how often the store was hit.
#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    tables: Arc<RwLock<Tables>>,
    calls: Arc<AtomicUsize>,
    grants_unavailable: Arc<AtomicBool>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user reachable through `access_token`
    pub fn add_user(&self, user_id: &str, email: &str, access_token: &str) -> &Self {
        self.tables.write().sessions.insert(
            access_token.to_string(),
            StoreUser {
                id: user_id.to_string(),
                email: Some(email.to_string()),
            },
        );
        self
    }

    pub fn add_refresh_token(&self, user_id: &str, refresh_token: &str) -> &Self {
        self.tables
            .write()
            .refresh_tokens
            .insert(refresh_token.to_string(), user_id.to_string());
        self
    }

    pub fn add_profile(&self, profile: Profile) -> &Self {
        self.tables
            .write()
            .profiles
            .insert(profile.id.clone(), profile);
        self
    }

    pub fn grant(&self, user_id: &str, grant: AdminRole) -> &Self {
        self.tables
            .write()
            .admin_roles
            .entry(user_id.to_string())
            .or_default()
            .push(grant);
        self
    }

    pub fn add_plant(&self, plant_id: &str, active: bool) -> &Self {
        self.tables.write().plants.push((plant_id.to_string(), active));
        self
    }

    /// Drop every session issued for a user
    pub fn revoke_sessions(&self, user_id: &str) {
        self.tables.write().sessions.retain(|_, u| u.id != user_id);
    }

    /// Make admin grant lookups fail until switched back
    pub fn set_grants_unavailable(&self, unavailable: bool) {
        self.grants_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of queries answered so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    fn record(&self, query: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!("memory store query: {}", query);
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn get_user(&self, access_token: &str) -> Result<StoreUser, StoreError> {
        self.record("get_user");
        self.tables
            .read()
            .sessions
            .get(access_token)
            .cloned()
            .ok_or(StoreError::Unauthorized)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenPair, StoreError> {
        self.record("refresh_session");
        let mut tables = self.tables.write();

        let user_id = tables
            .refresh_tokens
            .remove(refresh_token)
            .ok_or(StoreError::Unauthorized)?;
        let email = tables
            .sessions
            .values()
            .find(|u| u.id == user_id)
            .and_then(|u| u.email.clone());

        tables.next_session += 1;
        let access_token = format!("access-{}-{}", user_id, tables.next_session);
        let new_refresh = format!("refresh-{}-{}", user_id, tables.next_session);

        tables.sessions.insert(
            access_token.clone(),
            StoreUser {
                id: user_id.clone(),
                email,
            },
        );
        tables.refresh_tokens.insert(new_refresh.clone(), user_id);

        Ok(TokenPair {
            access_token,
            refresh_token: new_refresh,
            expires_at: None,
        })
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        self.record("get_profile");
        Ok(self.tables.read().profiles.get(user_id).cloned())
    }

    async fn get_admin_roles(&self, user_id: &str) -> Result<Vec<AdminRole>, StoreError> {
        self.record("get_admin_roles");
        if self.grants_unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Http("admin_roles unavailable".to_string()));
        }
        Ok(self
            .tables
            .read()
            .admin_roles
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_active_plants(&self) -> Result<Vec<String>, StoreError> {
        self.record("list_active_plants");
        Ok(self
            .tables
            .read()
            .plants
            .iter()
            .filter(|(_, active)| *active)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AdminRoleKind;

    #[tokio::test]
    async fn test_get_user_by_token() {
        let store = MemoryIdentityStore::new();
        store.add_user("u1", "u1@example.com", "tok-1");

        let user = store.get_user("tok-1").await.unwrap();
        assert_eq!(user.id, "u1");
        assert!(matches!(
            store.get_user("nope").await,
            Err(StoreError::Unauthorized)
        ));
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_rotates_tokens() {
        let store = MemoryIdentityStore::new();
        store
            .add_user("u1", "u1@example.com", "tok-1")
            .add_refresh_token("u1", "r-1");

        let pair = store.refresh_session("r-1").await.unwrap();
        assert_ne!(pair.refresh_token, "r-1");
        assert_eq!(store.get_user(&pair.access_token).await.unwrap().id, "u1");

        // Old refresh token is consumed
        assert!(store.refresh_session("r-1").await.is_err());
        assert!(store.refresh_session(&pair.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_inactive_plants_filtered() {
        let store = MemoryIdentityStore::new();
        store
            .add_plant("P1", true)
            .add_plant("P2", false)
            .add_plant("P3", true);

        assert_eq!(store.list_active_plants().await.unwrap(), vec!["P1", "P3"]);
    }

    #[tokio::test]
    async fn test_grants_and_revocation() {
        let store = MemoryIdentityStore::new();
        store
            .add_user("u1", "u1@example.com", "tok-1")
            .grant("u1", AdminRole::global(AdminRoleKind::DevAdmin));

        assert_eq!(store.get_admin_roles("u1").await.unwrap().len(), 1);
        assert!(store.get_admin_roles("u2").await.unwrap().is_empty());

        store.revoke_sessions("u1");
        assert!(store.get_user("tok-1").await.is_err());

        store.set_grants_unavailable(true);
        assert!(matches!(
            store.get_admin_roles("u1").await,
            Err(StoreError::Http(_))
        ));
        store.set_grants_unavailable(false);
        assert!(store.get_admin_roles("u1").await.is_ok());
    }
}
