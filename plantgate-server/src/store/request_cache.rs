use super::{IdentityStore, StoreError};
use crate::core::{AdminRole, Profile, StoreUser, TokenPair};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct Memo {
    users: HashMap<String, StoreUser>,
    profiles: HashMap<String, Option<Profile>>,
    admin_roles: HashMap<String, Vec<AdminRole>>,
    active_plants: Option<Vec<String>>,
}

/// Memoizing decorator over an identity store, scoped to one request
///
/// Successful reads are remembered until the cache is dropped; failures are
/// not. Session refreshes always pass through.
pub struct RequestCache {
    inner: Arc<dyn IdentityStore>,
    memo: Mutex<Memo>,
}

impl RequestCache {
    pub fn new(inner: Arc<dyn IdentityStore>) -> Self {
        Self {
            inner,
            memo: Mutex::new(Memo::default()),
        }
    }
}

#[async_trait]
impl IdentityStore for RequestCache {
    async fn get_user(&self, access_token: &str) -> Result<StoreUser, StoreError> {
        let cached = self.memo.lock().users.get(access_token).cloned();
        if let Some(user) = cached {
            return Ok(user);
        }

        let user = self.inner.get_user(access_token).await?;
        self.memo
            .lock()
            .users
            .insert(access_token.to_string(), user.clone());
        Ok(user)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenPair, StoreError> {
        self.inner.refresh_session(refresh_token).await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let cached = self.memo.lock().profiles.get(user_id).cloned();
        if let Some(profile) = cached {
            debug!("profile cache hit for user {}", user_id);
            return Ok(profile);
        }

        let profile = self.inner.get_profile(user_id).await?;
        self.memo
            .lock()
            .profiles
            .insert(user_id.to_string(), profile.clone());
        Ok(profile)
    }

    async fn get_admin_roles(&self, user_id: &str) -> Result<Vec<AdminRole>, StoreError> {
        let cached = self.memo.lock().admin_roles.get(user_id).cloned();
        if let Some(roles) = cached {
            debug!("admin role cache hit for user {}", user_id);
            return Ok(roles);
        }

        let roles = self.inner.get_admin_roles(user_id).await?;
        self.memo
            .lock()
            .admin_roles
            .insert(user_id.to_string(), roles.clone());
        Ok(roles)
    }

    async fn list_active_plants(&self) -> Result<Vec<String>, StoreError> {
        let cached = self.memo.lock().active_plants.clone();
        if let Some(plants) = cached {
            return Ok(plants);
        }

        let plants = self.inner.list_active_plants().await?;
        self.memo.lock().active_plants = Some(plants.clone());
        Ok(plants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AdminRoleKind;
    use crate::store::MemoryIdentityStore;

    #[tokio::test]
    async fn test_repeated_reads_hit_store_once() {
        let store = MemoryIdentityStore::new();
        store
            .add_user("u1", "u1@example.com", "tok")
            .grant("u1", AdminRole::global(AdminRoleKind::HrAdmin))
            .add_plant("P1", true);

        let cache = RequestCache::new(Arc::new(store.clone()));
        for _ in 0..3 {
            cache.get_user("tok").await.unwrap();
            cache.get_admin_roles("u1").await.unwrap();
            cache.get_profile("u1").await.unwrap();
            cache.list_active_plants().await.unwrap();
        }

        assert_eq!(store.calls(), 4);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let store = MemoryIdentityStore::new();
        let cache = RequestCache::new(Arc::new(store.clone()));

        assert!(cache.get_user("tok").await.is_err());
        store.add_user("u1", "u1@example.com", "tok");
        assert_eq!(cache.get_user("tok").await.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_missing_profile_is_remembered() {
        let store = MemoryIdentityStore::new();
        let cache = RequestCache::new(Arc::new(store.clone()));

        assert!(cache.get_profile("ghost").await.unwrap().is_none());
        assert!(cache.get_profile("ghost").await.unwrap().is_none());
        assert_eq!(store.calls(), 1);
    }
}
