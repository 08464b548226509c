//! Identity store access
//!
//! The gate never owns identity data. Users, profiles, admin grants and
//! plants live in a Supabase-style backend; this module defines the queries
//! the gate needs from it and provides:
//! - [`SupabaseStore`] for the real REST API
//! - [`MemoryIdentityStore`] for tests and local runs
//! - [`RequestCache`] to memoize lookups for the lifetime of one request

pub mod memory;
pub mod request_cache;
pub mod supabase;

pub use memory::MemoryIdentityStore;
pub use request_cache::RequestCache;
pub use supabase::SupabaseStore;

use crate::core::{AdminRole, Profile, StoreUser, TokenPair};
use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by an identity store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store rejected the credential (token or refresh token)
    #[error("credential rejected by identity store")]
    Unauthorized,

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("identity store request failed: {0}")]
    Http(String),

    #[error("unexpected identity store response: {0}")]
    Decode(String),
}

/// Queries the gate issues against the identity store
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve an access token to the user it was issued for
    async fn get_user(&self, access_token: &str) -> Result<StoreUser, StoreError>;

    /// Rotate a session using its refresh token
    async fn refresh_session(&self, refresh_token: &str) -> Result<TokenPair, StoreError>;

    /// HR profile of a user, `None` when no profile row exists
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError>;

    /// Admin grants held by a user (possibly empty)
    async fn get_admin_roles(&self, user_id: &str) -> Result<Vec<AdminRole>, StoreError>;

    /// Ids of every active plant
    async fn list_active_plants(&self) -> Result<Vec<String>, StoreError>;
}
