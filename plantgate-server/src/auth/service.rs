use super::token;
use crate::core::{
    AdminRole, AdminRoleKind, AuthError, AuthResult, AuthUser, Permission, Profile, Result,
    TokenPair, UserContext, UserRole,
};
use crate::store::{IdentityStore, RequestCache};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves tokens to identities and answers role, permission and plant
/// scope questions against the identity store
///
/// Stateless apart from the store handle. Use [`AuthService::request_scoped`]
/// to memoize lookups across the checks of a single request.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn IdentityStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// A service whose store reads are cached until it is dropped
    pub fn request_scoped(&self) -> Self {
        Self {
            store: Arc::new(RequestCache::new(self.store.clone())),
        }
    }

    /// Resolve an access token to an authenticated identity
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthResult> {
        if access_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        if token::is_expired(access_token, Utc::now()) {
            debug!("Rejecting expired access token");
            return Err(AuthError::TokenExpired);
        }

        let user = self
            .store
            .get_user(access_token)
            .await
            .map_err(|e| AuthError::authentication_from("Invalid or expired token", e))?;

        let profile = self
            .store
            .get_profile(&user.id)
            .await
            .map_err(|e| AuthError::authentication_from("Profile lookup failed", e))?
            .ok_or_else(|| AuthError::authentication("User profile not found"))?;

        let grants = self
            .store
            .get_admin_roles(&user.id)
            .await
            .map_err(|e| AuthError::authentication_from("Role lookup failed", e))?;

        let role = UserRole::derive(&grants);
        debug!("Authenticated user {} as {}", user.id, role);

        Ok(AuthResult {
            user: AuthUser {
                id: user.id,
                email: user.email.or(profile.email),
                role,
                permissions: role.permissions().to_vec(),
                plant_id: profile.plant_id,
            },
            is_authenticated: true,
        })
    }

    /// Exchange a refresh token for a new access/refresh pair
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair> {
        if refresh_token.is_empty() {
            return Err(AuthError::authentication("Refresh token required"));
        }

        let pair = self
            .store
            .refresh_session(refresh_token)
            .await
            .map_err(|e| AuthError::authentication_from("Token refresh failed", e))?;

        info!("Session refreshed");
        Ok(pair)
    }

    /// HR profile of a user, read-only
    pub async fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        Ok(self.store.get_profile(user_id).await?)
    }

    /// Effective role of a user
    pub async fn user_role(&self, user_id: &str) -> Result<UserRole> {
        let grants = self.store.get_admin_roles(user_id).await?;
        Ok(UserRole::derive(&grants))
    }

    /// Admin grants held by a user
    pub async fn admin_roles(&self, user_id: &str) -> Result<Vec<AdminRole>> {
        Ok(self.store.get_admin_roles(user_id).await?)
    }

    pub async fn try_has_role(&self, user_id: &str, role: UserRole) -> Result<bool> {
        Ok(self.user_role(user_id).await? == role)
    }

    pub async fn try_has_permission(&self, user_id: &str, permission: Permission) -> Result<bool> {
        Ok(self.user_role(user_id).await?.has_permission(permission))
    }

    /// Without a role, any grant counts. With a role, the grant must carry it
    /// and, when a plant is named, either be global or scoped to that plant.
    pub async fn try_has_admin_role(
        &self,
        user_id: &str,
        role: Option<AdminRoleKind>,
        plant_id: Option<&str>,
    ) -> Result<bool> {
        let grants = self.store.get_admin_roles(user_id).await?;

        let Some(role) = role else {
            return Ok(!grants.is_empty());
        };

        Ok(grants
            .iter()
            .filter(|g| g.role == role)
            .any(|g| plant_id.is_none_or(|p| g.covers_plant(p))))
    }

    /// `false` when the user lacks the role or the lookup fails
    pub async fn has_role(&self, user_id: &str, role: UserRole) -> bool {
        self.try_has_role(user_id, role)
            .await
            .unwrap_or_else(|e| swallow("has_role", user_id, e))
    }

    /// `false` when the user lacks the permission or the lookup fails
    pub async fn has_permission(&self, user_id: &str, permission: Permission) -> bool {
        self.try_has_permission(user_id, permission)
            .await
            .unwrap_or_else(|e| swallow("has_permission", user_id, e))
    }

    /// `false` when no matching grant exists or the lookup fails
    pub async fn has_admin_role(
        &self,
        user_id: &str,
        role: Option<AdminRoleKind>,
        plant_id: Option<&str>,
    ) -> bool {
        self.try_has_admin_role(user_id, role, plant_id)
            .await
            .unwrap_or_else(|e| swallow("has_admin_role", user_id, e))
    }

    /// Tenant scope of a user; `None` when the user has no profile
    pub async fn get_user_context(&self, user_id: &str) -> Result<Option<UserContext>> {
        let Some(profile) = self.store.get_profile(user_id).await? else {
            debug!("No profile for user {} - no context", user_id);
            return Ok(None);
        };

        let roles = self.store.get_admin_roles(user_id).await?;
        let accessible_plants = self
            .expand_plants(profile.plant_id.as_deref(), &roles)
            .await?;

        Ok(Some(UserContext {
            user_id: user_id.to_string(),
            plant_id: profile.plant_id,
            roles,
            accessible_plants,
        }))
    }

    /// Plants a user holding `roles` may see
    pub async fn get_accessible_plants(
        &self,
        user_id: &str,
        roles: &[AdminRole],
    ) -> Result<Vec<String>> {
        let home = self
            .store
            .get_profile(user_id)
            .await?
            .and_then(|p| p.plant_id);
        self.expand_plants(home.as_deref(), roles).await
    }

    /// Org admins see every active plant; everyone else sees their home
    /// plant plus the plants of their plant_manager grants
    async fn expand_plants(&self, home: Option<&str>, roles: &[AdminRole]) -> Result<Vec<String>> {
        let mut plants: Vec<String> = Vec::new();
        let mut push = |plant: &str| {
            if !plants.iter().any(|p| p == plant) {
                plants.push(plant.to_string());
            }
        };

        let org_admin = roles
            .iter()
            .any(|g| UserRole::from(g.role).is_org_admin());

        if org_admin {
            for plant in self.store.list_active_plants().await? {
                push(&plant);
            }
            if let Some(home) = home {
                push(home);
            }
        } else {
            if let Some(home) = home {
                push(home);
            }
            roles
                .iter()
                .filter(|g| g.role == AdminRoleKind::PlantManager)
                .filter_map(|g| g.plant_id.as_deref())
                .for_each(&mut push);
        }

        Ok(plants)
    }
}

fn swallow(check: &str, user_id: &str, err: AuthError) -> bool {
    warn!("{} for user {} treated as false: {}", check, user_id, err);
    false
}
