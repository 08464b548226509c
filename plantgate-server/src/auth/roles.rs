//! Role and permission facades over [`AuthService`]
//!
//! Every boolean check has a `require_*` twin that fails with
//! [`AuthError::Authorization`] naming what is missing. Nothing is cached
//! here; wrap the service with [`AuthService::request_scoped`] to share
//! lookups across checks.

use super::AuthService;
use crate::core::{AdminRoleKind, AuthError, Permission, Result, UserContext, UserRole};
use tracing::warn;

#[derive(Clone)]
pub struct RoleService {
    auth: AuthService,
}

impl RoleService {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    pub async fn has_role(&self, user_id: &str, role: UserRole) -> bool {
        self.auth.has_role(user_id, role).await
    }

    pub async fn require_role(&self, user_id: &str, role: UserRole) -> Result<()> {
        if self.auth.try_has_role(user_id, role).await? {
            Ok(())
        } else {
            Err(AuthError::Authorization(format!("role {} required", role)))
        }
    }

    /// Effective role is any of `roles`
    pub async fn require_any_role(&self, user_id: &str, roles: &[UserRole]) -> Result<()> {
        let role = self.auth.user_role(user_id).await?;
        if roles.contains(&role) {
            return Ok(());
        }

        let names: Vec<&str> = roles.iter().map(UserRole::as_str).collect();
        Err(AuthError::Authorization(format!(
            "one of roles [{}] required",
            names.join(", ")
        )))
    }

    pub async fn has_admin_role(
        &self,
        user_id: &str,
        role: Option<AdminRoleKind>,
        plant_id: Option<&str>,
    ) -> bool {
        self.auth.has_admin_role(user_id, role, plant_id).await
    }

    pub async fn require_admin_role(
        &self,
        user_id: &str,
        role: Option<AdminRoleKind>,
        plant_id: Option<&str>,
    ) -> Result<()> {
        if self.auth.try_has_admin_role(user_id, role, plant_id).await? {
            return Ok(());
        }

        let what = role.map_or("admin role".to_string(), |r| format!("role {}", r));
        Err(AuthError::Authorization(match plant_id {
            Some(plant) => format!("{} required for plant {}", what, plant),
            None => format!("{} required", what),
        }))
    }

    pub async fn is_hr_admin(&self, user_id: &str) -> bool {
        self.has_admin_role(user_id, Some(AdminRoleKind::HrAdmin), None)
            .await
    }

    pub async fn is_dev_admin(&self, user_id: &str) -> bool {
        self.has_admin_role(user_id, Some(AdminRoleKind::DevAdmin), None)
            .await
    }

    pub async fn is_plant_manager(&self, user_id: &str, plant_id: Option<&str>) -> bool {
        self.has_admin_role(user_id, Some(AdminRoleKind::PlantManager), plant_id)
            .await
    }

    /// Holds any admin grant
    pub async fn is_admin(&self, user_id: &str) -> bool {
        self.has_admin_role(user_id, None, None).await
    }

    /// Holds an hr_admin or dev_admin grant
    pub async fn is_org_admin(&self, user_id: &str) -> bool {
        match self.auth.user_role(user_id).await {
            Ok(role) => role.is_org_admin(),
            Err(e) => {
                warn!("is_org_admin for user {} treated as false: {}", user_id, e);
                false
            }
        }
    }

    pub async fn get_user_context(&self, user_id: &str) -> Result<Option<UserContext>> {
        self.auth.get_user_context(user_id).await
    }

    /// Context of a user whose scope includes `plant_id`
    pub async fn require_plant_access(&self, user_id: &str, plant_id: &str) -> Result<UserContext> {
        let context = self
            .auth
            .get_user_context(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user context for {}", user_id)))?;

        if context.can_access_plant(plant_id) {
            Ok(context)
        } else {
            Err(AuthError::TenantAccess(format!(
                "user {} cannot access plant {}",
                user_id, plant_id
            )))
        }
    }
}

#[derive(Clone)]
pub struct PermissionService {
    auth: AuthService,
}

impl PermissionService {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }

    pub async fn has_permission(&self, user_id: &str, permission: Permission) -> bool {
        self.auth.has_permission(user_id, permission).await
    }

    pub async fn require_permission(&self, user_id: &str, permission: Permission) -> Result<()> {
        if self.auth.try_has_permission(user_id, permission).await? {
            Ok(())
        } else {
            Err(AuthError::Authorization(format!(
                "permission {} required",
                permission
            )))
        }
    }

    /// Every permission in `permissions`
    pub async fn require_all(&self, user_id: &str, permissions: &[Permission]) -> Result<()> {
        let role = self.auth.user_role(user_id).await?;
        match permissions.iter().find(|p| !role.has_permission(**p)) {
            Some(missing) => Err(AuthError::Authorization(format!(
                "permission {} required",
                missing
            ))),
            None => Ok(()),
        }
    }

    pub async fn can_read(&self, user_id: &str) -> bool {
        self.has_permission(user_id, Permission::Read).await
    }

    pub async fn can_write(&self, user_id: &str) -> bool {
        self.has_permission(user_id, Permission::Write).await
    }

    pub async fn can_delete(&self, user_id: &str) -> bool {
        self.has_permission(user_id, Permission::Delete).await
    }

    pub async fn can_manage_users(&self, user_id: &str) -> bool {
        self.has_permission(user_id, Permission::ManageUsers).await
    }

    pub async fn can_manage_courses(&self, user_id: &str) -> bool {
        self.has_permission(user_id, Permission::ManageCourses).await
    }

    pub async fn can_manage_enrollments(&self, user_id: &str) -> bool {
        self.has_permission(user_id, Permission::ManageEnrollments)
            .await
    }

    pub async fn can_view_analytics(&self, user_id: &str) -> bool {
        self.has_permission(user_id, Permission::ViewAnalytics).await
    }

    pub async fn can_manage_plants(&self, user_id: &str) -> bool {
        self.has_permission(user_id, Permission::ManagePlants).await
    }
}
