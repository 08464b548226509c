use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Atomic capability, derived solely from a user's role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Delete,
    ManageUsers,
    ManageCourses,
    ManageEnrollments,
    ViewAnalytics,
    ManagePlants,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::Read,
        Permission::Write,
        Permission::Delete,
        Permission::ManageUsers,
        Permission::ManageCourses,
        Permission::ManageEnrollments,
        Permission::ViewAnalytics,
        Permission::ManagePlants,
    ];

    /// Get permission name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
            Permission::ManageUsers => "manage_users",
            Permission::ManageCourses => "manage_courses",
            Permission::ManageEnrollments => "manage_enrollments",
            Permission::ViewAnalytics => "view_analytics",
            Permission::ManagePlants => "manage_plants",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown permission: {}", s))
    }
}

const PLANT_MANAGER_PERMISSIONS: [Permission; 5] = [
    Permission::Read,
    Permission::Write,
    Permission::ManageCourses,
    Permission::ManageEnrollments,
    Permission::ViewAnalytics,
];

const USER_PERMISSIONS: [Permission; 1] = [Permission::Read];

/// Effective role of a user, derived from their admin grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    HrAdmin,
    DevAdmin,
    PlantManager,
    User,
}

impl UserRole {
    /// Get role name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::HrAdmin => "hr_admin",
            UserRole::DevAdmin => "dev_admin",
            UserRole::PlantManager => "plant_manager",
            UserRole::User => "user",
        }
    }

    /// Higher wins when several grants are held
    pub fn precedence(&self) -> u8 {
        match self {
            UserRole::HrAdmin => 3,
            UserRole::DevAdmin => 2,
            UserRole::PlantManager => 1,
            UserRole::User => 0,
        }
    }

    /// Fixed role → permission table
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            UserRole::HrAdmin | UserRole::DevAdmin => &Permission::ALL,
            UserRole::PlantManager => &PLANT_MANAGER_PERMISSIONS,
            UserRole::User => &USER_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Organization-wide admin (sees every active plant)
    pub fn is_org_admin(&self) -> bool {
        matches!(self, UserRole::HrAdmin | UserRole::DevAdmin)
    }

    /// Derive the effective role from a set of grants; no grants means `user`
    pub fn derive(grants: &[AdminRole]) -> UserRole {
        grants
            .iter()
            .map(|g| UserRole::from(g.role))
            .max_by_key(UserRole::precedence)
            .unwrap_or(UserRole::User)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hr_admin" => Ok(UserRole::HrAdmin),
            "dev_admin" => Ok(UserRole::DevAdmin),
            "plant_manager" => Ok(UserRole::PlantManager),
            "user" => Ok(UserRole::User),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Role carried by an admin grant (`user` is never granted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRoleKind {
    HrAdmin,
    DevAdmin,
    PlantManager,
}

impl AdminRoleKind {
    pub fn as_str(&self) -> &'static str {
        UserRole::from(*self).as_str()
    }
}

impl From<AdminRoleKind> for UserRole {
    fn from(kind: AdminRoleKind) -> Self {
        match kind {
            AdminRoleKind::HrAdmin => UserRole::HrAdmin,
            AdminRoleKind::DevAdmin => UserRole::DevAdmin,
            AdminRoleKind::PlantManager => UserRole::PlantManager,
        }
    }
}

impl fmt::Display for AdminRoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRoleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hr_admin" => Ok(AdminRoleKind::HrAdmin),
            "dev_admin" => Ok(AdminRoleKind::DevAdmin),
            "plant_manager" => Ok(AdminRoleKind::PlantManager),
            other => Err(format!("unknown admin role: {}", other)),
        }
    }
}

/// Admin grant attached to a user, optionally restricted to one plant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRole {
    pub role: AdminRoleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
}

impl AdminRole {
    /// Grant that applies to every plant
    pub fn global(role: AdminRoleKind) -> Self {
        Self {
            role,
            plant_id: None,
        }
    }

    /// Grant restricted to one plant
    pub fn scoped(role: AdminRoleKind, plant_id: impl Into<String>) -> Self {
        Self {
            role,
            plant_id: Some(plant_id.into()),
        }
    }

    /// A global grant covers any plant; a scoped grant only its own
    pub fn covers_plant(&self, plant_id: &str) -> bool {
        self.plant_id.as_deref().is_none_or(|p| p == plant_id)
    }
}

/// HR profile record owned by the identity store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub plant_id: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
}

/// Identity the store resolves an access token to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Resolved user inside an [`AuthResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub permissions: Vec<Permission>,
    pub plant_id: Option<String>,
}

/// Identity resolved for one authenticated request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub user: AuthUser,
    pub is_authenticated: bool,
}

impl AuthResult {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.user.permissions.contains(&permission)
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.user.role == role
    }
}

/// Tenant scope of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub user_id: String,
    pub plant_id: Option<String>,
    pub roles: Vec<AdminRole>,
    pub accessible_plants: Vec<String>,
}

impl UserContext {
    pub fn can_access_plant(&self, plant_id: &str) -> bool {
        self.accessible_plants.iter().any(|p| p == plant_id)
    }

    pub fn is_home_plant(&self, plant_id: &str) -> bool {
        self.plant_id.as_deref() == Some(plant_id)
    }
}

/// Access/refresh pair returned by a session refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
