//! Route guards
//!
//! One guard type covers every protection the application needs: it
//! authenticates the request, applies a [`Requirement`], and on success
//! injects the resolved identity for downstream handlers.
//!
//! ```ignore
//! let admin = require_permission(&auth_state, Permission::ManageUsers);
//! Router::new()
//!     .route("/admin/users", get(list_users))
//!     .route_layer(axum::middleware::from_fn_with_state(admin, enforce));
//! ```

use super::{AuthService, AuthState};
use crate::core::{AdminRoleKind, AuthError, AuthResult, Permission, Result, UserContext, UserRole};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_PLANT_HEADER: &str = "x-user-plant-id";
pub const ACCESSIBLE_PLANTS_HEADER: &str = "x-accessible-plants";

const IDENTITY_HEADERS: [&str; 4] = [
    USER_ID_HEADER,
    USER_ROLE_HEADER,
    USER_PLANT_HEADER,
    ACCESSIBLE_PLANTS_HEADER,
];

/// Custom check over a resolved identity
pub type Predicate = Arc<dyn Fn(&AuthResult) -> bool + Send + Sync>;

/// What an authenticated request must satisfy
#[derive(Clone)]
pub enum Requirement {
    Authenticated,
    /// Effective role is one of these
    AnyRole(Vec<UserRole>),
    Permission(Permission),
    /// hr_admin or dev_admin
    Admin,
    /// Admin or plant_manager
    AdminOrInstructor,
    /// Holds an hr_admin grant
    HrAdmin,
    /// Holds an hr_admin or dev_admin grant
    OrgAdmin,
    /// plant_manager or org admin; a target plant must be in scope
    PlantManager,
    /// Any admin grant and the target plant is in scope
    AdminWithPlantAccess,
    /// Target plant is in scope
    PlantAccess,
    /// Target plant is the home plant
    OwnPlant,
    Predicate { name: String, check: Predicate },
}

impl Requirement {
    /// Resolves the user context and publishes accessible plants
    pub fn is_tenant_aware(&self) -> bool {
        matches!(
            self,
            Self::PlantManager | Self::AdminWithPlantAccess | Self::PlantAccess | Self::OwnPlant
        )
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated => f.write_str("Authenticated"),
            Self::AnyRole(roles) => f.debug_tuple("AnyRole").field(roles).finish(),
            Self::Permission(p) => f.debug_tuple("Permission").field(p).finish(),
            Self::Admin => f.write_str("Admin"),
            Self::AdminOrInstructor => f.write_str("AdminOrInstructor"),
            Self::HrAdmin => f.write_str("HrAdmin"),
            Self::OrgAdmin => f.write_str("OrgAdmin"),
            Self::PlantManager => f.write_str("PlantManager"),
            Self::AdminWithPlantAccess => f.write_str("AdminWithPlantAccess"),
            Self::PlantAccess => f.write_str("PlantAccess"),
            Self::OwnPlant => f.write_str("OwnPlant"),
            Self::Predicate { name, .. } => f.debug_tuple("Predicate").field(name).finish(),
        }
    }
}

/// Identity resolved by a passing guard
#[derive(Clone)]
pub struct Verdict {
    /// Request-scoped service, reusable by handlers without new lookups
    pub service: AuthService,
    pub auth: AuthResult,
    pub context: Option<UserContext>,
}

impl fmt::Debug for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verdict")
            .field("auth", &self.auth)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Verdict {
    /// Replace any client-supplied identity headers with the resolved ones
    pub fn inject(&self, headers: &mut HeaderMap) -> Result<()> {
        for name in IDENTITY_HEADERS {
            headers.remove(name);
        }

        let user = &self.auth.user;
        insert(headers, USER_ID_HEADER, &user.id)?;
        insert(headers, USER_ROLE_HEADER, user.role.as_str())?;
        if let Some(plant) = &user.plant_id {
            insert(headers, USER_PLANT_HEADER, plant)?;
        }
        if let Some(context) = &self.context {
            let plants = serde_json::to_string(&context.accessible_plants)
                .map_err(|e| AuthError::Internal(e.to_string()))?;
            insert(headers, ACCESSIBLE_PLANTS_HEADER, &plants)?;
        }

        Ok(())
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| AuthError::Internal(format!("{} is not a valid header value", name)))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

/// Authentication plus one requirement
#[derive(Clone)]
pub struct AuthGuard {
    state: AuthState,
    requirement: Requirement,
}

impl AuthGuard {
    pub fn new(state: &AuthState, requirement: Requirement) -> Self {
        Self {
            state: state.clone(),
            requirement,
        }
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Authenticate and authorize; `target_plant` feeds plant-scoped checks
    pub async fn check(&self, headers: &HeaderMap, target_plant: Option<&str>) -> Result<Verdict> {
        let token = self.state.tokens.extract(headers)?;

        let service = self.state.service.request_scoped();
        let auth = service.authenticate(&token).await?;
        let user_id = auth.user.id.as_str();
        let role = auth.user.role;

        let context = if self.requirement.is_tenant_aware() {
            Some(
                service
                    .get_user_context(user_id)
                    .await?
                    .ok_or_else(|| AuthError::NotFound(format!("user context for {}", user_id)))?,
            )
        } else {
            None
        };

        let target = || {
            target_plant.ok_or_else(|| AuthError::InvalidRequest("plant id required".to_string()))
        };
        let in_scope = |plant: &str| -> Result<()> {
            match &context {
                Some(ctx) if ctx.can_access_plant(plant) => Ok(()),
                _ => Err(AuthError::TenantAccess(format!(
                    "plant {} is outside the scope of user {}",
                    plant, user_id
                ))),
            }
        };

        match &self.requirement {
            Requirement::Authenticated => {}
            Requirement::AnyRole(roles) => {
                if !roles.contains(&role) {
                    let names: Vec<&str> = roles.iter().map(UserRole::as_str).collect();
                    return Err(AuthError::Authorization(format!(
                        "one of roles [{}] required",
                        names.join(", ")
                    )));
                }
            }
            Requirement::Permission(permission) => {
                if !auth.has_permission(*permission) {
                    return Err(AuthError::Authorization(format!(
                        "permission {} required",
                        permission
                    )));
                }
            }
            Requirement::Admin | Requirement::OrgAdmin => {
                if !role.is_org_admin() {
                    return Err(AuthError::Authorization("admin role required".to_string()));
                }
            }
            Requirement::AdminOrInstructor => {
                if role == UserRole::User {
                    return Err(AuthError::Authorization(
                        "admin or instructor role required".to_string(),
                    ));
                }
            }
            Requirement::HrAdmin => {
                if !service
                    .try_has_admin_role(user_id, Some(AdminRoleKind::HrAdmin), None)
                    .await?
                {
                    return Err(AuthError::Authorization("role hr_admin required".to_string()));
                }
            }
            Requirement::PlantManager => {
                if !matches!(role, UserRole::PlantManager) && !role.is_org_admin() {
                    return Err(AuthError::Authorization(
                        "role plant_manager required".to_string(),
                    ));
                }
                if let Some(plant) = target_plant {
                    in_scope(plant)?;
                }
            }
            Requirement::AdminWithPlantAccess => {
                if !service.try_has_admin_role(user_id, None, None).await? {
                    return Err(AuthError::Authorization("admin role required".to_string()));
                }
                in_scope(target()?)?;
            }
            Requirement::PlantAccess => in_scope(target()?)?,
            Requirement::OwnPlant => {
                let plant = target()?;
                if auth.user.plant_id.as_deref() != Some(plant) {
                    return Err(AuthError::TenantAccess(format!(
                        "plant {} is not the home plant of user {}",
                        plant, user_id
                    )));
                }
            }
            Requirement::Predicate { name, check } => {
                if !(**check)(&auth) {
                    return Err(AuthError::Authorization(format!("{} check failed", name)));
                }
            }
        }

        debug!("User {} passed {:?}", user_id, self.requirement);

        Ok(Verdict {
            service,
            auth,
            context,
        })
    }
}

/// Middleware function for Axum, used with `from_fn_with_state`
pub async fn enforce(State(guard): State<AuthGuard>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();
    let target = guard.state.plants.resolve(&mut parts).await;

    let verdict = match guard.check(&parts.headers, target.as_deref()).await {
        Ok(verdict) => verdict,
        Err(err) => {
            warn!(
                "Denied {} {} ({:?}): {}",
                parts.method,
                parts.uri.path(),
                guard.requirement,
                err
            );
            return err.into_response();
        }
    };

    if let Err(err) = verdict.inject(&mut parts.headers) {
        return err.into_response();
    }

    parts.extensions.insert(verdict.auth.clone());
    if let Some(context) = verdict.context.clone() {
        parts.extensions.insert(context);
    }
    parts.extensions.insert(verdict.service);

    next.run(Request::from_parts(parts, body)).await
}

pub fn require_auth(state: &AuthState) -> AuthGuard {
    AuthGuard::new(state, Requirement::Authenticated)
}

pub fn require_role(state: &AuthState, roles: &[UserRole]) -> AuthGuard {
    AuthGuard::new(state, Requirement::AnyRole(roles.to_vec()))
}

pub fn require_permission(state: &AuthState, permission: Permission) -> AuthGuard {
    AuthGuard::new(state, Requirement::Permission(permission))
}

pub fn require_admin(state: &AuthState) -> AuthGuard {
    AuthGuard::new(state, Requirement::Admin)
}

pub fn require_admin_or_instructor(state: &AuthState) -> AuthGuard {
    AuthGuard::new(state, Requirement::AdminOrInstructor)
}

pub fn require_hr_admin(state: &AuthState) -> AuthGuard {
    AuthGuard::new(state, Requirement::HrAdmin)
}

pub fn require_org_admin(state: &AuthState) -> AuthGuard {
    AuthGuard::new(state, Requirement::OrgAdmin)
}

pub fn require_plant_manager(state: &AuthState) -> AuthGuard {
    AuthGuard::new(state, Requirement::PlantManager)
}

pub fn require_admin_with_plant_access(state: &AuthState) -> AuthGuard {
    AuthGuard::new(state, Requirement::AdminWithPlantAccess)
}

pub fn require_plant_access(state: &AuthState) -> AuthGuard {
    AuthGuard::new(state, Requirement::PlantAccess)
}

pub fn require_own_plant(state: &AuthState) -> AuthGuard {
    AuthGuard::new(state, Requirement::OwnPlant)
}

/// Guard on an arbitrary predicate over the resolved identity
pub fn require<F>(state: &AuthState, name: impl Into<String>, check: F) -> AuthGuard
where
    F: Fn(&AuthResult) -> bool + Send + Sync + 'static,
{
    AuthGuard::new(
        state,
        Requirement::Predicate {
            name: name.into(),
            check: Arc::new(check),
        },
    )
}
