pub mod extractor;
pub mod middleware;
pub mod plant;
pub mod roles;
pub mod service;
pub mod token;
pub mod wrappers;

pub use extractor::{AuthResultExtractor, IdentityHeaders, UserContextExtractor};
pub use middleware::{
    AuthGuard, Requirement, Verdict, enforce, require, require_admin, require_admin_or_instructor,
    require_admin_with_plant_access, require_auth, require_hr_admin, require_org_admin,
    require_own_plant, require_permission, require_plant_access, require_plant_manager,
    require_role,
};
pub use plant::PlantSelector;
pub use roles::{PermissionService, RoleService};
pub use service::AuthService;
pub use token::TokenExtractor;
pub use wrappers::{with_admin_auth, with_context_auth, with_user_auth};

use crate::config::AuthConfig;

/// Everything a guard or wrapper needs to resolve a request's identity
#[derive(Clone)]
pub struct AuthState {
    pub service: AuthService,
    pub tokens: TokenExtractor,
    pub plants: PlantSelector,
}

impl AuthState {
    pub fn new(service: AuthService, config: &AuthConfig) -> Self {
        Self {
            service,
            tokens: TokenExtractor::new(config),
            plants: PlantSelector::new(config),
        }
    }

    /// Same settings, with lookups memoized for one request
    pub fn scoped(&self) -> Self {
        Self {
            service: self.service.request_scoped(),
            tokens: self.tokens.clone(),
            plants: self.plants.clone(),
        }
    }

    pub fn roles(&self) -> RoleService {
        RoleService::new(self.service.clone())
    }

    pub fn permissions(&self) -> PermissionService {
        PermissionService::new(self.service.clone())
    }
}
