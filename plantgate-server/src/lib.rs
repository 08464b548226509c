pub mod auth;
pub mod config;
pub mod core;
pub mod protocol;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use auth::{
    AuthGuard, AuthService, AuthState, PermissionService, Requirement, RoleService,
    TokenExtractor,
};
pub use config::ServerConfig;
pub use core::{
    AdminRole, AdminRoleKind, AuthError, AuthResult, AuthUser, Permission, Profile, TokenPair,
    UserContext, UserRole,
};
pub use protocol::ApiResponse;
pub use server::{AppState, create_router};
pub use store::{IdentityStore, MemoryIdentityStore, RequestCache, StoreError, SupabaseStore};
