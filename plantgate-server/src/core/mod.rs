pub mod error;
pub mod types;

pub use error::{AuthError, Result};
pub use types::{
    AdminRole, AdminRoleKind, AuthResult, AuthUser, Permission, Profile, StoreUser, TokenPair,
    UserContext, UserRole,
};
