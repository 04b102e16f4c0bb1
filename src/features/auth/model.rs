use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::constants::{ROLE_CONTENT_ADMIN, ROLE_SUPER_ADMIN};

/// Caller identity resolved from a verified bearer token
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub sub: String,
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    /// Check if user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(ROLE_SUPER_ADMIN)
    }

    /// Content admins manage the category hierarchy but nothing else
    pub fn is_content_admin(&self) -> bool {
        self.has_role(ROLE_CONTENT_ADMIN)
    }

    /// Check if user may manage categories (super_admin or content_admin)
    pub fn has_admin_access(&self) -> bool {
        self.is_super_admin() || self.is_content_admin()
    }
}
