// =============================================================================
// ROLE CONSTANTS
// =============================================================================

/// Super admin role - full access to the admin console
pub const ROLE_SUPER_ADMIN: &str = "super_admin";

/// Content admin role - can manage categories and resources
pub const ROLE_CONTENT_ADMIN: &str = "content_admin";

// =============================================================================
// CATEGORY TREE LIMITS
// =============================================================================

/// Number of levels a category tree may hold (roots are level 0).
/// Keeps the nested tree JSON within serde_json's recursion limit.
pub const MAX_CATEGORY_DEPTH: u32 = 32;
