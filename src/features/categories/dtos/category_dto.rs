use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::categories::models::Category;
use crate::features::categories::tree::TreeFilters;
use crate::shared::validation::SLUG_REGEX;

// =============================================================================
// SORT / STRATEGY ENUMS
// =============================================================================

/// Field used to order siblings before the tree is built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    #[default]
    SortOrder,
    CreatedAt,
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// What happens to the descendants of a deleted category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStrategy {
    /// Delete the whole subtree and detach its resource associations
    #[default]
    Cascade,
    /// Move direct children up to the deleted category's parent
    ReparentChildren,
}

impl FromStr for DeleteStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "cascade" => Ok(Self::Cascade),
            "reparent_children" => Ok(Self::ReparentChildren),
            other => Err(format!(
                "delete strategy must be 'cascade' or 'reparent_children', got '{}'",
                other
            )),
        }
    }
}

/// Deserialize a present JSON field (including `null`) as `Some(..)` so that
/// an absent field and an explicit `null` can be told apart.
fn deserialize_some<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// =============================================================================
// REQUEST DTOs
// =============================================================================

// Create request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryDto {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    /// Derived from `name` when omitted
    #[validate(length(min = 1, max = 200), regex(path = *SLUG_REGEX, message = "slug must be lowercase alphanumeric segments separated by single hyphens (e.g., 'linear-algebra')"))]
    pub slug: Option<String>,

    pub description: Option<String>,

    /// Parent category; omit for a root category
    pub parent_id: Option<Uuid>,

    #[serde(default)]
    pub sort_order: i32,

    #[serde(default = "default_is_active")]
    pub is_active: bool,
}

fn default_is_active() -> bool {
    true
}

// Update request. `parent_id` and `description` accept `null` to clear.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryDto {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 200), regex(path = *SLUG_REGEX, message = "slug must be lowercase alphanumeric segments separated by single hyphens (e.g., 'linear-algebra')"))]
    pub slug: Option<String>,

    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<Uuid>, nullable)]
    pub parent_id: Option<Option<Uuid>>,

    pub sort_order: Option<i32>,

    pub is_active: Option<bool>,
}

/// Move a category under a new parent (drag-and-drop)
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReparentCategoryDto {
    /// New parent; `null` moves the category to the root level
    pub parent_id: Option<Uuid>,
}

/// Change a category's position among its siblings
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReorderCategoryDto {
    pub sort_order: i32,
}

// =============================================================================
// QUERY PARAMS
// =============================================================================

/// Query params for the admin flat list
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CategoryListQuery {
    /// Sort field (default: sort_order)
    #[serde(default)]
    pub sort: SortKey,
    /// Sort direction (default: asc)
    #[serde(default)]
    pub direction: SortDirection,
    /// Include inactive categories (default: false)
    #[serde(default)]
    pub include_inactive: bool,
}

/// Query params for the admin tree view
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CategoryTreeQuery {
    /// Case-insensitive search in name, slug or description
    pub search: Option<String>,
    /// Include inactive categories (default: false)
    #[serde(default)]
    pub include_inactive: bool,
    /// Sibling sort field (default: sort_order)
    #[serde(default)]
    pub sort: SortKey,
    /// Sort direction (default: asc)
    #[serde(default)]
    pub direction: SortDirection,
    /// Comma-separated ids of expanded nodes. Omit to expand everything.
    pub expanded: Option<String>,
}

impl CategoryTreeQuery {
    pub fn into_filters(self) -> Result<TreeFilters> {
        let expanded = match self.expanded {
            Some(raw) => Some(parse_id_list(&raw)?),
            None => None,
        };

        Ok(TreeFilters {
            include_inactive: self.include_inactive,
            search: self.search,
            sort: self.sort,
            direction: self.direction,
            expanded,
        })
    }
}

fn parse_id_list(raw: &str) -> Result<HashSet<Uuid>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s)
                .map_err(|_| AppError::BadRequest(format!("Invalid category id in expanded: '{}'", s)))
        })
        .collect()
}

/// Query params for deleting a category
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct DeleteCategoryQuery {
    /// cascade (default) or reparent_children
    pub strategy: Option<DeleteStrategy>,
}

// =============================================================================
// RESPONSE DTOs
// =============================================================================

/// Response DTO for category
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponseDto {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub resource_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponseDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            parent_id: c.parent_id,
            name: c.name,
            slug: c.slug,
            description: c.description,
            sort_order: c.sort_order,
            is_active: c.is_active,
            resource_count: c.resource_count,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Response DTO for a rendered tree node (hierarchical structure)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(no_recursion)]
pub struct CategoryTreeDto {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub resource_count: i64,
    /// Depth from the root (roots are 0)
    pub level: u32,
    /// Whether the node has visible children, even if they are collapsed
    pub has_children: bool,
    /// Whether `children` was rendered
    pub is_expanded: bool,
    pub children: Vec<CategoryTreeDto>,
}

/// Rendered forest plus counters for the console
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RenderedTreeDto {
    pub roots: Vec<CategoryTreeDto>,
    /// Number of stored categories
    pub total: usize,
    /// Number of categories left after active/search filtering
    pub visible: usize,
}

/// Result of a delete
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteCategoryResponseDto {
    pub strategy: DeleteStrategy,
    /// Every category removed from the store
    pub deleted_ids: Vec<Uuid>,
    /// Children moved to the deleted category's parent
    pub reparented_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_dto_distinguishes_null_from_absent() {
        let absent: UpdateCategoryDto = serde_json::from_str(r#"{"name":"Algebra"}"#).unwrap();
        assert_eq!(absent.parent_id, None);
        assert_eq!(absent.description, None);

        let cleared: UpdateCategoryDto =
            serde_json::from_str(r#"{"parent_id":null,"description":null}"#).unwrap();
        assert_eq!(cleared.parent_id, Some(None));
        assert_eq!(cleared.description, Some(None));
    }

    #[test]
    fn test_create_dto_defaults() {
        let dto: CreateCategoryDto = serde_json::from_str(r#"{"name":"Biology"}"#).unwrap();
        assert_eq!(dto.sort_order, 0);
        assert!(dto.is_active);
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_create_dto_rejects_malformed_slug() {
        let dto: CreateCategoryDto =
            serde_json::from_str(r#"{"name":"Biology","slug":"Bio Logy"}"#).unwrap();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_tree_query_parses_expanded_ids() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let query = CategoryTreeQuery {
            expanded: Some(format!("{}, {},", a, b)),
            ..Default::default()
        };

        let filters = query.into_filters().unwrap();
        let expanded = filters.expanded.unwrap();
        assert_eq!(expanded.len(), 2);
        assert!(expanded.contains(&a) && expanded.contains(&b));
    }

    #[test]
    fn test_tree_query_rejects_bad_expanded_id() {
        let query = CategoryTreeQuery {
            expanded: Some("not-a-uuid".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.into_filters(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_delete_strategy_from_str() {
        assert_eq!("cascade".parse::<DeleteStrategy>(), Ok(DeleteStrategy::Cascade));
        assert_eq!(
            "reparent_children".parse::<DeleteStrategy>(),
            Ok(DeleteStrategy::ReparentChildren)
        );
        assert!("orphan".parse::<DeleteStrategy>().is_err());
    }
}
