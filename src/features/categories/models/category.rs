use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored category record, as returned by the repository.
///
/// `parent_id` is the only structural edge; children and depth are derived by
/// the tree builder on every read. `resource_count` is an aggregate the
/// repository computes from resource associations.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Category {
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

/// Fields for inserting a new category (already validated)
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
}

/// Partial update of a category.
///
/// `None` leaves a field untouched. For the nullable columns the inner option
/// is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<Uuid>>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

impl CategoryChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the changes onto a record in place and bump `updated_at`
    pub fn apply_to(&self, category: &mut Category, now: DateTime<Utc>) {
        if let Some(ref name) = self.name {
            category.name = name.clone();
        }
        if let Some(ref slug) = self.slug {
            category.slug = slug.clone();
        }
        if let Some(ref description) = self.description {
            category.description = description.clone();
        }
        if let Some(parent_id) = self.parent_id {
            category.parent_id = parent_id;
        }
        if let Some(sort_order) = self.sort_order {
            category.sort_order = sort_order;
        }
        if let Some(is_active) = self.is_active {
            category.is_active = is_active;
        }
        category.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::now_v7(),
            parent_id: Some(Uuid::now_v7()),
            name: "Physics".to_string(),
            slug: "physics".to_string(),
            description: Some("Mechanics and waves".to_string()),
            sort_order: 3,
            is_active: true,
            resource_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_empty_changes_only_touch_timestamp() {
        let mut category = sample();
        let before = category.clone();
        let later = before.updated_at + chrono::Duration::seconds(5);

        let changes = CategoryChanges::default();
        assert!(changes.is_empty());
        changes.apply_to(&mut category, later);

        assert_eq!(category.name, before.name);
        assert_eq!(category.parent_id, before.parent_id);
        assert_eq!(category.updated_at, later);
    }

    #[test]
    fn test_changes_clear_nullable_fields() {
        let mut category = sample();
        let changes = CategoryChanges {
            description: Some(None),
            parent_id: Some(None),
            ..Default::default()
        };
        assert!(!changes.is_empty());

        changes.apply_to(&mut category, Utc::now());

        assert_eq!(category.description, None);
        assert_eq!(category.parent_id, None);
        assert_eq!(category.name, "Physics");
    }
}
