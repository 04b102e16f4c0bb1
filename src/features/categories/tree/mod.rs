//! Category hierarchy: building the forest from flat records and projecting
//! it for display.

mod builder;
mod projection;

pub use builder::{ancestor_count, build_forest, descendant_ids, flatten, subtree_height};
pub use projection::{render, sort_records, TreeFilters};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashSet;

    use chrono::Utc;
    use uuid::Uuid;

    use crate::features::categories::models::{Category, CategoryNode};
    use crate::shared::validation::slugify;

    pub fn category(name: &str, parent_id: Option<Uuid>) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::now_v7(),
            parent_id,
            name: name.to_string(),
            slug: slugify(name),
            description: None,
            sort_order: 0,
            is_active: true,
            resource_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ids_of(forest: &[CategoryNode]) -> HashSet<Uuid> {
        super::flatten(forest).iter().map(|n| n.id()).collect()
    }
}
