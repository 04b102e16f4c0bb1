use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::categories::models::{Category, CategoryChanges, NewCategory};
use crate::features::categories::repositories::CategoryRepository;

#[derive(Default)]
struct MemoryState {
    categories: Vec<Category>,
    /// (category_id, resource_id)
    resource_links: Vec<(Uuid, Uuid)>,
}

impl MemoryState {
    fn position(&self, id: Uuid) -> Option<usize> {
        self.categories.iter().position(|c| c.id == id)
    }

    fn resource_count(&self, id: Uuid) -> i64 {
        self.resource_links
            .iter()
            .filter(|(category_id, _)| *category_id == id)
            .count() as i64
    }

    fn with_count(&self, category: &Category) -> Category {
        Category {
            resource_count: self.resource_count(category.id),
            ..category.clone()
        }
    }

    /// Same guarantees the Postgres schema gives: unique slug, existing parent
    fn check_constraints(&self, id: Uuid, slug: &str, parent_id: Option<Uuid>) -> Result<()> {
        if self
            .categories
            .iter()
            .any(|c| c.id != id && c.slug == slug)
        {
            return Err(AppError::SlugConflict(
                "A category with this slug already exists. Please choose a different name or slug."
                    .to_string(),
            ));
        }
        if let Some(parent_id) = parent_id {
            if parent_id != id && self.position(parent_id).is_none() {
                return Err(AppError::NotFound(
                    "Referenced parent category does not exist."
                        .to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Category store kept in process memory.
///
/// Used when `CATEGORY_STORE=memory` and by tests. Each call holds the lock
/// for its whole duration, so multi-record operations are atomic.
#[derive(Default)]
pub struct InMemoryCategoryRepository {
    state: RwLock<MemoryState>,
}

impl InMemoryCategoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records, bypassing validation
    #[cfg(test)]
    pub fn with_records(categories: Vec<Category>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                categories,
                resource_links: Vec::new(),
            }),
        }
    }

    /// Associate a resource with a category
    #[cfg(test)]
    pub async fn attach_resource(&self, category_id: Uuid, resource_id: Uuid) {
        self.state
            .write()
            .await
            .resource_links
            .push((category_id, resource_id));
    }

    #[cfg(test)]
    pub async fn resource_link_count(&self) -> usize {
        self.state.read().await.resource_links.len()
    }
}

#[async_trait]
impl CategoryRepository for InMemoryCategoryRepository {
    async fn fetch_all(&self) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        Ok(state
            .categories
            .iter()
            .map(|c| state.with_count(c))
            .collect())
    }

    async fn insert(&self, category: NewCategory) -> Result<Category> {
        let mut state = self.state.write().await;

        if state.position(category.id).is_some() {
            return Err(AppError::Repository(format!(
                "Category with id {} already exists",
                category.id
            )));
        }
        state.check_constraints(category.id, &category.slug, category.parent_id)?;

        let now = Utc::now();
        let record = Category {
            id: category.id,
            parent_id: category.parent_id,
            name: category.name,
            slug: category.slug,
            description: category.description,
            sort_order: category.sort_order,
            is_active: category.is_active,
            resource_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.categories.push(record.clone());

        Ok(record)
    }

    async fn update(&self, id: Uuid, changes: CategoryChanges) -> Result<Category> {
        let mut state = self.state.write().await;

        let position = state
            .position(id)
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))?;

        let mut updated = state.categories[position].clone();
        changes.apply_to(&mut updated, Utc::now());
        state.check_constraints(id, &updated.slug, updated.parent_id)?;

        state.categories[position] = updated;
        Ok(state.with_count(&state.categories[position]))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;

        let position = state
            .position(id)
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))?;

        if state.categories.iter().any(|c| c.parent_id == Some(id)) {
            return Err(AppError::InUse(format!(
                "Category {} still has children",
                id
            )));
        }

        state.categories.remove(position);
        state.resource_links.retain(|(category_id, _)| *category_id != id);
        Ok(())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64> {
        let mut state = self.state.write().await;
        let doomed: HashSet<Uuid> = ids.iter().copied().collect();

        if let Some(missing) = doomed.iter().find(|id| state.position(**id).is_none()) {
            return Err(AppError::NotFound(format!(
                "Category with id {} not found; nothing was deleted",
                missing
            )));
        }

        // Refuse if a surviving record still points into the set
        if let Some(survivor) = state.categories.iter().find(|c| {
            !doomed.contains(&c.id) && c.parent_id.is_some_and(|p| doomed.contains(&p))
        }) {
            return Err(AppError::InUse(format!(
                "Category {} still references a category being deleted",
                survivor.id
            )));
        }

        let before = state.categories.len();
        state.categories.retain(|c| !doomed.contains(&c.id));
        state
            .resource_links
            .retain(|(category_id, _)| !doomed.contains(category_id));

        Ok((before - state.categories.len()) as u64)
    }

    async fn delete_and_reparent(
        &self,
        id: Uuid,
        children: &[Uuid],
        new_parent_id: Option<Uuid>,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        let position = state
            .position(id)
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))?;

        if let Some(parent_id) = new_parent_id {
            if parent_id == id || state.position(parent_id).is_none() {
                return Err(AppError::NotFound(
                    "Referenced parent category does not exist."
                        .to_string(),
                ));
            }
        }

        let moving: HashSet<Uuid> = children.iter().copied().collect();
        if state
            .categories
            .iter()
            .any(|c| c.parent_id == Some(id) && !moving.contains(&c.id))
        {
            return Err(AppError::InUse(format!(
                "Category {} still has children",
                id
            )));
        }

        let now = Utc::now();
        for category in state.categories.iter_mut() {
            if moving.contains(&category.id) {
                category.parent_id = new_parent_id;
                category.updated_at = now;
            }
        }
        state.categories.remove(position);
        state.resource_links.retain(|(category_id, _)| *category_id != id);

        Ok(())
    }
}
