//! Storage behind the category hierarchy manager.
//!
//! The service only talks to [`CategoryRepository`]. Two implementations
//! ship: Postgres for deployments and an in-memory store for local runs
//! without a database.

mod memory_category_repository;
mod pg_category_repository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::categories::models::{Category, CategoryChanges, NewCategory};

pub use memory_category_repository::InMemoryCategoryRepository;
pub use pg_category_repository::PgCategoryRepository;

/// Repository trait for category records.
///
/// Every call either applies fully or not at all. `resource_count` on the
/// returned records is supplied by the store.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Fetch every category, active or not.
    async fn fetch_all(&self) -> Result<Vec<Category>>;

    /// Insert a new category.
    async fn insert(&self, category: NewCategory) -> Result<Category>;

    /// Apply a partial update. Fails with `NotFound` for an unknown id.
    async fn update(&self, id: Uuid, changes: CategoryChanges) -> Result<Category>;

    /// Delete a single category that has no children.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Delete a set of categories and detach their resource associations.
    /// Returns the number of removed records, which is always `ids.len()`:
    /// if any id is already gone the call fails and nothing is removed.
    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64>;

    /// Move `children` under `new_parent_id`, then delete `id`.
    async fn delete_and_reparent(
        &self,
        id: Uuid,
        children: &[Uuid],
        new_parent_id: Option<Uuid>,
    ) -> Result<()>;
}
