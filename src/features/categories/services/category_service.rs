use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::categories::dtos::{
    CategoryListQuery, CategoryResponseDto, CategoryTreeDto, CreateCategoryDto,
    DeleteCategoryResponseDto, DeleteStrategy, RenderedTreeDto, SortDirection, SortKey,
    UpdateCategoryDto,
};
use crate::features::categories::models::{Category, CategoryChanges, NewCategory};
use crate::features::categories::repositories::CategoryRepository;
use crate::features::categories::tree::{
    ancestor_count, build_forest, descendant_ids, flatten, render, sort_records, subtree_height,
    TreeFilters,
};
use crate::shared::constants::MAX_CATEGORY_DEPTH;
use crate::shared::validation::{slugify, SLUG_REGEX};

/// Service for category operations.
///
/// Every mutation validates against a fresh repository snapshot, never a
/// cached tree, and fails without touching the store when a check fails.
/// Mutations hold `write_lock` from that snapshot until their write lands,
/// so two concurrent moves cannot both pass the cycle check.
pub struct CategoryService {
    repository: Arc<dyn CategoryRepository>,
    timeout: Duration,
    default_delete_strategy: DeleteStrategy,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for CategoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryService")
            .field("repository", &"<dyn CategoryRepository>")
            .field("timeout", &self.timeout)
            .field("default_delete_strategy", &self.default_delete_strategy)
            .finish()
    }
}

impl CategoryService {
    pub fn new(
        repository: Arc<dyn CategoryRepository>,
        timeout: Duration,
        default_delete_strategy: DeleteStrategy,
    ) -> Self {
        Self {
            repository,
            timeout,
            default_delete_strategy,
            write_lock: Mutex::new(()),
        }
    }

    /// Run a repository call under the configured timeout
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Category repository call timed out"
                );
                Err(AppError::RepositoryTimeout(format!(
                    "{} did not complete within {:?}",
                    operation, self.timeout
                )))
            }
        }
    }

    async fn snapshot(&self) -> Result<Vec<Category>> {
        self.call("fetch_all", self.repository.fetch_all()).await
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// List all active categories (flat list), ordered by sort order then name
    pub async fn list_active(&self) -> Result<Vec<CategoryResponseDto>> {
        let mut categories: Vec<Category> = self
            .snapshot()
            .await?
            .into_iter()
            .filter(|c| c.is_active)
            .collect();

        sort_records(&mut categories, SortKey::Name, SortDirection::Asc);
        sort_records(&mut categories, SortKey::SortOrder, SortDirection::Asc);

        Ok(categories.into_iter().map(|c| c.into()).collect())
    }

    /// List all active categories as tree structure
    pub async fn list_active_tree(&self) -> Result<Vec<CategoryTreeDto>> {
        let categories = self.snapshot().await?;
        Ok(render(categories, &TreeFilters::default()).roots)
    }

    /// Get an active category by slug
    pub async fn get_by_slug(&self, slug: &str) -> Result<CategoryResponseDto> {
        self.snapshot()
            .await?
            .into_iter()
            .find(|c| c.slug == slug && c.is_active)
            .map(|c| c.into())
            .ok_or_else(|| AppError::NotFound(format!("Category '{}' not found", slug)))
    }

    /// Get any category by id
    pub async fn get_by_id(&self, id: Uuid) -> Result<CategoryResponseDto> {
        let categories = self.snapshot().await?;
        Ok(find(&categories, id)?.clone().into())
    }

    /// Flat list for the admin console, depth-first so parents precede
    /// their children and siblings follow the requested order
    pub async fn list(&self, params: &CategoryListQuery) -> Result<Vec<CategoryResponseDto>> {
        let mut categories = self.snapshot().await?;
        if !params.include_inactive {
            categories.retain(|c| c.is_active);
        }
        sort_records(&mut categories, params.sort, params.direction);

        let forest = build_forest(&categories);
        Ok(flatten(&forest)
            .into_iter()
            .map(|node| node.category.clone().into())
            .collect())
    }

    /// Render the tree with the given view filters
    pub async fn render(&self, filters: &TreeFilters) -> Result<RenderedTreeDto> {
        let categories = self.snapshot().await?;
        Ok(render(categories, filters))
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Create a new category
    pub async fn create(&self, dto: CreateCategoryDto) -> Result<CategoryResponseDto> {
        let name = validate_name(&dto.name)?;
        let slug = resolve_slug(&name, dto.slug.as_deref())?;

        let _guard = self.write_lock.lock().await;
        let categories = self.snapshot().await?;
        ensure_slug_available(&categories, &slug, None)?;
        if let Some(parent_id) = dto.parent_id {
            find(&categories, parent_id)?;
            ensure_depth(&categories, parent_id, 0)?;
        }

        let new_category = NewCategory {
            id: Uuid::now_v7(),
            parent_id: dto.parent_id,
            name,
            slug,
            description: normalize_description(dto.description),
            sort_order: dto.sort_order,
            is_active: dto.is_active,
        };

        let category = self
            .call("insert", self.repository.insert(new_category))
            .await?;

        tracing::info!(
            category_id = %category.id,
            slug = %category.slug,
            parent_id = ?category.parent_id,
            "Category created"
        );

        Ok(category.into())
    }

    /// Update (rename, move, reorder, toggle) a category in one call
    pub async fn update(&self, id: Uuid, dto: UpdateCategoryDto) -> Result<CategoryResponseDto> {
        let _guard = self.write_lock.lock().await;
        let categories = self.snapshot().await?;
        find(&categories, id)?;

        let name = dto.name.as_deref().map(validate_name).transpose()?;
        let slug = match dto.slug.as_deref() {
            Some(slug) => Some(validate_slug(slug)?),
            None => None,
        };
        if let Some(ref slug) = slug {
            ensure_slug_available(&categories, slug, Some(id))?;
        }
        if let Some(new_parent) = dto.parent_id {
            ensure_valid_parent(&categories, id, new_parent)?;
        }

        let changes = CategoryChanges {
            name,
            slug,
            description: dto.description.map(normalize_description),
            parent_id: dto.parent_id,
            sort_order: dto.sort_order,
            is_active: dto.is_active,
        };

        if changes.is_empty() {
            return Err(AppError::Validation(
                "At least one field must be provided".to_string(),
            ));
        }

        let category = self
            .call("update", self.repository.update(id, changes))
            .await?;

        tracing::info!(category_id = %id, "Category updated");

        Ok(category.into())
    }

    /// Move a category under a new parent, or to the root with `None`
    pub async fn reparent(
        &self,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<CategoryResponseDto> {
        let _guard = self.write_lock.lock().await;
        let categories = self.snapshot().await?;
        find(&categories, id)?;
        ensure_valid_parent(&categories, id, new_parent_id)?;

        let changes = CategoryChanges {
            parent_id: Some(new_parent_id),
            ..Default::default()
        };
        let category = self
            .call("update", self.repository.update(id, changes))
            .await?;

        tracing::info!(
            category_id = %id,
            parent_id = ?new_parent_id,
            "Category reparented"
        );

        Ok(category.into())
    }

    /// Change a category's sort order among its siblings
    pub async fn reorder(&self, id: Uuid, sort_order: i32) -> Result<CategoryResponseDto> {
        let changes = CategoryChanges {
            sort_order: Some(sort_order),
            ..Default::default()
        };
        let _guard = self.write_lock.lock().await;
        let category = self
            .call("update", self.repository.update(id, changes))
            .await?;

        tracing::info!(category_id = %id, sort_order, "Category reordered");

        Ok(category.into())
    }

    /// Flip `is_active`. Descendants keep their own flag.
    pub async fn toggle_active(&self, id: Uuid) -> Result<CategoryResponseDto> {
        let _guard = self.write_lock.lock().await;
        let categories = self.snapshot().await?;
        let current = find(&categories, id)?;

        let changes = CategoryChanges {
            is_active: Some(!current.is_active),
            ..Default::default()
        };
        let category = self
            .call("update", self.repository.update(id, changes))
            .await?;

        tracing::info!(
            category_id = %id,
            is_active = category.is_active,
            "Category active flag toggled"
        );

        Ok(category.into())
    }

    /// Delete a category and handle its descendants per `strategy`
    pub async fn delete(
        &self,
        id: Uuid,
        strategy: Option<DeleteStrategy>,
    ) -> Result<DeleteCategoryResponseDto> {
        let strategy = strategy.unwrap_or(self.default_delete_strategy);

        let _guard = self.write_lock.lock().await;
        let categories = self.snapshot().await?;
        let target = find(&categories, id)?;

        let response = match strategy {
            DeleteStrategy::Cascade => {
                let mut doomed = vec![id];
                doomed.extend(descendant_ids(&categories, id));

                if doomed.len() == 1 {
                    self.call("delete", self.repository.delete(id)).await?;
                } else {
                    let removed = self
                        .call("delete_many", self.repository.delete_many(&doomed))
                        .await?;
                    if removed != doomed.len() as u64 {
                        tracing::error!(
                            category_id = %id,
                            expected = doomed.len(),
                            removed,
                            "Cascade delete removed a different number of categories than planned"
                        );
                        return Err(AppError::Repository(format!(
                            "cascade delete of {} removed {} of {} categories",
                            id,
                            removed,
                            doomed.len()
                        )));
                    }
                }

                DeleteCategoryResponseDto {
                    strategy,
                    deleted_ids: doomed,
                    reparented_ids: Vec::new(),
                }
            }
            DeleteStrategy::ReparentChildren => {
                let children: Vec<Uuid> = categories
                    .iter()
                    .filter(|c| c.parent_id == Some(id) && c.id != id)
                    .map(|c| c.id)
                    .collect();
                // A dangling grandparent would orphan the children again
                let new_parent = target
                    .parent_id
                    .filter(|p| *p != id && categories.iter().any(|c| c.id == *p));

                self.call(
                    "delete_and_reparent",
                    self.repository.delete_and_reparent(id, &children, new_parent),
                )
                .await?;

                DeleteCategoryResponseDto {
                    strategy,
                    deleted_ids: vec![id],
                    reparented_ids: children,
                }
            }
        };

        tracing::info!(
            category_id = %id,
            strategy = ?strategy,
            deleted = response.deleted_ids.len(),
            reparented = response.reparented_ids.len(),
            "Category deleted"
        );

        Ok(response)
    }
}

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

fn find(categories: &[Category], id: Uuid) -> Result<&Category> {
    categories
        .iter()
        .find(|c| c.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

fn validate_slug(slug: &str) -> Result<String> {
    let slug = slug.trim();
    if !SLUG_REGEX.is_match(slug) {
        return Err(AppError::Validation(format!(
            "slug '{}' must be lowercase alphanumeric segments separated by single hyphens",
            slug
        )));
    }
    Ok(slug.to_string())
}

/// Use the supplied slug, or derive one from the name
fn resolve_slug(name: &str, slug: Option<&str>) -> Result<String> {
    match slug {
        Some(slug) => validate_slug(slug),
        None => {
            let derived = slugify(name);
            if derived.is_empty() {
                return Err(AppError::Validation(format!(
                    "cannot derive a slug from name '{}'; provide one explicitly",
                    name
                )));
            }
            Ok(derived)
        }
    }
}

fn ensure_slug_available(categories: &[Category], slug: &str, exclude: Option<Uuid>) -> Result<()> {
    let taken = categories
        .iter()
        .any(|c| c.slug == slug && Some(c.id) != exclude);
    if taken {
        return Err(AppError::SlugConflict(format!(
            "Slug '{}' is already used by another category",
            slug
        )));
    }
    Ok(())
}

/// Reject a parent that does not exist or would close a loop
fn ensure_valid_parent(categories: &[Category], id: Uuid, new_parent: Option<Uuid>) -> Result<()> {
    let Some(parent_id) = new_parent else {
        return Ok(());
    };

    if parent_id == id {
        return Err(AppError::Cycle(
            "A category cannot be its own parent".to_string(),
        ));
    }

    find(categories, parent_id)?;

    if descendant_ids(categories, id).contains(&parent_id) {
        return Err(AppError::Cycle(format!(
            "Category {} is a descendant of {}; moving there would create a cycle",
            parent_id, id
        )));
    }

    ensure_depth(categories, parent_id, subtree_height(categories, id))
}

/// Reject placing a subtree of the given height under `parent_id` when its
/// deepest node would land past the depth limit
fn ensure_depth(categories: &[Category], parent_id: Uuid, height: u32) -> Result<()> {
    let deepest_level = ancestor_count(categories, parent_id) + 1 + height;
    if deepest_level >= MAX_CATEGORY_DEPTH {
        return Err(AppError::Validation(format!(
            "Category tree cannot be deeper than {} levels",
            MAX_CATEGORY_DEPTH
        )));
    }
    Ok(())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
