use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::categories::models::{Category, CategoryChanges, NewCategory};
use crate::features::categories::repositories::CategoryRepository;

/// Statement kind, used to read constraint violations in context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbOperation {
    Read,
    /// INSERT or UPDATE; a FK violation means the parent is missing
    Write,
    /// DELETE; a FK violation means a child still points at the row
    Delete,
}

/// Map a SQLSTATE to a domain error, if it is one the service reports
fn constraint_error(code: &str, constraint: Option<&str>, operation: DbOperation) -> Option<AppError> {
    match (code, operation) {
        // unique_violation
        ("23505", _) => Some(match constraint {
            Some(name) if name.contains("slug") => AppError::SlugConflict(
                "A category with this slug already exists. Please choose a different name or slug."
                    .to_string(),
            ),
            _ => AppError::SlugConflict("Category already exists.".to_string()),
        }),
        // foreign_key_violation
        ("23503", DbOperation::Delete) => Some(AppError::InUse(
            "Category is still referenced by another category.".to_string(),
        )),
        ("23503", _) => Some(AppError::NotFound(
            "Referenced parent category does not exist.".to_string(),
        )),
        _ => None,
    }
}

/// Convert database error to more specific AppError with user-friendly messages
fn handle_db_error(e: sqlx::Error, operation: DbOperation) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if let Some(mapped) = db_err
            .code()
            .and_then(|code| constraint_error(&code, db_err.constraint(), operation))
        {
            return mapped;
        }
    }

    tracing::error!(?operation, "Category repository error: {:?}", e);
    AppError::Database(e)
}

fn db_error(operation: DbOperation) -> impl Fn(sqlx::Error) -> AppError {
    move |e| handle_db_error(e, operation)
}

/// Postgres-backed category store
pub struct PgCategoryRepository {
    pool: PgPool,
}

impl PgCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn fetch_all(&self) -> Result<Vec<Category>> {
        // LEFT JOIN so categories without resources are still listed
        sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.parent_id, c.name, c.slug, c.description, c.sort_order, c.is_active,
                   COUNT(cr.resource_id) AS resource_count,
                   c.created_at, c.updated_at
            FROM categories c
            LEFT JOIN category_resources cr ON cr.category_id = c.id
            GROUP BY c.id
            ORDER BY c.created_at, c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error(DbOperation::Read))
    }

    async fn insert(&self, category: NewCategory) -> Result<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, parent_id, name, slug, description, sort_order, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, parent_id, name, slug, description, sort_order, is_active,
                      0::BIGINT AS resource_count, created_at, updated_at
            "#,
        )
        .bind(category.id)
        .bind(category.parent_id)
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.sort_order)
        .bind(category.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error(DbOperation::Write))
    }

    async fn update(&self, id: Uuid, changes: CategoryChanges) -> Result<Category> {
        // Nullable columns use an explicit "set" flag so NULL can be written
        sqlx::query_as::<_, Category>(
            r#"
            WITH updated AS (
                UPDATE categories
                SET name = COALESCE($2, name),
                    slug = COALESCE($3, slug),
                    description = CASE WHEN $4 THEN $5 ELSE description END,
                    parent_id = CASE WHEN $6 THEN $7 ELSE parent_id END,
                    sort_order = COALESCE($8, sort_order),
                    is_active = COALESCE($9, is_active),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING id, parent_id, name, slug, description, sort_order, is_active,
                          created_at, updated_at
            )
            SELECT u.id, u.parent_id, u.name, u.slug, u.description, u.sort_order, u.is_active,
                   (SELECT COUNT(*) FROM category_resources cr WHERE cr.category_id = u.id) AS resource_count,
                   u.created_at, u.updated_at
            FROM updated u
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.slug)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .bind(changes.parent_id.is_some())
        .bind(changes.parent_id.flatten())
        .bind(changes.sort_order)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error(DbOperation::Write))?
        .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error(DbOperation::Delete))?;

        sqlx::query("DELETE FROM category_resources WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(DbOperation::Delete))?;

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(DbOperation::Delete))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Category with id {} not found",
                id
            )));
        }

        tx.commit().await.map_err(db_error(DbOperation::Delete))?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(db_error(DbOperation::Delete))?;

        sqlx::query("DELETE FROM category_resources WHERE category_id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await
            .map_err(db_error(DbOperation::Delete))?;

        // One statement, so the parent FK is checked after the whole set is gone
        let result = sqlx::query("DELETE FROM categories WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await
            .map_err(db_error(DbOperation::Delete))?;

        let expected = ids.iter().collect::<HashSet<_>>().len() as u64;
        if result.rows_affected() != expected {
            // dropping `tx` rolls back the partial delete
            return Err(AppError::NotFound(format!(
                "Expected to delete {} categories but found {}; nothing was deleted",
                expected,
                result.rows_affected()
            )));
        }

        tx.commit().await.map_err(db_error(DbOperation::Delete))?;
        Ok(result.rows_affected())
    }

    async fn delete_and_reparent(
        &self,
        id: Uuid,
        children: &[Uuid],
        new_parent_id: Option<Uuid>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_error(DbOperation::Delete))?;

        sqlx::query(
            r#"
            UPDATE categories
            SET parent_id = $2, updated_at = NOW()
            WHERE id = ANY($1)
            "#,
        )
        .bind(children)
        .bind(new_parent_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error(DbOperation::Write))?;

        sqlx::query("DELETE FROM category_resources WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(DbOperation::Delete))?;

        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error(DbOperation::Delete))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Category with id {} not found",
                id
            )));
        }

        tx.commit().await.map_err(db_error(DbOperation::Delete))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_fk_violation_depends_on_operation() {
        assert!(matches!(
            constraint_error("23503", Some("categories_parent_id_fkey"), DbOperation::Write),
            Some(AppError::NotFound(_))
        ));
        assert!(matches!(
            constraint_error("23503", Some("categories_parent_id_fkey"), DbOperation::Delete),
            Some(AppError::InUse(_))
        ));
    }

    #[test]
    fn test_unique_violation_is_slug_conflict() {
        assert!(matches!(
            constraint_error("23505", Some("categories_slug_key"), DbOperation::Write),
            Some(AppError::SlugConflict(_))
        ));
        assert!(constraint_error("40001", None, DbOperation::Write).is_none());
    }

    /// Repository on the database named by `DATABASE_URL`, migrated.
    /// Returns `None` when no database is configured so the suite still
    /// runs without Postgres.
    async fn repository() -> Option<PgCategoryRepository> {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect to DATABASE_URL");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        Some(PgCategoryRepository::new(pool))
    }

    /// Slugs carry a random suffix so parallel tests never collide
    fn new_category(name: &str, parent_id: Option<Uuid>) -> NewCategory {
        let id = Uuid::now_v7();
        NewCategory {
            id,
            parent_id,
            name: name.to_string(),
            slug: format!("{}-{}", crate::shared::validation::slugify(name), id.simple()),
            description: None,
            sort_order: 0,
            is_active: true,
        }
    }

    async fn fetch(repo: &PgCategoryRepository, id: Uuid) -> Option<Category> {
        repo.fetch_all()
            .await
            .unwrap()
            .into_iter()
            .find(|c| c.id == id)
    }

    async fn attach_resource(repo: &PgCategoryRepository, category_id: Uuid) {
        sqlx::query("INSERT INTO category_resources (category_id, resource_id) VALUES ($1, $2)")
            .bind(category_id)
            .bind(Uuid::now_v7())
            .execute(&repo.pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_resource_count() {
        let Some(repo) = repository().await else {
            return;
        };
        let root = repo.insert(new_category("Pg Root", None)).await.unwrap();
        let empty = repo
            .insert(new_category("Pg Empty", Some(root.id)))
            .await
            .unwrap();
        attach_resource(&repo, root.id).await;
        attach_resource(&repo, root.id).await;

        assert_eq!(fetch(&repo, root.id).await.unwrap().resource_count, 2);
        // LEFT JOIN keeps categories without resources
        assert_eq!(fetch(&repo, empty.id).await.unwrap().resource_count, 0);

        assert_ok!(repo.delete_many(&[root.id, empty.id]).await);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let Some(repo) = repository().await else {
            return;
        };
        let first = repo.insert(new_category("Pg Slug", None)).await.unwrap();
        let mut second = new_category("Pg Slug", None);
        second.slug = first.slug.clone();

        let result = repo.insert(second).await;
        assert!(matches!(result, Err(AppError::SlugConflict(_))));

        assert_ok!(repo.delete(first.id).await);
    }

    #[tokio::test]
    async fn test_insert_with_missing_parent_is_not_found() {
        let Some(repo) = repository().await else {
            return;
        };
        let result = repo
            .insert(new_category("Pg Orphan", Some(Uuid::now_v7())))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_sets_and_clears_nullable_columns() {
        let Some(repo) = repository().await else {
            return;
        };
        let root = repo.insert(new_category("Pg Parent", None)).await.unwrap();
        let mut child = new_category("Pg Child", None);
        child.description = Some("Initial".to_string());
        let child = repo.insert(child).await.unwrap();

        let moved = repo
            .update(
                child.id,
                CategoryChanges {
                    parent_id: Some(Some(root.id)),
                    sort_order: Some(7),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.parent_id, Some(root.id));
        assert_eq!(moved.sort_order, 7);
        // untouched columns keep their value
        assert_eq!(moved.description.as_deref(), Some("Initial"));

        let cleared = repo
            .update(
                child.id,
                CategoryChanges {
                    parent_id: Some(None),
                    description: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.parent_id, None);
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.sort_order, 7);

        assert_ok!(repo.delete_many(&[root.id, child.id]).await);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let Some(repo) = repository().await else {
            return;
        };
        let result = repo
            .update(
                Uuid::now_v7(),
                CategoryChanges {
                    sort_order: Some(1),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_many_removes_subtree_in_one_statement() {
        let Some(repo) = repository().await else {
            return;
        };
        let root = repo.insert(new_category("Pg Tree", None)).await.unwrap();
        let child = repo
            .insert(new_category("Pg Branch", Some(root.id)))
            .await
            .unwrap();
        let leaf = repo
            .insert(new_category("Pg Leaf", Some(child.id)))
            .await
            .unwrap();
        attach_resource(&repo, leaf.id).await;

        let removed = repo
            .delete_many(&[root.id, child.id, leaf.id])
            .await
            .unwrap();

        assert_eq!(removed, 3);
        assert!(fetch(&repo, root.id).await.is_none());
        assert!(fetch(&repo, leaf.id).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_many_rolls_back_when_an_id_is_gone() {
        let Some(repo) = repository().await else {
            return;
        };
        let root = repo.insert(new_category("Pg Keep", None)).await.unwrap();

        let result = repo.delete_many(&[root.id, Uuid::now_v7()]).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(fetch(&repo, root.id).await.is_some());
        assert_ok!(repo.delete(root.id).await);
    }

    #[tokio::test]
    async fn test_delete_referenced_parent_is_in_use() {
        let Some(repo) = repository().await else {
            return;
        };
        let root = repo.insert(new_category("Pg Busy", None)).await.unwrap();
        let child = repo
            .insert(new_category("Pg Busy Child", Some(root.id)))
            .await
            .unwrap();

        let result = repo.delete(root.id).await;
        assert!(matches!(result, Err(AppError::InUse(_))));

        assert_ok!(repo.delete_many(&[root.id, child.id]).await);
    }

    #[tokio::test]
    async fn test_delete_and_reparent_moves_children() {
        let Some(repo) = repository().await else {
            return;
        };
        let root = repo.insert(new_category("Pg Grand", None)).await.unwrap();
        let middle = repo
            .insert(new_category("Pg Middle", Some(root.id)))
            .await
            .unwrap();
        let first = repo
            .insert(new_category("Pg First", Some(middle.id)))
            .await
            .unwrap();
        let second = repo
            .insert(new_category("Pg Second", Some(middle.id)))
            .await
            .unwrap();

        assert_ok!(
            repo.delete_and_reparent(middle.id, &[first.id, second.id], Some(root.id))
                .await
        );

        assert!(fetch(&repo, middle.id).await.is_none());
        assert_eq!(fetch(&repo, first.id).await.unwrap().parent_id, Some(root.id));
        assert_eq!(fetch(&repo, second.id).await.unwrap().parent_id, Some(root.id));

        // a child left behind keeps the row referenced
        let lonely = repo
            .insert(new_category("Pg Lonely", Some(first.id)))
            .await
            .unwrap();
        assert_err!(repo.delete_and_reparent(first.id, &[], None).await);
        assert!(fetch(&repo, first.id).await.is_some());

        assert_ok!(
            repo.delete_many(&[root.id, first.id, second.id, lonely.id])
                .await
        );
    }
}
