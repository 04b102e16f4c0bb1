use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, AppQuery};
use crate::features::auth::guards::RequireAdmin;
use crate::features::categories::dtos::{
    CategoryListQuery, CategoryResponseDto, CategoryTreeDto, CategoryTreeQuery,
    CreateCategoryDto, DeleteCategoryQuery, DeleteCategoryResponseDto, RenderedTreeDto,
    ReorderCategoryDto, ReparentCategoryDto, UpdateCategoryDto,
};
use crate::features::categories::services::CategoryService;
use crate::shared::types::{ApiResponse, Meta};

// =============================================================================
// PUBLIC
// =============================================================================

/// Query params for listing categories
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCategoriesQuery {
    /// If true, return tree structure. Default: false (flat list)
    #[serde(default)]
    pub tree: bool,
}

/// List all active categories
///
/// Returns categories as flat list or tree structure based on `tree` query param.
#[utoipa::path(
    get,
    path = "/api/categories",
    params(ListCategoriesQuery),
    responses(
        (status = 200, description = "List of categories", body = ApiResponse<Vec<CategoryResponseDto>>),
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(service): State<Arc<CategoryService>>,
    AppQuery(query): AppQuery<ListCategoriesQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    // `total` counts roots in tree mode
    let (value, total) = if query.tree {
        let tree: Vec<CategoryTreeDto> = service.list_active_tree().await?;
        let total = tree.len();
        (to_json(tree)?, total)
    } else {
        let categories = service.list_active().await?;
        let total = categories.len();
        (to_json(categories)?, total)
    };

    Ok(Json(ApiResponse::success(
        Some(value),
        None,
        Some(Meta::total(total)),
    )))
}

fn to_json<T: serde::Serialize>(value: T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::Internal(format!("Failed to serialize categories: {}", e)))
}

/// Get category by slug
#[utoipa::path(
    get,
    path = "/api/categories/{slug}",
    params(
        ("slug" = String, Path, description = "Category slug")
    ),
    responses(
        (status = 200, description = "Category found", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found")
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(service): State<Arc<CategoryService>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.get_by_slug(&slug).await?;
    Ok(Json(ApiResponse::ok(category)))
}

// =============================================================================
// ADMIN
// =============================================================================

/// List categories as a flat, depth-first list (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/categories",
    params(CategoryListQuery),
    responses(
        (status = 200, description = "Categories retrieved successfully", body = ApiResponse<Vec<CategoryResponseDto>>),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "admin-categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn admin_list_categories(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    AppQuery(params): AppQuery<CategoryListQuery>,
) -> Result<Json<ApiResponse<Vec<CategoryResponseDto>>>> {
    let categories = service.list(&params).await?;
    Ok(Json(ApiResponse::list(categories)))
}

/// Render the category tree with search, visibility and expansion filters (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/categories/tree",
    params(CategoryTreeQuery),
    responses(
        (status = 200, description = "Rendered category tree", body = ApiResponse<RenderedTreeDto>),
        (status = 400, description = "Invalid query parameters"),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "admin-categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn admin_category_tree(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    AppQuery(query): AppQuery<CategoryTreeQuery>,
) -> Result<Json<ApiResponse<RenderedTreeDto>>> {
    let filters = query.into_filters()?;
    let tree = service.render(&filters).await?;
    Ok(Json(ApiResponse::ok(tree)))
}

/// Get a category by ID, active or not (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/categories/{id}",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category retrieved successfully", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found"),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "admin-categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn admin_get_category(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.get_by_id(id).await?;
    Ok(Json(ApiResponse::ok(category)))
}

/// Create a new category (admin only)
#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CreateCategoryDto,
    responses(
        (status = 201, description = "Category created successfully", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Parent category not found"),
        (status = 409, description = "Slug already in use"),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "admin-categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_category(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    AppJson(dto): AppJson<CreateCategoryDto>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = service.create(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(category)),
    ))
}

/// Update a category (admin only)
///
/// Any subset of fields may be sent. `parent_id: null` moves the category to the root.
#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    request_body = UpdateCategoryDto,
    responses(
        (status = 200, description = "Category updated successfully", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Slug conflict or cycle"),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "admin-categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_category(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateCategoryDto>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = service.update(id, dto).await?;
    Ok(Json(ApiResponse::ok(category)))
}

/// Move a category under a new parent (admin only)
#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}/parent",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    request_body = ReparentCategoryDto,
    responses(
        (status = 200, description = "Category moved successfully", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Move would exceed the maximum tree depth"),
        (status = 404, description = "Category or parent not found"),
        (status = 409, description = "Move would create a cycle"),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "admin-categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reparent_category(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<ReparentCategoryDto>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.reparent(id, dto.parent_id).await?;
    Ok(Json(ApiResponse::ok(category)))
}

/// Change a category's sort order (admin only)
#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}/sort-order",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    request_body = ReorderCategoryDto,
    responses(
        (status = 200, description = "Category reordered successfully", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found"),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "admin-categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reorder_category(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<ReorderCategoryDto>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.reorder(id, dto.sort_order).await?;
    Ok(Json(ApiResponse::ok(category)))
}

/// Toggle a category between active and inactive (admin only)
#[utoipa::path(
    post,
    path = "/api/admin/categories/{id}/toggle-active",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Active flag toggled", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found"),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "admin-categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn toggle_category_active(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.toggle_active(id).await?;
    Ok(Json(ApiResponse::ok(category)))
}

/// Delete a category (admin only)
///
/// `strategy=cascade` removes the whole subtree; `strategy=reparent_children`
/// moves the direct children up one level first.
#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(
        ("id" = Uuid, Path, description = "Category ID"),
        DeleteCategoryQuery
    ),
    responses(
        (status = 200, description = "Category deleted successfully", body = ApiResponse<DeleteCategoryResponseDto>),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Category is still referenced"),
        (status = 403, description = "Forbidden - admin only")
    ),
    tag = "admin-categories",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_category(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<Uuid>,
    AppQuery(query): AppQuery<DeleteCategoryQuery>,
) -> Result<Json<ApiResponse<DeleteCategoryResponseDto>>> {
    let result = service.delete(id, query.strategy).await?;
    Ok(Json(ApiResponse::ok(result)))
}
