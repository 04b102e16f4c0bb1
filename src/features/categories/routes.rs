use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::features::categories::handlers;
use crate::features::categories::services::CategoryService;

/// Create routes for the categories feature
///
/// Note: This feature is public (no authentication required)
pub fn routes(service: Arc<CategoryService>) -> Router {
    Router::new()
        .route("/api/categories", get(handlers::list_categories))
        .route("/api/categories/{slug}", get(handlers::get_category))
        .with_state(service)
}

/// Create admin routes for category management (admin only)
pub fn admin_routes(service: Arc<CategoryService>) -> Router {
    Router::new()
        .route(
            "/api/admin/categories",
            get(handlers::admin_list_categories).post(handlers::create_category),
        )
        .route(
            "/api/admin/categories/tree",
            get(handlers::admin_category_tree),
        )
        .route(
            "/api/admin/categories/{id}",
            get(handlers::admin_get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route(
            "/api/admin/categories/{id}/parent",
            put(handlers::reparent_category),
        )
        .route(
            "/api/admin/categories/{id}/sort-order",
            put(handlers::reorder_category),
        )
        .route(
            "/api/admin/categories/{id}/toggle-active",
            post(handlers::toggle_category_active),
        )
        .with_state(service)
}
