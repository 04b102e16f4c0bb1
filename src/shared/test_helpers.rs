use crate::features::auth::model::AuthenticatedUser;
use crate::shared::constants::ROLE_CONTENT_ADMIN;

use axum::{extract::Request, middleware::Next, Router};

pub fn create_user(roles: &[&str]) -> AuthenticatedUser {
    AuthenticatedUser {
        sub: "test-sub".to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}

/// Wrap a router so every request arrives as the given user
pub fn with_user_roles(router: Router, roles: &[&str]) -> Router {
    let user = create_user(roles);
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| {
            let user = user.clone();
            async move {
                request.extensions_mut().insert(user);
                next.run(request).await
            }
        },
    ))
}

pub fn with_admin_auth(router: Router) -> Router {
    with_user_roles(router, &[ROLE_CONTENT_ADMIN])
}

