use axum::{extract::Request, middleware::Next, response::Response};

use super::ApiError;
use crate::api::auth::CurrentUser;
use crate::models::role::Role;

fn role_of(request: &Request) -> Result<Role, ApiError> {
    request
        .extensions()
        .get::<CurrentUser>()
        .map(|user| user.role)
        .ok_or_else(|| ApiError::unauthorized("Authentication required."))
}

/// Gate for admin-only route groups.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    if role_of(&request)? != Role::Admin {
        return Err(ApiError::forbidden("Insufficient permissions."));
    }

    Ok(next.run(request).await)
}

/// Gate for ticket-write route groups: admins and support engineers.
pub async fn require_support(request: Request, next: Next) -> Result<Response, ApiError> {
    if !matches!(role_of(&request)?, Role::Admin | Role::SupportEngineer) {
        return Err(ApiError::forbidden("Insufficient permissions."));
    }

    Ok(next.run(request).await)
}
