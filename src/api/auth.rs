use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResponse, AppState, LoginData, MeData, SessionUser};
use crate::api::validation::normalized_email;
use crate::db::User;
use crate::db::repositories::user::verify_password;
use crate::models::role::Role;

/// JWT payload. `sub` carries the user id, `exp` a unix timestamp.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Identity resolved by `auth_middleware` and attached to request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl From<&CurrentUser> for SessionUser {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role.as_str().to_string(),
        }
    }
}

pub fn create_token(user: &User, secret: &str, expiry_hours: i64) -> anyhow::Result<String> {
    let expires_at = chrono::Utc::now() + chrono::Duration::hours(expiry_hours);

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: usize::try_from(expires_at.timestamp()).unwrap_or(usize::MAX),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(Into::into)
}

fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

/// Bearer-token gate for everything except login. Resolves the token to a
/// live user record so deactivation takes effect immediately, not at token
/// expiry.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Authentication required."))?;

    let claims = verify_token(token, state.jwt_secret())
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token."))?;

    let user_id: i32 = claims
        .sub
        .parse()
        .map_err(|_| ApiError::unauthorized("Invalid or expired token."))?;

    let user = state
        .store()
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token."))?;

    if !user.is_active {
        return Err(ApiError::unauthorized("Account is deactivated."));
    }

    let role = Role::parse(&user.role).ok_or_else(|| {
        ApiError::internal(format!("User {} has unknown role '{}'", user.id, user.role))
    })?;

    tracing::Span::current().record("user_id", user.id);

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        full_name: user.full_name,
        role,
    });

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginData>>, ApiError> {
    let email = normalized_email(body.email.as_deref().unwrap_or_default())?;

    let password = body
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation("Password is required"))?;

    let (user, password_hash) = state
        .store()
        .get_user_by_email_with_password(&email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password."))?;

    // Deactivated accounts get the explicit message even with a wrong
    // password; the lockout matters more than the credential check.
    if !user.is_active {
        return Err(ApiError::unauthorized("Account is deactivated."));
    }

    if !verify_password(&password, &password_hash).await? {
        return Err(ApiError::unauthorized("Invalid email or password."));
    }

    let token = create_token(
        &user,
        state.jwt_secret(),
        state.config().auth.token_expiry_hours,
    )?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(ApiResponse::success(LoginData {
        token,
        user: SessionUser::from(&user),
    })))
}

pub async fn me(
    axum::Extension(current_user): axum::Extension<CurrentUser>,
) -> Json<ApiResponse<MeData>> {
    Json(ApiResponse::success(MeData {
        user: SessionUser::from(&current_user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 42,
            email: "admin@customer360.com".to_string(),
            full_name: "Admin User".to_string(),
            role: "admin".to_string(),
            is_active: true,
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            updated_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let user = sample_user();
        let token = create_token(&user, "test-secret", 1).unwrap();

        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn test_token_rejects_wrong_secret() {
        let user = sample_user();
        let token = create_token(&user, "test-secret", 1).unwrap();

        assert!(verify_token(&token, "other-secret").is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let user = sample_user();
        let token = create_token(&user, "test-secret", -1).unwrap();

        assert!(verify_token(&token, "test-secret").is_none());
    }
}
