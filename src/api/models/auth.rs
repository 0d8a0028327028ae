//! API models for login, session, and password management.

use crate::api::models::users::UserResponse;
use crate::auth::{CurrentUser, permissions::Role};
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Access JWT, also set as the session cookie
    pub token: String,
    /// Opaque refresh token for `POST /api/auth/refresh`
    pub refresh_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Verdict of `GET /api/auth/validate` for the supplied token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
}

/// The authenticated principal, as returned by `GET /api/auth/me`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrincipalResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&CurrentUser> for PrincipalResponse {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Effective permission codes for the principal.
///
/// Served so clients can mirror server-side decisions in their UI. This is
/// conditional rendering support, not a security boundary.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PermissionsResponse {
    pub role: Role,
    pub is_admin: bool,
    pub permissions: Vec<String>,
}
