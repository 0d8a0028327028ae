//! API request/response models for user administration.

use super::pagination::Pagination;
use crate::auth::permissions::Role;
use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserCreate {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

/// A user as returned by the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            active: user.active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,
}

/// Body for granting or denying one permission code for a user.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PermissionOverrideBody {
    /// Permission code, e.g. `CUSTOMERS_EDIT`
    pub permission: String,
    /// true grants the permission, false denies it
    pub granted: bool,
}

/// Admin view of one user's permission situation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserPermissionsResponse {
    pub role: Role,
    /// Override rows as stored, including codes the resolver may skip
    pub overrides: Vec<OverrideEntry>,
    /// The resulting effective permission codes
    pub effective: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverrideEntry {
    pub permission: String,
    pub granted: bool,
}
