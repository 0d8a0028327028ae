//! User administration endpoints. All of them require `USERS_MANAGE`.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::{info, instrument};

use crate::{
    AppState,
    api::models::{
        ApiEnvelope,
        pagination::PaginatedResponse,
        users::{ListUsersQuery, OverrideEntry, PermissionOverrideBody, UserCreate, UserPermissionsResponse, UserResponse, UserUpdate},
    },
    auth::{
        password,
        permissions::{Permission, RequiresPermission, Role, effective_permissions, require},
    },
    db::{
        errors::DbError,
        handlers::{Repository, tokens::RefreshTokens, users::{UserFilter, Users}},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::Error,
    types::UserId,
};

/// List user accounts
#[utoipa::path(
    get,
    path = "/api/users",
    params(ListUsersQuery),
    tag = "users",
    responses(
        (status = 200, description = "Paginated users", body = ApiEnvelope<PaginatedResponse<UserResponse>>),
        (status = 403, description = "Missing USERS_MANAGE"),
    )
)]
#[instrument(skip_all)]
pub async fn list_users(
    _: RequiresPermission<require::UsersManage>,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<ApiEnvelope<PaginatedResponse<UserResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    let total = users.count().await?;
    let rows = users
        .list(&UserFilter::new(query.pagination.skip(), query.pagination.limit()))
        .await?;

    let data = rows.into_iter().map(UserResponse::from).collect();
    Ok(ApiEnvelope::ok(PaginatedResponse::new(data, total, &query.pagination)))
}

/// Create a user account
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = UserCreate,
    tag = "users",
    responses(
        (status = 201, description = "User created", body = ApiEnvelope<UserResponse>),
        (status = 409, description = "Email already in use"),
        (status = 400, description = "Password violates the policy"),
    )
)]
#[instrument(skip_all)]
pub async fn create_user(
    _: RequiresPermission<require::UsersManage>,
    State(state): State<AppState>,
    Json(request): Json<UserCreate>,
) -> Result<ApiEnvelope<UserResponse>, Error> {
    password::validate_password_policy(&request.password, &state.config.auth.password)?;
    let password_hash = password::hash_password_blocking(request.password, &state.config.auth.password).await?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    let user = users
        .create(&UserCreateDBRequest {
            name: request.name,
            email: request.email,
            password_hash,
            role: request.role.unwrap_or(Role::Employee),
            active: request.active.unwrap_or(true),
        })
        .await?;

    info!(user_id = %user.id, "User created");
    Ok(ApiEnvelope::created(UserResponse::from(user)))
}

/// Get one user account
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, format = "uuid")),
    tag = "users",
    responses(
        (status = 200, description = "The user", body = ApiEnvelope<UserResponse>),
        (status = 404, description = "No such user"),
    )
)]
#[instrument(skip_all)]
pub async fn get_user(
    _: RequiresPermission<require::UsersManage>,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<ApiEnvelope<UserResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    let user = users.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "user".to_string(),
        id: id.to_string(),
    })?;

    Ok(ApiEnvelope::ok(UserResponse::from(user)))
}

/// Update a user account
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = String, Path, format = "uuid")),
    request_body = UserUpdate,
    tag = "users",
    responses(
        (status = 200, description = "Updated user", body = ApiEnvelope<UserResponse>),
        (status = 404, description = "No such user"),
    )
)]
#[instrument(skip_all)]
pub async fn update_user(
    admin: RequiresPermission<require::UsersManage>,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(request): Json<UserUpdate>,
) -> Result<ApiEnvelope<UserResponse>, Error> {
    if admin.user.id == id && request.active == Some(false) {
        return Err(Error::BadRequest {
            message: "You cannot deactivate your own account".to_string(),
        });
    }

    let password_hash = match request.password {
        Some(new_password) => {
            password::validate_password_policy(&new_password, &state.config.auth.password)?;
            Some(password::hash_password_blocking(new_password, &state.config.auth.password).await?)
        }
        None => None,
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    let deactivated = request.active == Some(false);
    let user = users
        .update(
            id,
            &UserUpdateDBRequest {
                name: request.name,
                email: request.email,
                role: request.role,
                active: request.active,
                password_hash,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                resource: "user".to_string(),
                id: id.to_string(),
            },
            other => Error::Database(other),
        })?;

    // A deactivated account must not keep working sessions alive.
    if deactivated {
        let mut tokens = RefreshTokens::new(&mut conn);
        let revoked = tokens.revoke_all_for_user(id, None).await?;
        info!(user_id = %id, revoked, "User deactivated, refresh tokens revoked");
    }

    Ok(ApiEnvelope::ok(UserResponse::from(user)))
}

/// Delete a user account
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, format = "uuid")),
    tag = "users",
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "Attempted self-deletion"),
        (status = 404, description = "No such user"),
    )
)]
#[instrument(skip_all)]
pub async fn delete_user(
    admin: RequiresPermission<require::UsersManage>,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<ApiEnvelope<serde_json::Value>, Error> {
    if admin.user.id == id {
        return Err(Error::BadRequest {
            message: "You cannot delete your own account".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    // Refresh tokens cascade with the row, so the chains die with the account.
    let deleted = users.delete(id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "user".to_string(),
            id: id.to_string(),
        });
    }

    info!(user_id = %id, "User deleted");
    Ok(ApiEnvelope::ok(serde_json::json!(null)).with_message("User deleted"))
}

/// Inspect a user's role, overrides, and effective permissions
#[utoipa::path(
    get,
    path = "/api/users/{id}/permissions",
    params(("id" = String, Path, format = "uuid")),
    tag = "users",
    responses(
        (status = 200, description = "Permission situation", body = ApiEnvelope<UserPermissionsResponse>),
        (status = 404, description = "No such user"),
    )
)]
#[instrument(skip_all)]
pub async fn get_user_permissions(
    _: RequiresPermission<require::UsersManage>,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<ApiEnvelope<UserPermissionsResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    let user = users.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "user".to_string(),
        id: id.to_string(),
    })?;
    let overrides = users.permission_overrides(id).await?;

    let mut effective: Vec<String> = effective_permissions(user.role, &overrides)
        .iter()
        .map(|p| p.code().to_string())
        .collect();
    effective.sort();

    Ok(ApiEnvelope::ok(UserPermissionsResponse {
        role: user.role,
        overrides: overrides
            .into_iter()
            .map(|o| OverrideEntry {
                permission: o.permission,
                granted: o.granted,
            })
            .collect(),
        effective,
    }))
}

/// Grant or deny one permission code for a user
#[utoipa::path(
    put,
    path = "/api/users/{id}/permissions",
    params(("id" = String, Path, format = "uuid")),
    request_body = PermissionOverrideBody,
    tag = "users",
    responses(
        (status = 200, description = "Override stored"),
        (status = 404, description = "No such user"),
        (status = 400, description = "Unknown permission code"),
    )
)]
#[instrument(skip_all)]
pub async fn set_user_permission(
    _: RequiresPermission<require::UsersManage>,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<PermissionOverrideBody>,
) -> Result<ApiEnvelope<serde_json::Value>, Error> {
    // Only codes from the closed enum are storable.
    let permission = Permission::from_str(&body.permission).map_err(|e| Error::Validation {
        errors: vec![e.to_string()],
    })?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    if users.get_by_id(id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "user".to_string(),
            id: id.to_string(),
        });
    }

    users.set_permission_override(id, permission.code(), body.granted).await?;
    info!(user_id = %id, permission = %permission, granted = body.granted, "Permission override stored");

    Ok(ApiEnvelope::ok(serde_json::json!(null)).with_message("Permission override stored"))
}

/// Remove one permission override, restoring the role baseline
#[utoipa::path(
    delete,
    path = "/api/users/{id}/permissions/{code}",
    params(
        ("id" = String, Path, format = "uuid"),
        ("code" = String, Path, description = "Permission code, e.g. CUSTOMERS_EDIT"),
    ),
    tag = "users",
    responses(
        (status = 200, description = "Override removed"),
        (status = 404, description = "No such user or override"),
    )
)]
#[instrument(skip_all)]
pub async fn clear_user_permission(
    _: RequiresPermission<require::UsersManage>,
    State(state): State<AppState>,
    Path((id, code)): Path<(UserId, String)>,
) -> Result<ApiEnvelope<serde_json::Value>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut users = Users::new(&mut conn);

    let removed = users.clear_permission_override(id, &code).await?;
    if !removed {
        return Err(Error::NotFound {
            resource: "permission override".to_string(),
            id: format!("{id}/{code}"),
        });
    }

    Ok(ApiEnvelope::ok(serde_json::json!(null)).with_message("Permission override removed"))
}
