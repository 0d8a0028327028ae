//! Per-user notification feed endpoints.
//!
//! Everything here is scoped to the caller; the repository carries the user
//! id into every query, so one user can never touch another's rows.

use axum::extract::{Path, Query, State};
use tracing::instrument;

use crate::{
    AppState,
    api::models::{
        ApiEnvelope,
        notifications::{ListNotificationsQuery, MarkAllReadResponse, NotificationResponse},
    },
    auth::permissions::{RequiresPermission, require},
    db::{errors::DbError, handlers::notifications::Notifications},
    errors::Error,
    types::NotificationId,
};

/// List the caller's notifications
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(ListNotificationsQuery),
    tag = "notifications",
    responses(
        (status = 200, description = "The caller's notifications", body = ApiEnvelope<Vec<NotificationResponse>>),
        (status = 403, description = "Missing NOTIFICATIONS_VIEW"),
    )
)]
#[instrument(skip_all)]
pub async fn list_notifications(
    principal: RequiresPermission<require::NotificationsView>,
    State(state): State<AppState>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<ApiEnvelope<Vec<NotificationResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut notifications = Notifications::new(&mut conn);

    let rows = notifications
        .list_for_user(
            principal.user.id,
            query.unread_only.unwrap_or(false),
            query.pagination.skip(),
            query.pagination.limit(),
        )
        .await?;

    Ok(ApiEnvelope::ok(rows.into_iter().map(NotificationResponse::from).collect()))
}

/// Mark one notification read
#[utoipa::path(
    put,
    path = "/api/notifications/{id}/read",
    params(("id" = String, Path, format = "uuid")),
    tag = "notifications",
    responses(
        (status = 200, description = "Marked read"),
        (status = 404, description = "No such notification for this user"),
    )
)]
#[instrument(skip_all)]
pub async fn mark_notification_read(
    principal: RequiresPermission<require::NotificationsView>,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<ApiEnvelope<serde_json::Value>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut notifications = Notifications::new(&mut conn);

    let marked = notifications.mark_read(id, principal.user.id).await?;
    if !marked {
        return Err(Error::NotFound {
            resource: "notification".to_string(),
            id: id.to_string(),
        });
    }

    Ok(ApiEnvelope::ok(serde_json::json!(null)).with_message("Notification marked read"))
}

/// Mark all of the caller's notifications read
#[utoipa::path(
    put,
    path = "/api/notifications/read-all",
    tag = "notifications",
    responses(
        (status = 200, description = "All marked read", body = ApiEnvelope<MarkAllReadResponse>),
    )
)]
#[instrument(skip_all)]
pub async fn mark_all_notifications_read(
    principal: RequiresPermission<require::NotificationsView>,
    State(state): State<AppState>,
) -> Result<ApiEnvelope<MarkAllReadResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut notifications = Notifications::new(&mut conn);

    let marked = notifications.mark_all_read(principal.user.id).await?;
    Ok(ApiEnvelope::ok(MarkAllReadResponse { marked }))
}

/// Delete one notification
#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(("id" = String, Path, format = "uuid")),
    tag = "notifications",
    responses(
        (status = 200, description = "Notification deleted"),
        (status = 404, description = "No such notification for this user"),
    )
)]
#[instrument(skip_all)]
pub async fn delete_notification(
    principal: RequiresPermission<require::NotificationsView>,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<ApiEnvelope<serde_json::Value>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut notifications = Notifications::new(&mut conn);

    let deleted = notifications.delete(id, principal.user.id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "notification".to_string(),
            id: id.to_string(),
        });
    }

    Ok(ApiEnvelope::ok(serde_json::json!(null)).with_message("Notification deleted"))
}
