//! Contact-request intake and triage endpoints.
//!
//! `submit_request` is the public form endpoint. It sits behind the auth
//! rate-limit tier instead of authentication, and it fans out a
//! notification to active staff. Triage endpoints are staff-only.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::{info, instrument, warn};

use crate::{
    AppState,
    api::models::{
        ApiEnvelope,
        pagination::PaginatedResponse,
        requests::{ContactRequestCreate, ContactRequestResponse, ContactRequestUpdate, ListRequestsQuery},
    },
    auth::permissions::{RequiresPermission, require},
    db::{
        errors::DbError,
        handlers::{
            Repository,
            notifications::Notifications,
            requests::{ContactRequestFilter, ContactRequests},
            users::Users,
        },
        models::{
            notifications::{NotificationCreateDBRequest, NotificationKind},
            requests::{ContactRequestCreateDBRequest, ContactRequestDBResponse},
        },
    },
    errors::Error,
    types::ContactRequestId,
};

/// Notify active staff about a new contact request. Failures are logged and
/// swallowed; intake must not fail because a notification insert did.
async fn notify_staff(state: &AppState, request: &ContactRequestDBResponse) {
    let result: Result<usize, crate::db::errors::DbError> = async {
        let mut conn = state.db.acquire().await?;

        let staff = Users::new(&mut conn).list_active_staff().await?;
        let mut notifications = Notifications::new(&mut conn);

        let mut created = 0;
        for user in &staff {
            notifications
                .create(&NotificationCreateDBRequest {
                    user_id: user.id,
                    title: "New contact request".to_string(),
                    message: format!("{} sent a contact request", request.name),
                    kind: NotificationKind::Action,
                    link: Some(format!("/requests/{}", request.id)),
                })
                .await?;
            created += 1;
        }
        Ok(created)
    }
    .await;

    match result {
        Ok(created) => info!(request_id = %request.id, notified = created, "Staff notified of contact request"),
        Err(e) => warn!(request_id = %request.id, error = %e, "Failed to notify staff of contact request"),
    }
}

/// Submit the public contact form
#[utoipa::path(
    post,
    path = "/api/requests",
    request_body = ContactRequestCreate,
    tag = "requests",
    responses(
        (status = 201, description = "Request recorded", body = ApiEnvelope<ContactRequestResponse>),
        (status = 400, description = "Form validation failed"),
        (status = 429, description = "Too many submissions"),
    )
)]
#[instrument(skip_all)]
pub async fn submit_request(
    State(state): State<AppState>,
    Json(request): Json<ContactRequestCreate>,
) -> Result<ApiEnvelope<ContactRequestResponse>, Error> {
    request.validate()?;

    let created = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        let mut requests = ContactRequests::new(&mut conn);
        requests
            .create(&ContactRequestCreateDBRequest {
                name: request.name,
                email: request.email,
                phone: request.phone,
                service: request.service,
                message: request.message,
            })
            .await?
    };

    notify_staff(&state, &created).await;

    Ok(ApiEnvelope::created(ContactRequestResponse::from(created)).with_message("Thank you, we will be in touch"))
}

/// List contact requests for triage
#[utoipa::path(
    get,
    path = "/api/requests",
    params(ListRequestsQuery),
    tag = "requests",
    responses(
        (status = 200, description = "Paginated requests", body = ApiEnvelope<PaginatedResponse<ContactRequestResponse>>),
        (status = 403, description = "Missing REQUESTS_VIEW"),
    )
)]
#[instrument(skip_all)]
pub async fn list_requests(
    _: RequiresPermission<require::RequestsView>,
    State(state): State<AppState>,
    Query(query): Query<ListRequestsQuery>,
) -> Result<ApiEnvelope<PaginatedResponse<ContactRequestResponse>>, Error> {
    let filter = ContactRequestFilter {
        status: query.status,
        skip: query.pagination.skip(),
        limit: query.pagination.limit(),
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut requests = ContactRequests::new(&mut conn);

    let total = requests.count(&filter).await?;
    let rows = requests.list(&filter).await?;

    let data = rows.into_iter().map(ContactRequestResponse::from).collect();
    Ok(ApiEnvelope::ok(PaginatedResponse::new(data, total, &query.pagination)))
}

/// Get one contact request
#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    params(("id" = String, Path, format = "uuid")),
    tag = "requests",
    responses(
        (status = 200, description = "The request", body = ApiEnvelope<ContactRequestResponse>),
        (status = 404, description = "No such request"),
    )
)]
#[instrument(skip_all)]
pub async fn get_request(
    _: RequiresPermission<require::RequestsView>,
    State(state): State<AppState>,
    Path(id): Path<ContactRequestId>,
) -> Result<ApiEnvelope<ContactRequestResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut requests = ContactRequests::new(&mut conn);

    let request = requests.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "contact request".to_string(),
        id: id.to_string(),
    })?;

    Ok(ApiEnvelope::ok(ContactRequestResponse::from(request)))
}

/// Triage a contact request: change status and/or assign a processor
#[utoipa::path(
    put,
    path = "/api/requests/{id}",
    params(("id" = String, Path, format = "uuid")),
    request_body = ContactRequestUpdate,
    tag = "requests",
    responses(
        (status = 200, description = "Updated request", body = ApiEnvelope<ContactRequestResponse>),
        (status = 403, description = "Missing REQUESTS_PROCESS"),
        (status = 404, description = "No such request"),
    )
)]
#[instrument(skip_all)]
pub async fn update_request(
    _: RequiresPermission<require::RequestsProcess>,
    State(state): State<AppState>,
    Path(id): Path<ContactRequestId>,
    Json(request): Json<ContactRequestUpdate>,
) -> Result<ApiEnvelope<ContactRequestResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut requests = ContactRequests::new(&mut conn);

    let updated = requests
        .update(
            id,
            &crate::db::models::requests::ContactRequestUpdateDBRequest {
                status: request.status,
                processor_id: request.processor_id,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                resource: "contact request".to_string(),
                id: id.to_string(),
            },
            other => Error::Database(other),
        })?;

    Ok(ApiEnvelope::ok(ContactRequestResponse::from(updated)))
}

/// Delete a contact request
#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    params(("id" = String, Path, format = "uuid")),
    tag = "requests",
    responses(
        (status = 200, description = "Request deleted"),
        (status = 403, description = "Missing REQUESTS_PROCESS"),
        (status = 404, description = "No such request"),
    )
)]
#[instrument(skip_all)]
pub async fn delete_request(
    _: RequiresPermission<require::RequestsProcess>,
    State(state): State<AppState>,
    Path(id): Path<ContactRequestId>,
) -> Result<ApiEnvelope<serde_json::Value>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut requests = ContactRequests::new(&mut conn);

    let deleted = requests.delete(id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "contact request".to_string(),
            id: id.to_string(),
        });
    }

    info!(request_id = %id, "Contact request deleted");
    Ok(ApiEnvelope::ok(serde_json::json!(null)).with_message("Contact request deleted"))
}
