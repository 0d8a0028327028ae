//! Appointment CRUD endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::{info, instrument};

use crate::{
    AppState,
    api::models::{
        ApiEnvelope,
        appointments::{AppointmentCreate, AppointmentResponse, AppointmentUpdate, ListAppointmentsQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, require},
    db::{
        errors::DbError,
        handlers::{Repository, appointments::{AppointmentFilter, Appointments}},
        models::appointments::{AppointmentCreateDBRequest, AppointmentStatus, AppointmentUpdateDBRequest},
    },
    errors::Error,
    types::AppointmentId,
};

const DEFAULT_DURATION_MINUTES: i32 = 60;

fn validate_duration(duration_minutes: i32) -> Result<(), Error> {
    if duration_minutes <= 0 {
        return Err(Error::Validation {
            errors: vec!["duration_minutes must be positive".to_string()],
        });
    }
    Ok(())
}

/// List appointments with date range, status, and customer filters
#[utoipa::path(
    get,
    path = "/api/appointments",
    params(ListAppointmentsQuery),
    tag = "appointments",
    responses(
        (status = 200, description = "Paginated appointments", body = ApiEnvelope<PaginatedResponse<AppointmentResponse>>),
        (status = 403, description = "Missing APPOINTMENTS_VIEW"),
    )
)]
#[instrument(skip_all)]
pub async fn list_appointments(
    _: RequiresPermission<require::AppointmentsView>,
    State(state): State<AppState>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<ApiEnvelope<PaginatedResponse<AppointmentResponse>>, Error> {
    let filter = AppointmentFilter {
        status: query.status,
        customer_id: query.customer_id,
        from: query.from,
        until: query.until,
        skip: query.pagination.skip(),
        limit: query.pagination.limit(),
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut appointments = Appointments::new(&mut conn);

    let total = appointments.count(&filter).await?;
    let rows = appointments.list(&filter).await?;

    let data = rows.into_iter().map(AppointmentResponse::from).collect();
    Ok(ApiEnvelope::ok(PaginatedResponse::new(data, total, &query.pagination)))
}

/// Create an appointment
#[utoipa::path(
    post,
    path = "/api/appointments",
    request_body = AppointmentCreate,
    tag = "appointments",
    responses(
        (status = 201, description = "Appointment created", body = ApiEnvelope<AppointmentResponse>),
        (status = 403, description = "Missing APPOINTMENTS_EDIT"),
    )
)]
#[instrument(skip_all)]
pub async fn create_appointment(
    staff: RequiresPermission<require::AppointmentsEdit>,
    State(state): State<AppState>,
    Json(request): Json<AppointmentCreate>,
) -> Result<ApiEnvelope<AppointmentResponse>, Error> {
    if request.title.trim().is_empty() {
        return Err(Error::Validation {
            errors: vec!["title must not be empty".to_string()],
        });
    }
    let duration_minutes = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    validate_duration(duration_minutes)?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut appointments = Appointments::new(&mut conn);

    let appointment = appointments
        .create(&AppointmentCreateDBRequest {
            title: request.title,
            customer_id: request.customer_id,
            scheduled_at: request.scheduled_at,
            duration_minutes,
            location: request.location,
            status: request.status.unwrap_or(AppointmentStatus::Scheduled),
            notes: request.notes,
            created_by: Some(staff.user.id),
        })
        .await?;

    info!(appointment_id = %appointment.id, "Appointment created");
    Ok(ApiEnvelope::created(AppointmentResponse::from(appointment)))
}

/// Get one appointment
#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    params(("id" = String, Path, format = "uuid")),
    tag = "appointments",
    responses(
        (status = 200, description = "The appointment", body = ApiEnvelope<AppointmentResponse>),
        (status = 404, description = "No such appointment"),
    )
)]
#[instrument(skip_all)]
pub async fn get_appointment(
    _: RequiresPermission<require::AppointmentsView>,
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
) -> Result<ApiEnvelope<AppointmentResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut appointments = Appointments::new(&mut conn);

    let appointment = appointments.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "appointment".to_string(),
        id: id.to_string(),
    })?;

    Ok(ApiEnvelope::ok(AppointmentResponse::from(appointment)))
}

/// Update an appointment
#[utoipa::path(
    put,
    path = "/api/appointments/{id}",
    params(("id" = String, Path, format = "uuid")),
    request_body = AppointmentUpdate,
    tag = "appointments",
    responses(
        (status = 200, description = "Updated appointment", body = ApiEnvelope<AppointmentResponse>),
        (status = 404, description = "No such appointment"),
    )
)]
#[instrument(skip_all)]
pub async fn update_appointment(
    _: RequiresPermission<require::AppointmentsEdit>,
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
    Json(request): Json<AppointmentUpdate>,
) -> Result<ApiEnvelope<AppointmentResponse>, Error> {
    if let Some(duration_minutes) = request.duration_minutes {
        validate_duration(duration_minutes)?;
    }

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut appointments = Appointments::new(&mut conn);

    let appointment = appointments
        .update(
            id,
            &AppointmentUpdateDBRequest {
                title: request.title,
                customer_id: request.customer_id,
                scheduled_at: request.scheduled_at,
                duration_minutes: request.duration_minutes,
                location: request.location,
                status: request.status,
                notes: request.notes,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                resource: "appointment".to_string(),
                id: id.to_string(),
            },
            other => Error::Database(other),
        })?;

    Ok(ApiEnvelope::ok(AppointmentResponse::from(appointment)))
}

/// Delete an appointment
#[utoipa::path(
    delete,
    path = "/api/appointments/{id}",
    params(("id" = String, Path, format = "uuid")),
    tag = "appointments",
    responses(
        (status = 200, description = "Appointment deleted"),
        (status = 403, description = "Missing APPOINTMENTS_DELETE"),
        (status = 404, description = "No such appointment"),
    )
)]
#[instrument(skip_all)]
pub async fn delete_appointment(
    _: RequiresPermission<require::AppointmentsDelete>,
    State(state): State<AppState>,
    Path(id): Path<AppointmentId>,
) -> Result<ApiEnvelope<serde_json::Value>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut appointments = Appointments::new(&mut conn);

    let deleted = appointments.delete(id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "appointment".to_string(),
            id: id.to_string(),
        });
    }

    info!(appointment_id = %id, "Appointment deleted");
    Ok(ApiEnvelope::ok(serde_json::json!(null)).with_message("Appointment deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_must_be_positive() {
        assert!(validate_duration(-15).is_err());
        assert!(validate_duration(0).is_err());
        assert!(validate_duration(30).is_ok());
    }
}
