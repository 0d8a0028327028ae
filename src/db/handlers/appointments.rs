//! Database repository for appointments.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::appointments::{
        AppointmentCreateDBRequest, AppointmentDBResponse, AppointmentStatus, AppointmentUpdateDBRequest,
    },
};
use crate::types::{AppointmentId, CustomerId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing appointments
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    pub customer_id: Option<CustomerId>,
    /// Inclusive lower bound on `scheduled_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `scheduled_at`.
    pub until: Option<DateTime<Utc>>,
    pub skip: i64,
    pub limit: i64,
}

pub struct Appointments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Appointments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total rows matching the filter, ignoring pagination.
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &AppointmentFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments \
             WHERE ($1::appointment_status IS NULL OR status = $1) \
               AND ($2::uuid IS NULL OR customer_id = $2) \
               AND ($3::timestamptz IS NULL OR scheduled_at >= $3) \
               AND ($4::timestamptz IS NULL OR scheduled_at < $4)",
        )
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.until)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// Appointments in the future that have not been completed or cancelled.
    #[instrument(skip(self), err)]
    pub async fn count_upcoming(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM appointments \
             WHERE scheduled_at > NOW() AND status IN ('scheduled', 'confirmed')",
        )
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// The next few upcoming appointments, soonest first.
    #[instrument(skip(self), err)]
    pub async fn upcoming(&mut self, limit: i64) -> Result<Vec<AppointmentDBResponse>> {
        let appointments = sqlx::query_as::<_, AppointmentDBResponse>(
            "SELECT * FROM appointments \
             WHERE scheduled_at > NOW() AND status IN ('scheduled', 'confirmed') \
             ORDER BY scheduled_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(appointments)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Appointments<'c> {
    type CreateRequest = AppointmentCreateDBRequest;
    type UpdateRequest = AppointmentUpdateDBRequest;
    type Response = AppointmentDBResponse;
    type Id = AppointmentId;
    type Filter = AppointmentFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>(
            r#"
            INSERT INTO appointments (title, customer_id, scheduled_at, duration_minutes, location, status, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&request.title)
        .bind(request.customer_id)
        .bind(request.scheduled_at)
        .bind(request.duration_minutes)
        .bind(&request.location)
        .bind(request.status)
        .bind(&request.notes)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(appointment)
    }

    #[instrument(skip(self), fields(appointment_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(appointment)
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let appointments = sqlx::query_as::<_, AppointmentDBResponse>(
            "SELECT * FROM appointments \
             WHERE ($1::appointment_status IS NULL OR status = $1) \
               AND ($2::uuid IS NULL OR customer_id = $2) \
               AND ($3::timestamptz IS NULL OR scheduled_at >= $3) \
               AND ($4::timestamptz IS NULL OR scheduled_at < $4) \
             ORDER BY scheduled_at ASC OFFSET $5 LIMIT $6",
        )
        .bind(filter.status)
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.until)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(appointments)
    }

    #[instrument(skip(self), fields(appointment_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(appointment_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let appointment = sqlx::query_as::<_, AppointmentDBResponse>(
            r#"
            UPDATE appointments SET
                title = COALESCE($2, title),
                customer_id = CASE WHEN $3 THEN $4 ELSE customer_id END,
                scheduled_at = COALESCE($5, scheduled_at),
                duration_minutes = COALESCE($6, duration_minutes),
                location = CASE WHEN $7 THEN $8 ELSE location END,
                status = COALESCE($9, status),
                notes = CASE WHEN $10 THEN $11 ELSE notes END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(request.customer_id.is_some())
        .bind(request.customer_id.flatten())
        .bind(request.scheduled_at)
        .bind(request.duration_minutes)
        .bind(request.location.is_some())
        .bind(request.location.clone().flatten())
        .bind(request.status)
        .bind(request.notes.is_some())
        .bind(request.notes.clone().flatten())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(appointment)
    }
}
