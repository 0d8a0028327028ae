//! Database models for appointments.

use crate::types::{AppointmentId, CustomerId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Stored as the `appointment_status` PostgreSQL enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "appointment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

/// Database request for creating an appointment
#[derive(Debug, Clone)]
pub struct AppointmentCreateDBRequest {
    pub title: String,
    pub customer_id: Option<CustomerId>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub location: Option<String>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
}

/// Database request for updating an appointment. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AppointmentUpdateDBRequest {
    pub title: Option<String>,
    pub customer_id: Option<Option<CustomerId>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub location: Option<Option<String>>,
    pub status: Option<AppointmentStatus>,
    pub notes: Option<Option<String>>,
}

/// Database response for an appointment
#[derive(Debug, Clone, FromRow)]
pub struct AppointmentDBResponse {
    pub id: AppointmentId,
    pub title: String,
    pub customer_id: Option<CustomerId>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub location: Option<String>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
