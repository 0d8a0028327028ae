//! API request/response models for appointments.

use super::{double_option, pagination::Pagination};
use crate::db::models::appointments::{AppointmentDBResponse, AppointmentStatus};
use crate::types::{AppointmentId, CustomerId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AppointmentCreate {
    pub title: String,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub customer_id: Option<CustomerId>,
    pub scheduled_at: DateTime<Utc>,
    /// Defaults to 60
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub location: Option<String>,
    /// Defaults to `scheduled`
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AppointmentUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub customer_id: Option<Option<CustomerId>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub location: Option<Option<String>>,
    pub status: Option<AppointmentStatus>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppointmentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AppointmentId,
    pub title: String,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub customer_id: Option<CustomerId>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub location: Option<String>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppointmentDBResponse> for AppointmentResponse {
    fn from(appointment: AppointmentDBResponse) -> Self {
        Self {
            id: appointment.id,
            title: appointment.title,
            customer_id: appointment.customer_id,
            scheduled_at: appointment.scheduled_at,
            duration_minutes: appointment.duration_minutes,
            location: appointment.location,
            status: appointment.status,
            notes: appointment.notes,
            created_by: appointment.created_by,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

/// Query parameters for listing appointments
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListAppointmentsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<AppointmentStatus>,

    #[param(value_type = Option<String>, format = "uuid")]
    pub customer_id: Option<CustomerId>,

    /// Inclusive lower bound on the scheduled time (RFC 3339)
    pub from: Option<DateTime<Utc>>,

    /// Exclusive upper bound on the scheduled time (RFC 3339)
    pub until: Option<DateTime<Utc>>,
}
