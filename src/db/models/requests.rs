//! Database models for contact requests.

use crate::types::{ContactRequestId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Triage state of a contact request. Stored as the `contact_request_status`
/// PostgreSQL enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "contact_request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactRequestStatus {
    New,
    InProgress,
    Done,
    Spam,
}

/// Database request for recording a contact request from the public form
#[derive(Debug, Clone)]
pub struct ContactRequestCreateDBRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub service: Option<String>,
    pub message: String,
}

/// Database request for triaging a contact request. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ContactRequestUpdateDBRequest {
    pub status: Option<ContactRequestStatus>,
    pub processor_id: Option<Option<UserId>>,
}

/// Database response for a contact request
#[derive(Debug, Clone, FromRow)]
pub struct ContactRequestDBResponse {
    pub id: ContactRequestId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub service: Option<String>,
    pub message: String,
    pub status: ContactRequestStatus,
    pub processor_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
