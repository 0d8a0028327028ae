//! API models for the dashboard aggregation endpoint.

use crate::api::models::{appointments::AppointmentResponse, requests::ContactRequestResponse};
use serde::Serialize;
use utoipa::ToSchema;

/// Aggregated counters and recent activity for the dashboard.
///
/// Sub-queries run concurrently and degrade independently: a failed counter
/// comes back as its default value rather than failing the whole response.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_customers: i64,
    pub active_customers: i64,
    pub prospect_customers: i64,
    pub upcoming_appointments: i64,
    pub new_requests: i64,
    pub unread_notifications: i64,
    /// The next few upcoming appointments, soonest first
    pub next_appointments: Vec<AppointmentResponse>,
    /// Most recently received contact requests
    pub recent_requests: Vec<ContactRequestResponse>,
}
