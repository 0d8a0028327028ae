//! Dashboard aggregation endpoint.

use axum::extract::State;
use tracing::{instrument, warn};

use crate::{
    AppState,
    api::models::{
        ApiEnvelope,
        appointments::AppointmentResponse,
        dashboard::DashboardStats,
        requests::ContactRequestResponse,
    },
    auth::permissions::{RequiresPermission, require},
    db::{
        errors::{DbError, Result as DbResult},
        handlers::{
            Repository,
            appointments::Appointments,
            customers::Customers,
            notifications::Notifications,
            requests::{ContactRequestFilter, ContactRequests},
        },
        models::customers::CustomerStatus,
    },
    errors::Error,
    types::UserId,
};

const RECENT_LIMIT: i64 = 5;

async fn customer_counts(state: &AppState) -> DbResult<(i64, i64, i64)> {
    let mut conn = state.db.acquire().await?;
    let mut customers = Customers::new(&mut conn);

    let total = customers.count(&Default::default()).await?;
    let active = customers.count_by_status(CustomerStatus::Active).await?;
    let prospects = customers.count_by_status(CustomerStatus::Prospect).await?;
    Ok((total, active, prospects))
}

async fn upcoming_appointments(state: &AppState) -> DbResult<(i64, Vec<AppointmentResponse>)> {
    let mut conn = state.db.acquire().await?;
    let mut appointments = Appointments::new(&mut conn);

    let count = appointments.count_upcoming().await?;
    let next = appointments.upcoming(RECENT_LIMIT).await?;
    Ok((count, next.into_iter().map(AppointmentResponse::from).collect()))
}

async fn request_activity(state: &AppState) -> DbResult<(i64, Vec<ContactRequestResponse>)> {
    let mut conn = state.db.acquire().await?;
    let mut requests = ContactRequests::new(&mut conn);

    let new_count = requests.count_new().await?;
    let recent = requests
        .list(&ContactRequestFilter {
            status: None,
            skip: 0,
            limit: RECENT_LIMIT,
        })
        .await?;
    Ok((new_count, recent.into_iter().map(ContactRequestResponse::from).collect()))
}

async fn unread_notifications(state: &AppState, user_id: UserId) -> DbResult<i64> {
    let mut conn = state.db.acquire().await?;
    Notifications::new(&mut conn).unread_count(user_id).await
}

fn or_default<T: Default>(section: &str, result: std::result::Result<T, DbError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(section, error = %e, "Dashboard sub-query failed, using default");
            T::default()
        }
    }
}

/// Aggregated dashboard statistics
///
/// Sub-queries run concurrently; any one of them failing degrades that
/// section to its default value instead of failing the response.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    tag = "dashboard",
    responses(
        (status = 200, description = "Dashboard statistics", body = ApiEnvelope<DashboardStats>),
        (status = 403, description = "Missing DASHBOARD_VIEW"),
    )
)]
#[instrument(skip_all)]
pub async fn dashboard_stats(
    principal: RequiresPermission<require::DashboardView>,
    State(state): State<AppState>,
) -> Result<ApiEnvelope<DashboardStats>, Error> {
    let (customers, appointments, requests, unread) = tokio::join!(
        customer_counts(&state),
        upcoming_appointments(&state),
        request_activity(&state),
        unread_notifications(&state, principal.user.id),
    );

    let (total_customers, active_customers, prospect_customers) = or_default("customers", customers);
    let (upcoming_count, next_appointments) = or_default("appointments", appointments);
    let (new_requests, recent_requests) = or_default("requests", requests);
    let unread_notifications = or_default("notifications", unread);

    Ok(ApiEnvelope::ok(DashboardStats {
        total_customers,
        active_customers,
        prospect_customers,
        upcoming_appointments: upcoming_count,
        new_requests,
        unread_notifications,
        next_appointments,
        recent_requests,
    }))
}
