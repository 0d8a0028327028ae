//! Liveness and database health endpoints.

use axum::extract::State;
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    AppState,
    api::models::ApiEnvelope,
    auth::permissions::{RequiresPermission, require},
    health::DatabaseStatus,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Liveness probe. No authentication, no database access.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "health",
    responses(
        (status = 200, description = "Process is up", body = LivenessResponse),
    )
)]
#[instrument(skip_all)]
pub async fn healthz() -> ApiEnvelope<LivenessResponse> {
    ApiEnvelope::ok(LivenessResponse { status: "ok" })
}

/// Current database health snapshot
#[utoipa::path(
    get,
    path = "/api/health/database",
    tag = "health",
    responses(
        (status = 200, description = "Database status", body = ApiEnvelope<DatabaseStatus>),
        (status = 403, description = "Missing SETTINGS_MANAGE"),
    )
)]
#[instrument(skip_all)]
pub async fn database_health(
    _: RequiresPermission<require::SettingsManage>,
    State(state): State<AppState>,
) -> ApiEnvelope<DatabaseStatus> {
    ApiEnvelope::ok(state.db_health.status().await)
}
