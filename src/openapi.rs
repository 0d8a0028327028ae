//! OpenAPI documentation for the management API.
//!
//! The generated document is served at `/api/openapi.json`. All routes except
//! `/healthz`, the auth endpoints, and public contact intake require a bearer
//! token (or session cookie) obtained from `POST /api/auth/login`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, auth::permissions, health};

/// Registers the bearer-token security scheme used by authenticated routes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token authentication. Include the token from `POST /api/auth/login` \
                            in the `Authorization` header:\n\n```\nAuthorization: Bearer YOUR_TOKEN\n```\n\n\
                            Browser clients may rely on the session cookie instead.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "clientdesk API",
        description = "Business service management backend: customers, appointments, contact requests, notifications, and staff administration."
    ),
    modifiers(&SecurityAddon),
    paths(
        // Liveness and health
        api::handlers::health::healthz,
        api::handlers::health::database_health,
        // Authentication
        api::handlers::auth::login,
        api::handlers::auth::refresh,
        api::handlers::auth::logout,
        api::handlers::auth::validate,
        api::handlers::auth::me,
        api::handlers::auth::permissions,
        api::handlers::auth::change_password,
        // Users and permission overrides
        api::handlers::users::list_users,
        api::handlers::users::create_user,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::users::get_user_permissions,
        api::handlers::users::set_user_permission,
        api::handlers::users::clear_user_permission,
        // Customers
        api::handlers::customers::list_customers,
        api::handlers::customers::create_customer,
        api::handlers::customers::get_customer,
        api::handlers::customers::update_customer,
        api::handlers::customers::delete_customer,
        // Appointments
        api::handlers::appointments::list_appointments,
        api::handlers::appointments::create_appointment,
        api::handlers::appointments::get_appointment,
        api::handlers::appointments::update_appointment,
        api::handlers::appointments::delete_appointment,
        // Contact requests
        api::handlers::requests::submit_request,
        api::handlers::requests::list_requests,
        api::handlers::requests::get_request,
        api::handlers::requests::update_request,
        api::handlers::requests::delete_request,
        // Notifications
        api::handlers::notifications::list_notifications,
        api::handlers::notifications::mark_notification_read,
        api::handlers::notifications::mark_all_notifications_read,
        api::handlers::notifications::delete_notification,
        // Dashboard
        api::handlers::dashboard::dashboard_stats,
    ),
    components(
        schemas(
            permissions::Role,
            permissions::Permission,
            health::DatabaseStatus,
            api::handlers::health::LivenessResponse,
            api::models::pagination::Pagination,
            api::models::auth::LoginRequest,
            api::models::auth::LoginResponse,
            api::models::auth::RefreshRequest,
            api::models::auth::RefreshResponse,
            api::models::auth::LogoutRequest,
            api::models::auth::ChangePasswordRequest,
            api::models::auth::ValidateResponse,
            api::models::auth::PrincipalResponse,
            api::models::auth::PermissionsResponse,
            api::models::users::UserCreate,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::users::PermissionOverrideBody,
            api::models::users::UserPermissionsResponse,
            api::models::users::OverrideEntry,
            api::models::customers::CustomerCreate,
            api::models::customers::CustomerUpdate,
            api::models::customers::CustomerResponse,
            api::models::appointments::AppointmentCreate,
            api::models::appointments::AppointmentUpdate,
            api::models::appointments::AppointmentResponse,
            api::models::requests::ContactRequestCreate,
            api::models::requests::ContactRequestUpdate,
            api::models::requests::ContactRequestResponse,
            api::models::notifications::NotificationResponse,
            api::models::notifications::MarkAllReadResponse,
            api::models::dashboard::DashboardStats,
        )
    ),
    tags(
        (name = "health", description = "Liveness probe and database health monitoring."),
        (name = "auth", description = "Login, token refresh and rotation, logout, and the authenticated principal."),
        (name = "users", description = "Staff account management and per-user permission overrides. Requires `USERS_MANAGE`."),
        (name = "customers", description = "Customer records with search, status filtering, and sorting."),
        (name = "appointments", description = "Appointment scheduling against customer records."),
        (name = "requests", description = "Public contact-request intake and staff triage."),
        (name = "notifications", description = "Per-user notification feed."),
        (name = "dashboard", description = "Aggregated statistics for the landing dashboard."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi as _;

    #[test]
    fn document_builds_and_covers_core_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for expected in [
            "/healthz",
            "/api/auth/login",
            "/api/auth/refresh",
            "/api/auth/validate",
            "/api/users/{id}/permissions",
            "/api/customers",
            "/api/appointments/{id}",
            "/api/requests",
            "/api/notifications/read-all",
            "/api/dashboard/stats",
            "/api/health/database",
        ] {
            assert!(paths.contains_key(expected), "missing path {expected}");
        }
    }

    #[test]
    fn bearer_security_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components present");
        assert!(components.security_schemes.contains_key("BearerAuth"));
    }
}
