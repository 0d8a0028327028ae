//! Role and permission resolution.
//!
//! Authorization is a two-layer model:
//!
//! 1. A closed [`Role`] enum with a static role-to-permission mapping.
//! 2. Per-user overrides from `user_permission_overrides` that grant or deny
//!    individual permission codes on top of the role set.
//!
//! Admins short-circuit both layers through a single bypass branch in
//! [`has_permission`]; no database access is involved in that decision.
//! Everything else fails closed: a permission that cannot be resolved is a
//! permission the user does not have.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::AppState;
use crate::auth::current_user::CurrentUser;
use crate::errors::Error;

/// Account role. Stored in PostgreSQL as the `user_role` enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
    Customer,
}

/// Permission codes understood by the API.
///
/// Serialized as SCREAMING_SNAKE_CASE strings, which is also the format stored
/// in the `user_permission_overrides` table and returned by
/// `GET /api/auth/permissions`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    DashboardView,
    CustomersView,
    CustomersEdit,
    CustomersDelete,
    AppointmentsView,
    AppointmentsEdit,
    AppointmentsDelete,
    RequestsView,
    RequestsProcess,
    NotificationsView,
    UsersManage,
    SettingsManage,
}

impl Permission {
    /// Every permission code the system knows about.
    pub const ALL: &'static [Permission] = &[
        Permission::DashboardView,
        Permission::CustomersView,
        Permission::CustomersEdit,
        Permission::CustomersDelete,
        Permission::AppointmentsView,
        Permission::AppointmentsEdit,
        Permission::AppointmentsDelete,
        Permission::RequestsView,
        Permission::RequestsProcess,
        Permission::NotificationsView,
        Permission::UsersManage,
        Permission::SettingsManage,
    ];

    /// The wire/storage form of the code, e.g. `CUSTOMERS_DELETE`.
    pub fn code(&self) -> &'static str {
        match self {
            Permission::DashboardView => "DASHBOARD_VIEW",
            Permission::CustomersView => "CUSTOMERS_VIEW",
            Permission::CustomersEdit => "CUSTOMERS_EDIT",
            Permission::CustomersDelete => "CUSTOMERS_DELETE",
            Permission::AppointmentsView => "APPOINTMENTS_VIEW",
            Permission::AppointmentsEdit => "APPOINTMENTS_EDIT",
            Permission::AppointmentsDelete => "APPOINTMENTS_DELETE",
            Permission::RequestsView => "REQUESTS_VIEW",
            Permission::RequestsProcess => "REQUESTS_PROCESS",
            Permission::NotificationsView => "NOTIFICATIONS_VIEW",
            Permission::UsersManage => "USERS_MANAGE",
            Permission::SettingsManage => "SETTINGS_MANAGE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.code() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

/// A permission code that is not part of the closed [`Permission`] enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPermission(pub String);

impl fmt::Display for UnknownPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown permission code: {}", self.0)
    }
}

impl std::error::Error for UnknownPermission {}

/// Static permission set for a role. Admins are handled by the bypass in
/// [`has_permission`] and intentionally get the full set here so that the
/// capability endpoint reports the truth.
pub fn role_permissions(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin => Permission::ALL,
        Role::Employee => &[
            Permission::DashboardView,
            Permission::CustomersView,
            Permission::CustomersEdit,
            Permission::AppointmentsView,
            Permission::AppointmentsEdit,
            Permission::AppointmentsDelete,
            Permission::RequestsView,
            Permission::RequestsProcess,
            Permission::NotificationsView,
        ],
        Role::Customer => &[Permission::AppointmentsView, Permission::NotificationsView],
    }
}

/// A single override row: grant or deny one permission code for one user.
///
/// Rows with codes that no longer parse are skipped (and logged) rather than
/// failing resolution: stale rows must not lock users out, and they can never
/// grant anything the enum does not know.
#[derive(Debug, Clone)]
pub struct PermissionOverride {
    pub permission: String,
    pub granted: bool,
}

/// Resolve the effective permission set: role baseline, then grants, then denies.
///
/// Denies win over grants. Admin overrides are ignored entirely; the bypass in
/// [`has_permission`] makes them meaningless and honoring a deny row for an
/// admin would contradict it.
pub fn effective_permissions(role: Role, overrides: &[PermissionOverride]) -> HashSet<Permission> {
    let mut set: HashSet<Permission> = role_permissions(role).iter().copied().collect();

    if role == Role::Admin {
        return set;
    }

    for row in overrides.iter().filter(|o| o.granted) {
        match row.permission.parse::<Permission>() {
            Ok(p) => {
                set.insert(p);
            }
            Err(e) => tracing::warn!("Skipping unparseable permission override: {e}"),
        }
    }
    for row in overrides.iter().filter(|o| !o.granted) {
        match row.permission.parse::<Permission>() {
            Ok(p) => {
                set.remove(&p);
            }
            Err(e) => tracing::warn!("Skipping unparseable permission override: {e}"),
        }
    }

    set
}

/// Check whether a principal holds a permission.
pub fn has_permission(user: &CurrentUser, required: Permission) -> bool {
    // Admin bypass: admins hold every permission unconditionally.
    if user.role == Role::Admin {
        return true;
    }

    user.permissions.contains(&required)
}

/// Marker types for compile-time permission requirements on handlers.
pub mod require {
    use super::Permission;

    pub trait PermissionMarker: Send + Sync + 'static {
        const PERMISSION: Permission;
    }

    macro_rules! permission_marker {
        ($($name:ident => $perm:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl PermissionMarker for $name {
                    const PERMISSION: Permission = Permission::$perm;
                }
            )*
        };
    }

    permission_marker! {
        DashboardView => DashboardView,
        CustomersView => CustomersView,
        CustomersEdit => CustomersEdit,
        CustomersDelete => CustomersDelete,
        AppointmentsView => AppointmentsView,
        AppointmentsEdit => AppointmentsEdit,
        AppointmentsDelete => AppointmentsDelete,
        RequestsView => RequestsView,
        RequestsProcess => RequestsProcess,
        NotificationsView => NotificationsView,
        UsersManage => UsersManage,
        SettingsManage => SettingsManage,
    }
}

/// Extractor that authenticates the request and requires one permission.
///
/// Used as a handler argument, e.g.
/// `_: RequiresPermission<require::CustomersDelete>`. The resolved principal
/// is available as the `user` field when the handler needs it.
pub struct RequiresPermission<P: require::PermissionMarker> {
    pub user: CurrentUser,
    _marker: PhantomData<P>,
}

impl<P: require::PermissionMarker> FromRequestParts<AppState> for RequiresPermission<P> {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        if !has_permission(&user, P::PERMISSION) {
            return Err(Error::InsufficientPermissions {
                required: P::PERMISSION,
            });
        }

        Ok(Self {
            user,
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user_with(role: Role, permissions: &[Permission]) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            name: "Someone".to_string(),
            role,
            permissions: permissions.iter().copied().collect(),
        }
    }

    #[test]
    fn test_admin_bypasses_every_check() {
        let admin = user_with(Role::Admin, &[]);
        for p in Permission::ALL {
            assert!(has_permission(&admin, *p), "admin denied {p}");
        }
    }

    #[test]
    fn test_employee_baseline_excludes_user_management() {
        let perms = effective_permissions(Role::Employee, &[]);
        assert!(perms.contains(&Permission::CustomersEdit));
        assert!(!perms.contains(&Permission::UsersManage));
        assert!(!perms.contains(&Permission::CustomersDelete));
    }

    #[test]
    fn test_grant_override_adds_permission() {
        let overrides = vec![PermissionOverride {
            permission: "CUSTOMERS_DELETE".to_string(),
            granted: true,
        }];
        let perms = effective_permissions(Role::Employee, &overrides);
        assert!(perms.contains(&Permission::CustomersDelete));
    }

    #[test]
    fn test_deny_override_wins_over_grant() {
        let overrides = vec![
            PermissionOverride {
                permission: "CUSTOMERS_EDIT".to_string(),
                granted: true,
            },
            PermissionOverride {
                permission: "CUSTOMERS_EDIT".to_string(),
                granted: false,
            },
        ];
        let perms = effective_permissions(Role::Employee, &overrides);
        assert!(!perms.contains(&Permission::CustomersEdit));
    }

    #[test]
    fn test_unknown_override_codes_are_skipped() {
        let overrides = vec![PermissionOverride {
            permission: "TOTALLY_MADE_UP".to_string(),
            granted: true,
        }];
        let perms = effective_permissions(Role::Customer, &overrides);
        assert_eq!(perms, role_permissions(Role::Customer).iter().copied().collect());
    }

    #[test]
    fn test_non_admin_without_permission_is_denied() {
        let customer = user_with(Role::Customer, role_permissions(Role::Customer));
        assert!(!has_permission(&customer, Permission::UsersManage));
        assert!(has_permission(&customer, Permission::NotificationsView));
    }

    #[test]
    fn test_permission_code_round_trip() {
        for p in Permission::ALL {
            assert_eq!(p.code().parse::<Permission>().unwrap(), *p);
        }
        assert!("CUSTOMERS_VIEWX".parse::<Permission>().is_err());
    }
}
