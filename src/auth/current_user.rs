//! Authenticated-user extraction.
//!
//! Every protected handler receives a [`CurrentUser`] through the axum
//! extractor below. Extraction verifies the bearer token, confirms the
//! account still exists and is active, rejects sessions whose refresh
//! token chain has been revoked, and resolves the effective permission
//! set from the role baseline plus per-user overrides.

use std::collections::HashSet;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    auth::{
        permissions::{Permission, Role, effective_permissions},
        token::verify_access_token,
    },
    config::Config,
    db::{
        errors::DbError,
        handlers::{Repository, tokens::RefreshTokens, users::Users},
    },
    errors::{Error, Result},
    types::UserId,
};

/// The authenticated user attached to a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub permissions: HashSet<Permission>,
}

/// Pull a single cookie value out of a `Cookie` header string.
fn find_cookie<'a>(cookie_str: &'a str, name: &str) -> Option<&'a str> {
    cookie_str.split(';').find_map(|cookie| {
        let (k, v) = cookie.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}

/// Locate the access token in the request.
///
/// Checked in order: `Authorization: Bearer`, the `X-Auth-Token` header,
/// the configured session cookie, then legacy cookie names kept for
/// clients that predate the current cookie.
pub(crate) fn extract_token(headers: &HeaderMap, config: &Config) -> Option<String> {
    if let Some(auth) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        && let Some(token) = auth.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    if let Some(token) = headers.get("x-auth-token").and_then(|h| h.to_str().ok()) {
        return Some(token.trim().to_string());
    }

    let cookie_str = headers.get(axum::http::header::COOKIE).and_then(|h| h.to_str().ok())?;

    let session = &config.auth.session;
    if let Some(value) = find_cookie(cookie_str, &session.cookie_name) {
        return Some(value.to_string());
    }
    for legacy in &session.legacy_cookie_names {
        if let Some(value) = find_cookie(cookie_str, legacy) {
            trace!(cookie = %legacy, "Accepted legacy session cookie");
            return Some(value.to_string());
        }
    }
    None
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Middleware may have resolved the user already.
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let token = extract_token(&parts.headers, &state.config).ok_or(Error::Unauthenticated { message: None })?;

        let claims = match verify_access_token(&token, &state.config)? {
            Ok(claims) => claims,
            Err(rejection) => {
                trace!(?rejection, "Rejected access token");
                return Err(rejection.into());
            }
        };

        let mut conn = state.db.acquire().await.map_err(DbError::from)?;

        // The token only proves who the user was at issue time. Role,
        // active flag, and overrides are re-read on every request.
        let mut users = Users::new(&mut conn);
        let user = users
            .get_by_id(claims.sub)
            .await?
            .filter(|u| u.active)
            .ok_or_else(|| Error::Unauthenticated {
                message: Some("Account is inactive or no longer exists".to_string()),
            })?;

        let overrides = users.permission_overrides(user.id).await?;

        // The check is per chain: a user logged in from two places who logs
        // out of one must not keep using that session's access token just
        // because the other session is still alive.
        let mut tokens = RefreshTokens::new(&mut conn);
        if !tokens.has_active_for_session(claims.sid).await? {
            debug!(user_id = %user.id, session_id = %claims.sid, "Refresh chain revoked, rejecting session");
            return Err(Error::Unauthenticated {
                message: Some("Session has been revoked".to_string()),
            });
        }

        let permissions = effective_permissions(user.role, &overrides);
        let current_user = CurrentUser {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            permissions,
        };

        parts.extensions.insert(current_user.clone());
        Ok(current_user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::create_access_token;
    use crate::test_utils::{test_config, test_state};
    use axum::extract::FromRequestParts as _;
    use uuid::Uuid;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/api/customers");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let config = test_config();
        let parts = parts_with_headers(&[
            ("authorization", "Bearer from-header"),
            ("x-auth-token", "from-x-auth"),
            ("cookie", "clientdesk_session=from-cookie"),
        ]);
        assert_eq!(extract_token(&parts.headers, &config).as_deref(), Some("from-header"));
    }

    #[test]
    fn x_auth_token_wins_over_cookie() {
        let config = test_config();
        let parts = parts_with_headers(&[
            ("x-auth-token", "from-x-auth"),
            ("cookie", "clientdesk_session=from-cookie"),
        ]);
        assert_eq!(extract_token(&parts.headers, &config).as_deref(), Some("from-x-auth"));
    }

    #[test]
    fn session_cookie_and_legacy_fallback() {
        let config = test_config();

        let parts = parts_with_headers(&[("cookie", "other=1; clientdesk_session=sess-value")]);
        assert_eq!(extract_token(&parts.headers, &config).as_deref(), Some("sess-value"));

        // Legacy names are only consulted when the current cookie is absent.
        let parts = parts_with_headers(&[("cookie", "token=legacy-value; theme=dark")]);
        assert_eq!(extract_token(&parts.headers, &config).as_deref(), Some("legacy-value"));

        let parts = parts_with_headers(&[("cookie", "theme=dark")]);
        assert_eq!(extract_token(&parts.headers, &config), None);
    }

    #[test]
    fn find_cookie_ignores_partial_names() {
        assert_eq!(find_cookie("my_token=a; token=b", "token"), Some("b"));
        assert_eq!(find_cookie("", "token"), None);
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let state = test_state();
        let mut parts = parts_with_headers(&[]);

        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { message: None }));
    }

    #[tokio::test]
    async fn malformed_token_is_rejected_before_db_access() {
        // The pool is lazy and points nowhere, so reaching the database
        // would fail the test with a connection error instead.
        let state = test_state();
        let mut parts = parts_with_headers(&[("authorization", "Bearer not-a-jwt")]);

        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { message: Some(m) } if m.contains("malformed")));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_with_expired_message() {
        let state = test_state();

        let mut claims =
            crate::auth::token::AccessClaims::new(
            Uuid::new_v4(),
            "u@example.com",
            Role::Employee,
            Uuid::new_v4(),
            &state.config,
        );
        claims.iat -= 7200;
        claims.exp = claims.iat + 10;
        let secret = state.config.secret_key.as_deref().unwrap();
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();

        let mut parts = parts_with_headers(&[("authorization", &format!("Bearer {token}"))]);
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { message: Some(m) } if m.contains("expired")));
    }

    #[tokio::test]
    async fn extension_cache_skips_verification() {
        let state = test_state();
        let cached = CurrentUser {
            id: Uuid::new_v4(),
            email: "cached@example.com".to_string(),
            name: "Cached".to_string(),
            role: Role::Admin,
            permissions: Permission::ALL.iter().copied().collect(),
        };

        let mut parts = parts_with_headers(&[]);
        parts.extensions.insert(cached.clone());

        let user = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.id, cached.id);
    }

    #[test]
    fn valid_token_round_trips_through_claims() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, "a@example.com", Role::Employee, Uuid::new_v4(), &config).unwrap();

        let claims = verify_access_token(&token, &config).unwrap().unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Employee);
    }
}
