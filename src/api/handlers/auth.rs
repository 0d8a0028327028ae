//! Login, session, and password management endpoints.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    AppState,
    api::models::{
        ApiEnvelope,
        auth::{
            ChangePasswordRequest, LoginRequest, LoginResponse, LogoutRequest, PermissionsResponse, PrincipalResponse,
            RefreshRequest, RefreshResponse, ValidateResponse,
        },
        users::UserResponse,
    },
    auth::{
        CurrentUser,
        current_user::extract_token,
        password,
        permissions::Role,
        token,
    },
    config::Config,
    db::{
        errors::DbError,
        handlers::{Repository, tokens::RefreshTokens, users::Users},
        models::{tokens::RefreshTokenCreateDBRequest, users::UserUpdateDBRequest},
    },
    errors::Error,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Best-effort client address for token audit columns.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

fn session_cookie(token: &str, config: &Config) -> String {
    let session = &config.auth.session;
    let max_age = config.auth.security.jwt_expiry.as_secs();
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite={}; Max-Age={}",
        session.cookie_name, token, session.cookie_same_site, max_age
    );
    if session.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_session_cookie(config: &Config) -> String {
    let session = &config.auth.session;
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite={}; Max-Age=0",
        session.cookie_name, session.cookie_same_site
    );
    if session.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn with_cookie<T: Serialize>(envelope: ApiEnvelope<T>, cookie: String) -> Response {
    let mut response = envelope.into_response();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Login successful", body = ApiEnvelope<LoginResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts"),
    )
)]
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Response, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;

    let mut users = Users::new(&mut conn);
    let user = users.get_by_email(&request.email).await?;

    // A missing or inactive account fails with the same message as a bad
    // password so login cannot be used to probe for accounts.
    let user = match user {
        Some(user) if user.active => user,
        _ => {
            return Err(Error::Unauthenticated {
                message: Some(INVALID_CREDENTIALS.to_string()),
            });
        }
    };

    let valid = password::verify_password_blocking(request.password, user.password_hash.clone()).await?;
    if !valid {
        warn!(email = %request.email, "Failed login attempt");
        return Err(Error::Unauthenticated {
            message: Some(INVALID_CREDENTIALS.to_string()),
        });
    }

    let refresh_token = password::generate_refresh_token();
    // Each login starts a fresh rotation chain; the access token is bound to
    // it so revoking this session kills its access tokens too.
    let session_id = uuid::Uuid::new_v4();
    let expires_at = Utc::now()
        + chrono::Duration::from_std(state.config.auth.security.refresh_token_expiry).map_err(|e| Error::Internal {
            operation: format!("refresh token expiry out of range: {e}"),
        })?;

    let mut tokens = RefreshTokens::new(&mut conn);
    tokens
        .create(&RefreshTokenCreateDBRequest {
            token: refresh_token.clone(),
            user_id: user.id,
            session_id,
            expires_at,
            created_by_ip: client_ip(&headers),
        })
        .await?;

    let access_token = token::create_access_token(user.id, &user.email, user.role, session_id, &state.config)?;
    let cookie = session_cookie(&access_token, &state.config);

    info!(user_id = %user.id, "User logged in");

    let envelope = ApiEnvelope::ok(LoginResponse {
        token: access_token,
        refresh_token,
        user: UserResponse::from(user),
    })
    .with_message("Login successful");

    Ok(with_cookie(envelope, cookie))
}

/// Rotate a refresh token and issue a new access token
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Token refreshed", body = ApiEnvelope<RefreshResponse>),
        (status = 401, description = "Refresh token invalid, expired, or revoked"),
    )
)]
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<Response, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;

    let mut tokens = RefreshTokens::new(&mut conn);
    let record = tokens
        .get(&request.refresh_token)
        .await?
        .filter(|record| record.is_active(Utc::now()))
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Refresh token is invalid, expired, or revoked".to_string()),
        })?;

    let mut users = Users::new(&mut conn);
    let user = users
        .get_by_id(record.user_id)
        .await?
        .filter(|user| user.active)
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Account is inactive or no longer exists".to_string()),
        })?;

    let expires_at = Utc::now()
        + chrono::Duration::from_std(state.config.auth.security.refresh_token_expiry).map_err(|e| Error::Internal {
            operation: format!("refresh token expiry out of range: {e}"),
        })?;

    let successor = RefreshTokenCreateDBRequest {
        token: password::generate_refresh_token(),
        user_id: user.id,
        session_id: record.session_id,
        expires_at,
        created_by_ip: client_ip(&headers),
    };

    let mut tokens = RefreshTokens::new(&mut conn);
    let new_record = tokens.rotate(&record.token, &successor).await.map_err(|e| match e {
        // Lost the race against a concurrent rotation of the same token.
        DbError::NotFound => Error::Unauthenticated {
            message: Some("Refresh token is invalid, expired, or revoked".to_string()),
        },
        other => Error::Database(other),
    })?;

    let access_token = token::create_access_token(user.id, &user.email, user.role, new_record.session_id, &state.config)?;
    let cookie = session_cookie(&access_token, &state.config);

    let envelope = ApiEnvelope::ok(RefreshResponse {
        token: access_token,
        refresh_token: new_record.token,
    });

    Ok(with_cookie(envelope, cookie))
}

/// Logout: revoke the presented refresh token and clear the session cookie
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    request_body = LogoutRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful"),
    )
)]
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> Result<Response, Error> {
    if let Some(Json(LogoutRequest {
        refresh_token: Some(refresh_token),
    })) = body
    {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        let mut tokens = RefreshTokens::new(&mut conn);
        tokens.revoke(&refresh_token, client_ip(&headers).as_deref()).await?;
    }

    let cookie = clear_session_cookie(&state.config);
    let envelope = ApiEnvelope::ok(serde_json::json!(null)).with_message("Logout successful");
    Ok(with_cookie(envelope, cookie))
}

/// Check whether a supplied access token is valid
///
/// Stateless: answers for the token's signature and expiry only, without
/// consulting the account or the refresh chain. Always 200; an absent or
/// bad token means `valid: false`, never a 401.
#[utoipa::path(
    get,
    path = "/api/auth/validate",
    tag = "auth",
    responses(
        (status = 200, description = "Verdict for the supplied token", body = ApiEnvelope<ValidateResponse>),
    )
)]
#[instrument(skip_all)]
pub async fn validate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ApiEnvelope<ValidateResponse>, Error> {
    let valid = match extract_token(&headers, &state.config) {
        Some(presented) => token::verify_access_token(&presented, &state.config)?.is_ok(),
        None => false,
    };
    Ok(ApiEnvelope::ok(ValidateResponse { valid }))
}

/// Current principal
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "The authenticated principal", body = ApiEnvelope<PrincipalResponse>),
        (status = 401, description = "Not authenticated"),
    )
)]
#[instrument(skip_all)]
pub async fn me(user: CurrentUser) -> ApiEnvelope<PrincipalResponse> {
    ApiEnvelope::ok(PrincipalResponse::from(&user))
}

/// Effective permission codes for the principal
#[utoipa::path(
    get,
    path = "/api/auth/permissions",
    tag = "auth",
    responses(
        (status = 200, description = "Effective permissions", body = ApiEnvelope<PermissionsResponse>),
        (status = 401, description = "Not authenticated"),
    )
)]
#[instrument(skip_all)]
pub async fn permissions(user: CurrentUser) -> ApiEnvelope<PermissionsResponse> {
    let mut codes: Vec<String> = user.permissions.iter().map(|p| p.code().to_string()).collect();
    codes.sort();

    ApiEnvelope::ok(PermissionsResponse {
        role: user.role,
        is_admin: user.role == Role::Admin,
        permissions: codes,
    })
}

/// Change the caller's password and revoke all their refresh tokens
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Current password incorrect"),
        (status = 400, description = "New password violates the policy"),
    )
)]
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<ApiEnvelope<serde_json::Value>, Error> {
    password::validate_password_policy(&request.new_password, &state.config.auth.password)?;

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;

    let mut users = Users::new(&mut conn);
    let record = users.get_by_id(user.id).await?.ok_or_else(|| Error::Unauthenticated {
        message: Some("Account no longer exists".to_string()),
    })?;

    let valid = password::verify_password_blocking(request.current_password, record.password_hash).await?;
    if !valid {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }

    let password_hash = password::hash_password_blocking(request.new_password, &state.config.auth.password).await?;
    users
        .update(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    // Every outstanding session must re-authenticate with the new password.
    let mut tokens = RefreshTokens::new(&mut conn);
    let revoked = tokens.revoke_all_for_user(user.id, client_ip(&headers).as_deref()).await?;
    info!(user_id = %user.id, revoked, "Password changed, refresh tokens revoked");

    Ok(ApiEnvelope::ok(serde_json::json!(null)).with_message("Password changed successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_config;

    #[test]
    fn session_cookie_carries_name_and_max_age() {
        let config = test_config();
        let cookie = session_cookie("abc123", &config);

        assert!(cookie.starts_with("clientdesk_session=abc123;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains(&format!("Max-Age={}", config.auth.security.jwt_expiry.as_secs())));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let config = test_config();
        let cookie = clear_session_cookie(&config);

        assert!(cookie.starts_with("clientdesk_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "192.0.2.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "192.0.2.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("192.0.2.1"));

        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
