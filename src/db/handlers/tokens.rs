//! Database repository for refresh tokens.
//!
//! Refresh tokens are keyed by their opaque token string rather than a
//! surrogate id, and rows are never updated in place except to mark them
//! revoked. Rotation links the old row to its successor via
//! `replaced_by_token`, so a stolen-token replay can be traced.

use crate::db::{
    errors::{DbError, Result},
    models::tokens::{RefreshTokenCreateDBRequest, RefreshTokenDBResponse},
};
use crate::types::{SessionId, UserId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct RefreshTokens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> RefreshTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn create(&mut self, request: &RefreshTokenCreateDBRequest) -> Result<RefreshTokenDBResponse> {
        let row = sqlx::query_as::<_, RefreshTokenDBResponse>(
            r#"
            INSERT INTO refresh_tokens (token, user_id, session_id, expires_at, created_by_ip)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&request.token)
        .bind(request.user_id)
        .bind(request.session_id)
        .bind(request.expires_at)
        .bind(&request.created_by_ip)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row)
    }

    #[instrument(skip_all, err)]
    pub async fn get(&mut self, token: &str) -> Result<Option<RefreshTokenDBResponse>> {
        let row = sqlx::query_as::<_, RefreshTokenDBResponse>("SELECT * FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row)
    }

    /// Mark a single token revoked. Returns false when the token does not
    /// exist or was already revoked.
    #[instrument(skip_all, err)]
    pub async fn revoke(&mut self, token: &str, revoked_by_ip: Option<&str>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW(), revoked_by_ip = $2 \
             WHERE token = $1 AND revoked_at IS NULL",
        )
        .bind(token)
        .bind(revoked_by_ip)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace an active token with a successor.
    ///
    /// Revokes the old row and inserts the new one in a single transaction,
    /// stamping `replaced_by_token` on the old row. The successor inherits
    /// the old row's `session_id` so the chain stays traceable through
    /// rotations. Fails with `NotFound` when the old token is missing or no
    /// longer active, in which case nothing is inserted.
    #[instrument(skip_all, fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    pub async fn rotate(
        &mut self,
        old_token: &str,
        request: &RefreshTokenCreateDBRequest,
    ) -> Result<RefreshTokenDBResponse> {
        let mut tx = self.db.begin().await?;

        let session_id: Option<SessionId> = sqlx::query_scalar(
            "UPDATE refresh_tokens \
             SET revoked_at = NOW(), revoked_by_ip = $2, replaced_by_token = $3 \
             WHERE token = $1 AND revoked_at IS NULL AND expires_at > NOW() \
             RETURNING session_id",
        )
        .bind(old_token)
        .bind(&request.created_by_ip)
        .bind(&request.token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(session_id) = session_id else {
            return Err(DbError::NotFound);
        };

        let row = sqlx::query_as::<_, RefreshTokenDBResponse>(
            r#"
            INSERT INTO refresh_tokens (token, user_id, session_id, expires_at, created_by_ip)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&request.token)
        .bind(request.user_id)
        .bind(session_id)
        .bind(request.expires_at)
        .bind(&request.created_by_ip)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Revoke every active token a user holds. Used on logout-everywhere and
    /// password change.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn revoke_all_for_user(&mut self, user_id: UserId, revoked_by_ip: Option<&str>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW(), revoked_by_ip = $2 \
             WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(revoked_by_ip)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// True when the rotation chain still has an unrevoked, unexpired token.
    ///
    /// Keyed on the chain, not the user: revoking one session must not be
    /// masked by the user's other concurrent sessions.
    #[instrument(skip(self), fields(session_id = %abbrev_uuid(&session_id)), err)]
    pub async fn has_active_for_session(&mut self, session_id: SessionId) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM refresh_tokens \
             WHERE session_id = $1 AND revoked_at IS NULL AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count > 0)
    }

    /// Delete tokens that have been expired or revoked for longer than the
    /// retention window. Returns the number of rows removed.
    #[instrument(skip(self), err)]
    pub async fn purge_dead(&mut self, retention_secs: i64) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM refresh_tokens \
             WHERE expires_at < NOW() - make_interval(secs => $1) \
                OR (revoked_at IS NOT NULL AND revoked_at < NOW() - make_interval(secs => $1))",
        )
        .bind(retention_secs as f64)
        .execute(&mut *self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
