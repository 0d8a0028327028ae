//! Database models for refresh-token records.

use crate::types::{SessionId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for recording a freshly issued refresh token
#[derive(Debug, Clone)]
pub struct RefreshTokenCreateDBRequest {
    pub token: String,
    pub user_id: UserId,
    /// Rotation-chain identifier. Fresh for a login, inherited from the
    /// predecessor on rotation.
    pub session_id: SessionId,
    pub expires_at: DateTime<Utc>,
    pub created_by_ip: Option<String>,
}

/// A refresh-token record.
///
/// A revoked record keeps its row: `revoked_at`/`revoked_by_ip` say when and
/// from where, and `replaced_by_token` links to the successor when revocation
/// happened through rotation.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenDBResponse {
    pub token: String,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_by_ip: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by_ip: Option<String>,
    pub replaced_by_token: Option<String>,
}

impl RefreshTokenDBResponse {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// A token is active when it is neither revoked nor expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(expires_in_secs: i64, revoked: bool) -> RefreshTokenDBResponse {
        let now = Utc::now();
        RefreshTokenDBResponse {
            token: "tok".to_string(),
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(expires_in_secs),
            created_by_ip: None,
            revoked_at: revoked.then_some(now),
            revoked_by_ip: None,
            replaced_by_token: None,
        }
    }

    #[test]
    fn test_active_requires_unrevoked_and_unexpired() {
        let now = Utc::now();
        assert!(record(60, false).is_active(now));
        assert!(!record(-60, false).is_active(now));
        assert!(!record(60, true).is_active(now));
    }
}
