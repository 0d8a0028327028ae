//! API response models for the per-user notification feed.

use super::pagination::Pagination;
use crate::db::models::notifications::{NotificationDBResponse, NotificationKind};
use crate::types::{NotificationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: NotificationId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationDBResponse> for NotificationResponse {
    fn from(notification: NotificationDBResponse) -> Self {
        Self {
            id: notification.id,
            user_id: notification.user_id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            link: notification.link,
            read: notification.read,
            created_at: notification.created_at,
        }
    }
}

/// Query parameters for listing the caller's notifications
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListNotificationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only return unread notifications
    #[serde(default)]
    pub unread_only: Option<bool>,
}

/// Result of a bulk mark-read operation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    pub marked: u64,
}
