//! API request and response data models.
//!
//! These are distinct from the database models under `crate::db::models` so
//! the public contract can evolve independently of storage. Everything is
//! annotated with `utoipa` for the generated OpenAPI document.

pub mod appointments;
pub mod auth;
pub mod customers;
pub mod dashboard;
pub mod notifications;
pub mod pagination;
pub mod requests;
pub mod users;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Uniform success envelope for every API response.
///
/// Failures use the same shape with `success: false` and no `data`, produced
/// by the central error type.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            status_code: StatusCode::OK.as_u16(),
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            status_code: StatusCode::CREATED.as_u16(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiEnvelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// Distinguishes an absent PATCH field from an explicit `null`.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on
/// `Option<Option<T>>` fields: absent stays `None`, `null` becomes
/// `Some(None)`, and a value becomes `Some(Some(value))`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_serializes_status_code_in_camel_case() {
        let envelope = ApiEnvelope::ok(json!({"id": 1})).with_message("done");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["message"], "done");
        assert_eq!(value["data"]["id"], 1);
    }

    #[test]
    fn envelope_omits_message_when_unset() {
        let value = serde_json::to_value(ApiEnvelope::created(json!(null))).unwrap();
        assert_eq!(value["statusCode"], 201);
        assert!(value.get("message").is_none());
    }

    #[test]
    fn double_option_distinguishes_null_from_absent() {
        #[derive(Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "double_option")]
            notes: Option<Option<String>>,
        }

        let absent: Patch = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.notes, None);

        let null: Patch = serde_json::from_value(json!({"notes": null})).unwrap();
        assert_eq!(null.notes, Some(None));

        let value: Patch = serde_json::from_value(json!({"notes": "hi"})).unwrap();
        assert_eq!(value.notes, Some(Some("hi".to_string())));
    }
}
