//! API request/response models for contact-request intake and triage.

use super::{double_option, pagination::Pagination};
use crate::db::models::requests::{ContactRequestDBResponse, ContactRequestStatus};
use crate::errors::Error;
use crate::types::{ContactRequestId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Body of the public contact form.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ContactRequestCreate {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    pub message: String,
}

impl ContactRequestCreate {
    /// Field-level validation for the public form. Collects every problem
    /// rather than stopping at the first.
    pub fn validate(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        if self.name.len() > 200 {
            errors.push("name must be at most 200 characters".to_string());
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            errors.push("email must be a valid address".to_string());
        }
        if self.message.trim().is_empty() {
            errors.push("message must not be empty".to_string());
        }
        if self.message.len() > 10_000 {
            errors.push("message must be at most 10000 characters".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { errors })
        }
    }
}

/// Triage update: change status and/or claim a processor.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ContactRequestUpdate {
    pub status: Option<ContactRequestStatus>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub processor_id: Option<Option<UserId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactRequestResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ContactRequestId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub service: Option<String>,
    pub message: String,
    pub status: ContactRequestStatus,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub processor_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContactRequestDBResponse> for ContactRequestResponse {
    fn from(request: ContactRequestDBResponse) -> Self {
        Self {
            id: request.id,
            name: request.name,
            email: request.email,
            phone: request.phone,
            service: request.service,
            message: request.message,
            status: request.status,
            processor_id: request.processor_id,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// Query parameters for listing contact requests
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListRequestsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<ContactRequestStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ContactRequestCreate {
        ContactRequestCreate {
            name: "Jo Fischer".to_string(),
            email: "jo@example.com".to_string(),
            phone: None,
            service: Some("consulting".to_string()),
            message: "Please call me back.".to_string(),
        }
    }

    #[test]
    fn valid_form_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn collects_all_problems() {
        let form = ContactRequestCreate {
            name: "  ".to_string(),
            email: "not-an-email".to_string(),
            message: String::new(),
            ..valid()
        };
        let err = form.validate().unwrap_err();
        match err {
            Error::Validation { errors } => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bare_at_signs() {
        for email in ["@example.com", "jo@", "@"] {
            let form = ContactRequestCreate {
                email: email.to_string(),
                ..valid()
            };
            assert!(form.validate().is_err(), "email: {email}");
        }
    }
}
