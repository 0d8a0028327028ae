//! API request/response models for customers.

use super::{double_option, pagination::Pagination};
use crate::db::handlers::customers::CustomerSortBy;
use crate::db::models::customers::{CustomerDBResponse, CustomerStatus};
use crate::errors::Error;
use crate::types::CustomerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CustomerCreate {
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Defaults to `prospect`
    #[serde(default)]
    pub status: Option<CustomerStatus>,
    #[serde(default)]
    pub newsletter: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update. Nullable fields distinguish `null` (clear) from absent
/// (leave unchanged).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub phone: Option<Option<String>>,
    pub status: Option<CustomerStatus>,
    pub newsletter: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: CustomerId,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: CustomerStatus,
    pub newsletter: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CustomerDBResponse> for CustomerResponse {
    fn from(customer: CustomerDBResponse) -> Self {
        Self {
            id: customer.id,
            name: customer.name,
            company: customer.company,
            email: customer.email,
            phone: customer.phone,
            status: customer.status,
            newsletter: customer.newsletter,
            notes: customer.notes,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        }
    }
}

/// Query parameters for listing customers
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListCustomersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on name, company, and email
    pub search: Option<String>,

    pub status: Option<CustomerStatus>,

    /// Sort column: `name`, `status`, `created_at`, or `updated_at`
    pub sort_by: Option<String>,

    /// Sort direction: `asc` (default) or `desc`
    pub sort_dir: Option<String>,
}

impl ListCustomersQuery {
    /// Resolve the sort column against the whitelist.
    pub fn sort_by(&self) -> Result<CustomerSortBy, Error> {
        match self.sort_by.as_deref() {
            None => Ok(CustomerSortBy::default()),
            Some("name") => Ok(CustomerSortBy::Name),
            Some("status") => Ok(CustomerSortBy::Status),
            Some("created_at") => Ok(CustomerSortBy::CreatedAt),
            Some("updated_at") => Ok(CustomerSortBy::UpdatedAt),
            Some(other) => Err(Error::BadRequest {
                message: format!("Unknown sort column: {other}"),
            }),
        }
    }

    pub fn descending(&self) -> Result<bool, Error> {
        match self.sort_dir.as_deref() {
            None | Some("asc") => Ok(false),
            Some("desc") => Ok(true),
            Some(other) => Err(Error::BadRequest {
                message: format!("Unknown sort direction: {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_whitelist_rejects_unknown_columns() {
        let query = ListCustomersQuery {
            sort_by: Some("password_hash".to_string()),
            ..Default::default()
        };
        assert!(query.sort_by().is_err());

        let query = ListCustomersQuery {
            sort_by: Some("name".to_string()),
            sort_dir: Some("desc".to_string()),
            ..Default::default()
        };
        assert_eq!(query.sort_by().unwrap(), CustomerSortBy::Name);
        assert!(query.descending().unwrap());
    }

    #[test]
    fn defaults_sort_by_created_at_ascending() {
        let query = ListCustomersQuery::default();
        assert_eq!(query.sort_by().unwrap(), CustomerSortBy::CreatedAt);
        assert!(!query.descending().unwrap());
    }
}
