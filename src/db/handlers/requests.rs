//! Database repository for contact requests.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::requests::{
        ContactRequestCreateDBRequest, ContactRequestDBResponse, ContactRequestStatus, ContactRequestUpdateDBRequest,
    },
};
use crate::types::{ContactRequestId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

/// Filter for listing contact requests
#[derive(Debug, Clone, Default)]
pub struct ContactRequestFilter {
    pub status: Option<ContactRequestStatus>,
    pub skip: i64,
    pub limit: i64,
}

pub struct ContactRequests<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ContactRequests<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total rows matching the filter, ignoring pagination.
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ContactRequestFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM contact_requests \
             WHERE ($1::contact_request_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// Untriaged requests, for the dashboard badge.
    #[instrument(skip(self), err)]
    pub async fn count_new(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contact_requests WHERE status = 'new'")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for ContactRequests<'c> {
    type CreateRequest = ContactRequestCreateDBRequest;
    type UpdateRequest = ContactRequestUpdateDBRequest;
    type Response = ContactRequestDBResponse;
    type Id = ContactRequestId;
    type Filter = ContactRequestFilter;

    #[instrument(skip_all, err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as::<_, ContactRequestDBResponse>(
            r#"
            INSERT INTO contact_requests (name, email, phone, service, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.service)
        .bind(&request.message)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row)
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let row = sqlx::query_as::<_, ContactRequestDBResponse>("SELECT * FROM contact_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(row)
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let rows = sqlx::query_as::<_, ContactRequestDBResponse>(
            "SELECT * FROM contact_requests \
             WHERE ($1::contact_request_status IS NULL OR status = $1) \
             ORDER BY created_at DESC OFFSET $2 LIMIT $3",
        )
        .bind(filter.status)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(rows)
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contact_requests WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let row = sqlx::query_as::<_, ContactRequestDBResponse>(
            r#"
            UPDATE contact_requests SET
                status = COALESCE($2, status),
                processor_id = CASE WHEN $3 THEN $4 ELSE processor_id END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.status)
        .bind(request.processor_id.is_some())
        .bind(request.processor_id.flatten())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(row)
    }
}
