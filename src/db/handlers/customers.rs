//! Database repository for customers.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::customers::{CustomerCreateDBRequest, CustomerDBResponse, CustomerStatus, CustomerUpdateDBRequest},
};
use crate::types::{CustomerId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;

/// Whitelisted sort columns for customer listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CustomerSortBy {
    Name,
    Status,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl CustomerSortBy {
    fn column(self) -> &'static str {
        match self {
            CustomerSortBy::Name => "name",
            CustomerSortBy::Status => "status",
            CustomerSortBy::CreatedAt => "created_at",
            CustomerSortBy::UpdatedAt => "updated_at",
        }
    }
}

/// Filter for listing customers
#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    /// Case-insensitive substring match against name, company, and email.
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
    pub sort_by: CustomerSortBy,
    pub descending: bool,
    pub skip: i64,
    pub limit: i64,
}

impl CustomerFilter {
    fn search_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|s| format!("%{}%", s.trim()))
    }
}

pub struct Customers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Customers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total rows matching the filter, ignoring pagination.
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &CustomerFilter) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM customers \
             WHERE ($1::text IS NULL OR name ILIKE $1 OR company ILIKE $1 OR email ILIKE $1) \
               AND ($2::customer_status IS NULL OR status = $2)",
        )
        .bind(filter.search_pattern())
        .bind(filter.status)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }

    /// Number of customers in each lifecycle state, for the dashboard.
    #[instrument(skip(self), err)]
    pub async fn count_by_status(&mut self, status: CustomerStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE status = $1")
            .bind(status)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Customers<'c> {
    type CreateRequest = CustomerCreateDBRequest;
    type UpdateRequest = CustomerUpdateDBRequest;
    type Response = CustomerDBResponse;
    type Id = CustomerId;
    type Filter = CustomerFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let customer = sqlx::query_as::<_, CustomerDBResponse>(
            r#"
            INSERT INTO customers (name, company, email, phone, status, newsletter, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(&request.company)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.status)
        .bind(request.newsletter)
        .bind(&request.notes)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(customer)
    }

    #[instrument(skip(self), fields(customer_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let customer = sqlx::query_as::<_, CustomerDBResponse>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(customer)
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let direction = if filter.descending { "DESC" } else { "ASC" };
        // sort_by is a closed enum, so the column name is safe to splice.
        let query = format!(
            "SELECT * FROM customers \
             WHERE ($1::text IS NULL OR name ILIKE $1 OR company ILIKE $1 OR email ILIKE $1) \
               AND ($2::customer_status IS NULL OR status = $2) \
             ORDER BY {} {} OFFSET $3 LIMIT $4",
            filter.sort_by.column(),
            direction
        );

        let customers = sqlx::query_as::<_, CustomerDBResponse>(&query)
            .bind(filter.search_pattern())
            .bind(filter.status)
            .bind(filter.skip)
            .bind(filter.limit)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(customers)
    }

    #[instrument(skip(self), fields(customer_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(customer_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // Nullable columns use a presence flag so an explicit null clears the
        // value while an absent field leaves it untouched.
        let customer = sqlx::query_as::<_, CustomerDBResponse>(
            r#"
            UPDATE customers SET
                name = COALESCE($2, name),
                company = CASE WHEN $3 THEN $4 ELSE company END,
                email = CASE WHEN $5 THEN $6 ELSE email END,
                phone = CASE WHEN $7 THEN $8 ELSE phone END,
                status = COALESCE($9, status),
                newsletter = COALESCE($10, newsletter),
                notes = CASE WHEN $11 THEN $12 ELSE notes END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.company.is_some())
        .bind(request.company.clone().flatten())
        .bind(request.email.is_some())
        .bind(request.email.clone().flatten())
        .bind(request.phone.is_some())
        .bind(request.phone.clone().flatten())
        .bind(request.status)
        .bind(request.newsletter)
        .bind(request.notes.is_some())
        .bind(request.notes.clone().flatten())
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(customer)
    }
}
