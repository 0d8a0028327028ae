//! Customer CRUD endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::{info, instrument};

use crate::{
    AppState,
    api::models::{
        ApiEnvelope,
        customers::{CustomerCreate, CustomerResponse, CustomerUpdate, ListCustomersQuery},
        pagination::PaginatedResponse,
    },
    auth::permissions::{RequiresPermission, require},
    db::{
        errors::DbError,
        handlers::{Repository, customers::{CustomerFilter, Customers}},
        models::customers::{CustomerCreateDBRequest, CustomerStatus, CustomerUpdateDBRequest},
    },
    errors::Error,
    types::CustomerId,
};

/// List customers with search, status filter, sorting, and pagination
#[utoipa::path(
    get,
    path = "/api/customers",
    params(ListCustomersQuery),
    tag = "customers",
    responses(
        (status = 200, description = "Paginated customers", body = ApiEnvelope<PaginatedResponse<CustomerResponse>>),
        (status = 403, description = "Missing CUSTOMERS_VIEW"),
    )
)]
#[instrument(skip_all)]
pub async fn list_customers(
    _: RequiresPermission<require::CustomersView>,
    State(state): State<AppState>,
    Query(query): Query<ListCustomersQuery>,
) -> Result<ApiEnvelope<PaginatedResponse<CustomerResponse>>, Error> {
    let filter = CustomerFilter {
        search: query.search.clone().filter(|s| !s.trim().is_empty()),
        status: query.status,
        sort_by: query.sort_by()?,
        descending: query.descending()?,
        skip: query.pagination.skip(),
        limit: query.pagination.limit(),
    };

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut customers = Customers::new(&mut conn);

    let total = customers.count(&filter).await?;
    let rows = customers.list(&filter).await?;

    let data = rows.into_iter().map(CustomerResponse::from).collect();
    Ok(ApiEnvelope::ok(PaginatedResponse::new(data, total, &query.pagination)))
}

/// Create a customer
#[utoipa::path(
    post,
    path = "/api/customers",
    request_body = CustomerCreate,
    tag = "customers",
    responses(
        (status = 201, description = "Customer created", body = ApiEnvelope<CustomerResponse>),
        (status = 403, description = "Missing CUSTOMERS_EDIT"),
    )
)]
#[instrument(skip_all)]
pub async fn create_customer(
    _: RequiresPermission<require::CustomersEdit>,
    State(state): State<AppState>,
    Json(request): Json<CustomerCreate>,
) -> Result<ApiEnvelope<CustomerResponse>, Error> {
    if request.name.trim().is_empty() {
        return Err(Error::Validation {
            errors: vec!["name must not be empty".to_string()],
        });
    }

    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut customers = Customers::new(&mut conn);

    let customer = customers
        .create(&CustomerCreateDBRequest {
            name: request.name,
            company: request.company,
            email: request.email,
            phone: request.phone,
            status: request.status.unwrap_or(CustomerStatus::Prospect),
            newsletter: request.newsletter.unwrap_or(false),
            notes: request.notes,
        })
        .await?;

    info!(customer_id = %customer.id, "Customer created");
    Ok(ApiEnvelope::created(CustomerResponse::from(customer)))
}

/// Get one customer
#[utoipa::path(
    get,
    path = "/api/customers/{id}",
    params(("id" = String, Path, format = "uuid")),
    tag = "customers",
    responses(
        (status = 200, description = "The customer", body = ApiEnvelope<CustomerResponse>),
        (status = 404, description = "No such customer"),
    )
)]
#[instrument(skip_all)]
pub async fn get_customer(
    _: RequiresPermission<require::CustomersView>,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<ApiEnvelope<CustomerResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut customers = Customers::new(&mut conn);

    let customer = customers.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "customer".to_string(),
        id: id.to_string(),
    })?;

    Ok(ApiEnvelope::ok(CustomerResponse::from(customer)))
}

/// Update a customer
#[utoipa::path(
    put,
    path = "/api/customers/{id}",
    params(("id" = String, Path, format = "uuid")),
    request_body = CustomerUpdate,
    tag = "customers",
    responses(
        (status = 200, description = "Updated customer", body = ApiEnvelope<CustomerResponse>),
        (status = 404, description = "No such customer"),
    )
)]
#[instrument(skip_all)]
pub async fn update_customer(
    _: RequiresPermission<require::CustomersEdit>,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(request): Json<CustomerUpdate>,
) -> Result<ApiEnvelope<CustomerResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut customers = Customers::new(&mut conn);

    let customer = customers
        .update(
            id,
            &CustomerUpdateDBRequest {
                name: request.name,
                company: request.company,
                email: request.email,
                phone: request.phone,
                status: request.status,
                newsletter: request.newsletter,
                notes: request.notes,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                resource: "customer".to_string(),
                id: id.to_string(),
            },
            other => Error::Database(other),
        })?;

    Ok(ApiEnvelope::ok(CustomerResponse::from(customer)))
}

/// Delete a customer
#[utoipa::path(
    delete,
    path = "/api/customers/{id}",
    params(("id" = String, Path, format = "uuid")),
    tag = "customers",
    responses(
        (status = 200, description = "Customer deleted"),
        (status = 403, description = "Missing CUSTOMERS_DELETE"),
        (status = 404, description = "No such customer"),
    )
)]
#[instrument(skip_all)]
pub async fn delete_customer(
    _: RequiresPermission<require::CustomersDelete>,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<ApiEnvelope<serde_json::Value>, Error> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let mut customers = Customers::new(&mut conn);

    let deleted = customers.delete(id).await?;
    if !deleted {
        return Err(Error::NotFound {
            resource: "customer".to_string(),
            id: id.to_string(),
        });
    }

    info!(customer_id = %id, "Customer deleted");
    Ok(ApiEnvelope::ok(serde_json::json!(null)).with_message("Customer deleted"))
}
