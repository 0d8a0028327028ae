//! Database repositories.
//!
//! Each repository borrows a `PgConnection` for its lifetime, so callers
//! decide whether operations share a transaction.

pub mod appointments;
pub mod customers;
pub mod notifications;
pub mod repository;
pub mod requests;
pub mod tokens;
pub mod users;

pub use repository::Repository;
