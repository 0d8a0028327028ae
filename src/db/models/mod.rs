//! Database-layer request/response models.
//!
//! These are the shapes that cross the repository boundary: `*CreateDBRequest`
//! and `*UpdateDBRequest` going in, `*DBResponse` rows coming out. API-facing
//! types live in `crate::api::models` and convert from these.

pub mod appointments;
pub mod customers;
pub mod notifications;
pub mod requests;
pub mod tokens;
pub mod users;
