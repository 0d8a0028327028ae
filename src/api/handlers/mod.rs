//! HTTP request handlers.

pub mod appointments;
pub mod auth;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod notifications;
pub mod requests;
pub mod users;
