//! Shared fixtures for unit tests.
//!
//! Nothing here opens a real database connection: `test_state` builds its
//! pool with `connect_lazy`, so tests exercising extraction, validation, and
//! middleware logic fail fast with a connection error if they accidentally
//! reach the database layer.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crate::{AppState, config::Config, health::DbHealthMonitor, limits::Limiters};

/// A fully validated config with a fixed signing key and library defaults.
pub fn test_config() -> Config {
    Config {
        secret_key: Some("unit-test-secret-key-0123456789abcdef".to_string()),
        ..Default::default()
    }
}

/// An `AppState` backed by a lazy pool that never connects.
pub fn test_state() -> AppState {
    let config = test_config();
    let db = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_millis(100))
        .connect_lazy("postgres://unused@127.0.0.1:1/unused")
        .expect("lazy pool construction cannot fail");

    AppState::builder()
        .db(db)
        .limiters(Limiters::new(&config.rate_limits))
        .db_health(Arc::new(DbHealthMonitor::new(config.health.clone())))
        .config(config)
        .build()
}
