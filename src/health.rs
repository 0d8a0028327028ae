//! Database health monitoring.
//!
//! A background loop pings the database on an interval. A ping that takes
//! longer than the configured timeout counts as a failure even if it would
//! eventually succeed. Failure and recovery callbacks fire exactly once per
//! outage: the failure callback on the check that reaches the consecutive
//! failure threshold, the recovery callback on the first success after it.

use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::config::HealthConfig;

type HealthCallback = Box<dyn Fn(&DatabaseStatus) + Send + Sync>;

/// Snapshot of database connectivity.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DatabaseStatus {
    pub healthy: bool,
    pub last_checked: Option<DateTime<Utc>>,
    /// Round-trip time of the last successful ping.
    pub latency_ms: Option<u64>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl Default for DatabaseStatus {
    fn default() -> Self {
        // Assume healthy until the first check says otherwise, so startup
        // does not trip the failure callback.
        Self {
            healthy: true,
            last_checked: None,
            latency_ms: None,
            last_error: None,
            consecutive_failures: 0,
        }
    }
}

pub struct DbHealthMonitor {
    config: HealthConfig,
    status: RwLock<DatabaseStatus>,
    /// True while the failure callback has fired and recovery has not.
    alerting: Mutex<bool>,
    on_failure: Mutex<Option<HealthCallback>>,
    on_recovery: Mutex<Option<HealthCallback>>,
}

impl DbHealthMonitor {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            status: RwLock::new(DatabaseStatus::default()),
            alerting: Mutex::new(false),
            on_failure: Mutex::new(None),
            on_recovery: Mutex::new(None),
        }
    }

    pub fn set_on_failure(&self, callback: impl Fn(&DatabaseStatus) + Send + Sync + 'static) {
        if let Ok(mut slot) = self.on_failure.lock() {
            *slot = Some(Box::new(callback));
        }
    }

    pub fn set_on_recovery(&self, callback: impl Fn(&DatabaseStatus) + Send + Sync + 'static) {
        if let Ok(mut slot) = self.on_recovery.lock() {
            *slot = Some(Box::new(callback));
        }
    }

    pub async fn status(&self) -> DatabaseStatus {
        self.status.read().await.clone()
    }

    /// Run one ping against the pool and fold the result into the status.
    pub async fn check_now(&self, pool: &PgPool) -> DatabaseStatus {
        let outcome = self
            .timed_ping(async {
                sqlx::query_scalar::<_, i32>("SELECT 1")
                    .fetch_one(pool)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .await;
        self.observe(outcome).await
    }

    /// Race a ping against the configured timeout. A slow ping is a failure
    /// regardless of whether it would eventually succeed.
    async fn timed_ping<F>(&self, ping: F) -> Result<u64, String>
    where
        F: Future<Output = Result<(), String>>,
    {
        let started = tokio::time::Instant::now();
        match tokio::time::timeout(self.config.ping_timeout, ping).await {
            Ok(Ok(())) => Ok(started.elapsed().as_millis() as u64),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(format!(
                "Ping exceeded {}ms timeout",
                self.config.ping_timeout.as_millis()
            )),
        }
    }

    /// Fold one check outcome into the status and fire callbacks on
    /// threshold transitions.
    async fn observe(&self, outcome: Result<u64, String>) -> DatabaseStatus {
        let mut status = self.status.write().await;
        status.last_checked = Some(Utc::now());

        match outcome {
            Ok(latency_ms) => {
                let was_alerting = self.take_alerting();
                status.healthy = true;
                status.latency_ms = Some(latency_ms);
                status.last_error = None;
                status.consecutive_failures = 0;

                if was_alerting {
                    info!(latency_ms, "Database connectivity recovered");
                    self.fire(&self.on_recovery, &status);
                } else {
                    debug!(latency_ms, "Database ping ok");
                }
            }
            Err(message) => {
                status.healthy = false;
                status.latency_ms = None;
                status.last_error = Some(message.clone());
                status.consecutive_failures += 1;

                if status.consecutive_failures == self.config.failure_threshold {
                    error!(
                        failures = status.consecutive_failures,
                        error = %message,
                        "Database failure threshold reached"
                    );
                    if let Ok(mut alerting) = self.alerting.lock() {
                        *alerting = true;
                    }
                    self.fire(&self.on_failure, &status);
                } else {
                    warn!(failures = status.consecutive_failures, error = %message, "Database ping failed");
                }
            }
        }

        status.clone()
    }

    fn take_alerting(&self) -> bool {
        match self.alerting.lock() {
            Ok(mut alerting) => std::mem::replace(&mut *alerting, false),
            Err(_) => false,
        }
    }

    fn fire(&self, slot: &Mutex<Option<HealthCallback>>, status: &DatabaseStatus) {
        if let Ok(slot) = slot.lock()
            && let Some(callback) = slot.as_ref()
        {
            callback(status);
        }
    }

    /// Ping on an interval until cancelled.
    pub async fn run(&self, pool: PgPool, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_now(&pool).await;
                }
                _ = cancel.cancelled() => {
                    debug!("Database health monitor stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn monitor(threshold: u32) -> DbHealthMonitor {
        DbHealthMonitor::new(HealthConfig {
            check_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_millis(50),
            failure_threshold: threshold,
        })
    }

    #[test_log::test(tokio::test)]
    async fn slow_ping_counts_as_failure() {
        let monitor = monitor(3);

        let outcome = monitor
            .timed_ping(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        let message = outcome.unwrap_err();
        assert!(message.contains("50ms"));

        let status = monitor.observe(Err(message)).await;
        assert!(!status.healthy);
        assert_eq!(status.consecutive_failures, 1);
    }

    #[test_log::test(tokio::test)]
    async fn fast_ping_records_latency() {
        let monitor = monitor(3);
        let outcome = monitor.timed_ping(async { Ok(()) }).await;
        let status = monitor.observe(outcome).await;

        assert!(status.healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.latency_ms.is_some());
        assert!(status.last_checked.is_some());
    }

    #[test_log::test(tokio::test)]
    async fn failure_callback_fires_exactly_once_at_threshold() {
        let monitor = monitor(3);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        monitor.set_on_failure(move |status| {
            assert_eq!(status.consecutive_failures, 3);
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..2 {
            monitor.observe(Err("connection refused".to_string())).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        monitor.observe(Err("connection refused".to_string())).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Staying down does not re-fire.
        for _ in 0..3 {
            monitor.observe(Err("connection refused".to_string())).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test_log::test(tokio::test)]
    async fn recovery_callback_fires_once_after_an_outage() {
        let monitor = monitor(2);
        let recovered = Arc::new(AtomicUsize::new(0));
        let recovered_clone = recovered.clone();
        monitor.set_on_recovery(move |status| {
            assert!(status.healthy);
            recovered_clone.fetch_add(1, Ordering::SeqCst);
        });

        // A success before any outage is not a recovery.
        monitor.observe(Ok(2)).await;
        assert_eq!(recovered.load(Ordering::SeqCst), 0);

        monitor.observe(Err("down".to_string())).await;
        monitor.observe(Err("down".to_string())).await;

        monitor.observe(Ok(3)).await;
        assert_eq!(recovered.load(Ordering::SeqCst), 1);

        monitor.observe(Ok(3)).await;
        assert_eq!(recovered.load(Ordering::SeqCst), 1);
    }

    #[test_log::test(tokio::test)]
    async fn failures_below_threshold_do_not_alert() {
        let monitor = monitor(5);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        monitor.set_on_failure(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..4 {
            monitor.observe(Err("down".to_string())).await;
        }
        let status = monitor.status().await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!status.healthy);
        assert_eq!(status.consecutive_failures, 4);
    }

    #[test_log::test(tokio::test)]
    async fn outage_then_recovery_resets_the_counter() {
        let monitor = monitor(2);

        monitor.observe(Err("down".to_string())).await;
        monitor.observe(Err("down".to_string())).await;
        let status = monitor.observe(Ok(1)).await;

        assert!(status.healthy);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_none());
    }
}
