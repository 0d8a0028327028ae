//! Request rate limiting.
//!
//! Counting is a fixed-window scheme behind the [`CounterStore`] trait, so
//! the in-memory store can be swapped for a shared backend without touching
//! the middleware. Two tiers run as axum middleware: a general per-client
//! tier over the whole API, and a stricter tier keyed on client and path
//! for credential endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, header::HeaderName},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::{AppState, config::RateLimitsConfig, errors::Error};

pub const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const HEADER_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Outcome of checking one request against a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// Seconds until the current window resets, rounded up.
    pub reset_secs: u64,
}

/// Storage backend for fixed-window counters.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the counter for `key` in its current window.
    ///
    /// Returns the count after the increment and the seconds left until the
    /// window resets. A key seen for the first time (or after its window
    /// elapsed) starts a fresh window at count 1.
    async fn incr(&self, key: &str, window: Duration) -> (u64, u64);
}

/// In-process counter store.
///
/// Windows are tracked per key and reset lazily on the next increment after
/// expiry, so idle keys cost nothing but stale entries linger until touched.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: DashMap<String, WindowSlot>,
}

#[derive(Debug, Clone, Copy)]
struct WindowSlot {
    started: Instant,
    count: u64,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str, window: Duration) -> (u64, u64) {
        let now = Instant::now();
        let mut slot = self.windows.entry(key.to_string()).or_insert(WindowSlot { started: now, count: 0 });

        if now.duration_since(slot.started) >= window {
            slot.started = now;
            slot.count = 0;
        }
        slot.count += 1;

        let elapsed = now.duration_since(slot.started);
        let remaining = window.saturating_sub(elapsed);
        (slot.count, remaining.as_secs_f64().ceil() as u64)
    }
}

/// A fixed-window limiter for one tier.
pub struct FixedWindowLimiter {
    store: Arc<dyn CounterStore>,
    limit: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(store: Arc<dyn CounterStore>, limit: u32, window: Duration) -> Self {
        Self { store, limit, window }
    }

    /// True when this tier is switched off (`max_requests: 0` in config).
    pub fn disabled(&self) -> bool {
        self.limit == 0
    }

    /// Count this request against `key` and decide whether it may proceed.
    pub async fn check(&self, key: &str) -> RateLimitDecision {
        // A zero limit disables the tier: everything passes, nothing counts.
        if self.disabled() {
            return RateLimitDecision {
                allowed: true,
                limit: 0,
                remaining: 0,
                reset_secs: 0,
            };
        }

        let (count, reset_secs) = self.store.incr(key, self.window).await;
        let allowed = count <= u64::from(self.limit);
        let remaining = u64::from(self.limit).saturating_sub(count) as u32;

        RateLimitDecision {
            allowed,
            limit: self.limit,
            remaining,
            reset_secs,
        }
    }
}

/// Container for all rate limiters, one per tier.
#[derive(Clone)]
pub struct Limiters {
    pub general: Arc<FixedWindowLimiter>,
    pub auth: Arc<FixedWindowLimiter>,
}

impl Limiters {
    /// Creates all limiters from configuration. Each tier gets its own
    /// counter store so tiers never share windows.
    pub fn new(config: &RateLimitsConfig) -> Self {
        Self {
            general: Arc::new(FixedWindowLimiter::new(
                Arc::new(MemoryCounterStore::new()),
                config.general.max_requests,
                config.general.window,
            )),
            auth: Arc::new(FixedWindowLimiter::new(
                Arc::new(MemoryCounterStore::new()),
                config.auth.max_requests,
                config.auth.window,
            )),
        }
    }
}

/// Best-effort client identity for limiter keys.
///
/// The first entry of `X-Forwarded-For` wins so limits follow the original
/// client through a reverse proxy. Falls back to the socket peer address.
fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for").and_then(|h| h.to_str().ok())
        && let Some(first) = forwarded.split(',').next()
        && !first.trim().is_empty()
    {
        return first.trim().to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert(HEADER_LIMIT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert(HEADER_REMAINING, value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.reset_secs.to_string()) {
        headers.insert(HEADER_RESET, value);
    }
}

async fn enforce(limiter: &FixedWindowLimiter, key: &str, request: Request, next: Next) -> Response {
    // Disabled tiers add no quota headers either.
    if limiter.disabled() {
        return next.run(request).await;
    }

    let decision = limiter.check(key).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        debug!(%key, limit = decision.limit, "Rate limit exceeded");
        Error::TooManyRequests {
            retry_after_secs: decision.reset_secs,
        }
        .into_response()
    };

    apply_headers(&mut response, &decision);
    response
}

/// General tier, keyed on the client only.
pub async fn general_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(&request);
    enforce(&state.limiters.general, &key, request, next).await
}

/// Credential tier, keyed on client and path so a burst against one auth
/// endpoint does not lock the client out of the others.
pub async fn auth_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = format!("{}:{}", client_key(&request), request.uri().path());
    enforce(&state.limiters.auth, &key, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window: Duration) -> FixedWindowLimiter {
        FixedWindowLimiter::new(Arc::new(MemoryCounterStore::new()), limit, window)
    }

    #[tokio::test]
    async fn allows_up_to_limit_and_rejects_the_next() {
        let limiter = limiter(3, Duration::from_secs(60));

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check("10.0.0.1").await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = limiter.check("10.0.0.1").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.reset_secs >= 1);
    }

    #[tokio::test]
    async fn first_request_after_window_reset_succeeds() {
        let limiter = limiter(1, Duration::from_millis(100));

        assert!(limiter.check("10.0.0.1").await.allowed);
        assert!(!limiter.check("10.0.0.1").await.allowed);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let decision = limiter.check("10.0.0.1").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn zero_limit_disables_the_tier() {
        let limiter = limiter(0, Duration::from_secs(60));
        assert!(limiter.disabled());

        // Every request passes, including well past where a limit of one
        // would have tripped.
        for _ in 0..10 {
            let decision = limiter.check("10.0.0.1").await;
            assert!(decision.allowed);
        }
    }

    #[tokio::test]
    async fn keys_are_counted_independently() {
        let limiter = limiter(1, Duration::from_secs(60));

        assert!(limiter.check("10.0.0.1").await.allowed);
        assert!(limiter.check("10.0.0.2").await.allowed);
        assert!(!limiter.check("10.0.0.1").await.allowed);
    }

    #[tokio::test]
    async fn tiers_do_not_share_counters() {
        let limiters = Limiters::new(&RateLimitsConfig::default());

        let general = limiters.general.check("10.0.0.1").await;
        let auth = limiters.auth.check("10.0.0.1").await;
        assert_eq!((general.limit, general.remaining), (60, 59));
        assert_eq!((auth.limit, auth.remaining), (5, 4));
    }

    #[test]
    fn forwarded_for_wins_over_peer_address() {
        let request = Request::builder()
            .uri("/api/customers")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.9");

        let mut request = Request::builder().uri("/api/customers").body(axum::body::Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("192.0.2.4:5150".parse().unwrap()));
        assert_eq!(client_key(&request), "192.0.2.4");
    }

    #[test]
    fn headers_reflect_the_decision() {
        let decision = RateLimitDecision {
            allowed: true,
            limit: 60,
            remaining: 41,
            reset_secs: 17,
        };
        let mut response = Response::new(axum::body::Body::empty());
        apply_headers(&mut response, &decision);

        assert_eq!(response.headers()[HEADER_LIMIT], "60");
        assert_eq!(response.headers()[HEADER_REMAINING], "41");
        assert_eq!(response.headers()[HEADER_RESET], "17");
    }
}
