//! Per-client rate limiting.
//!
//! Each client IP owns a token bucket holding `max_requests` tokens that
//! refills completely over `window_ms`.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// A simple token bucket.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    capacity: f64,
    refill_per_sec: f64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let window = Duration::from_millis(config.window_ms.max(1));
        let capacity = config.max_requests.max(1) as f64;
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
            window,
        }
    }

    /// Take one token for `key`; false when the bucket is empty.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));
        bucket.try_acquire(self.capacity, self.refill_per_sec, now)
    }

    /// Drop buckets idle for a full window (they would be full again anyway).
    pub fn purge_idle(&self) -> usize {
        let before = self.buckets.len();
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_update) < self.window);
        before - self.buckets.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Middleware rejecting clients that exhausted their bucket with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if limiter.check(&key) {
        return next.run(request).await;
    }

    tracing::warn!(client = %key, "Rate limit exceeded");
    metrics::record_rate_limited("per_ip");
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "message": "Too many requests, please try again later." })),
    )
        .into_response()
}
