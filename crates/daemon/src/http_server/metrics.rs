//! Request counters recorded by a middleware around every route

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::ServiceState;

#[derive(Debug)]
pub struct RequestMetrics {
    requests: AtomicU64,
    total_response_micros: AtomicU64,
    started: Instant,
}

impl Default for RequestMetrics {
    fn default() -> Self {
        Self {
            requests: AtomicU64::new(0),
            total_response_micros: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
}

impl RequestMetrics {
    pub fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_micros
            .fetch_add(micros, Ordering::Relaxed);
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Mean time spent producing a response, 0 before the first request.
    pub fn average_response_micros(&self) -> f64 {
        let requests = self.requests();
        if requests == 0 {
            return 0.0;
        }
        self.total_response_micros.load(Ordering::Relaxed) as f64 / requests as f64
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn requests_per_second(&self) -> f64 {
        let secs = self.uptime().as_secs_f64();
        if secs > 0.0 {
            self.requests() as f64 / secs
        } else {
            0.0
        }
    }
}

pub async fn track(State(state): State<ServiceState>, request: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;
    state.metrics().record(started.elapsed());
    response
}
