//! Probe endpoints for the Door Controller.
//!
//! | Path | 200 when | 503 when |
//! |------|----------|----------|
//! | `/health` | the process is up | never, while the server answers |
//! | `/ready` | the door line is being answered | before the modem is initialized, and after the dispatch loop stops |
//!
//! Readiness is owned by `DoorService::run`: it is raised when the loop
//! starts taking rings and lowered when the loop returns, whatever the reason.
//! A controller stuck waiting for a modem acknowledgement is still ready; the
//! busy state shows in `dc_rings_total{outcome="dropped"}` instead.
//!
//! `/metrics` is merged in by `main` from the Prometheus handle.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flags behind the probe endpoints.
#[derive(Debug)]
pub struct HealthState {
    live: AtomicBool,
    /// True while the dispatch loop is answering rings.
    answering: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Live, not yet answering.
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            answering: AtomicBool::new(false),
        }
    }

    /// The dispatch loop started taking rings.
    pub fn set_ready(&self) {
        self.answering.store(true, Ordering::SeqCst);
    }

    /// The dispatch loop stopped.
    pub fn set_not_ready(&self) {
        self.answering.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.answering.load(Ordering::SeqCst)
    }
}

/// Router serving `/health` and `/ready`.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route(
            "/health",
            get(|State(state): State<Arc<HealthState>>| async move { probe_status(state.is_live()) }),
        )
        .route(
            "/ready",
            get(|State(state): State<Arc<HealthState>>| async move { probe_status(state.is_ready()) }),
        )
        .with_state(health_state)
}

fn probe_status(up: bool) -> StatusCode {
    if up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");
        app.oneshot(request)
            .await
            .expect("Failed to execute request")
            .status()
    }

    #[test]
    fn test_health_state_transitions() {
        let state = HealthState::new();
        assert!(state.is_live());
        assert!(!state.is_ready(), "not answering before the loop starts");

        state.set_ready();
        assert!(state.is_ready());

        state.set_not_ready();
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn test_liveness_endpoint() {
        let app = health_router(Arc::new(HealthState::new()));
        assert_eq!(status_of(app, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_endpoint_follows_state() {
        let state = Arc::new(HealthState::new());

        let app = health_router(Arc::clone(&state));
        assert_eq!(
            status_of(app, "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.set_ready();
        let app = health_router(Arc::clone(&state));
        assert_eq!(status_of(app, "/ready").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let app = health_router(Arc::new(HealthState::new()));
        assert_eq!(status_of(app, "/unknown").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_readiness_drops_when_loop_stops() {
        let state = Arc::new(HealthState::new());
        state.set_ready();
        state.set_not_ready();

        let app = health_router(Arc::clone(&state));
        assert_eq!(
            status_of(app, "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        let app = health_router(state);
        assert_eq!(status_of(app, "/health").await, StatusCode::OK);
    }
}
