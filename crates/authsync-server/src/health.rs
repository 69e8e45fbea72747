//! Health check handlers
//!
//! - /live - is the process running?
//! - /ready - has the controller queued its startup resync?

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Readiness flag shared with the operator loop
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Mark ready once `synced` reports `true`. Stays unready if the
    /// sender goes away first.
    pub async fn mark_ready_when(self, mut synced: watch::Receiver<bool>) {
        if synced.wait_for(|done| *done).await.is_ok() {
            self.mark_ready();
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SimpleHealthResponse {
    pub status: String,
}

pub fn router(readiness: Readiness) -> Router {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness_check))
        .with_state(readiness)
}

pub async fn liveness() -> (StatusCode, Json<SimpleHealthResponse>) {
    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: "alive".to_string(),
        }),
    )
}

pub async fn readiness_check(
    State(readiness): State<Readiness>,
) -> (StatusCode, Json<SimpleHealthResponse>) {
    if readiness.is_ready() {
        (
            StatusCode::OK,
            Json(SimpleHealthResponse {
                status: "ready".to_string(),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SimpleHealthResponse {
                status: "not ready: controller starting".to_string(),
            }),
        )
    }
}
