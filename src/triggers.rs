//! Trigger surfaces: the HTTP route and the cron ticker.
//!
//! Both run cycles through one shared `run_gate`, so at most one digest
//! run is active per process no matter which surface fired.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::digest::DigestOrchestrator;

/// Shared state for the digest trigger routes.
#[derive(Clone)]
pub struct TriggerState {
    pub orchestrator: Arc<DigestOrchestrator>,
    /// Serializes runs across trigger surfaces.
    pub run_gate: Arc<tokio::sync::Mutex<()>>,
}

impl TriggerState {
    pub fn new(orchestrator: Arc<DigestOrchestrator>) -> Self {
        Self {
            orchestrator,
            run_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

/// GET /cron/digest
///
/// Runs one digest cycle and returns its summary. Refuses with 409
/// while another run is active; reports 500 when a run aborts.
async fn trigger_digest(State(state): State<TriggerState>) -> impl IntoResponse {
    let started = std::time::Instant::now();

    let Ok(_guard) = state.run_gate.try_lock() else {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "success": false,
                "error": "A digest run is already in progress",
            })),
        )
            .into_response();
    };

    match state.orchestrator.run_cycle().await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            error!(error = %e, "Digest run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": e.to_string(),
                    "executionTime": started.elapsed().as_millis() as u64,
                })),
            )
                .into_response()
        }
    }
}

/// GET /healthz
async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Build the digest trigger routes.
pub fn trigger_routes(state: TriggerState) -> Router {
    Router::new()
        .route("/cron/digest", get(trigger_digest))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Parse a cron expression and compute the next fire time from now.
pub fn next_cron_fire(schedule: &str) -> Result<Option<DateTime<Utc>>, String> {
    let cron_schedule =
        cron::Schedule::from_str(schedule).map_err(|e| format!("invalid cron: {e}"))?;
    Ok(cron_schedule.upcoming(Utc).next())
}

/// Spawn a long-running ticker that fires digest runs on a cron
/// schedule. Fires are skipped with a warning while a run is active.
pub fn spawn_cron_ticker(state: TriggerState, schedule: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let next = match next_cron_fire(&schedule) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    warn!(schedule = %schedule, "Cron schedule has no upcoming fire times");
                    return;
                }
                Err(e) => {
                    error!(schedule = %schedule, error = %e, "Cron ticker stopped");
                    return;
                }
            };

            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            info!(next_fire = %next, "Next scheduled digest run");
            tokio::time::sleep(wait).await;

            match state.run_gate.try_lock() {
                Ok(_guard) => {
                    if let Err(e) = state.orchestrator.run_cycle().await {
                        error!(error = %e, "Scheduled digest run failed");
                    }
                }
                Err(_) => {
                    warn!("Skipping scheduled digest run: a run is already in progress");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::DigestConfig;
    use crate::digest::DigestOrchestrator;
    use crate::error::{EmailError, SearchError};
    use crate::fetch::{ArticleFetcher, SearchProvider, SearchResult};
    use crate::mailer::{EmailTransport, SendReceipt};
    use crate::render::RenderedDigest;
    use crate::store::LibsqlStorage;

    struct NullProvider;

    #[async_trait::async_trait]
    impl SearchProvider for NullProvider {
        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
        ) -> Result<Vec<SearchResult>, SearchError> {
            Ok(Vec::new())
        }
    }

    struct NullMailer;

    #[async_trait::async_trait]
    impl EmailTransport for NullMailer {
        async fn send_digest(
            &self,
            _to: &str,
            _digest: &RenderedDigest,
        ) -> Result<SendReceipt, EmailError> {
            Ok(SendReceipt {
                message_id: "m".to_string(),
            })
        }
    }

    async fn test_state() -> TriggerState {
        let store = Arc::new(LibsqlStorage::new_memory().await.unwrap());
        let orchestrator = DigestOrchestrator::new(
            DigestConfig::default(),
            store,
            ArticleFetcher::new(Arc::new(NullProvider)),
            Arc::new(NullMailer),
        );
        TriggerState::new(Arc::new(orchestrator))
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let app = trigger_routes(test_state().await);
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn trigger_returns_run_summary() {
        let app = trigger_routes(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cron/digest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["dueSubscribers"], 0);
        assert_eq!(body["abortedEarly"], false);
    }

    #[tokio::test]
    async fn trigger_refuses_while_run_active() {
        let state = test_state().await;
        let _held = state.run_gate.clone().try_lock_owned().unwrap();

        let app = trigger_routes(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cron/digest")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
    }

    #[test]
    fn next_cron_fire_valid() {
        let next = next_cron_fire("* * * * * *").unwrap();
        assert!(next.is_some());
    }

    #[test]
    fn next_cron_fire_invalid() {
        assert!(next_cron_fire("not a cron").is_err());
    }
}
