//! Collector HTTP server: receives session summaries from clients and logs
//! them into the local store.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ses_core::SessionSummary;
use ses_store::Store;

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Store>>,
}

pub async fn serve(store: Store, addr: SocketAddr) -> Result<()> {
    let app = router(store);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("collector listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

fn router(store: Store) -> Router {
    let state = AppState {
        store: Arc::new(Mutex::new(store)),
    };
    Router::new()
        .route("/", get(health))
        .route("/api/v1/engagement/upload", post(upload))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        return;
    }
    tracing::info!("shutting down");
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "up" }))
}

async fn upload(
    State(state): State<AppState>,
    Json(summary): Json<SessionSummary>,
) -> (StatusCode, Json<Value>) {
    let store = state.store.lock().await;
    match store.insert_session(&summary) {
        Ok(id) => {
            tracing::info!(
                "received session from {} ({:.1}% engaged)",
                summary.matric_id,
                summary.engaged_percentage
            );
            (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "message": "Data received",
                    "id": id.to_string(),
                })),
            )
        }
        Err(e) => {
            tracing::error!("failed to store session: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
        }
    }
}
