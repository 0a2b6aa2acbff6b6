//! HTTP server for Alertmanager webhooks.

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::dispatch::AlertDispatcher;
use crate::types::WebhookPayload;

/// Build the HTTP router.
pub fn build_router(dispatcher: Arc<AlertDispatcher>) -> Router {
    Router::new()
        .route("/alerts", post(webhook_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

/// Serve until `shutdown` resolves.
pub async fn run_server(
    dispatcher: Arc<AlertDispatcher>,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(dispatcher);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Alert forwarder listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Body of every webhook response.
#[derive(Debug, Serialize)]
struct WebhookResponse {
    status: u16,
    message: String,
}

fn respond(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<WebhookResponse>) {
    (
        status,
        Json(WebhookResponse {
            status: status.as_u16(),
            message: message.into(),
        }),
    )
}

/// Alertmanager webhook handler. The body is decoded regardless of its
/// content type.
async fn webhook_handler(
    State(dispatcher): State<Arc<AlertDispatcher>>,
    body: Bytes,
) -> impl IntoResponse {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "JSON decode error");
            return respond(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    info!(
        alerts = payload.alerts.len(),
        status = %payload.status,
        receiver = %payload.receiver,
        "Received alert webhook"
    );

    let summary = dispatcher.handle_batch(payload.alerts).await;
    info!(
        heartbeats = summary.heartbeats,
        forwarded = summary.forwarded,
        "Processed alert webhook"
    );

    respond(StatusCode::OK, "success")
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "Ok!")
}
