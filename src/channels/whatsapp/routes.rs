//! HTTP surface: the WhatsApp webhook and a health probe.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::bot::LeadBot;

pub const WEBHOOK_PATH: &str = "/webhooks/whatsapp";

/// Largest webhook body read. Anything bigger is acknowledged and ignored.
pub const MAX_WEBHOOK_BODY: usize = 4 * 1024 * 1024;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    pub bot: Arc<LeadBot>,
    /// Token expected in the subscription handshake. `None` rejects all.
    pub verify_token: Option<SecretString>,
}

/// Query parameters of the subscription handshake.
#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /webhooks/whatsapp
///
/// Echoes `hub.challenge` when the mode is `subscribe` and the token matches.
async fn verify(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let token_ok = match (&state.verify_token, params.verify_token.as_deref()) {
        (Some(expected), Some(given)) => {
            bool::from(expected.expose_secret().as_bytes().ct_eq(given.as_bytes()))
        }
        _ => false,
    };

    match (params.mode.as_deref(), params.challenge) {
        (Some("subscribe"), Some(challenge)) if token_ok => {
            info!("Webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            warn!(mode = ?params.mode, "Webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhooks/whatsapp
///
/// Always answers 200 so the platform does not redeliver; problems are
/// logged and reported as `ignored`.
async fn receive(State(state): State<WebhookState>, body: Body) -> impl IntoResponse {
    // Read the raw body ourselves so no extractor limit can turn it into a 413.
    let body = match axum::body::to_bytes(body, MAX_WEBHOOK_BODY).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, limit = MAX_WEBHOOK_BODY, "Ignoring unreadable webhook body");
            return ignored();
        }
    };

    let bot = Arc::clone(&state.bot);
    // Own task so a panic while handling stays contained.
    let result = tokio::spawn(async move { bot.handle_envelope(&body).await }).await;

    let status = match result {
        Ok(Ok(processed)) => {
            if processed > 0 {
                info!(processed, "Webhook delivery handled");
            }
            "ok"
        }
        Ok(Err(e)) => {
            debug!(error = %e, "Ignoring webhook delivery");
            "ignored"
        }
        Err(e) => {
            error!(error = %e, "Webhook handler task failed");
            "ignored"
        }
    };
    (StatusCode::OK, Json(serde_json::json!({ "status": status })))
}

fn ignored() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ignored" })))
}

/// GET /health
async fn health(State(state): State<WebhookState>) -> impl IntoResponse {
    let sessions = state.bot.sessions().len().await;
    Json(serde_json::json!({
        "status": "ok",
        "service": "lead-assist",
        "sessions": sessions,
    }))
}

/// Build the webhook and health routes.
pub fn webhook_routes(state: WebhookState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, get(verify).post(receive))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}
