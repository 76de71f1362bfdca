//! HTTP handlers for payment provider webhooks.
//!
//! One route per provider channel. The handlers only transport: they
//! capture the raw request material, hand it to the reconciliation
//! orchestrator with the matching adapter, and forward the adapter's
//! response verbatim (status and body are part of each provider's
//! protocol).

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::adapters::providers::{ClickAdapter, PaymeAdapter, StarsAdapter};
use crate::application::ReconcileWebhookHandler;
use crate::domain::billing::ProviderResponse;
use crate::ports::RawWebhook;

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub reconciler: Arc<ReconcileWebhookHandler>,
    pub stars: Arc<StarsAdapter>,
    pub payme: Arc<PaymeAdapter>,
    pub click: Arc<ClickAdapter>,
}

/// Create the webhook router.
///
/// # Routes
///
/// - `POST /webhooks/stars` - Telegram Stars notifications
/// - `POST /webhooks/payme` - Payme JSON-RPC merchant endpoint
/// - `GET /webhooks/click/prepare` - Click prepare leg
/// - `GET /webhooks/click/complete` - Click complete leg
pub fn webhook_router() -> Router<WebhookAppState> {
    Router::new()
        .route("/webhooks/stars", post(handle_stars))
        .route("/webhooks/payme", post(handle_payme))
        .route("/webhooks/click/prepare", get(handle_click))
        .route("/webhooks/click/complete", get(handle_click))
}

fn to_response(provider_response: ProviderResponse) -> Response {
    let status = StatusCode::from_u16(provider_response.status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(provider_response.body)).into_response()
}

async fn handle_stars(State(state): State<WebhookAppState>, body: Bytes) -> Response {
    let raw = RawWebhook::from_body(body.to_vec());
    to_response(state.reconciler.handle(state.stars.as_ref(), &raw).await)
}

async fn handle_payme(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut raw = RawWebhook::from_body(body.to_vec());
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        raw = raw.with_auth(auth);
    }
    to_response(state.reconciler.handle(state.payme.as_ref(), &raw).await)
}

async fn handle_click(
    State(state): State<WebhookAppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let raw = RawWebhook::from_query(params);
    to_response(state.reconciler.handle(state.click.as_ref(), &raw).await)
}
