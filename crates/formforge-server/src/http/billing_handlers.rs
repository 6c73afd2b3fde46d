use crate::auth;
use crate::external::billing::{parse_webhook_event, verify_webhook_signature, WebhookEvent};
use crate::http::handlers::{
    decode_json_body, finish, propagated_request_id, store_error_to_api,
};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use formforge_api::dto::{CheckoutRequestDto, CheckoutResponseDto};
use formforge_api::{ApiError, ApiErrorCode};
use formforge_core::time;
use serde_json::json;
use std::time::Instant;

pub(crate) const WEBHOOK_SIGNATURE_HEADER: &str = "x-billing-signature";

pub(crate) async fn checkout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = checkout(&state, &headers, &body).await;
    finish(&state, "/v1/billing/checkout", started, &request_id, result).await
}

async fn checkout(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let payload: CheckoutRequestDto = if body.is_empty() {
        CheckoutRequestDto { price_id: None }
    } else {
        decode_json_body(body)?
    };
    let price_id = payload
        .price_id
        .unwrap_or_else(|| state.api.billing_price_id.clone());

    let customer_id = match &authed.user.billing_customer_id {
        Some(existing) => existing.clone(),
        None => {
            let created = state.billing.create_customer(&authed.user).await.map_err(|e| {
                ApiError::new(
                    ApiErrorCode::UpstreamUnavailable,
                    "billing provider rejected customer creation",
                    json!({"message": e.to_string()}),
                    "req-unknown",
                )
            })?;
            let mut store = state.store.lock().await;
            store
                .attach_billing_customer(&authed.user.id, &created)
                .map_err(store_error_to_api)?;
            created
        }
    };

    let session = state
        .billing
        .create_checkout_session(&customer_id, &price_id)
        .await
        .map_err(|e| {
            ApiError::new(
                ApiErrorCode::UpstreamUnavailable,
                "billing provider rejected checkout session",
                json!({"message": e.to_string()}),
                "req-unknown",
            )
        })?;
    tracing::info!(user = %authed.user.id.as_str(), "checkout session created");
    Ok(Json(CheckoutResponseDto {
        checkout_url: session.url,
        checkout_session_id: session.id,
    })
    .into_response())
}

pub(crate) async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = webhook(&state, &headers, &body).await;
    finish(&state, "/v1/billing/webhook", started, &request_id, result).await
}

async fn webhook(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    let Some(secret) = state.api.webhook_secret.as_deref() else {
        return Err(ApiError::internal("webhook secret is not configured"));
    };
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                ApiErrorCode::InvalidSignature,
                "missing signature header",
                json!({"header": WEBHOOK_SIGNATURE_HEADER}),
                "req-unknown",
            )
        })?;
    verify_webhook_signature(
        body,
        signature,
        secret.as_bytes(),
        time::unix_seconds(),
        state.api.webhook_max_skew_secs,
    )
    .map_err(|e| {
        ApiError::new(
            ApiErrorCode::InvalidSignature,
            "webhook signature verification failed",
            json!({"message": e.to_string()}),
            "req-unknown",
        )
    })?;

    let event = parse_webhook_event(body)
        .map_err(|e| ApiError::invalid_payload(e.to_string()))?;
    match event {
        WebhookEvent::SubscriptionActivated { customer } => {
            let mut store = state.store.lock().await;
            let changed = store
                .set_subscribed_by_customer(&customer, true)
                .map_err(store_error_to_api)?;
            tracing::info!(%customer, changed, "subscription activated");
        }
        WebhookEvent::SubscriptionCanceled { customer } => {
            let mut store = state.store.lock().await;
            let changed = store
                .set_subscribed_by_customer(&customer, false)
                .map_err(store_error_to_api)?;
            tracing::info!(%customer, changed, "subscription canceled");
        }
        WebhookEvent::Ignored { event_type } => {
            tracing::debug!(%event_type, "webhook event ignored");
        }
    }
    Ok(Json(json!({"received": true})).into_response())
}
