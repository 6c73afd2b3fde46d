use crate::auth;
use crate::external::assistant::{build_prompt, parse_generated_form};
use crate::http::form_handlers::{check_form_quota, save_draft};
use crate::http::handlers::{decode_json_body, finish, propagated_request_id};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use formforge_api::convert::form_draft_from_request;
use formforge_api::dto::GenerateFormRequestDto;
use formforge_api::{ApiError, ApiErrorCode};
use serde_json::json;
use std::time::Instant;

pub(crate) async fn generate_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = generate_form(&state, &headers, &body).await;
    finish(&state, "/v1/forms/generate", started, &request_id, result).await
}

async fn generate_form(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let payload: GenerateFormRequestDto = decode_json_body(body)?;
    if payload.description.trim().is_empty() {
        return Err(ApiError::validation_failed(
            json!([{"field": "description", "reason": "must not be empty"}]),
        ));
    }
    check_form_quota(state, &authed.user).await?;

    let prompt = build_prompt(payload.description.trim());
    let text = state.generator.generate(&prompt).await.map_err(|e| {
        ApiError::new(
            ApiErrorCode::UpstreamUnavailable,
            "form generation failed",
            json!({"message": e.to_string()}),
            "req-unknown",
        )
    })?;
    let request = parse_generated_form(&text).map_err(|e| {
        ApiError::new(
            ApiErrorCode::UpstreamUnavailable,
            "generated form was unusable",
            json!({"message": e.to_string()}),
            "req-unknown",
        )
    })?;
    // Generated drafts walk through the same validation as hand-built ones.
    let draft = form_draft_from_request(&request)?;

    let form_id = save_draft(state, &authed.user, &draft).await?;
    tracing::info!(form = %form_id, user = %authed.user.id.as_str(), "form generated");
    Ok((StatusCode::CREATED, Json(json!({"id": form_id.get()}))).into_response())
}
