use crate::auth;
use crate::http::handlers::{
    client_ip, decode_json_body, finish, propagated_request_id, store_error_to_api,
};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use formforge_api::convert::answer_drafts_from_request;
use formforge_api::dto::{
    AnalyticsRequestDto, AnalyticsResponseDto, ResultsResponseDto, ResultsRowDto,
    SubmitRequestDto, SubmitResponseDto,
};
use formforge_api::{ApiError, ApiErrorCode};
use formforge_core::time;
use formforge_model::{validate_answers, FormId, QuestionId};
use serde_json::json;
use std::time::Instant;

fn parse_form_id(raw: i64) -> Result<FormId, ApiError> {
    FormId::new(raw).map_err(|_| ApiError::not_found("form"))
}

pub(crate) async fn submit_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(form_id): Path<i64>,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = submit_form(&state, &headers, form_id, &body).await;
    finish(
        &state,
        "/v1/forms/{form_id}/submissions",
        started,
        &request_id,
        result,
    )
    .await
}

async fn submit_form(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: i64,
    body: &[u8],
) -> Result<Response, ApiError> {
    let ip = client_ip(headers);
    if !state.ip_limiter.allow(&ip, &state.api.rate_limit_per_ip).await {
        return Err(ApiError::new(
            ApiErrorCode::RateLimited,
            "too many requests",
            json!({}),
            "req-unknown",
        ));
    }

    let form_id = parse_form_id(raw_id)?;
    let payload: SubmitRequestDto = decode_json_body(body)?;
    // A forged token is an error even though the endpoint is public.
    let caller = auth::authenticate_optional(state, headers).await?;
    let respondent = if payload.anonymous {
        None
    } else {
        caller.map(|a| a.user.id)
    };

    let answers = answer_drafts_from_request(&payload.answers)?;

    let mut store = state.store.lock().await;
    let Some((form, questions)) = store
        .get_form_with_questions(form_id)
        .map_err(store_error_to_api)?
    else {
        return Err(ApiError::not_found("form"));
    };
    if !form.published {
        return Err(ApiError::validation_failed(
            json!([{"reason": "form is not published"}]),
        ));
    }
    validate_answers(&questions, &answers)
        .map_err(|e| ApiError::validation_failed(json!([{"reason": e.to_string()}])))?;

    let submission_id = store
        .insert_submission(
            form_id,
            respondent.as_ref(),
            &answers,
            time::unix_seconds(),
        )
        .map_err(store_error_to_api)?;
    tracing::info!(form = %form_id, submission = %submission_id, "submission stored");
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponseDto {
            submission_id: submission_id.get(),
        }),
    )
        .into_response())
}

pub(crate) async fn results_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(form_id): Path<i64>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = results(&state, &headers, form_id).await;
    finish(
        &state,
        "/v1/forms/{form_id}/results",
        started,
        &request_id,
        result,
    )
    .await
}

async fn results(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: i64,
) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let form_id = parse_form_id(raw_id)?;

    let store = state.store.lock().await;
    let Some((form, questions, submissions)) = store
        .load_form_results(form_id)
        .map_err(store_error_to_api)?
    else {
        return Err(ApiError::not_found("form"));
    };
    // Unpublished forms have no results surface at all.
    if !form.published {
        return Err(ApiError::not_found("form"));
    }
    if form.owner != authed.user.id {
        return Err(ApiError::forbidden());
    }

    let table = formforge_query::build_results_table(&questions, &submissions);
    let response = ResultsResponseDto {
        form_id: form.id.get(),
        form_name: form.name,
        columns: table.columns,
        rows: table
            .rows
            .into_iter()
            .map(|row| ResultsRowDto {
                submission_id: row.submission_id,
                submitted_at: row.submitted_at,
                respondent: row.respondent,
                values: row.values,
            })
            .collect(),
    };
    Ok(Json(response).into_response())
}

pub(crate) async fn analytics_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(form_id): Path<i64>,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = analytics(&state, &headers, form_id, &body).await;
    finish(
        &state,
        "/v1/forms/{form_id}/analytics",
        started,
        &request_id,
        result,
    )
    .await
}

async fn analytics(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: i64,
    body: &[u8],
) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let form_id = parse_form_id(raw_id)?;
    let payload: AnalyticsRequestDto = decode_json_body(body)?;
    if payload.question_ids.is_empty() {
        return Err(ApiError::invalid_payload("question_ids must not be empty"));
    }
    let mut selected = Vec::with_capacity(payload.question_ids.len());
    for raw in payload.question_ids {
        selected.push(
            QuestionId::new(raw)
                .map_err(|e| ApiError::validation_failed(json!([{"reason": e.to_string()}])))?,
        );
    }

    let store = state.store.lock().await;
    let Some((form, questions, submissions)) = store
        .load_form_results(form_id)
        .map_err(store_error_to_api)?
    else {
        return Err(ApiError::not_found("form"));
    };
    if form.owner != authed.user.id {
        return Err(ApiError::forbidden());
    }

    let data = formforge_query::option_frequencies(&form, &questions, &submissions, &selected)
        .map_err(|e| ApiError::invalid_payload(e.to_string()))?;
    Ok(Json(AnalyticsResponseDto { data }).into_response())
}
