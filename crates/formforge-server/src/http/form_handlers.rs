use crate::auth;
use crate::http::handlers::{
    decode_json_body, finish, propagated_request_id, store_error_to_api,
};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use formforge_api::convert::{
    form_detail_dto, form_draft_from_request, question_updates_from_request,
};
use formforge_api::dto::{FormSummaryDto, SaveFormRequestDto};
use formforge_api::ApiError;
use formforge_core::time;
use formforge_model::{FormDraft, FormId, User};
use serde_json::json;
use std::time::Instant;

fn parse_form_id(raw: i64) -> Result<FormId, ApiError> {
    FormId::new(raw).map_err(|_| ApiError::not_found("form"))
}

/// Free-tier gate shared by manual creation and AI generation.
pub(crate) async fn check_form_quota(state: &AppState, user: &User) -> Result<(), ApiError> {
    if user.subscribed {
        return Ok(());
    }
    let store = state.store.lock().await;
    let owned = store
        .count_forms_by_user(&user.id)
        .map_err(store_error_to_api)?;
    if owned as usize >= state.api.max_free_forms {
        return Err(ApiError::free_tier_exhausted(state.api.max_free_forms));
    }
    Ok(())
}

pub(crate) async fn save_draft(
    state: &AppState,
    owner: &User,
    draft: &FormDraft,
) -> Result<FormId, ApiError> {
    let mut store = state.store.lock().await;
    store
        .insert_form(&owner.id, draft, time::unix_seconds())
        .map_err(store_error_to_api)
}

pub(crate) async fn create_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = create_form(&state, &headers, &body).await;
    finish(&state, "/v1/forms", started, &request_id, result).await
}

async fn create_form(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let payload: SaveFormRequestDto = decode_json_body(body)?;
    let draft = form_draft_from_request(&payload)?;
    check_form_quota(state, &authed.user).await?;
    let form_id = save_draft(state, &authed.user, &draft).await?;
    tracing::info!(form = %form_id, user = %authed.user.id.as_str(), "form created");
    Ok((StatusCode::CREATED, Json(json!({"id": form_id.get()}))).into_response())
}

pub(crate) async fn list_forms_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = list_forms(&state, &headers).await;
    finish(&state, "/v1/forms", started, &request_id, result).await
}

async fn list_forms(state: &AppState, headers: &HeaderMap) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let store = state.store.lock().await;
    let forms = store
        .list_forms_by_user(&authed.user.id)
        .map_err(store_error_to_api)?;
    let summaries: Vec<FormSummaryDto> = forms
        .into_iter()
        .map(|(form, question_count, submission_count)| FormSummaryDto {
            id: form.id.get(),
            name: form.name,
            description: form.description,
            published: form.published,
            created_at: form.created_at,
            question_count,
            submission_count,
        })
        .collect();
    Ok(Json(json!({"forms": summaries})).into_response())
}

pub(crate) async fn get_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(form_id): Path<i64>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = get_form(&state, &headers, form_id).await;
    finish(&state, "/v1/forms/{form_id}", started, &request_id, result).await
}

async fn get_form(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: i64,
) -> Result<Response, ApiError> {
    let form_id = parse_form_id(raw_id)?;
    let caller = auth::authenticate_optional(state, headers).await?;

    let store = state.store.lock().await;
    let Some((form, questions)) = store
        .get_form_with_questions(form_id)
        .map_err(store_error_to_api)?
    else {
        return Err(ApiError::not_found("form"));
    };

    let is_owner = caller
        .as_ref()
        .map(|a| a.user.id == form.owner)
        .unwrap_or(false);
    // Drafts are visible to their owner only; published forms render for
    // anyone who holds the link.
    if !is_owner && !form.published {
        return Err(ApiError::not_found("form"));
    }
    Ok(Json(json!({"form": form_detail_dto(&form, &questions)})).into_response())
}

pub(crate) async fn update_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(form_id): Path<i64>,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = update_form(&state, &headers, form_id, &body).await;
    finish(&state, "/v1/forms/{form_id}", started, &request_id, result).await
}

async fn update_form(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: i64,
    body: &[u8],
) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let form_id = parse_form_id(raw_id)?;
    let payload: SaveFormRequestDto = decode_json_body(body)?;
    // Full structural validation first, then the id-preserving view.
    form_draft_from_request(&payload)?;
    let updates = question_updates_from_request(&payload)?;

    let mut store = state.store.lock().await;
    let Some(form) = store.get_form(form_id).map_err(store_error_to_api)? else {
        return Err(ApiError::not_found("form"));
    };
    if form.owner != authed.user.id {
        return Err(ApiError::forbidden());
    }
    if form.published {
        return Err(ApiError::form_published());
    }
    store
        .update_form(form_id, &payload.name, &payload.description, &updates)
        .map_err(store_error_to_api)?;
    tracing::info!(form = %form_id, "form updated");
    Ok(Json(json!({"success": true})).into_response())
}

pub(crate) async fn delete_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(form_id): Path<i64>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = delete_form(&state, &headers, form_id).await;
    finish(&state, "/v1/forms/{form_id}", started, &request_id, result).await
}

async fn delete_form(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: i64,
) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let form_id = parse_form_id(raw_id)?;

    let mut store = state.store.lock().await;
    let Some(form) = store.get_form(form_id).map_err(store_error_to_api)? else {
        return Err(ApiError::not_found("form"));
    };
    if form.owner != authed.user.id {
        return Err(ApiError::forbidden());
    }
    store.delete_form(form_id).map_err(store_error_to_api)?;
    tracing::info!(form = %form_id, "form deleted");
    Ok(Json(json!({"success": true, "id": form_id.get()})).into_response())
}

pub(crate) async fn publish_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(form_id): Path<i64>,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = publish_form(&state, &headers, form_id).await;
    finish(
        &state,
        "/v1/forms/{form_id}/publish",
        started,
        &request_id,
        result,
    )
    .await
}

async fn publish_form(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: i64,
) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let form_id = parse_form_id(raw_id)?;

    let mut store = state.store.lock().await;
    let Some(form) = store.get_form(form_id).map_err(store_error_to_api)? else {
        return Err(ApiError::not_found("form"));
    };
    if form.owner != authed.user.id {
        return Err(ApiError::forbidden());
    }
    store.publish_form(form_id).map_err(store_error_to_api)?;
    tracing::info!(form = %form_id, "form published");
    Ok(Json(json!({"success": true})).into_response())
}
