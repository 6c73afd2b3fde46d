use crate::auth::{self, password};
use crate::http::handlers::{
    client_ip, decode_json_body, finish, propagated_request_id, store_error_to_api,
};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use formforge_api::dto::{
    LoginRequestDto, RegisterRequestDto, SessionResponseDto, UpdateProfileRequestDto, UserDto,
};
use formforge_api::{ApiError, ApiErrorCode};
use formforge_core::{sha256_hex, time};
use formforge_model::{validate_email_address, User, UserId};
use serde_json::json;
use std::time::Instant;

pub(crate) fn user_dto(user: &User) -> UserDto {
    UserDto {
        id: user.id.as_str().to_string(),
        name: user.name.clone(),
        email: user.email.clone(),
        subscribed: user.subscribed,
        created_at: user.created_at,
    }
}

fn derive_user_id(state: &AppState, email: &str) -> Result<UserId, ApiError> {
    let salt = auth::fresh_salt(state, email);
    let raw = format!("u-{}", &sha256_hex(&salt)[..24]);
    UserId::parse(&raw).map_err(|e| ApiError::internal(e.to_string()))
}

pub(crate) async fn register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = register(&state, &headers, &body).await;
    finish(&state, "/v1/auth/register", started, &request_id, result).await
}

async fn register(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response, ApiError> {
    let ip = client_ip(headers);
    if !state.ip_limiter.allow(&ip, &state.api.rate_limit_per_ip).await {
        return Err(ApiError::new(
            ApiErrorCode::RateLimited,
            "too many requests",
            json!({}),
            "req-unknown",
        ));
    }

    let payload: RegisterRequestDto = decode_json_body(body)?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation_failed(
            json!([{"field": "name", "reason": "must not be empty"}]),
        ));
    }
    validate_email_address(&payload.email).map_err(|e| {
        ApiError::validation_failed(json!([{"field": "email", "reason": e.to_string()}]))
    })?;
    if payload.password.len() < 8 {
        return Err(ApiError::validation_failed(
            json!([{"field": "password", "reason": "must be at least 8 characters"}]),
        ));
    }

    let user_id = derive_user_id(state, &payload.email)?;
    let salt = auth::fresh_salt(state, &payload.email);
    let digest = password::hash_password(&payload.password, &salt, state.api.password_iterations)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let now = time::unix_seconds();

    let mut store = state.store.lock().await;
    store
        .create_user(&user_id, payload.name.trim(), &payload.email, &digest, now)
        .map_err(|e| match e.code {
            formforge_store::StoreErrorCode::Conflict => ApiError::new(
                ApiErrorCode::Conflict,
                "email is already registered",
                json!({}),
                "req-unknown",
            ),
            _ => store_error_to_api(e),
        })?;
    let user = store
        .find_user_by_id(&user_id)
        .map_err(store_error_to_api)?
        .ok_or_else(|| ApiError::internal("user vanished after insert"))?;

    tracing::info!(user = %user_id.as_str(), "user registered");
    Ok((StatusCode::CREATED, Json(json!({"user": user_dto(&user)}))).into_response())
}

pub(crate) async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = login(&state, &headers, &body).await;
    finish(&state, "/v1/auth/login", started, &request_id, result).await
}

async fn login(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response, ApiError> {
    let ip = client_ip(headers);
    if !state.ip_limiter.allow(&ip, &state.api.rate_limit_per_ip).await {
        return Err(ApiError::new(
            ApiErrorCode::RateLimited,
            "too many requests",
            json!({}),
            "req-unknown",
        ));
    }

    let payload: LoginRequestDto = decode_json_body(body)?;
    let now = time::unix_seconds();
    let expires_at = now + state.api.session_ttl.as_secs() as i64;

    let mut store = state.store.lock().await;
    let user = store
        .find_user_by_email(&payload.email)
        .map_err(store_error_to_api)?;
    // Run the verifier either way so unknown emails do not short-circuit.
    let verified = match &user {
        Some(user) => password::verify_password(&payload.password, &user.password_digest),
        None => {
            let _ = password::verify_password(&payload.password, "pbkdf2-sha256$1$AA$AA");
            false
        }
    };
    let Some(user) = user.filter(|_| verified) else {
        return Err(ApiError::new(
            ApiErrorCode::Unauthorized,
            "invalid email or password",
            json!({}),
            "req-unknown",
        ));
    };

    let session_id = store
        .insert_session(&user.id, "pending", expires_at)
        .map_err(store_error_to_api)?;
    let token = auth::issue_token(state.api.session_secret.as_bytes(), session_id, expires_at)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    store
        .set_session_token_hash(session_id, &sha256_hex(token.as_bytes()))
        .map_err(store_error_to_api)?;

    tracing::info!(user = %user.id.as_str(), "session issued");
    let response = SessionResponseDto {
        token,
        expires_at,
        user: user_dto(&user),
    };
    Ok(Json(response).into_response())
}

pub(crate) async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = logout(&state, &headers).await;
    finish(&state, "/v1/auth/logout", started, &request_id, result).await
}

async fn logout(state: &AppState, headers: &HeaderMap) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let mut store = state.store.lock().await;
    store
        .delete_session(authed.session_id)
        .map_err(store_error_to_api)?;
    Ok(Json(json!({"success": true})).into_response())
}

pub(crate) async fn me_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = me(&state, &headers).await;
    finish(&state, "/v1/me", started, &request_id, result).await
}

async fn me(state: &AppState, headers: &HeaderMap) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    Ok(Json(json!({"user": user_dto(&authed.user)})).into_response())
}

pub(crate) async fn update_me_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let request_id = propagated_request_id(&headers, &state);
    let result = update_me(&state, &headers, &body).await;
    finish(&state, "/v1/me", started, &request_id, result).await
}

async fn update_me(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, ApiError> {
    let authed = auth::authenticate(state, headers).await?;
    let payload: UpdateProfileRequestDto = decode_json_body(body)?;

    if let Some(name) = payload.name.as_deref() {
        if name.trim().is_empty() {
            return Err(ApiError::validation_failed(
                json!([{"field": "name", "reason": "must not be empty"}]),
            ));
        }
    }
    if let Some(email) = payload.email.as_deref() {
        validate_email_address(email).map_err(|e| {
            ApiError::validation_failed(json!([{"field": "email", "reason": e.to_string()}]))
        })?;
    }

    // Password rotation needs both halves and a matching current password.
    let new_digest = match (&payload.old_password, &payload.new_password) {
        (None, None) => None,
        (Some(old), Some(new)) => {
            if !password::verify_password(old, &authed.user.password_digest) {
                return Err(ApiError::validation_failed(
                    json!([{"field": "old_password", "reason": "does not match"}]),
                ));
            }
            if new.len() < 8 {
                return Err(ApiError::validation_failed(
                    json!([{"field": "new_password", "reason": "must be at least 8 characters"}]),
                ));
            }
            let salt = auth::fresh_salt(state, &authed.user.email);
            Some(
                password::hash_password(new, &salt, state.api.password_iterations)
                    .map_err(|e| ApiError::internal(e.to_string()))?,
            )
        }
        _ => {
            return Err(ApiError::validation_failed(
                json!([{"reason": "password rotation needs old_password and new_password"}]),
            ))
        }
    };

    let mut store = state.store.lock().await;
    store
        .update_user_profile(
            &authed.user.id,
            payload.name.as_deref().map(str::trim),
            payload.email.as_deref(),
            new_digest.as_deref(),
        )
        .map_err(|e| match e.code {
            formforge_store::StoreErrorCode::Conflict => ApiError::new(
                ApiErrorCode::Conflict,
                "email is already registered",
                json!({}),
                "req-unknown",
            ),
            _ => store_error_to_api(e),
        })?;
    let user = store
        .find_user_by_id(&authed.user.id)
        .map_err(store_error_to_api)?
        .ok_or_else(|| ApiError::internal("user vanished after update"))?;
    tracing::info!(user = %user.id.as_str(), "profile updated");
    Ok(Json(json!({"user": user_dto(&user)})).into_response())
}
