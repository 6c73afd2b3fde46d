// SPDX-License-Identifier: Apache-2.0

use crate::AppState;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use formforge_api::ApiError;
use formforge_core::{canonical, sha256_hex, time};
use formforge_model::User;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::Ordering;

pub mod password;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenPayload {
    session: i64,
    expires: i64,
}

#[derive(Debug)]
pub struct TokenError(pub String);

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for TokenError {}

fn sign(payload_part: &str, secret: &[u8]) -> Result<String, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| TokenError(e.to_string()))?;
    mac.update(payload_part.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

pub(crate) fn issue_token(
    secret: &[u8],
    session_id: i64,
    expires_at: i64,
) -> Result<String, TokenError> {
    let payload = TokenPayload {
        session: session_id,
        expires: expires_at,
    };
    let payload_part =
        canonical::encode_token_payload(&payload).map_err(|e| TokenError(e.to_string()))?;
    let sig_part = sign(&payload_part, secret)?;
    Ok(format!("{payload_part}.{sig_part}"))
}

fn decode_token(token: &str, secret: &[u8]) -> Result<TokenPayload, TokenError> {
    let (payload_part, sig_part) = token
        .split_once('.')
        .ok_or_else(|| TokenError("invalid token format".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| TokenError(e.to_string()))?;
    mac.update(payload_part.as_bytes());
    let expected = URL_SAFE_NO_PAD
        .decode(sig_part)
        .map_err(|e| TokenError(e.to_string()))?;
    mac.verify_slice(&expected)
        .map_err(|_| TokenError("token signature mismatch".to_string()))?;
    let value = canonical::decode_token_payload(payload_part).map_err(TokenError)?;
    serde_json::from_value(value).map_err(|e| TokenError(e.to_string()))
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get("authorization")?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").or_else(|| raw.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Pseudorandom per-registration salt. Salts only need uniqueness, so a hash
/// over the email, the clock, and a process counter is sufficient.
pub(crate) fn fresh_salt(state: &AppState, email: &str) -> [u8; 16] {
    let counter = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(time::unix_millis().to_be_bytes());
    hasher.update(counter.to_be_bytes());
    let digest = hasher.finalize();
    let mut salt = [0_u8; 16];
    salt.copy_from_slice(&digest[..16]);
    salt
}

pub(crate) struct Authenticated {
    pub user: User,
    pub session_id: i64,
}

/// Resolves the bearer token to a live session and its user. Fails closed:
/// any malformed, forged, expired, or revoked token yields `unauthorized`.
pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Authenticated, ApiError> {
    let token = bearer_token(headers).ok_or_else(ApiError::unauthorized)?;
    let payload = decode_token(token, state.api.session_secret.as_bytes())
        .map_err(|_| ApiError::unauthorized())?;
    let now = time::unix_seconds();
    if payload.expires <= now {
        return Err(ApiError::unauthorized());
    }

    let token_hash = sha256_hex(token.as_bytes());
    let store = state.store.lock().await;
    let session = store
        .find_session(payload.session, now)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(ApiError::unauthorized)?;
    if !formforge_core::ct_eq(session.token_hash.as_bytes(), token_hash.as_bytes()) {
        return Err(ApiError::unauthorized());
    }
    let user = store
        .find_user_by_id(&session.user_id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(ApiError::unauthorized)?;
    Ok(Authenticated {
        user,
        session_id: session.id,
    })
}

/// Like `authenticate`, but absent credentials are fine; forged or expired
/// tokens still fail so a bad token never downgrades to anonymous.
pub(crate) async fn authenticate_optional(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Authenticated>, ApiError> {
    if bearer_token(headers).is_none() {
        return Ok(None);
    }
    authenticate(state, headers).await.map(Some)
}
