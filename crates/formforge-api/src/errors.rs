// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    InvalidPayload,
    ValidationFailed,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    FormPublished,
    FreeTierExhausted,
    InvalidSignature,
    RateLimited,
    UpstreamUnavailable,
    NotReady,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Value,
    pub request_id: String,
}

impl ApiError {
    #[must_use]
    pub fn new(
        code: ApiErrorCode,
        message: impl Into<String>,
        details: Value,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            request_id: request_id.into(),
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    #[must_use]
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::new(
            ApiErrorCode::InvalidPayload,
            "invalid request payload",
            json!({"reason": reason.into()}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn validation_failed(field_errors: Value) -> Self {
        Self::new(
            ApiErrorCode::ValidationFailed,
            "validation failed",
            json!({"field_errors": field_errors}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(
            ApiErrorCode::Unauthorized,
            "authentication required",
            json!({}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(
            ApiErrorCode::Forbidden,
            "you do not own this resource",
            json!({}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn not_found(what: &str) -> Self {
        Self::new(
            ApiErrorCode::NotFound,
            format!("{what} not found"),
            json!({"resource": what}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn form_published() -> Self {
        Self::new(
            ApiErrorCode::FormPublished,
            "published forms are immutable",
            json!({}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn free_tier_exhausted(max_free_forms: usize) -> Self {
        Self::new(
            ApiErrorCode::FreeTierExhausted,
            "free tier form limit reached; upgrade to create more forms",
            json!({"max_free_forms": max_free_forms}),
            "req-unknown",
        )
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            ApiErrorCode::Internal,
            "internal error",
            json!({"message": message.into()}),
            "req-unknown",
        )
    }
}

const _: fn() = || {
    fn assert_traits<T: Serialize + for<'de> Deserialize<'de>>() {}
    assert_traits::<ApiErrorCode>();
};