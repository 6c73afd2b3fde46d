// SPDX-License-Identifier: Apache-2.0

use crate::{ApiError, ApiErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiErrorMapping {
    pub status_code: u16,
}

#[must_use]
pub fn map_error(error: &ApiError) -> ApiErrorMapping {
    let status_code = match error.code {
        ApiErrorCode::InvalidPayload
        | ApiErrorCode::ValidationFailed
        | ApiErrorCode::FormPublished
        | ApiErrorCode::InvalidSignature => 400,
        ApiErrorCode::Unauthorized => 401,
        ApiErrorCode::FreeTierExhausted => 402,
        ApiErrorCode::Forbidden => 403,
        ApiErrorCode::NotFound => 404,
        ApiErrorCode::Conflict => 409,
        ApiErrorCode::RateLimited => 429,
        ApiErrorCode::UpstreamUnavailable | ApiErrorCode::NotReady => 503,
        ApiErrorCode::Internal => 500,
    };
    ApiErrorMapping { status_code }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn free_tier_maps_to_payment_required() {
        let err = ApiError::free_tier_exhausted(3);
        assert_eq!(map_error(&err).status_code, 402);
    }

    #[test]
    fn unknown_resources_map_to_not_found() {
        let err = ApiError::not_found("form");
        assert_eq!(map_error(&err).status_code, 404);
    }

    #[test]
    fn signature_failures_are_client_errors() {
        let err = ApiError::new(
            ApiErrorCode::InvalidSignature,
            "webhook signature mismatch",
            json!({}),
            "req-unknown",
        );
        assert_eq!(map_error(&err).status_code, 400);
    }
}