#![forbid(unsafe_code)]

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use formforge_store::Store;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use tokio::sync::Mutex;

pub mod auth;
pub mod config;
pub mod external;
pub mod http;
pub mod middleware;
mod rate_limiter;
pub mod telemetry;

pub use config::{ApiConfig, RateLimitConfig};
pub use external::assistant::{HttpTextGenerator, TextGenerator};
pub use external::billing::{BillingApi, HttpBillingClient};

use rate_limiter::RateLimiter;
use telemetry::RequestMetrics;

pub const CRATE_NAME: &str = "formforge-server";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<Store>>,
    pub api: Arc<ApiConfig>,
    pub ready: Arc<AtomicBool>,
    pub accepting_requests: Arc<AtomicBool>,
    pub(crate) metrics: Arc<RequestMetrics>,
    pub(crate) request_id_seed: Arc<AtomicU64>,
    pub(crate) ip_limiter: Arc<RateLimiter>,
    pub(crate) billing: Arc<dyn BillingApi>,
    pub(crate) generator: Arc<dyn TextGenerator>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Store,
        api: ApiConfig,
        billing: Arc<dyn BillingApi>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            api: Arc::new(api),
            ready: Arc::new(AtomicBool::new(true)),
            accepting_requests: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(RequestMetrics::default()),
            request_id_seed: Arc::new(AtomicU64::new(1)),
            ip_limiter: Arc::new(RateLimiter::default()),
            billing,
            generator,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_body = state.api.max_body_bytes;
    Router::new()
        .route("/healthz", get(http::handlers::healthz_handler))
        .route("/readyz", get(http::handlers::readyz_handler))
        .route("/metrics", get(http::handlers::metrics_handler))
        .route("/v1/version", get(http::handlers::version_handler))
        .route("/v1/auth/register", post(http::auth_handlers::register_handler))
        .route("/v1/auth/login", post(http::auth_handlers::login_handler))
        .route("/v1/auth/logout", post(http::auth_handlers::logout_handler))
        .route(
            "/v1/me",
            get(http::auth_handlers::me_handler).put(http::auth_handlers::update_me_handler),
        )
        .route(
            "/v1/forms",
            get(http::form_handlers::list_forms_handler)
                .post(http::form_handlers::create_form_handler),
        )
        .route("/v1/forms/generate", post(http::generate_handlers::generate_form_handler))
        .route(
            "/v1/forms/:form_id",
            get(http::form_handlers::get_form_handler)
                .put(http::form_handlers::update_form_handler)
                .delete(http::form_handlers::delete_form_handler),
        )
        .route(
            "/v1/forms/:form_id/publish",
            post(http::form_handlers::publish_form_handler),
        )
        .route(
            "/v1/forms/:form_id/submissions",
            post(http::submission_handlers::submit_form_handler),
        )
        .route(
            "/v1/forms/:form_id/results",
            get(http::submission_handlers::results_handler),
        )
        .route(
            "/v1/forms/:form_id/analytics",
            post(http::submission_handlers::analytics_handler),
        )
        .route(
            "/v1/billing/checkout",
            post(http::billing_handlers::checkout_handler),
        )
        .route(
            "/v1/billing/webhook",
            post(http::billing_handlers::webhook_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::request_tracing::request_tracing_middleware,
        ))
        .layer(DefaultBodyLimit::max(max_body))
        .with_state(state)
}

#[cfg(test)]
mod app_tests;
