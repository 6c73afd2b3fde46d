// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 30.0,
            refill_per_sec: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub max_body_bytes: usize,
    pub session_ttl: Duration,
    pub session_secret: String,
    pub password_iterations: u32,
    pub max_free_forms: usize,
    pub rate_limit_per_ip: RateLimitConfig,
    pub webhook_secret: Option<String>,
    pub webhook_max_skew_secs: u64,
    pub billing_base_url: String,
    pub billing_secret_key: Option<String>,
    pub billing_price_id: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub assistant_base_url: String,
    pub assistant_api_key: Option<String>,
    pub assistant_model: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 256 * 1024,
            session_ttl: Duration::from_secs(7 * 24 * 3600),
            session_secret: "dev-only-secret".to_string(),
            password_iterations: 100_000,
            max_free_forms: 3,
            rate_limit_per_ip: RateLimitConfig::default(),
            webhook_secret: None,
            webhook_max_skew_secs: 300,
            billing_base_url: "https://api.stripe.com".to_string(),
            billing_secret_key: None,
            billing_price_id: "price_default".to_string(),
            checkout_success_url: "http://localhost:3000/payment/success".to_string(),
            checkout_cancel_url: "http://localhost:3000/".to_string(),
            assistant_base_url: "https://generativelanguage.googleapis.com".to_string(),
            assistant_api_key: None,
            assistant_model: "gemini-2.0-flash".to_string(),
        }
    }
}