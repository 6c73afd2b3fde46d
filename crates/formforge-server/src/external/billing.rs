// SPDX-License-Identifier: Apache-2.0

use crate::config::ApiConfig;
use crate::external::ExternalError;
use async_trait::async_trait;
use formforge_core::ct_eq;
use formforge_model::User;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// Outbound surface of the billing provider. The HTTP client talks to the
/// real API; tests substitute a fake.
#[async_trait]
pub trait BillingApi: Send + Sync {
    async fn create_customer(&self, user: &User) -> Result<String, ExternalError>;
    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<CheckoutSession, ExternalError>;
}

pub struct HttpBillingClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    success_url: String,
    cancel_url: String,
}

impl HttpBillingClient {
    pub fn from_config(api: &ApiConfig) -> Result<Self, ExternalError> {
        let secret_key = api
            .billing_secret_key
            .clone()
            .ok_or_else(|| ExternalError("billing secret key is not configured".to_string()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: api.billing_base_url.trim_end_matches('/').to_string(),
            secret_key,
            success_url: api.checkout_success_url.clone(),
            cancel_url: api.checkout_cancel_url.clone(),
        })
    }
}

#[async_trait]
impl BillingApi for HttpBillingClient {
    async fn create_customer(&self, user: &User) -> Result<String, ExternalError> {
        let response = self
            .client
            .post(format!("{}/v1/customers", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&[("email", user.email.as_str()), ("name", user.name.as_str())])
            .send()
            .await
            .map_err(|e| ExternalError(format!("customer create request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ExternalError(format!(
                "customer create returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| ExternalError(format!("customer create decode failed: {e}")))?;
        body["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ExternalError("customer create response missing id".to_string()))
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
    ) -> Result<CheckoutSession, ExternalError> {
        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&[
                ("customer", customer_id),
                ("mode", "subscription"),
                ("line_items[0][price]", price_id),
                ("line_items[0][quantity]", "1"),
                ("success_url", self.success_url.as_str()),
                ("cancel_url", self.cancel_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ExternalError(format!("checkout request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(ExternalError(format!(
                "checkout returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| ExternalError(format!("checkout decode failed: {e}")))?;
        let id = body["id"]
            .as_str()
            .ok_or_else(|| ExternalError("checkout response missing id".to_string()))?;
        let url = body["url"]
            .as_str()
            .ok_or_else(|| ExternalError("checkout response missing url".to_string()))?;
        Ok(CheckoutSession {
            id: id.to_string(),
            url: url.to_string(),
        })
    }
}

/// Stand-in used when no billing credentials are configured; every call
/// reports the provider as unavailable instead of panicking at startup.
pub struct UnconfiguredBilling;

#[async_trait]
impl BillingApi for UnconfiguredBilling {
    async fn create_customer(&self, _user: &User) -> Result<String, ExternalError> {
        Err(ExternalError("billing is not configured".to_string()))
    }

    async fn create_checkout_session(
        &self,
        _customer_id: &str,
        _price_id: &str,
    ) -> Result<CheckoutSession, ExternalError> {
        Err(ExternalError("billing is not configured".to_string()))
    }
}

/// Verifies a webhook signature header of the form `t=<unix>,v1=<hex>` where
/// the hex part is HMAC-SHA256 over `"{t}.{body}"`. The timestamp must fall
/// within the configured skew window to stop replays.
pub fn verify_webhook_signature(
    body: &[u8],
    header: &str,
    secret: &[u8],
    now: i64,
    max_skew_secs: u64,
) -> Result<(), ExternalError> {
    let mut timestamp: Option<i64> = None;
    let mut signature: Option<String> = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", raw)) => timestamp = raw.parse::<i64>().ok(),
            Some(("v1", raw)) => signature = Some(raw.to_string()),
            _ => {}
        }
    }
    let timestamp =
        timestamp.ok_or_else(|| ExternalError("signature header missing timestamp".to_string()))?;
    let signature =
        signature.ok_or_else(|| ExternalError("signature header missing v1".to_string()))?;

    if (now - timestamp).unsigned_abs() > max_skew_secs {
        return Err(ExternalError("signature timestamp outside skew window".to_string()));
    }

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| ExternalError(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected = hex_encode(&mac.finalize().into_bytes());
    if !ct_eq(expected.as_bytes(), signature.as_bytes()) {
        return Err(ExternalError("signature mismatch".to_string()));
    }
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    SubscriptionActivated { customer: String },
    SubscriptionCanceled { customer: String },
    Ignored { event_type: String },
}

/// Maps provider events onto subscription flips. `checkout.session.completed`
/// only activates when the session actually carries a subscription, matching
/// one-off payments being a no-op.
pub fn parse_webhook_event(body: &[u8]) -> Result<WebhookEvent, ExternalError> {
    let event: Value = serde_json::from_slice(body)
        .map_err(|e| ExternalError(format!("webhook body decode failed: {e}")))?;
    let event_type = event["type"]
        .as_str()
        .ok_or_else(|| ExternalError("webhook event missing type".to_string()))?;
    let object = &event["data"]["object"];

    let customer = || -> Result<String, ExternalError> {
        object["customer"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ExternalError("webhook event missing customer".to_string()))
    };

    match event_type {
        "checkout.session.completed" => {
            if object["subscription"].is_null() {
                Ok(WebhookEvent::Ignored {
                    event_type: event_type.to_string(),
                })
            } else {
                Ok(WebhookEvent::SubscriptionActivated {
                    customer: customer()?,
                })
            }
        }
        "customer.subscription.created" => Ok(WebhookEvent::SubscriptionActivated {
            customer: customer()?,
        }),
        "customer.subscription.deleted" => Ok(WebhookEvent::SubscriptionCanceled {
            customer: customer()?,
        }),
        other => Ok(WebhookEvent::Ignored {
            event_type: other.to_string(),
        }),
    }
}
