use crate::external::billing::{BillingApi, CheckoutSession};
use crate::external::{assistant::TextGenerator, ExternalError};
use crate::{ApiConfig, AppState, RateLimitConfig};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use formforge_model::User;
use formforge_store::Store;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;

struct FakeBilling;

#[async_trait]
impl BillingApi for FakeBilling {
    async fn create_customer(&self, user: &User) -> Result<String, ExternalError> {
        Ok(format!("cus_{}", user.id.as_str()))
    }

    async fn create_checkout_session(
        &self,
        customer_id: &str,
        _price_id: &str,
    ) -> Result<CheckoutSession, ExternalError> {
        Ok(CheckoutSession {
            id: format!("cs_{customer_id}"),
            url: "https://billing.example/checkout/cs_test".to_string(),
        })
    }
}

struct FakeGenerator;

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, ExternalError> {
        Ok(r#"Here you go:
{"name":"Coffee survey","description":"About your coffee habits","questions":[
  {"text":"Do you drink coffee?","fieldType":"RadioGroup",
   "fieldOptions":[{"text":"Yes","value":"yes"},{"text":"No","value":"no"}]},
  {"text":"Favorite roast","fieldType":"Input","fieldOptions":[]}
]}"#
        .to_string())
    }
}

fn test_state() -> AppState {
    let store = Store::open_in_memory().expect("in-memory store");
    let api = ApiConfig {
        password_iterations: 500,
        session_secret: "test-secret".to_string(),
        webhook_secret: Some("whsec_test".to_string()),
        rate_limit_per_ip: RateLimitConfig {
            capacity: 10_000.0,
            refill_per_sec: 10_000.0,
        },
        ..ApiConfig::default()
    };
    AppState::new(store, api, Arc::new(FakeBilling), Arc::new(FakeGenerator))
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn json_bytes(value: &Value) -> Bytes {
    Bytes::from(serde_json::to_vec(value).expect("encode"))
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
    );
    headers
}

async fn register(state: &AppState, name: &str, email: &str) -> Response {
    crate::http::auth_handlers::register_handler(
        State(state.clone()),
        HeaderMap::new(),
        json_bytes(&json!({"name": name, "email": email, "password": "password123"})),
    )
    .await
}

async fn login(state: &AppState, email: &str, password: &str) -> Response {
    crate::http::auth_handlers::login_handler(
        State(state.clone()),
        HeaderMap::new(),
        json_bytes(&json!({"email": email, "password": password})),
    )
    .await
}

async fn register_and_login(state: &AppState, name: &str, email: &str) -> String {
    let response = register(state, name, email).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = login(state, email, "password123").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().expect("token").to_string()
}

fn survey_payload() -> Value {
    json!({
        "name": "Team survey",
        "description": "Quarterly pulse",
        "questions": [
            {
                "text": "How satisfied are you?",
                "field_type": "RadioGroup",
                "required": true,
                "options": [
                    {"text": "Happy", "value": "happy"},
                    {"text": "Neutral", "value": "neutral"}
                ]
            },
            {"text": "Anything else?", "field_type": "Textarea"}
        ]
    })
}

async fn create_form(state: &AppState, token: &str) -> i64 {
    let response = crate::http::form_handlers::create_form_handler(
        State(state.clone()),
        bearer(token),
        json_bytes(&survey_payload()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_i64().expect("form id")
}

async fn publish(state: &AppState, token: &str, form_id: i64) {
    let response = crate::http::form_handlers::publish_form_handler(
        State(state.clone()),
        bearer(token),
        Path(form_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

async fn get_form_detail(state: &AppState, headers: HeaderMap, form_id: i64) -> Response {
    crate::http::form_handlers::get_form_handler(State(state.clone()), headers, Path(form_id)).await
}

#[tokio::test]
async fn register_rejects_duplicate_emails() {
    let state = test_state();
    assert_eq!(
        register(&state, "Ada", "ada@example.com").await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        register(&state, "Eve", "ada@example.com").await.status(),
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn login_rejects_bad_credentials_and_me_requires_a_token() {
    let state = test_state();
    let _ = register(&state, "Ada", "ada@example.com").await;

    assert_eq!(
        login(&state, "ada@example.com", "wrong-password").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&state, "nobody@example.com", "password123").await.status(),
        StatusCode::UNAUTHORIZED
    );

    let response =
        crate::http::auth_handlers::me_handler(State(state.clone()), HeaderMap::new()).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = register_and_login(&state, "Bob", "bob@example.com").await;
    let response =
        crate::http::auth_handlers::me_handler(State(state.clone()), bearer(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "bob@example.com");
    assert!(body["user"].get("password_digest").is_none());
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;

    let response =
        crate::http::auth_handlers::logout_handler(State(state.clone()), bearer(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response =
        crate::http::auth_handlers::me_handler(State(state.clone()), bearer(&token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_updates_rotate_passwords_with_verification() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;

    let response = crate::http::auth_handlers::update_me_handler(
        State(state.clone()),
        bearer(&token),
        json_bytes(&json!({
            "old_password": "wrong-password",
            "new_password": "next-password1"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = crate::http::auth_handlers::update_me_handler(
        State(state.clone()),
        bearer(&token),
        json_bytes(&json!({
            "name": "Ada L.",
            "old_password": "password123",
            "new_password": "next-password1"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["name"], "Ada L.");

    assert_eq!(
        login(&state, "ada@example.com", "password123").await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&state, "ada@example.com", "next-password1").await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn draft_forms_are_owner_only_until_published() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;
    let form_id = create_form(&state, &token).await;

    // Anonymous readers see nothing while the form is a draft.
    let response = get_form_detail(&state, HeaderMap::new(), form_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_form_detail(&state, bearer(&token), form_id).await;
    assert_eq!(response.status(), StatusCode::OK);

    publish(&state, &token, form_id).await;
    let response = get_form_detail(&state, HeaderMap::new(), form_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["form"]["questions"].as_array().expect("questions").len(), 2);
}

#[tokio::test]
async fn published_forms_refuse_updates() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;
    let form_id = create_form(&state, &token).await;
    publish(&state, &token, form_id).await;

    let response = crate::http::form_handlers::update_form_handler(
        State(state.clone()),
        bearer(&token),
        Path(form_id),
        json_bytes(&survey_payload()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn foreign_owners_cannot_touch_a_form() {
    let state = test_state();
    let owner_token = register_and_login(&state, "Ada", "ada@example.com").await;
    let other_token = register_and_login(&state, "Eve", "eve@example.com").await;
    let form_id = create_form(&state, &owner_token).await;

    let response = crate::http::form_handlers::delete_form_handler(
        State(state.clone()),
        bearer(&other_token),
        Path(form_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = crate::http::form_handlers::publish_form_handler(
        State(state.clone()),
        bearer(&other_token),
        Path(form_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

async fn first_option_id(state: &AppState, token: &str, form_id: i64) -> (i64, i64, i64) {
    let response = get_form_detail(state, bearer(token), form_id).await;
    let body = body_json(response).await;
    let questions = body["form"]["questions"].as_array().expect("questions").clone();
    let q0 = questions[0]["id"].as_i64().expect("q0 id");
    let q1 = questions[1]["id"].as_i64().expect("q1 id");
    let option = questions[0]["options"][0]["id"].as_i64().expect("option id");
    (q0, q1, option)
}

#[tokio::test]
async fn submissions_validate_and_persist() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;
    let form_id = create_form(&state, &token).await;
    publish(&state, &token, form_id).await;
    let (q0, q1, option) = first_option_id(&state, &token, form_id).await;

    // Missing the required choice answer.
    let response = crate::http::submission_handlers::submit_form_handler(
        State(state.clone()),
        HeaderMap::new(),
        Path(form_id),
        json_bytes(&json!({"answers": [{"question_id": q1, "value": "fine"}]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = crate::http::submission_handlers::submit_form_handler(
        State(state.clone()),
        HeaderMap::new(),
        Path(form_id),
        json_bytes(&json!({"answers": [
            {"question_id": q0, "option_id": option},
            {"question_id": q1, "value": "all good"}
        ]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert!(body["submission_id"].as_i64().expect("submission id") > 0);
}

#[tokio::test]
async fn submissions_against_drafts_are_rejected() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;
    let form_id = create_form(&state, &token).await;

    let response = crate::http::submission_handlers::submit_form_handler(
        State(state.clone()),
        HeaderMap::new(),
        Path(form_id),
        json_bytes(&json!({"answers": []})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn results_and_analytics_are_owner_only_and_consistent() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;
    let other_token = register_and_login(&state, "Eve", "eve@example.com").await;
    let form_id = create_form(&state, &token).await;
    publish(&state, &token, form_id).await;
    let (q0, q1, option) = first_option_id(&state, &token, form_id).await;

    for _ in 0..2 {
        let response = crate::http::submission_handlers::submit_form_handler(
            State(state.clone()),
            HeaderMap::new(),
            Path(form_id),
            json_bytes(&json!({"answers": [
                {"question_id": q0, "option_id": option},
                {"question_id": q1, "value": "ok"}
            ]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = crate::http::submission_handlers::results_handler(
        State(state.clone()),
        bearer(&other_token),
        Path(form_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = crate::http::submission_handlers::results_handler(
        State(state.clone()),
        bearer(&token),
        Path(form_id),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["rows"].as_array().expect("rows").len(), 2);
    assert_eq!(body["rows"][0]["values"][0], "Happy");

    let response = crate::http::submission_handlers::analytics_handler(
        State(state.clone()),
        bearer(&token),
        Path(form_id),
        json_bytes(&json!({"question_ids": [q0, q1]})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["How satisfied are you?"]["Happy"], 2);
    assert_eq!(body["data"]["How satisfied are you?"]["Neutral"], 0);
    assert!(body["data"].get("Anything else?").is_none());
}

#[tokio::test]
async fn free_tier_limits_form_creation_until_subscribed() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;

    for _ in 0..state.api.max_free_forms {
        let _ = create_form(&state, &token).await;
    }
    let response = crate::http::form_handlers::create_form_handler(
        State(state.clone()),
        bearer(&token),
        json_bytes(&survey_payload()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    // Checkout attaches a billing customer, then the activation webhook
    // unlocks unlimited forms.
    let response = crate::http::billing_handlers::checkout_handler(
        State(state.clone()),
        bearer(&token),
        Bytes::new(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let session_id = body["checkout_session_id"].as_str().expect("session id");
    let customer = session_id.strip_prefix("cs_").expect("customer prefix");

    let event = json!({
        "type": "customer.subscription.created",
        "data": {"object": {"customer": customer}}
    });
    let response = send_webhook(&state, &event, "whsec_test").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = crate::http::form_handlers::create_form_handler(
        State(state.clone()),
        bearer(&token),
        json_bytes(&survey_payload()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn send_webhook(state: &AppState, event: &Value, secret: &str) -> Response {
    let body = serde_json::to_vec(event).expect("encode");
    let timestamp = formforge_core::time::unix_seconds();
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(&body);
    let signature: String = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();

    let mut headers = HeaderMap::new();
    headers.insert(
        crate::http::billing_handlers::WEBHOOK_SIGNATURE_HEADER,
        HeaderValue::from_str(&format!("t={timestamp},v1={signature}")).expect("header"),
    );
    crate::http::billing_handlers::webhook_handler(
        State(state.clone()),
        headers,
        Bytes::from(body),
    )
    .await
}

#[tokio::test]
async fn webhooks_with_bad_signatures_are_rejected() {
    let state = test_state();
    let event = json!({
        "type": "customer.subscription.created",
        "data": {"object": {"customer": "cus_x"}}
    });
    let response = send_webhook(&state, &event, "wrong-secret").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = crate::http::billing_handlers::webhook_handler(
        State(state.clone()),
        HeaderMap::new(),
        Bytes::from(serde_json::to_vec(&event).expect("encode")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancellation_webhook_clears_the_subscription() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;
    let _ = crate::http::billing_handlers::checkout_handler(
        State(state.clone()),
        bearer(&token),
        Bytes::new(),
    )
    .await;

    let me = body_json(
        crate::http::auth_handlers::me_handler(State(state.clone()), bearer(&token)).await,
    )
    .await;
    let user_id = me["user"]["id"].as_str().expect("user id").to_string();

    let activate = json!({
        "type": "customer.subscription.created",
        "data": {"object": {"customer": format!("cus_{user_id}")}}
    });
    assert_eq!(send_webhook(&state, &activate, "whsec_test").await.status(), StatusCode::OK);
    let me = body_json(
        crate::http::auth_handlers::me_handler(State(state.clone()), bearer(&token)).await,
    )
    .await;
    assert_eq!(me["user"]["subscribed"], true);

    let cancel = json!({
        "type": "customer.subscription.deleted",
        "data": {"object": {"customer": format!("cus_{user_id}")}}
    });
    assert_eq!(send_webhook(&state, &cancel, "whsec_test").await.status(), StatusCode::OK);
    let me = body_json(
        crate::http::auth_handlers::me_handler(State(state.clone()), bearer(&token)).await,
    )
    .await;
    assert_eq!(me["user"]["subscribed"], false);
}

#[tokio::test]
async fn generated_forms_save_as_drafts() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;

    let response = crate::http::generate_handlers::generate_form_handler(
        State(state.clone()),
        bearer(&token),
        json_bytes(&json!({"description": "a survey about coffee habits"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let form_id = body_json(response).await["id"].as_i64().expect("id");

    let response = get_form_detail(&state, bearer(&token), form_id).await;
    let body = body_json(response).await;
    assert_eq!(body["form"]["name"], "Coffee survey");
    assert_eq!(body["form"]["published"], false);
    let questions = body["form"]["questions"].as_array().expect("questions");
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["field_type"], "RadioGroup");
}

#[tokio::test]
async fn invalid_payloads_report_the_envelope() {
    let state = test_state();
    let token = register_and_login(&state, "Ada", "ada@example.com").await;

    let response = crate::http::form_handlers::create_form_handler(
        State(state.clone()),
        bearer(&token),
        Bytes::from_static(b"not json"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_payload");
    assert!(body["error"]["request_id"].as_str().expect("request id").starts_with("req-"));
}
