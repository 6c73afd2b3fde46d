#![forbid(unsafe_code)]

use formforge_server::external::assistant::UnconfiguredGenerator;
use formforge_server::external::billing::UnconfiguredBilling;
use formforge_server::{
    build_router, ApiConfig, AppState, BillingApi, HttpBillingClient, HttpTextGenerator,
    RateLimitConfig, TextGenerator,
};
use formforge_store::Store;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env_bool("FORGE_LOG_JSON", true) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();

    let bind_addr = env_string("FORGE_BIND", "0.0.0.0:8080");
    let db_path = PathBuf::from(env_string("FORGE_DB_PATH", "artifacts/formforge.sqlite"));
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| format!("create db dir failed: {e}"))?;
    }

    let api = ApiConfig {
        max_body_bytes: env_usize("FORGE_MAX_BODY_BYTES", 256 * 1024),
        session_ttl: Duration::from_secs(env_u64("FORGE_SESSION_TTL_SECS", 7 * 24 * 3600)),
        session_secret: env_string("FORGE_SESSION_SECRET", "dev-only-secret"),
        password_iterations: env_u64("FORGE_PASSWORD_ITERATIONS", 100_000) as u32,
        max_free_forms: env_usize("FORGE_MAX_FREE_FORMS", 3),
        rate_limit_per_ip: RateLimitConfig {
            capacity: env_f64("FORGE_RATE_LIMIT_CAPACITY", 30.0),
            refill_per_sec: env_f64("FORGE_RATE_LIMIT_REFILL_PER_SEC", 10.0),
        },
        webhook_secret: env_opt("FORGE_WEBHOOK_SECRET"),
        webhook_max_skew_secs: env_u64("FORGE_WEBHOOK_MAX_SKEW_SECS", 300),
        billing_base_url: env_string("FORGE_BILLING_BASE_URL", "https://api.stripe.com"),
        billing_secret_key: env_opt("FORGE_BILLING_SECRET_KEY"),
        billing_price_id: env_string("FORGE_BILLING_PRICE_ID", "price_default"),
        checkout_success_url: env_string(
            "FORGE_CHECKOUT_SUCCESS_URL",
            "http://localhost:3000/payment/success",
        ),
        checkout_cancel_url: env_string("FORGE_CHECKOUT_CANCEL_URL", "http://localhost:3000/"),
        assistant_base_url: env_string(
            "FORGE_ASSISTANT_BASE_URL",
            "https://generativelanguage.googleapis.com",
        ),
        assistant_api_key: env_opt("FORGE_ASSISTANT_API_KEY"),
        assistant_model: env_string("FORGE_ASSISTANT_MODEL", "gemini-2.0-flash"),
    };
    if api.session_secret == "dev-only-secret" {
        warn!("FORGE_SESSION_SECRET is unset; using the development default");
    }

    let store = Store::open(&db_path).map_err(|e| format!("store open failed: {e}"))?;

    let billing: Arc<dyn BillingApi> = match HttpBillingClient::from_config(&api) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("billing disabled: {e}");
            Arc::new(UnconfiguredBilling)
        }
    };
    let generator: Arc<dyn TextGenerator> = match HttpTextGenerator::from_config(&api) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("form generation disabled: {e}");
            Arc::new(UnconfiguredGenerator)
        }
    };

    let state = AppState::new(store, api, billing, generator);

    // Hourly sweep so abandoned sessions do not pile up.
    let purge_store = state.store.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(3600));
        loop {
            tick.tick().await;
            let now = formforge_core::time::unix_seconds();
            match purge_store.lock().await.purge_expired_sessions(now) {
                Ok(purged) if purged > 0 => info!(purged, "expired sessions purged"),
                Ok(_) => {}
                Err(e) => warn!("session purge failed: {e}"),
            }
        }
    });

    let app = build_router(state.clone());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| format!("bind failed: {e}"))?;
    info!("formforge-server listening on {bind_addr}");

    let accepting = state.accepting_requests.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            wait_for_shutdown_signal().await;
            accepting.store(false, Ordering::Relaxed);
            let drain_ms = env_u64("FORGE_SHUTDOWN_DRAIN_MS", 5000);
            tokio::time::sleep(Duration::from_millis(drain_ms)).await;
        })
        .await
        .map_err(|e| format!("server failed: {e}"))
}
