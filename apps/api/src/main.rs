mod auth;
mod config;
mod db;
mod errors;
mod evaluation;
mod llm_client;
mod models;
mod notifications;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::evaluation::evaluator::StructuredEvaluator;
use crate::evaluation::key_store::KeyStore;
use crate::evaluation::persister::PgEvaluationStore;
use crate::evaluation::pipeline::{EvaluationPipeline, UploadLimits};
use crate::llm_client::LlmClient;
use crate::notifications::interview::{InterviewNotifier, RoomTokenIssuer};
use crate::notifications::mailer::Mailer;
use crate::notifications::NotificationDispatcher;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Recruit API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;

    // LLM credentials + client
    let keys = Arc::new(KeyStore::new(config.llm_keys.iter().cloned()));
    if keys.is_empty() {
        warn!("LLM_KEYS holds no usable keys; every evaluation will fail");
    }
    let llm = LlmClient::new(&config.llm_base_url, &config.llm_model)
        .context("failed to build LLM client")?;
    info!(
        "LLM client initialized (model: {}, {} key(s))",
        llm.model(),
        keys.len()
    );
    spawn_cooldown_sweeper(keys.clone(), config.llm_key_cooldown_secs);
    let evaluator = StructuredEvaluator::new(
        Arc::new(llm),
        keys,
        config.llm_max_retries,
        chrono::Duration::seconds(config.llm_key_cooldown_secs),
    );

    // Notifications: interview room + result email, off the request path
    if config.resend_api_key.is_none() {
        warn!("RESEND_API_KEY not set; result emails will fail and be logged");
    }
    let mailer = Mailer::new(config.resend_api_key.clone(), config.email_from.clone())?;
    let issuer = RoomTokenIssuer::new(
        config.livekit_api_key.clone(),
        config.livekit_api_secret.clone(),
    );
    let notifier = InterviewNotifier::new(
        db.clone(),
        issuer,
        mailer,
        config.interview_base_url.clone(),
    );
    let dispatcher =
        NotificationDispatcher::spawn(Arc::new(notifier), config.notify_queue_capacity);

    let store = Arc::new(PgEvaluationStore::new(db.clone()));
    let pipeline = EvaluationPipeline::new(
        evaluator,
        store.clone(),
        dispatcher,
        UploadLimits {
            max_bytes: config.max_upload_size,
            allowed_extensions: config.allowed_extensions.clone(),
        },
    );

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        store,
        processor: Arc::new(pipeline),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drops expired key cooldowns so the table only holds live ones.
fn spawn_cooldown_sweeper(keys: Arc<KeyStore>, cooldown_secs: i64) {
    let period = std::time::Duration::from_secs(cooldown_secs.max(1) as u64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let removed = keys.sweep_expired();
            if removed > 0 {
                debug!(
                    "Swept {removed} expired key cooldown(s), {} still recorded",
                    keys.cooldown_records()
                );
            }
        }
    });
}
