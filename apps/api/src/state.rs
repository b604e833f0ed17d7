use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::evaluation::persister::EvaluationStore;
use crate::evaluation::stream::ResumeProcessor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Used directly only for the auth user lookup; evaluation storage goes through `store`.
    pub db: PgPool,
    pub config: Config,
    pub store: Arc<dyn EvaluationStore>,
    /// Per-file pipeline run by every evaluation batch.
    pub processor: Arc<dyn ResumeProcessor>,
}
