use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::evaluation::evaluator::{EvaluatorError, EvaluatorOutcome, StructuredEvaluator};
use crate::evaluation::extractor::{extract_text, ExtractionError};
use crate::evaluation::models::{StructuredEvaluation, UploadItem};
use crate::evaluation::persister::{persist, EvaluationStore, PersistenceError};
use crate::evaluation::stream::{BatchContext, ResumeProcessor};
use crate::notifications::{position_from, NotificationDispatcher, NotificationJob};

const TEMP_PREFIX: &str = "eval_";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("File type '{0}' is not allowed")]
    NotAllowed(String),
}

/// Every way a single file can fail. Each one becomes that file's `error` event.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Evaluation(#[from] EvaluatorError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_bytes: usize,
    /// Lowercased, without the leading dot.
    pub allowed_extensions: Vec<String>,
}

impl UploadLimits {
    pub fn validate(&self, item: &UploadItem) -> Result<(), UploadError> {
        let extension = item.extension();
        if !self.allowed_extensions.iter().any(|e| *e == extension) {
            return Err(UploadError::NotAllowed(extension));
        }
        if item.content.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: item.content.len(),
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Production `ResumeProcessor`: validate, stage, extract, evaluate, persist, notify.
pub struct EvaluationPipeline {
    evaluator: StructuredEvaluator,
    store: Arc<dyn EvaluationStore>,
    dispatcher: NotificationDispatcher,
    limits: UploadLimits,
}

impl EvaluationPipeline {
    pub fn new(
        evaluator: StructuredEvaluator,
        store: Arc<dyn EvaluationStore>,
        dispatcher: NotificationDispatcher,
        limits: UploadLimits,
    ) -> Self {
        Self {
            evaluator,
            store,
            dispatcher,
            limits,
        }
    }

    /// Writes the upload to a temp file that keeps the original extension.
    /// The file is removed when the returned handle drops.
    async fn stage(&self, item: &UploadItem) -> Result<NamedTempFile, std::io::Error> {
        let suffix = format!(".{}", item.extension());
        let file = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&suffix)
            .tempfile()?;
        tokio::fs::write(file.path(), &item.content).await?;
        debug!("Staged {} at {}", item.filename, file.path().display());
        Ok(file)
    }
}

#[async_trait]
impl ResumeProcessor for EvaluationPipeline {
    async fn process(&self, item: &UploadItem, batch: &BatchContext) -> Result<Value, PipelineError> {
        self.limits.validate(item)?;

        let text = {
            let staged = self.stage(item).await?;
            extract_text(staged.path()).await?
        };
        info!("Extracted {} chars from {}", text.len(), item.filename);

        let outcome = self.evaluator.evaluate(&text, &batch.job_description).await?;
        let (reply, malformed) = match outcome {
            EvaluatorOutcome::Structured(reply) => (reply, false),
            // persisted like any reply: every field is absent, so the candidate is "Unknown"
            EvaluatorOutcome::Malformed { raw } => {
                warn!("Model reply for {} was not JSON", item.filename);
                (EvaluatorOutcome::malformed_payload(&raw), true)
            }
        };

        let structured = StructuredEvaluation::from_value(&reply);
        let (candidate, evaluation) = persist(
            self.store.as_ref(),
            &structured,
            batch.evaluator_id,
            batch.requisition_id.as_deref(),
        )
        .await?;

        self.dispatcher.dispatch(NotificationJob {
            candidate_id: candidate.id,
            candidate_name: candidate.name.clone(),
            candidate_email: candidate.email.clone(),
            evaluation_id: evaluation.id,
            requisition_id: evaluation.requisition_id,
            position: position_from(&batch.job_description),
            is_eligible: evaluation.candidate_status,
        });

        if malformed {
            // the `{error, raw}` object stays the payload, tagged with the stored ids
            let mut payload = reply;
            if let Value::Object(fields) = &mut payload {
                fields.insert("candidate_id".to_string(), json!(candidate.id));
                fields.insert("evaluation_id".to_string(), json!(evaluation.id));
            }
            return Ok(payload);
        }

        Ok(json!({
            "candidate_id": candidate.id,
            "evaluation_id": evaluation.id,
            "evaluation": reply,
        }))
    }
}
