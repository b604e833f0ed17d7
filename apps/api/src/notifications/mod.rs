// Notification Dispatcher: interview room + result email after each evaluation.
// Jobs go onto a bounded queue drained by one background worker. Callers never
// wait on a job, and a failed job is logged and dropped.

pub mod interview;
pub mod mailer;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Everything the notifier needs about one persisted evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationJob {
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub evaluation_id: Uuid,
    pub requisition_id: Option<Uuid>,
    /// First line of the job description.
    pub position: String,
    pub is_eligible: bool,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, job: &NotificationJob) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<NotificationJob>,
}

impl NotificationDispatcher {
    /// Starts the background worker. Must be called inside a Tokio runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<NotificationJob>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match notifier.notify(&job).await {
                    Ok(()) => info!(
                        "Notification sent for candidate {} (evaluation {})",
                        job.candidate_id, job.evaluation_id
                    ),
                    Err(e) => error!(
                        "Notification failed for candidate {} (evaluation {}): {e:#}",
                        job.candidate_id, job.evaluation_id
                    ),
                }
            }
            debug!("Notification queue closed, worker exiting");
        });

        Self { tx }
    }

    /// Queues `job` without waiting. A full or closed queue drops the job.
    pub fn dispatch(&self, job: NotificationJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => warn!(
                "Notification queue full, dropping job for candidate {}",
                job.candidate_id
            ),
            Err(TrySendError::Closed(job)) => warn!(
                "Notification worker stopped, dropping job for candidate {}",
                job.candidate_id
            ),
        }
    }
}

/// First line of a job description, used as the position name in emails.
pub fn position_from(job_description: &str) -> String {
    job_description
        .split('\n')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
