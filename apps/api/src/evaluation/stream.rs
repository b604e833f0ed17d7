//! Streaming Orchestrator — runs a batch of uploads through a `ResumeProcessor`
//! one file at a time and reports each step as a named event.
//!
//! Per file: `progress`, then exactly one of `result` / `error`. After the last
//! file: `done` then `close`. A disconnected client is detected before each file
//! and on every send; from then on nothing else is emitted.

use async_trait::async_trait;
use axum::response::sse::Event;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::evaluation::models::UploadItem;
use crate::evaluation::pipeline::PipelineError;

/// Used when the batch names no requisition, or one that does not exist.
pub const DEFAULT_JOB_DESCRIPTION: &str = "Sample job description: Looking for a skilled software developer with experience in Python and FastAPI.";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress { index: usize },
    Result { index: usize, result: Value },
    Error { index: usize, error: String },
    Done { results: Vec<Value> },
    Close,
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Progress { .. } => "progress",
            StreamEvent::Result { .. } => "result",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Close => "close",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            StreamEvent::Progress { index } => json!({ "index": index, "status": "started" }),
            StreamEvent::Result { index, result } => {
                json!({ "index": index, "status": "completed", "result": result })
            }
            StreamEvent::Error { index, error } => {
                json!({ "index": index, "status": "failed", "error": error })
            }
            StreamEvent::Done { results } => json!({ "count": results.len(), "results": results }),
            StreamEvent::Close => json!({}),
        }
    }
}

impl From<StreamEvent> for Event {
    fn from(event: StreamEvent) -> Self {
        Event::default()
            .event(event.name())
            .data(event.payload().to_string())
    }
}

/// Per-batch inputs shared by every file.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchContext {
    pub job_description: String,
    pub evaluator_id: Uuid,
    pub requisition_id: Option<String>,
}

/// Runs one upload through extraction, evaluation, persistence and dispatch.
#[async_trait]
pub trait ResumeProcessor: Send + Sync {
    async fn process(&self, item: &UploadItem, batch: &BatchContext) -> Result<Value, PipelineError>;
}

#[derive(Debug, Error)]
#[error("client disconnected")]
pub struct Disconnected;

/// Where events go. `ChannelSink` feeds the SSE response body.
#[async_trait]
pub trait EventSink: Send {
    fn is_closed(&self) -> bool;
    async fn send(&mut self, event: StreamEvent) -> Result<(), Disconnected>;
}

pub struct ChannelSink {
    tx: mpsc::Sender<StreamEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&mut self, event: StreamEvent) -> Result<(), Disconnected> {
        self.tx.send(event).await.map_err(|_| Disconnected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed { succeeded: usize, failed: usize },
    /// The client went away; `processed` files had finished by then.
    Disconnected { processed: usize },
}

pub async fn run_batch<S: EventSink>(
    processor: &dyn ResumeProcessor,
    items: Vec<UploadItem>,
    batch: &BatchContext,
    sink: &mut S,
) -> BatchOutcome {
    let mut results = Vec::new();
    let mut failed = 0;

    for (processed, item) in items.iter().enumerate() {
        if sink.is_closed() {
            info!("Client disconnected, stopping after {processed} file(s)");
            return BatchOutcome::Disconnected { processed };
        }

        if sink
            .send(StreamEvent::Progress { index: item.index })
            .await
            .is_err()
        {
            return BatchOutcome::Disconnected { processed };
        }

        let event = match processor.process(item, batch).await {
            Ok(result) => {
                results.push(result.clone());
                StreamEvent::Result {
                    index: item.index,
                    result,
                }
            }
            Err(e) => {
                error!("Error processing file {}: {e}", item.filename);
                failed += 1;
                StreamEvent::Error {
                    index: item.index,
                    error: e.to_string(),
                }
            }
        };

        if sink.send(event).await.is_err() {
            return BatchOutcome::Disconnected {
                processed: processed + 1,
            };
        }
    }

    let succeeded = results.len();
    if sink.send(StreamEvent::Done { results }).await.is_err()
        || sink.send(StreamEvent::Close).await.is_err()
    {
        return BatchOutcome::Disconnected {
            processed: items.len(),
        };
    }

    BatchOutcome::Completed { succeeded, failed }
}
