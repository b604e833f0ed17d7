use std::convert::Infallible;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, HeaderName},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::evaluation::models::UploadItem;
use crate::evaluation::persister::{EvaluationFilter, EvaluationStore, PersistenceError};
use crate::evaluation::stream::{
    run_batch, BatchContext, ChannelSink, StreamEvent, DEFAULT_JOB_DESCRIPTION,
};
use crate::models::candidate::EvaluationListRow;
use crate::models::requisition::RequisitionRow;
use crate::state::AppState;

const EVENT_BUFFER: usize = 16;
const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

/// `"<title>\n<description>"`, or the canned description when there is no requisition.
pub fn job_description_for(requisition: Option<&RequisitionRow>) -> String {
    match requisition {
        Some(r) => match r.description.as_deref() {
            Some(description) => format!("{}\n{}", r.requisition, description),
            None => r.requisition.clone(),
        },
        None => DEFAULT_JOB_DESCRIPTION.to_string(),
    }
}

/// Job description for a batch. Unknown or missing requisitions fall back to the default.
pub async fn resolve_job_description(
    store: &dyn EvaluationStore,
    requisition_id: Option<&str>,
) -> Result<String, PersistenceError> {
    let requisition = match requisition_id {
        Some(id) => store.find_requisition(id).await?,
        None => None,
    };
    if requisition.is_none() && requisition_id.is_some() {
        warn!("Requisition {requisition_id:?} not found, using default job description");
    }
    Ok(job_description_for(requisition.as_ref()))
}

struct BatchUpload {
    items: Vec<UploadItem>,
    requisition_id: Option<String>,
}

async fn read_batch(multipart: &mut Multipart) -> Result<BatchUpload, AppError> {
    let mut items = Vec::new();
    let mut requisition_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or("") {
            "files" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read {filename}: {e}")))?;
                items.push(UploadItem {
                    index: items.len(),
                    filename,
                    content,
                });
            }
            "requisition" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid requisition field: {e}")))?;
                requisition_id = Some(text.trim().to_string()).filter(|id| !id.is_empty());
            }
            other => {
                // unknown parts are drained so the stream can advance
                let name = other.to_string();
                field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid {name} field: {e}")))?;
            }
        }
    }

    Ok(BatchUpload {
        items,
        requisition_id,
    })
}

/// POST /api/v1/evaluations
///
/// Streams `progress` / `result` / `error` per file, then `done` and `close`.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_batch(&mut multipart).await?;
    if upload.items.is_empty() {
        return Err(AppError::Validation("No files uploaded".to_string()));
    }

    let job_description =
        resolve_job_description(state.store.as_ref(), upload.requisition_id.as_deref()).await?;

    let batch = BatchContext {
        job_description,
        evaluator_id: user.id,
        requisition_id: upload.requisition_id,
    };

    info!(
        "Evaluating {} file(s) for {} (requisition: {:?})",
        upload.items.len(),
        user.email,
        batch.requisition_id
    );

    let (tx, rx) = mpsc::channel::<StreamEvent>(EVENT_BUFFER);
    let processor = state.processor.clone();
    let items = upload.items;
    tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        let outcome = run_batch(processor.as_ref(), items, &batch, &mut sink).await;
        info!("Batch finished: {outcome:?}");
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|event| (Ok::<Event, Infallible>(event.into()), rx))
    });

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub today: Option<bool>,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn into_filter(self, now: DateTime<Utc>) -> Result<EvaluationFilter, AppError> {
        let skip = self.skip.unwrap_or(0);
        if skip < 0 {
            return Err(AppError::Validation("skip must be >= 0".to_string()));
        }
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }

        let since = if self.today.unwrap_or(false) {
            now.date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| Utc.from_utc_datetime(&midnight))
        } else {
            None
        };

        Ok(EvaluationFilter {
            skip,
            limit,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(|s| format!("%{s}%")),
            since,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CandidateSummary {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub experience: Value,
    pub experience_months: Option<i32>,
    pub education: Value,
}

#[derive(Debug, Serialize)]
pub struct RequisitionSummary {
    pub id: Option<Uuid>,
    pub requisition: String,
    pub description: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EvaluationListing {
    pub id: Uuid,
    pub candidate_status: bool,
    pub match_score: Option<i32>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub report: Option<Value>,
    pub interview_status: bool,
    pub evaluated_at: DateTime<Utc>,
    pub candidate: CandidateSummary,
    pub requisition: RequisitionSummary,
}

impl From<EvaluationListRow> for EvaluationListing {
    fn from(row: EvaluationListRow) -> Self {
        Self {
            id: row.id,
            candidate_status: row.candidate_status,
            match_score: row.match_score,
            summary: row.summary,
            strengths: row.strengths,
            weaknesses: row.weaknesses,
            report: row.report,
            interview_status: row.interview_status,
            evaluated_at: row.evaluated_at,
            candidate: CandidateSummary {
                id: row.candidate_id,
                name: row.candidate_name,
                email: row.candidate_email,
                phone: row.candidate_phone,
                skills: row.candidate_skills,
                experience: row.candidate_experience,
                experience_months: row.candidate_experience_months,
                education: row.candidate_education,
            },
            requisition: RequisitionSummary {
                id: row.requisition_id,
                requisition: row.requisition_title,
                description: row.requisition_description,
                created_by: row.requisition_created_by,
            },
        }
    }
}

/// GET /api/v1/evaluations
pub async fn handle_list_evaluations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<EvaluationListing>>, AppError> {
    let filter = query.into_filter(Utc::now())?;
    let rows = state.store.list_evaluations(user.id, &filter).await?;
    Ok(Json(rows.into_iter().map(EvaluationListing::from).collect()))
}
