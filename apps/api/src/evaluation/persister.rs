//! Evaluation Persister — candidate and evaluation rows from a structured
//! evaluation, written in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::evaluation::models::StructuredEvaluation;
use crate::models::candidate::{CandidateRow, EvaluationListRow, EvaluationRow};
use crate::models::requisition::RequisitionRow;

pub const UNKNOWN_CANDIDATE: &str = "Unknown";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage rejected the write: {0}")]
    Rejected(String),
}

/// Values for a new `candidate_profiles` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCandidate {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub experience: Value,
    pub experience_months: Option<i32>,
    pub education: Value,
    pub evaluated_by_id: Uuid,
}

/// Values for a new `evaluations` row. The candidate id is assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvaluation {
    pub candidate_status: bool,
    /// Canonical UUID text when it parsed, otherwise the caller's string as given.
    pub requisition_id: Option<String>,
    pub match_score: Option<i32>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

/// Filters for the evaluation listing, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationFilter {
    pub skip: i64,
    pub limit: i64,
    /// ILIKE pattern matched against candidate name/email and requisition title.
    pub search: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

/// Storage collaborator of the evaluation pipeline.
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// Looks a requisition up by id. Ids that are not UUIDs simply do not match.
    async fn find_requisition(&self, id: &str) -> Result<Option<RequisitionRow>, PersistenceError>;

    /// Inserts both rows atomically: either both exist afterwards or neither does.
    async fn insert_evaluation(
        &self,
        candidate: &NewCandidate,
        evaluation: &NewEvaluation,
    ) -> Result<(CandidateRow, EvaluationRow), PersistenceError>;

    /// Evaluations for requisitions created by `owner`, newest first.
    async fn list_evaluations(
        &self,
        owner: Uuid,
        filter: &EvaluationFilter,
    ) -> Result<Vec<EvaluationListRow>, PersistenceError>;
}

pub fn new_candidate(structured: &StructuredEvaluation, evaluated_by_id: Uuid) -> NewCandidate {
    let profile = &structured.profile;
    NewCandidate {
        name: profile
            .name
            .clone()
            .unwrap_or_else(|| UNKNOWN_CANDIDATE.to_string()),
        email: profile.email.clone(),
        phone: profile.phone.clone(),
        skills: profile.skills.clone(),
        experience: Value::Array(profile.experience.clone()),
        experience_months: profile.experience_months,
        education: Value::Array(profile.education.clone()),
        evaluated_by_id,
    }
}

pub fn new_evaluation(structured: &StructuredEvaluation, requisition_id: Option<&str>) -> NewEvaluation {
    let evaluation = &structured.evaluation;
    NewEvaluation {
        candidate_status: evaluation.is_eligible.unwrap_or(false),
        requisition_id: requisition_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(normalize_requisition_id),
        match_score: evaluation.match_score,
        summary: evaluation.summary.clone(),
        strengths: evaluation.strengths.clone(),
        weaknesses: evaluation.weaknesses.clone(),
    }
}

/// UUIDs come back in canonical hyphenated form; anything else passes through.
pub fn normalize_requisition_id(raw: &str) -> String {
    match Uuid::parse_str(raw) {
        Ok(id) => id.to_string(),
        Err(_) => raw.to_string(),
    }
}

pub async fn persist(
    store: &dyn EvaluationStore,
    structured: &StructuredEvaluation,
    evaluated_by_id: Uuid,
    requisition_id: Option<&str>,
) -> Result<(CandidateRow, EvaluationRow), PersistenceError> {
    let candidate = new_candidate(structured, evaluated_by_id);
    let evaluation = new_evaluation(structured, requisition_id);
    store.insert_evaluation(&candidate, &evaluation).await
}

/// Postgres implementation of `EvaluationStore`.
#[derive(Clone)]
pub struct PgEvaluationStore {
    pool: PgPool,
}

impl PgEvaluationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvaluationStore for PgEvaluationStore {
    async fn find_requisition(&self, id: &str) -> Result<Option<RequisitionRow>, PersistenceError> {
        let Ok(id) = Uuid::parse_str(id.trim()) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, RequisitionRow>(
            "SELECT id, requisition, description, created_by, created_at, updated_at \
             FROM requisitions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_evaluation(
        &self,
        candidate: &NewCandidate,
        evaluation: &NewEvaluation,
    ) -> Result<(CandidateRow, EvaluationRow), PersistenceError> {
        // Dropping the transaction without commit rolls back the candidate insert.
        let mut tx = self.pool.begin().await?;

        let candidate_row = sqlx::query_as::<_, CandidateRow>(
            r#"
            INSERT INTO candidate_profiles
                (name, email, phone, skills, experience, experience_months, education, evaluated_by_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&candidate.name)
        .bind(&candidate.email)
        .bind(&candidate.phone)
        .bind(&candidate.skills)
        .bind(&candidate.experience)
        .bind(candidate.experience_months)
        .bind(&candidate.education)
        .bind(candidate.evaluated_by_id)
        .fetch_one(&mut *tx)
        .await?;

        // requisition_id is cast by Postgres; a non-UUID string fails here and rolls back.
        let evaluation_row = sqlx::query_as::<_, EvaluationRow>(
            r#"
            INSERT INTO evaluations
                (candidate_id, candidate_status, requisition_id, match_score, summary, strengths, weaknesses)
            VALUES ($1, $2, CAST($3 AS UUID), $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(candidate_row.id)
        .bind(evaluation.candidate_status)
        .bind(&evaluation.requisition_id)
        .bind(evaluation.match_score)
        .bind(&evaluation.summary)
        .bind(&evaluation.strengths)
        .bind(&evaluation.weaknesses)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "Persisted candidate {} with evaluation {}",
            candidate_row.id, evaluation_row.id
        );
        Ok((candidate_row, evaluation_row))
    }

    async fn list_evaluations(
        &self,
        owner: Uuid,
        filter: &EvaluationFilter,
    ) -> Result<Vec<EvaluationListRow>, PersistenceError> {
        let rows = sqlx::query_as::<_, EvaluationListRow>(
            r#"
            SELECT e.id, e.candidate_id, e.candidate_status, e.requisition_id, e.match_score,
                   e.summary, e.strengths, e.weaknesses, e.report, e.interview_status, e.evaluated_at,
                   c.name AS candidate_name, c.email AS candidate_email, c.phone AS candidate_phone,
                   c.skills AS candidate_skills, c.experience AS candidate_experience,
                   c.experience_months AS candidate_experience_months,
                   c.education AS candidate_education,
                   r.requisition AS requisition_title, r.description AS requisition_description,
                   r.created_by AS requisition_created_by
            FROM evaluations e
            JOIN requisitions r ON r.id = e.requisition_id
            JOIN candidate_profiles c ON c.id = e.candidate_id
            WHERE r.created_by = $1
              AND ($2::text IS NULL OR c.name ILIKE $2 OR c.email ILIKE $2 OR r.requisition ILIKE $2)
              AND ($3::timestamptz IS NULL OR e.evaluated_at >= $3)
            ORDER BY e.evaluated_at DESC
            OFFSET $4
            LIMIT $5
            "#,
        )
        .bind(owner)
        .bind(&filter.search)
        .bind(filter.since)
        .bind(filter.skip)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
