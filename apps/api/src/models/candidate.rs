use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CandidateRow {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub experience: Value,
    pub experience_months: Option<i32>,
    pub education: Value,
    pub evaluated_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EvaluationRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub candidate_status: bool,
    pub requisition_id: Option<Uuid>,
    pub match_score: Option<i32>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    /// Filled by interview analysis, never by resume evaluation.
    pub report: Option<Value>,
    pub interview_status: bool,
    pub evaluated_at: DateTime<Utc>,
}

/// Flat join of an evaluation with its candidate and requisition, as read by the listing query.
#[derive(Debug, Clone, FromRow)]
pub struct EvaluationListRow {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub candidate_status: bool,
    pub requisition_id: Option<Uuid>,
    pub match_score: Option<i32>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub report: Option<Value>,
    pub interview_status: bool,
    pub evaluated_at: DateTime<Utc>,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub candidate_phone: Option<String>,
    pub candidate_skills: Vec<String>,
    pub candidate_experience: Value,
    pub candidate_experience_months: Option<i32>,
    pub candidate_education: Value,
    pub requisition_title: String,
    pub requisition_description: Option<String>,
    pub requisition_created_by: Uuid,
}
