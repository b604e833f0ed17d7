use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewRow {
    pub id: Uuid,
    pub candidate_profile_id: Uuid,
    pub requisition_id: Option<Uuid>,
    pub evaluation_id: Option<Uuid>,
    pub room_name: String,
    pub token: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}
