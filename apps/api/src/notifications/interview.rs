//! Interview room provisioning: a signed room access token, a one-time password
//! and the `interviews` row that ties them to a candidate.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::interview::InterviewRow;
use crate::notifications::mailer::Mailer;
use crate::notifications::templates::{interview_link, render_result_mail, MailContext};
use crate::notifications::{NotificationJob, Notifier};

const ROOM_NAME_LEN: usize = 6;
const PASSWORD_LEN: usize = 5;
const TOKEN_TTL_HOURS: i64 = 6;
const DEFAULT_IDENTITY: &str = "interviewer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room_join: bool,
    pub room: String,
}

/// Claims of a room access token (LiveKit format).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomClaims {
    pub iss: String,
    pub sub: String,
    pub name: String,
    pub nbf: i64,
    pub exp: i64,
    pub video: VideoGrant,
}

#[derive(Clone)]
pub struct RoomTokenIssuer {
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl RoomTokenIssuer {
    pub fn new(api_key: Option<String>, api_secret: Option<String>) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Signs a token that lets `identity` join `room`.
    pub fn issue(&self, identity: &str, room: &str) -> Result<String> {
        let (Some(api_key), Some(api_secret)) = (&self.api_key, &self.api_secret) else {
            anyhow::bail!("LiveKit API key and secret are not set");
        };

        let now = Utc::now();
        let claims = RoomClaims {
            iss: api_key.clone(),
            sub: identity.to_string(),
            name: identity.to_string(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
            video: VideoGrant {
                room_join: true,
                room: room.to_string(),
            },
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(api_secret.as_bytes()),
        )
        .context("failed to sign room token")
    }
}

/// `len` lowercase hex characters from a fresh v4 UUID.
pub fn random_hex(len: usize) -> String {
    Uuid::new_v4().simple().to_string().chars().take(len).collect()
}

/// Creates the interview room record for one evaluated candidate.
pub async fn create_interview(
    pool: &PgPool,
    issuer: &RoomTokenIssuer,
    job: &NotificationJob,
) -> Result<InterviewRow> {
    let room = random_hex(ROOM_NAME_LEN);
    let identity = match job.candidate_name.trim() {
        "" => DEFAULT_IDENTITY,
        name => name,
    };
    let token = issuer.issue(identity, &room)?;

    let row = sqlx::query_as::<_, InterviewRow>(
        r#"
        INSERT INTO interviews
            (candidate_profile_id, requisition_id, evaluation_id, room_name, token, password)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(job.candidate_id)
    .bind(job.requisition_id)
    .bind(job.evaluation_id)
    .bind(&room)
    .bind(&token)
    .bind(random_hex(PASSWORD_LEN))
    .fetch_one(pool)
    .await
    .context("failed to insert interview")?;

    info!("Created interview {} in room {room}", row.id);
    Ok(row)
}

/// Production notifier: interview room first, then the result email.
pub struct InterviewNotifier {
    pool: PgPool,
    issuer: RoomTokenIssuer,
    mailer: Mailer,
    interview_base_url: String,
}

impl InterviewNotifier {
    pub fn new(
        pool: PgPool,
        issuer: RoomTokenIssuer,
        mailer: Mailer,
        interview_base_url: String,
    ) -> Self {
        Self {
            pool,
            issuer,
            mailer,
            interview_base_url,
        }
    }
}

#[async_trait]
impl Notifier for InterviewNotifier {
    async fn notify(&self, job: &NotificationJob) -> Result<()> {
        let interview = create_interview(&self.pool, &self.issuer, job).await?;

        let Some(email) = job.candidate_email.as_deref() else {
            warn!(
                "Candidate {} has no email address, skipping result email",
                job.candidate_id
            );
            return Ok(());
        };

        let link = interview_link(&self.interview_base_url, &interview.id.to_string());
        let mail = render_result_mail(&MailContext {
            candidate_name: &job.candidate_name,
            position: &job.position,
            is_eligible: job.is_eligible,
            interview_link: &link,
            password: &interview.password,
        });

        info!(
            "Sending email to {email} for position {}, eligible: {}",
            job.position, job.is_eligible
        );
        self.mailer.send(email, &mail).await
    }
}
