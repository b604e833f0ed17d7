use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::notifications::templates::ResultMail;

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const MAX_ATTEMPTS: u32 = 5;
const MIN_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

/// Transactional email over the Resend HTTP API.
#[derive(Clone)]
pub struct Mailer {
    client: Client,
    api_key: Option<String>,
    from: String,
}

impl Mailer {
    pub fn new(api_key: Option<String>, from: String) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            api_key,
            from,
        })
    }

    /// Sends `mail` to `to`, retrying with exponential backoff (2s, 4s, 8s, ... capped at 30s).
    pub async fn send(&self, to: &str, mail: &ResultMail) -> Result<()> {
        let api_key = self
            .api_key
            .as_deref()
            .context("RESEND_API_KEY is not set")?;

        let request_body = SendEmailRequest {
            from: &self.from,
            to: [to],
            subject: &mail.subject,
            html: &mail.html,
        };

        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = std::time::Duration::from_secs(backoff_secs(attempt));
                warn!(
                    "Email attempt {} failed, retrying after {}s...",
                    attempt,
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(RESEND_API_URL)
                .bearer_auth(api_key)
                .json(&request_body)
                .send()
                .await;

            match response {
                Ok(r) if r.status().is_success() => {
                    debug!("Email '{}' accepted for {to}", mail.subject);
                    return Ok(());
                }
                Ok(r) => {
                    let status = r.status();
                    let body = r.text().await.unwrap_or_default();
                    last_error = Some(anyhow!("email API returned {status}: {body}"));
                }
                Err(e) => last_error = Some(e.into()),
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("email not sent"))
            .context(format!("giving up after {MAX_ATTEMPTS} attempts")))
    }
}

fn backoff_secs(attempt: u32) -> u64 {
    (MIN_BACKOFF_SECS << attempt.saturating_sub(1).min(8)).min(MAX_BACKOFF_SECS)
}
