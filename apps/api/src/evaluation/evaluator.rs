//! Structured Evaluator — scores resume text against a job description through
//! the LLM, rotating API keys on failure.
//!
//! Any client error cools the current key down and the next attempt runs under
//! another one. A reply that is not JSON is *not* retried: it is returned as
//! `EvaluatorOutcome::Malformed` for the caller to surface.

use std::sync::Arc;

use chrono::Duration;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::evaluation::key_store::{key_prefix, KeyStore, KeyStoreError};
use crate::evaluation::prompts::evaluation_system_prompt;
use crate::llm_client::{ChatBackend, LlmError};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const NO_VALID_JSON: &str = "No valid JSON response found";

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error(transparent)]
    NoCredentials(#[from] KeyStoreError),

    #[error("All API keys failed after {attempts} attempt(s): {last}")]
    AllCredentialsExhausted {
        attempts: u32,
        #[source]
        last: LlmError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluatorOutcome {
    /// The model replied with parseable JSON.
    Structured(Value),
    /// The model replied, but neither the reply nor a fenced block parsed.
    Malformed { raw: String },
}

impl EvaluatorOutcome {
    /// Client-visible payload of a malformed reply.
    pub fn malformed_payload(raw: &str) -> Value {
        json!({ "error": NO_VALID_JSON, "raw": raw })
    }
}

/// Why a call failed, as far as the credential is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    BadCredential,
    RateLimited,
    Unclassified,
}

impl FailureClass {
    pub fn of(err: &LlmError) -> Self {
        match err.status() {
            Some(401) => FailureClass::BadCredential,
            Some(429) => FailureClass::RateLimited,
            Some(status) if (500..600).contains(&status) => FailureClass::RateLimited,
            _ => FailureClass::Unclassified,
        }
    }
}

pub struct StructuredEvaluator {
    backend: Arc<dyn ChatBackend>,
    keys: Arc<KeyStore>,
    max_retries: u32,
    cooldown: Duration,
}

impl StructuredEvaluator {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        keys: Arc<KeyStore>,
        max_retries: u32,
        cooldown: Duration,
    ) -> Self {
        Self {
            backend,
            keys,
            max_retries: max_retries.max(1),
            cooldown,
        }
    }

    pub async fn evaluate(
        &self,
        text: &str,
        job_description: &str,
    ) -> Result<EvaluatorOutcome, EvaluatorError> {
        let system = evaluation_system_prompt(job_description);
        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=self.max_retries {
            let key = self.keys.active()?;
            info!(
                "Using API key {}... (attempt {attempt}/{})",
                key_prefix(&key),
                self.max_retries
            );

            match self.backend.complete(&key, &system, text).await {
                Ok(reply) => return Ok(parse_model_reply(&reply)),
                Err(err) => {
                    let class = FailureClass::of(&err);
                    warn!("LLM call failed ({class:?}) on attempt {attempt}: {err}");
                    self.keys.mark_failed(&key, self.cooldown);
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last) => Err(EvaluatorError::AllCredentialsExhausted {
                attempts: self.max_retries,
                last,
            }),
            // max_retries is at least 1, so the loop ran and recorded an error
            None => Err(EvaluatorError::NoCredentials(
                KeyStoreError::NoCredentialsAvailable,
            )),
        }
    }
}

/// Parses a model reply: the whole reply as JSON first, then the first
/// ```` ```json ```` fenced block.
pub fn parse_model_reply(reply: &str) -> EvaluatorOutcome {
    if let Ok(value) = serde_json::from_str::<Value>(reply.trim()) {
        return EvaluatorOutcome::Structured(value);
    }
    match find_fenced_json(reply).map(|block| serde_json::from_str::<Value>(block)) {
        Some(Ok(value)) => EvaluatorOutcome::Structured(value),
        _ => EvaluatorOutcome::Malformed {
            raw: reply.to_string(),
        },
    }
}

/// Contents of the first ```` ```json ... ``` ```` block, trimmed.
fn find_fenced_json(reply: &str) -> Option<&str> {
    const OPEN: &str = "```json";
    const CLOSE: &str = "```";

    let start = reply.find(OPEN)? + OPEN.len();
    let rest = &reply[start..];
    let end = rest.find(CLOSE)?;
    Some(rest[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    fn evaluator(backend: Arc<ScriptedBackend>, keys: &[&str]) -> (StructuredEvaluator, Arc<KeyStore>) {
        let store = Arc::new(KeyStore::new(keys.iter().copied()));
        let evaluator = StructuredEvaluator::new(
            backend,
            store.clone(),
            DEFAULT_MAX_RETRIES,
            Duration::minutes(5),
        );
        (evaluator, store)
    }

    fn api_error(status: u16) -> LlmError {
        LlmError::Api {
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_parse_direct_json() {
        let outcome = parse_model_reply("  {\"evaluation\": {\"match_score\": 80}} ");
        assert_eq!(
            outcome,
            EvaluatorOutcome::Structured(json!({"evaluation": {"match_score": 80}}))
        );
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let reply = "Here is the result:\n```json\n{\"a\": 1}\n```\nand another\n```json\n{\"b\": 2}\n```";
        assert_eq!(parse_model_reply(reply), EvaluatorOutcome::Structured(json!({"a": 1})));
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let reply = "I cannot evaluate this resume.";
        assert_eq!(
            parse_model_reply(reply),
            EvaluatorOutcome::Malformed {
                raw: reply.to_string()
            }
        );
    }

    #[test]
    fn test_parse_broken_fence_is_malformed() {
        let reply = "```json\n{\"a\": \n```";
        assert!(matches!(parse_model_reply(reply), EvaluatorOutcome::Malformed { .. }));
    }

    #[test]
    fn test_malformed_payload_shape() {
        let payload = EvaluatorOutcome::malformed_payload("nope");
        assert_eq!(payload["error"], NO_VALID_JSON);
        assert_eq!(payload["raw"], "nope");
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(FailureClass::of(&api_error(401)), FailureClass::BadCredential);
        assert_eq!(FailureClass::of(&api_error(429)), FailureClass::RateLimited);
        assert_eq!(FailureClass::of(&api_error(503)), FailureClass::RateLimited);
        assert_eq!(FailureClass::of(&api_error(400)), FailureClass::Unclassified);
        let parse = serde_json::from_str::<Value>("{").unwrap_err();
        assert_eq!(FailureClass::of(&LlmError::Parse(parse)), FailureClass::Unclassified);
    }

    #[tokio::test]
    async fn test_rate_limited_key_rotates_to_next() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(api_error(429)),
            Ok("{\"ok\": true}".to_string()),
        ]));
        let (evaluator, store) = evaluator(backend.clone(), &["sk-a", "sk-b"]);

        let outcome = evaluator.evaluate("resume", "Backend Engineer").await.unwrap();
        assert_eq!(outcome, EvaluatorOutcome::Structured(json!({"ok": true})));
        assert_eq!(backend.keys_used(), vec!["sk-a", "sk-b"]);
        assert!(store.is_failed("sk-a"));
        assert!(!store.is_failed("sk-b"));
    }

    #[tokio::test]
    async fn test_unclassified_error_also_rotates() {
        let parse = serde_json::from_str::<Value>("{").unwrap_err();
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(LlmError::Parse(parse)),
            Ok("{}".to_string()),
        ]));
        let (evaluator, store) = evaluator(backend.clone(), &["sk-a", "sk-b"]);

        evaluator.evaluate("resume", "jd").await.unwrap();
        assert!(store.is_failed("sk-a"));
        assert_eq!(backend.keys_used(), vec!["sk-a", "sk-b"]);
    }

    #[tokio::test]
    async fn test_all_attempts_fail_is_exhausted() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(api_error(500)),
            Err(api_error(401)),
            Err(api_error(503)),
        ]));
        let (evaluator, _) = evaluator(backend.clone(), &["sk-a", "sk-b", "sk-c"]);

        let err = evaluator.evaluate("resume", "jd").await.unwrap_err();
        match err {
            EvaluatorError::AllCredentialsExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.status(), Some(503));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(backend.keys_used(), vec!["sk-a", "sk-b", "sk-c"]);
    }

    #[tokio::test]
    async fn test_keys_run_out_before_retries() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(api_error(429))]));
        let (evaluator, _) = evaluator(backend.clone(), &["sk-a"]);

        let err = evaluator.evaluate("resume", "jd").await.unwrap_err();
        assert!(matches!(
            err,
            EvaluatorError::NoCredentials(KeyStoreError::NoCredentialsAvailable)
        ));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_not_retried() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok("Sorry, no JSON today".to_string()),
            Ok("{}".to_string()),
        ]));
        let (evaluator, store) = evaluator(backend.clone(), &["sk-a", "sk-b"]);

        let outcome = evaluator.evaluate("resume", "jd").await.unwrap();
        assert!(matches!(outcome, EvaluatorOutcome::Malformed { ref raw } if raw == "Sorry, no JSON today"));
        assert_eq!(backend.calls(), 1);
        assert_eq!(store.cooldown_records(), 0);
    }

    #[tokio::test]
    async fn test_system_prompt_carries_job_description() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("{}".to_string())]));
        let (evaluator, _) = evaluator(backend.clone(), &["sk-a"]);

        evaluator
            .evaluate("resume body", "Backend Engineer\n5 yrs Go")
            .await
            .unwrap();
        let (system, user) = backend.last_prompt().unwrap();
        assert!(system.contains("Backend Engineer\n5 yrs Go"));
        assert_eq!(user, "resume body");
    }
}
