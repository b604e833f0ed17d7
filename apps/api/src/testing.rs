//! In-memory collaborators shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::evaluation::models::UploadItem;
use crate::evaluation::persister::{
    EvaluationFilter, EvaluationStore, NewCandidate, NewEvaluation, PersistenceError,
};
use crate::evaluation::pipeline::PipelineError;
use crate::evaluation::stream::{BatchContext, ResumeProcessor};
use crate::llm_client::{ChatBackend, LlmError};
use crate::models::candidate::{CandidateRow, EvaluationListRow, EvaluationRow};
use crate::models::requisition::RequisitionRow;
use crate::notifications::{NotificationJob, Notifier};

/// Chat backend that replays a fixed script of replies and records every call.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn keys_used(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _, _)| key.clone())
            .collect()
    }

    /// (system, user) of the most recent call.
    pub fn last_prompt(&self) -> Option<(String, String)> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, system, user)| (system.clone(), user.clone()))
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, api_key: &str, system: &str, user: &str) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((api_key.to_string(), system.to_string(), user.to_string()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("{}".to_string()))
    }
}

/// Evaluation store kept in vectors. Like Postgres, it rejects requisition ids
/// that are not UUIDs, and commits a candidate only together with its evaluation.
#[derive(Default)]
pub struct MemoryStore {
    /// Fail every evaluation insert after its candidate row was written.
    pub reject_evaluations: bool,
    requisitions: Mutex<Vec<RequisitionRow>>,
    candidates: Mutex<Vec<CandidateRow>>,
    evaluations: Mutex<Vec<EvaluationRow>>,
    candidate_writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn rejecting_evaluations() -> Self {
        Self {
            reject_evaluations: true,
            ..Self::default()
        }
    }

    /// Candidate rows written, including ones later rolled back.
    pub fn candidate_writes(&self) -> usize {
        *self.candidate_writes.lock().unwrap()
    }

    fn evaluation_requisition(&self, evaluation: &NewEvaluation) -> Result<Option<Uuid>, PersistenceError> {
        if self.reject_evaluations {
            return Err(PersistenceError::Rejected("evaluation insert failed".to_string()));
        }
        evaluation
            .requisition_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| PersistenceError::Rejected(e.to_string()))
    }

    pub fn add_requisition(&self, title: &str, description: Option<&str>) -> RequisitionRow {
        let now = Utc::now();
        let row = RequisitionRow {
            id: Uuid::new_v4(),
            requisition: title.to_string(),
            description: description.map(String::from),
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        self.requisitions.lock().unwrap().push(row.clone());
        row
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.lock().unwrap().len()
    }

    pub fn evaluation_count(&self) -> usize {
        self.evaluations.lock().unwrap().len()
    }
}

#[async_trait]
impl EvaluationStore for MemoryStore {
    async fn find_requisition(&self, id: &str) -> Result<Option<RequisitionRow>, PersistenceError> {
        let Ok(id) = Uuid::parse_str(id.trim()) else {
            return Ok(None);
        };
        Ok(self
            .requisitions
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn insert_evaluation(
        &self,
        candidate: &NewCandidate,
        evaluation: &NewEvaluation,
    ) -> Result<(CandidateRow, EvaluationRow), PersistenceError> {
        let now = Utc::now();
        let candidate_row = CandidateRow {
            id: Uuid::new_v4(),
            name: candidate.name.clone(),
            email: candidate.email.clone(),
            phone: candidate.phone.clone(),
            skills: candidate.skills.clone(),
            experience: candidate.experience.clone(),
            experience_months: candidate.experience_months,
            education: candidate.education.clone(),
            evaluated_by_id: Some(candidate.evaluated_by_id),
            created_at: now,
            updated_at: now,
        };

        // Both tables stay locked for the whole write, like a transaction.
        let mut candidates = self.candidates.lock().unwrap();
        let mut evaluations = self.evaluations.lock().unwrap();
        let checkpoint = candidates.len();
        candidates.push(candidate_row.clone());
        *self.candidate_writes.lock().unwrap() += 1;

        let requisition_id = match self.evaluation_requisition(evaluation) {
            Ok(id) => id,
            Err(e) => {
                candidates.truncate(checkpoint);
                return Err(e);
            }
        };

        let evaluation_row = EvaluationRow {
            id: Uuid::new_v4(),
            candidate_id: candidate_row.id,
            candidate_status: evaluation.candidate_status,
            requisition_id,
            match_score: evaluation.match_score,
            summary: evaluation.summary.clone(),
            strengths: evaluation.strengths.clone(),
            weaknesses: evaluation.weaknesses.clone(),
            report: None,
            interview_status: false,
            evaluated_at: now,
        };
        evaluations.push(evaluation_row.clone());
        Ok((candidate_row, evaluation_row))
    }

    async fn list_evaluations(
        &self,
        _owner: Uuid,
        _filter: &EvaluationFilter,
    ) -> Result<Vec<EvaluationListRow>, PersistenceError> {
        Ok(Vec::new())
    }
}

/// Notifier that records jobs, optionally failing every one of them.
#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    jobs: Mutex<Vec<NotificationJob>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<NotificationJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, job: &NotificationJob) -> anyhow::Result<()> {
        self.jobs.lock().unwrap().push(job.clone());
        if self.fail {
            anyhow::bail!("mail provider unavailable");
        }
        Ok(())
    }
}

/// Processor that accepts every file without touching it.
pub struct NoopProcessor;

#[async_trait]
impl ResumeProcessor for NoopProcessor {
    async fn process(&self, item: &UploadItem, _batch: &BatchContext) -> Result<Value, PipelineError> {
        Ok(json!({ "file": item.filename }))
    }
}
