//! Submission workflow: gate, record, evaluate, resolve, notify.
//!
//! # Components
//!
//! - [`Orchestrator`]: drives one submission from admission to a terminal state
//! - [`Evaluator`]: pluggable strategy per [`JobKind`], see [`Evaluators`]
//! - [`Notifier`]: fire-and-forget lifecycle events
//!
//! # Job lifecycle
//!
//! ```text
//! PENDING --> RUNNING --(evaluator ok)--------> COMPLETED
//!                     \--(error or deadline)--> FAILED
//! ```
//!
//! Both transient states are passed through inside a single
//! [`Orchestrator::submit`] call; there is no queue in front of the evaluator.

pub mod evaluator;
pub mod notifier;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::config::LabConfig;
use crate::error::{LabError, Result};
use crate::gate::{log_security_event, target_rule, validate_structured_size};
use crate::jobs::{
    FailureKind, JobFilter, JobKind, JobRecord, JobStatus, NewJob, Outcome, RecordPatch,
    RecordStore,
};

pub use evaluator::{EvaluationError, Evaluator, Evaluators, SimulatedEvaluator};
pub use notifier::{BroadcastNotifier, LifecycleEvent, Notifier, NoopNotifier};

/// What the caller wants to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackPayload {
    Xss(String),
    Ssrf(String),
    Combined { xss: String, ssrf: String },
}

impl AttackPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            AttackPayload::Xss(_) => JobKind::Xss,
            AttackPayload::Ssrf(_) => JobKind::Ssrf,
            AttackPayload::Combined { .. } => JobKind::Combined,
        }
    }

    /// Structured form checked by the size/depth gate.
    pub fn to_value(&self) -> Value {
        match self {
            AttackPayload::Xss(p) | AttackPayload::Ssrf(p) => Value::String(p.clone()),
            AttackPayload::Combined { xss, ssrf } => json!({ "xss": xss, "ssrf": ssrf }),
        }
    }

    /// String stored on the record; COMBINED keeps both parts as JSON.
    fn into_record_payload(self) -> String {
        match self {
            AttackPayload::Xss(p) | AttackPayload::Ssrf(p) => p,
            combined @ AttackPayload::Combined { .. } => combined.to_value().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub payload: AttackPayload,
    pub target_url: String,
    pub submitter_id: String,
}

impl Submission {
    pub fn new(
        payload: AttackPayload,
        target_url: impl Into<String>,
        submitter_id: impl Into<String>,
    ) -> Self {
        Self {
            payload,
            target_url: target_url.into(),
            submitter_id: submitter_id.into(),
        }
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }
}

/// Coordinates gate, store, evaluators and notifier.
///
/// Cheap to clone; every clone shares the same store and notifier.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<RecordStore>,
    evaluators: Evaluators,
    notifier: Arc<dyn Notifier>,
    deadline: Duration,
}

impl Orchestrator {
    pub fn new(
        store: Arc<RecordStore>,
        evaluators: Evaluators,
        notifier: Arc<dyn Notifier>,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            evaluators,
            notifier,
            deadline,
        }
    }

    /// Wire up a store and simulated evaluators from `config`.
    pub fn from_config(config: &LabConfig, notifier: Arc<dyn Notifier>) -> Self {
        let store = match config.store_capacity {
            Some(capacity) => RecordStore::with_capacity(capacity),
            None => RecordStore::new(),
        };
        Self::new(
            Arc::new(store),
            Evaluators::simulated(&config.simulation),
            notifier,
            config.evaluator_deadline,
        )
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run one submission to a terminal state and return the final record.
    ///
    /// Only gate rejections and store faults come back as `Err`. Evaluator
    /// errors and timeouts are recorded as a FAILED job and returned as `Ok`.
    ///
    /// Admitted jobs run on their own task, so dropping this future (a caller
    /// timeout, a cancelled request) never leaves a job RUNNING.
    pub async fn submit(&self, submission: Submission) -> Result<JobRecord> {
        self.admit(&submission)?;

        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.run(submission).await })
            .await
            .map_err(|e| LabError::Internal(format!("submission task failed: {e}")))?
    }

    /// Create, evaluate and resolve an admitted submission.
    async fn run(&self, submission: Submission) -> Result<JobRecord> {
        let kind = submission.kind();
        let record = self
            .store
            .create(NewJob::new(
                kind,
                submission.payload.into_record_payload(),
                submission.target_url,
                submission.submitter_id,
            ))
            .await?;
        tracing::info!(job_id = %record.id, kind = %kind, "Job created");

        let record = self.advance(&record, RecordPatch::status(JobStatus::Running)).await?;
        self.notifier.publish(LifecycleEvent::from_record(&record));

        let (status, outcome) = match self.evaluate(&record).await {
            Ok(outcome) => (JobStatus::Completed, outcome),
            Err(e @ LabError::EvaluationTimeout(_)) => {
                tracing::error!(job_id = %record.id, error = %e, "Evaluator missed deadline");
                (
                    JobStatus::Failed,
                    Outcome::failure(FailureKind::Timeout, e.to_string()),
                )
            }
            Err(e) => {
                tracing::warn!(job_id = %record.id, error = %e, "Evaluator failed");
                (
                    JobStatus::Failed,
                    Outcome::failure(FailureKind::Evaluation, e.to_string()),
                )
            }
        };

        let record = self
            .advance(&record, RecordPatch::terminal(status, outcome))
            .await?;
        tracing::info!(
            job_id = %record.id,
            kind = %kind,
            status = %record.status,
            succeeded = record.outcome.as_ref().map_or(false, |o| o.succeeded),
            "Job finished"
        );
        self.notifier.publish(LifecycleEvent::from_record(&record));

        Ok(record)
    }

    /// [`submit`](Self::submit) as a detached task; the handle may be dropped.
    pub fn spawn_submit(&self, submission: Submission) -> JoinHandle<Result<JobRecord>> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.submit(submission).await })
    }

    /// History query, newest first.
    pub async fn history(&self, kind: Option<JobKind>) -> Vec<JobRecord> {
        self.store
            .query(JobFilter { kind, limit: None })
            .await
    }

    pub async fn job(&self, id: &uuid::Uuid) -> Result<JobRecord> {
        self.store.get(id).await.ok_or(LabError::NotFound(*id))
    }

    fn admit(&self, submission: &Submission) -> Result<()> {
        let rule = target_rule(&submission.target_url);
        if !rule.allows() {
            log_security_event(
                "target_rejected",
                &submission.submitter_id,
                &format!("{} ({rule})", submission.target_url),
            );
            return Err(LabError::ValidationRejected(format!(
                "target URL not allowed: {rule}"
            )));
        }

        if !validate_structured_size(&submission.payload.to_value()) {
            log_security_event(
                "payload_rejected",
                &submission.submitter_id,
                "payload exceeds size or nesting limits",
            );
            return Err(LabError::ValidationRejected(
                "payload exceeds size or nesting limits".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply a patch after checking the status transition it implies.
    async fn advance(&self, current: &JobRecord, patch: RecordPatch) -> Result<JobRecord> {
        if let Some(next) = patch.status {
            if !current.status.can_transition_to(next) {
                return Err(LabError::InvalidTransition {
                    from: current.status,
                    to: next,
                });
            }
        }
        self.store.update(&current.id, patch).await
    }

    /// Call the kind's evaluator on a separate task under the deadline.
    ///
    /// On timeout the task is aborted; a panicking evaluator counts as failed.
    async fn evaluate(&self, record: &JobRecord) -> Result<Outcome> {
        let evaluator = Arc::clone(self.evaluators.for_kind(record.kind));
        let payload = record.payload.clone();
        let target_url = record.target_url.clone();

        let mut task =
            tokio::spawn(async move { evaluator.evaluate(&payload, &target_url).await });

        match tokio::time::timeout(self.deadline, &mut task).await {
            Ok(Ok(Ok(outcome))) => Ok(outcome),
            Ok(Ok(Err(e))) => Err(LabError::EvaluationFailed(e.to_string())),
            Ok(Err(join_err)) => Err(LabError::EvaluationFailed(format!(
                "evaluator task aborted: {join_err}"
            ))),
            Err(_) => {
                task.abort();
                Err(LabError::EvaluationTimeout(self.deadline))
            }
        }
    }
}
