use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Which simulated attack a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobKind {
    Xss,
    Ssrf,
    Combined,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Xss, JobKind::Ssrf, JobKind::Combined];
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Xss => write!(f, "XSS"),
            JobKind::Ssrf => write!(f, "SSRF"),
            JobKind::Combined => write!(f, "COMBINED"),
        }
    }
}

impl FromStr for JobKind {
    type Err = String;

    /// Accepts both the wire form (`XSS`) and the route form (`xss`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xss" => Ok(JobKind::Xss),
            "ssrf" => Ok(JobKind::Ssrf),
            "combined" => Ok(JobKind::Combined),
            other => Err(format!("unknown attack kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward-only lifecycle: PENDING -> RUNNING -> {COMPLETED, FAILED}.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Why a job ended in FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Evaluation,
    Timeout,
}

/// Result attached to a job once it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub succeeded: bool,
    pub detail: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
}

impl Outcome {
    pub fn success(detail: Value) -> Self {
        Self {
            succeeded: true,
            detail,
            error_message: None,
            error_kind: None,
        }
    }

    /// The simulated attack ran to completion but did not get through.
    pub fn blocked(detail: Value, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            detail,
            error_message: Some(message.into()),
            error_kind: None,
        }
    }

    /// The evaluator itself failed or ran out of time.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            detail: Value::Null,
            error_message: Some(message.into()),
            error_kind: Some(kind),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: String,
    pub target_url: String,
    pub submitter_id: String,
    pub status: JobStatus,
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields of a record; the store fills in id and timestamps.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub kind: JobKind,
    pub payload: String,
    pub target_url: String,
    pub submitter_id: String,
    pub status: Option<JobStatus>,
}

impl NewJob {
    pub fn new(
        kind: JobKind,
        payload: impl Into<String>,
        target_url: impl Into<String>,
        submitter_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            payload: payload.into(),
            target_url: target_url.into(),
            submitter_id: submitter_id.into(),
            status: None,
        }
    }
}

/// Shallow overwrite applied by [`RecordStore::update`](crate::jobs::RecordStore::update).
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub status: Option<JobStatus>,
    pub outcome: Option<Outcome>,
}

impl RecordPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            outcome: None,
        }
    }

    pub fn terminal(status: JobStatus, outcome: Outcome) -> Self {
        Self {
            status: Some(status),
            outcome: Some(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions_only_move_forward() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
    }

    #[test]
    fn kind_parses_route_and_wire_forms() {
        assert_eq!("xss".parse::<JobKind>().unwrap(), JobKind::Xss);
        assert_eq!("SSRF".parse::<JobKind>().unwrap(), JobKind::Ssrf);
        assert_eq!("Combined".parse::<JobKind>().unwrap(), JobKind::Combined);
        assert!("csrf".parse::<JobKind>().is_err());
    }

    #[test]
    fn record_serializes_with_wire_names() {
        let now = Utc::now();
        let record = JobRecord {
            id: Uuid::new_v4(),
            kind: JobKind::Combined,
            payload: "{}".to_string(),
            target_url: "http://example.com".to_string(),
            submitter_id: "u1".to_string(),
            status: JobStatus::Running,
            outcome: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "COMBINED");
        assert_eq!(json["status"], "RUNNING");
        assert_eq!(json["targetUrl"], "http://example.com");
        assert_eq!(json["submitterId"], "u1");
        assert!(json["outcome"].is_null());
    }

    #[test]
    fn failure_outcome_carries_kind() {
        let outcome = Outcome::failure(FailureKind::Timeout, "deadline exceeded");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["succeeded"], false);
        assert_eq!(json["errorKind"], "timeout");
        assert_eq!(json["errorMessage"], "deadline exceeded");
    }
}
