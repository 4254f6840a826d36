use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{LabError, Result};
use crate::jobs::record::{JobKind, JobRecord, JobStatus, NewJob, RecordPatch};

/// Selects records for [`RecordStore::query`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub kind: Option<JobKind>,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kind(kind: JobKind) -> Self {
        Self {
            kind: Some(kind),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Records in creation order.
    records: Vec<JobRecord>,
    index: HashMap<Uuid, usize>,
    last_created: Option<DateTime<Utc>>,
}

/// Canonical job-id -> record mapping.
///
/// Every operation takes the lock once, so an update's read-modify-write is
/// atomic and a query snapshot never sees a half-applied patch. The store is
/// append-only: records live for as long as the store does, and it is
/// unbounded unless built with [`RecordStore::with_capacity`].
#[derive(Debug)]
pub struct RecordStore {
    inner: RwLock<StoreInner>,
    capacity: Option<usize>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            capacity: None,
        }
    }

    /// Store that refuses new records once it holds `capacity` of them.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            capacity: Some(capacity),
        }
    }

    /// Append a new record with a fresh id. Status defaults to PENDING.
    pub async fn create(&self, job: NewJob) -> Result<JobRecord> {
        let mut inner = self.inner.write().await;
        if let Some(capacity) = self.capacity {
            if inner.records.len() >= capacity {
                return Err(LabError::StoreFull(capacity));
            }
        }

        let mut id = Uuid::new_v4();
        while inner.index.contains_key(&id) {
            id = Uuid::new_v4();
        }

        // Creation times are strictly increasing so newest-first is total.
        let mut now = Utc::now();
        if let Some(last) = inner.last_created {
            if now <= last {
                now = last + Duration::nanoseconds(1);
            }
        }
        inner.last_created = Some(now);

        let record = JobRecord {
            id,
            kind: job.kind,
            payload: job.payload,
            target_url: job.target_url,
            submitter_id: job.submitter_id,
            status: job.status.unwrap_or(JobStatus::Pending),
            outcome: None,
            created_at: now,
            updated_at: now,
        };

        let position = inner.records.len();
        inner.index.insert(id, position);
        inner.records.push(record.clone());
        Ok(record)
    }

    /// Merge `patch` into the record and bump `updated_at`.
    ///
    /// Transition rules are not checked here; the orchestrator owns them.
    pub async fn update(&self, id: &Uuid, patch: RecordPatch) -> Result<JobRecord> {
        let mut inner = self.inner.write().await;
        let position = *inner.index.get(id).ok_or(LabError::NotFound(*id))?;
        let record = &mut inner.records[position];

        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(outcome) = patch.outcome {
            record.outcome = Some(outcome);
        }
        record.updated_at = Utc::now().max(record.updated_at);

        Ok(record.clone())
    }

    pub async fn get(&self, id: &Uuid) -> Option<JobRecord> {
        let inner = self.inner.read().await;
        inner
            .index
            .get(id)
            .map(|&position| inner.records[position].clone())
    }

    /// Snapshot of matching records, most recently created first.
    pub async fn query(&self, filter: JobFilter) -> Vec<JobRecord> {
        let inner = self.inner.read().await;
        let mut records: Vec<JobRecord> = inner
            .records
            .iter()
            .rev()
            .filter(|r| filter.kind.map_or(true, |kind| r.kind == kind))
            .cloned()
            .collect();
        drop(inner);

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        records
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
