use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::jobs::{JobFilter, JobKind, JobRecord, JobStatus, RecordStore};

/// Records per kind that feed the statistics window.
pub const STATS_WINDOW: usize = 100;
/// Entries in the recent-attacks feed.
pub const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage, 0 when there are no records.
    pub success_rate: f64,
}

impl KindStats {
    /// Anything without a successful outcome counts as failed, including
    /// jobs still in flight.
    pub fn from_records(records: &[JobRecord]) -> Self {
        let total = records.len();
        let successful = records
            .iter()
            .filter(|r| r.outcome.as_ref().is_some_and(|o| o.succeeded))
            .count();
        Self {
            total,
            successful,
            failed: total - successful,
            success_rate: if total > 0 {
                successful as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsByKind {
    pub xss: KindStats,
    pub ssrf: KindStats,
    pub combined: KindStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentAttack {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub timestamp: DateTime<Utc>,
    pub status: JobStatus,
    pub success: bool,
}

impl From<&JobRecord> for RecentAttack {
    fn from(record: &JobRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            timestamp: record.created_at,
            status: record.status,
            success: record.outcome.as_ref().is_some_and(|o| o.succeeded),
        }
    }
}

/// Dashboard summary over the most recent records of each kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackStatistics {
    pub total_attacks: usize,
    pub attacks_by_type: StatsByKind,
    pub recent_attacks: Vec<RecentAttack>,
}

impl AttackStatistics {
    /// Each slice is expected newest first, as returned by the store.
    pub fn from_records(xss: &[JobRecord], ssrf: &[JobRecord], combined: &[JobRecord]) -> Self {
        let mut recent: Vec<&JobRecord> = xss.iter().chain(ssrf).chain(combined).collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Self {
            total_attacks: xss.len() + ssrf.len() + combined.len(),
            attacks_by_type: StatsByKind {
                xss: KindStats::from_records(xss),
                ssrf: KindStats::from_records(ssrf),
                combined: KindStats::from_records(combined),
            },
            recent_attacks: recent
                .into_iter()
                .take(RECENT_LIMIT)
                .map(RecentAttack::from)
                .collect(),
        }
    }

    pub async fn collect(store: &RecordStore) -> Self {
        let window = |kind| JobFilter::kind(kind).with_limit(STATS_WINDOW);
        let xss = store.query(window(JobKind::Xss)).await;
        let ssrf = store.query(window(JobKind::Ssrf)).await;
        let combined = store.query(window(JobKind::Combined)).await;
        Self::from_records(&xss, &ssrf, &combined)
    }
}
