//! Background jobs with pollable status.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Finished jobs stay pollable this long.
const FINISHED_JOB_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    /// Finished, but a newer result was already published.
    Superseded,
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Superseded | JobStatus::Failed { .. })
    }
}

/// What a successful job did with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Published,
    Superseded,
}

impl JobOutcome {
    /// Maps the flag returned by `SnapshotCache::publish`.
    pub fn from_publish(stored: bool) -> Self {
        if stored {
            JobOutcome::Published
        } else {
            JobOutcome::Superseded
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: Uuid,
    pub kind: String,
    /// Monotonic across all jobs; used to order published results.
    pub sequence: u64,
    #[serde(flatten)]
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Returned to the caller as soon as a job is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobTicket {
    pub id: Uuid,
    pub sequence: u64,
}

pub struct JobRegistry {
    jobs: DashMap<Uuid, JobInfo>,
    sequence: AtomicU64,
    retention_secs: i64,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention_secs(FINISHED_JOB_TTL_SECS)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention_secs(retention_secs: i64) -> Self {
        Self {
            jobs: DashMap::new(),
            sequence: AtomicU64::new(0),
            retention_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drops jobs that finished more than the retention period before `now`.
    /// Pending and running jobs are always kept.
    pub fn prune_finished(&self, now: DateTime<Utc>) {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| match job.finished_at {
            Some(finished) => (now - finished).num_seconds() < self.retention_secs,
            None => true,
        });
        let evicted = before.saturating_sub(self.jobs.len());
        if evicted > 0 {
            tracing::debug!("Evicted {} finished jobs", evicted);
        }
    }

    /// Next sequence number. Synchronous runs take one too so their results
    /// order against background jobs.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Registers a job and spawns it on the runtime. The task receives the
    /// job's sequence number. Expired finished jobs are evicted first.
    pub fn submit<F, Fut, E>(self: &Arc<Self>, kind: &str, task: F) -> JobTicket
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = Result<JobOutcome, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.prune_finished(Utc::now());
        let ticket = JobTicket {
            id: Uuid::new_v4(),
            sequence: self.next_sequence(),
        };
        self.jobs.insert(
            ticket.id,
            JobInfo {
                id: ticket.id,
                kind: kind.to_string(),
                sequence: ticket.sequence,
                status: JobStatus::Pending,
                submitted_at: Utc::now(),
                finished_at: None,
            },
        );
        tracing::info!("📋 Job {} ({}) queued, seq={}", ticket.id, kind, ticket.sequence);

        let registry = Arc::clone(self);
        tokio::spawn(async move {
            registry.set_status(ticket.id, JobStatus::Running);
            let status = match task(ticket.sequence).await {
                Ok(JobOutcome::Published) => JobStatus::Done,
                Ok(JobOutcome::Superseded) => JobStatus::Superseded,
                Err(e) => {
                    tracing::warn!("Job {} failed: {}", ticket.id, e);
                    JobStatus::Failed { reason: e.to_string() }
                }
            };
            registry.set_status(ticket.id, status);
        });

        ticket
    }

    pub fn status(&self, id: &Uuid) -> Option<JobInfo> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    fn set_status(&self, id: Uuid, status: JobStatus) {
        if let Some(mut entry) = self.jobs.get_mut(&id) {
            if status.is_finished() {
                entry.finished_at = Some(Utc::now());
                tracing::info!("✅ Job {} ({}) finished: {:?}", id, entry.kind, status);
            }
            entry.status = status;
        }
    }
}
