//! Background embedding generation.
//!
//! Jobs are queued on a channel and run one at a time by a worker task.
//! Each submission returns a [`JobHandle`] that resolves when its job
//! finishes; [`GenerationQueue::status`] can be polled by id meanwhile.
//! Only the most recent `retain_finished` finished jobs stay queryable.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use store::OwnerType;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::{BatchGenerateReport, EmbeddingGenerator, MatchError};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed { report: BatchGenerateReport },
    Failed { reason: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }
}

struct GenerationJob {
    id: Uuid,
    owner_type: OwnerType,
    batch_size: usize,
    done: oneshot::Sender<Result<BatchGenerateReport, MatchError>>,
}

/// Completion signal for one submitted job.
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    done: oneshot::Receiver<Result<BatchGenerateReport, MatchError>>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn wait(self) -> Result<BatchGenerateReport, MatchError> {
        self.done
            .await
            .map_err(|_| MatchError::Internal(format!("generation job {} was dropped", self.id)))?
    }
}

#[derive(Clone)]
pub struct GenerationQueue {
    tx: mpsc::Sender<GenerationJob>,
    statuses: Arc<DashMap<Uuid, JobStatus>>,
}

impl GenerationQueue {
    /// Spawn the worker on the current tokio runtime. `capacity` bounds the
    /// pending jobs, `retain_finished` the finished statuses kept for polling.
    pub fn start(
        generator: Arc<EmbeddingGenerator>,
        capacity: usize,
        retain_finished: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let statuses = Arc::new(DashMap::new());
        tokio::spawn(run_worker(
            generator,
            rx,
            Arc::clone(&statuses),
            retain_finished.max(1),
        ));
        Self { tx, statuses }
    }

    pub async fn submit(
        &self,
        owner_type: OwnerType,
        batch_size: usize,
    ) -> Result<JobHandle, MatchError> {
        if batch_size == 0 {
            return Err(MatchError::InvalidParams(
                "batch_size must be greater than zero".into(),
            ));
        }
        let id = Uuid::new_v4();
        let (done, rx) = oneshot::channel();
        self.statuses.insert(id, JobStatus::Queued);

        let job = GenerationJob {
            id,
            owner_type,
            batch_size,
            done,
        };
        if self.tx.send(job).await.is_err() {
            self.statuses.remove(&id);
            return Err(MatchError::Internal("generation worker has stopped".into()));
        }
        tracing::info!(job_id = %id, owner_type = %owner_type, batch_size, "generation job queued");
        Ok(JobHandle { id, done: rx })
    }

    pub fn status(&self, id: Uuid) -> Option<JobStatus> {
        self.statuses.get(&id).map(|s| s.value().clone())
    }

    /// Number of jobs whose status is currently retained.
    pub fn tracked(&self) -> usize {
        self.statuses.len()
    }
}

async fn run_worker(
    generator: Arc<EmbeddingGenerator>,
    mut rx: mpsc::Receiver<GenerationJob>,
    statuses: Arc<DashMap<Uuid, JobStatus>>,
    retain_finished: usize,
) {
    let mut finished = VecDeque::with_capacity(retain_finished);
    while let Some(job) = rx.recv().await {
        statuses.insert(job.id, JobStatus::Running);
        let outcome = generator.batch_generate(job.owner_type, job.batch_size).await;

        let status = match &outcome {
            Ok(report) => JobStatus::Completed {
                report: report.clone(),
            },
            Err(err) => {
                tracing::warn!(job_id = %job.id, error = %err, "generation job failed");
                JobStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };
        statuses.insert(job.id, status);
        finished.push_back(job.id);
        if finished.len() > retain_finished {
            if let Some(evicted) = finished.pop_front() {
                statuses.remove(&evicted);
            }
        }
        // The submitter may have dropped its handle; status stays queryable.
        let _ = job.done.send(outcome);
    }
    tracing::debug!("generation worker stopped");
}
