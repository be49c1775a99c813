use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::{MatchError, MatchParams, MatchResult, MatchingOrchestrator, TargetRef};

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub targets: Vec<TargetRef>,
    pub params: MatchParams,
    /// Targets matched concurrently; `0` is treated as `1`.
    pub max_concurrent: usize,
}

/// Cooperative cancellation shared between a caller and a running batch.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender is held by self, so this only happens during teardown.
            std::future::pending::<()>().await;
        }
    }
}

pub type TargetOutcome = Result<Vec<MatchResult>, MatchError>;

/// Every requested target exactly once, in request order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub outcomes: Vec<(TargetRef, TargetOutcome)>,
    pub processing_time_ms: u64,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, target: &TargetRef) -> Option<&TargetOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, outcome)| outcome)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&TargetRef, &Vec<MatchResult>)> {
        self.outcomes
            .iter()
            .filter_map(|(t, o)| o.as_ref().ok().map(|r| (t, r)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&TargetRef, &MatchError)> {
        self.outcomes
            .iter()
            .filter_map(|(t, o)| o.as_ref().err().map(|e| (t, e)))
    }

    /// `Some` when at least one target failed.
    pub fn partial_failure(&self) -> Option<BatchPartialFailure> {
        let failures: Vec<(TargetRef, MatchError)> = self
            .failed()
            .map(|(t, e)| (t.clone(), e.clone()))
            .collect();
        if failures.is_empty() {
            return None;
        }
        Some(BatchPartialFailure {
            succeeded: self.len() - failures.len(),
            failures,
        })
    }
}

/// Failed targets of a batch that otherwise completed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPartialFailure {
    pub succeeded: usize,
    pub failures: Vec<(TargetRef, MatchError)>,
}

impl fmt::Display for BatchPartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} targets failed",
            self.failures.len(),
            self.failures.len() + self.succeeded
        )
    }
}

impl std::error::Error for BatchPartialFailure {}

/// Fans `find_best_matches` out over many targets behind a semaphore.
#[derive(Clone)]
pub struct BatchCoordinator {
    orchestrator: Arc<MatchingOrchestrator>,
}

impl BatchCoordinator {
    pub fn new(orchestrator: Arc<MatchingOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn batch_match(&self, request: BatchRequest) -> BatchResult {
        self.batch_match_with_cancel(request, &CancelToken::new()).await
    }

    /// Like [`batch_match`](Self::batch_match), but stops scheduling and
    /// interrupts in-flight targets once `cancel` fires. Targets that did
    /// not finish are reported as `Cancelled`.
    pub async fn batch_match_with_cancel(
        &self,
        request: BatchRequest,
        cancel: &CancelToken,
    ) -> BatchResult {
        let started = Instant::now();
        let BatchRequest {
            targets,
            params,
            max_concurrent,
        } = request;

        let mut seen = HashSet::new();
        let targets: Vec<TargetRef> = targets
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();

        let params = Arc::new(params);
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let slots: Arc<DashMap<TargetRef, TargetOutcome>> = Arc::new(DashMap::new());
        let mut tasks = JoinSet::new();

        for target in &targets {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let orchestrator = Arc::clone(&self.orchestrator);
            let params = Arc::clone(&params);
            let slots = Arc::clone(&slots);
            let cancel = cancel.clone();
            let target = target.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(MatchError::Cancelled),
                    outcome = orchestrator.find_best_matches(&target, &params) => outcome,
                };
                slots.insert(target, outcome);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                tracing::error!(error = %err, "batch worker task failed");
            }
        }

        let cancelled = cancel.is_cancelled();
        let outcomes: Vec<(TargetRef, TargetOutcome)> = targets
            .into_iter()
            .map(|target| {
                let outcome = match slots.remove(&target) {
                    Some((_, outcome)) => outcome,
                    None if cancelled => Err(MatchError::Cancelled),
                    None => Err(MatchError::Internal(format!(
                        "no outcome recorded for {target}"
                    ))),
                };
                (target, outcome)
            })
            .collect();

        let result = BatchResult {
            outcomes,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            targets = result.len(),
            succeeded = result.succeeded().count(),
            failed = result.failed().count(),
            cancelled,
            elapsed_ms = result.processing_time_ms,
            "batch match finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str) -> TargetRef {
        TargetRef::job(id)
    }

    #[test]
    fn partial_failure_summarises_failed_targets() {
        let result = BatchResult {
            outcomes: vec![
                (target("a"), Ok(Vec::new())),
                (target("b"), Err(MatchError::Cancelled)),
                (target("c"), Ok(Vec::new())),
            ],
            processing_time_ms: 3,
        };
        assert_eq!(result.succeeded().count(), 2);
        let failure = result.partial_failure().unwrap();
        assert_eq!(failure.succeeded, 2);
        assert_eq!(failure.failures, vec![(target("b"), MatchError::Cancelled)]);
        assert_eq!(failure.to_string(), "1 of 3 targets failed");
        assert!(result.get(&target("b")).unwrap().is_err());
        assert!(result.get(&target("z")).is_none());
    }

    #[test]
    fn clean_batch_has_no_partial_failure() {
        let result = BatchResult {
            outcomes: vec![(target("a"), Ok(Vec::new()))],
            processing_time_ms: 0,
        };
        assert!(result.partial_failure().is_none());
    }

    #[tokio::test]
    async fn cancel_token_wakes_waiters() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        token.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());
    }
}
