//! Batch orchestration.
//!
//! Runs the transfer pipeline over every pending item, strictly one file at
//! a time and in selection order. A failing item never stops its siblings;
//! the batch result is only decided once the loop is over, and observers are
//! told exactly once.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt as _;
use tracing::{error, info, instrument};

use crate::api::KnowledgeApi;
use crate::error::TransferError;
use crate::executor::{TransferExecutor, TransferOutcome};
use crate::item::{ItemId, ItemPatch};
use crate::tracker::{TrackerUpdater, TransferJob, UploadTracker};

/// Aggregate result of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Nothing was uploaded (no pending items, or all of them were removed).
    Empty,
    /// Every processed item completed.
    Success,
    /// At least one item ended in error.
    PartialFailure,
    /// The batch was aborted with [`UploadTracker::cancel_all`] before every
    /// item finished.
    Interrupted,
    /// The batch loop itself broke.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub completed: Vec<ItemId>,
    pub failed: Vec<(ItemId, TransferError)>,
    pub cancelled: Vec<ItemId>,
    pub interrupted: Vec<ItemId>,
}

impl BatchReport {
    fn from_outcomes(outcomes: Vec<(ItemId, TransferOutcome)>) -> Self {
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut cancelled = Vec::new();
        let mut interrupted = Vec::new();

        for (id, outcome) in outcomes {
            match outcome {
                TransferOutcome::Completed { .. } => completed.push(id),
                TransferOutcome::Failed { error, .. } => failed.push((id, error)),
                TransferOutcome::Cancelled => cancelled.push(id),
                TransferOutcome::Interrupted => interrupted.push(id),
            }
        }

        // Removed items drop out of the verdict; interrupted ones do not.
        let outcome = if !failed.is_empty() {
            BatchOutcome::PartialFailure
        } else if !interrupted.is_empty() {
            BatchOutcome::Interrupted
        } else if completed.is_empty() {
            BatchOutcome::Empty
        } else {
            BatchOutcome::Success
        };

        Self {
            outcome,
            completed,
            failed,
            cancelled,
            interrupted,
        }
    }

    fn failed_batch(message: String) -> Self {
        Self {
            outcome: BatchOutcome::Failed(message),
            completed: Vec::new(),
            failed: Vec::new(),
            cancelled: Vec::new(),
            interrupted: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == BatchOutcome::Success
    }
}

/// Hooks for whoever presents the batch.
///
/// `on_success` is where file listings get invalidated and the view moves
/// on; it fires once per batch, never per file.
pub trait BatchObserver: Send + Sync {
    fn on_item_settled(&self, _id: &ItemId, _outcome: &TransferOutcome) {}
    fn on_success(&self, _report: &BatchReport) {}
    fn on_partial_failure(&self, _report: &BatchReport) {}
    fn on_interrupted(&self, _report: &BatchReport) {}
    fn on_failure(&self, _message: &str) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

pub struct BatchOrchestrator<A: ?Sized> {
    executor: TransferExecutor<A>,
    observer: Arc<dyn BatchObserver>,
}

impl<A: KnowledgeApi + ?Sized> BatchOrchestrator<A> {
    pub fn new(executor: TransferExecutor<A>) -> Self {
        Self {
            executor,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run the given jobs serially and report once.
    #[instrument(skip_all, name = "batch", fields(knowledge_id = self.executor.knowledge_id(), items = jobs.len()))]
    pub async fn run(&self, jobs: Vec<TransferJob>, updater: TrackerUpdater) -> BatchReport {
        let outcomes = AssertUnwindSafe(self.run_jobs(jobs, &updater))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(panic_message(&*panic)));

        let report = match outcomes {
            Ok(outcomes) => BatchReport::from_outcomes(outcomes),
            Err(message) => {
                error!(%message, "Batch aborted");
                BatchReport::failed_batch(message)
            }
        };

        match &report.outcome {
            BatchOutcome::Success => {
                info!(completed = report.completed.len(), "Batch succeeded");
                self.observer.on_success(&report);
            }
            BatchOutcome::PartialFailure => {
                info!(
                    completed = report.completed.len(),
                    failed = report.failed.len(),
                    "Batch finished with failures"
                );
                self.observer.on_partial_failure(&report);
            }
            BatchOutcome::Interrupted => {
                info!(
                    completed = report.completed.len(),
                    interrupted = report.interrupted.len(),
                    "Batch interrupted"
                );
                self.observer.on_interrupted(&report);
            }
            BatchOutcome::Failed(message) => self.observer.on_failure(message),
            BatchOutcome::Empty => info!("Nothing to upload"),
        }

        report
    }

    /// A panicking job is marked failed on the tracker and stops the loop;
    /// later jobs stay pending.
    async fn run_jobs(
        &self,
        jobs: Vec<TransferJob>,
        updater: &TrackerUpdater,
    ) -> Result<Vec<(ItemId, TransferOutcome)>, String> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let outcome = AssertUnwindSafe(self.executor.run(&job, updater))
                .catch_unwind()
                .await
                .map_err(|panic| {
                    let message = panic_message(&*panic);
                    updater.update(&job.id, ItemPatch::failed(message.clone()));
                    message
                })?;
            self.observer.on_item_settled(&job.id, &outcome);
            outcomes.push((job.id, outcome));
        }
        Ok(outcomes)
    }

    /// Run every pending item of `tracker`, applying updates as they arrive.
    ///
    /// `on_tick` is called with the synced tracker every `tick` and once more
    /// at the end. It may remove items, which are then skipped or cancelled,
    /// or call [`UploadTracker::cancel_all`] to interrupt the batch.
    pub async fn run_tracked<F>(
        &self,
        tracker: &mut UploadTracker,
        tick: Duration,
        mut on_tick: F,
    ) -> BatchReport
    where
        F: FnMut(&mut UploadTracker),
    {
        let run = self.run(tracker.pending_jobs(), tracker.updater());
        tokio::pin!(run);

        let mut ticker = tokio::time::interval(tick);
        let report = loop {
            tokio::select! {
                report = &mut run => break report,
                _ = ticker.tick() => {
                    tracker.sync();
                    on_tick(tracker);
                }
            }
        };

        tracker.sync();
        on_tick(tracker);
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unexpected error".to_owned())
}
