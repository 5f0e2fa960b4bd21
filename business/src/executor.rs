//! Per-file transfer pipeline.
//!
//! Each file goes through `Creating -> Uploading -> Acknowledging ->
//! Completed`. The sequence is expressed by [`TransferState::next`], a pure
//! transition from the current state and the result of its remote step; the
//! [`TransferExecutor`] only performs the step and publishes
//! [`TransferState::entry_patch`] for every state it enters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{Instrument as _, debug, info, info_span, warn};

use crate::api::{CreateFileRecord, KnowledgeApi, ProgressFn, RemoteRecord, TransferPayload};
use crate::config::OrphanPolicy;
use crate::error::TransferError;
use crate::item::{ItemPatch, UploadStatus};
use crate::tracker::{TrackerUpdater, TransferJob};

/// Progress published when the acknowledge step starts.
pub const ACKNOWLEDGE_PROGRESS: u8 = 90;

/// What a successful remote step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    Created(RemoteRecord),
    Uploaded,
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Creating,
    Uploading(RemoteRecord),
    Acknowledging(RemoteRecord),
    Completed(RemoteRecord),
    Failed {
        error: TransferError,
        record: Option<RemoteRecord>,
    },
}

impl TransferState {
    pub fn status(&self) -> UploadStatus {
        match self {
            Self::Creating => UploadStatus::Creating,
            Self::Uploading(_) => UploadStatus::Uploading,
            Self::Acknowledging(_) => UploadStatus::Acknowledging,
            Self::Completed(_) => UploadStatus::Completed,
            Self::Failed { .. } => UploadStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// The record created by the first step, once there is one.
    pub fn record(&self) -> Option<&RemoteRecord> {
        match self {
            Self::Creating => None,
            Self::Uploading(record) | Self::Acknowledging(record) | Self::Completed(record) => {
                Some(record)
            }
            Self::Failed { record, .. } => record.as_ref(),
        }
    }

    /// Patch describing entry into this state.
    pub fn entry_patch(&self) -> ItemPatch {
        match self {
            Self::Creating => ItemPatch::enter(UploadStatus::Creating, 0),
            Self::Uploading(record) => ItemPatch::enter(UploadStatus::Uploading, 0)
                .with_remote(record.id.clone(), record.upload_url.clone()),
            Self::Acknowledging(_) => {
                ItemPatch::enter(UploadStatus::Acknowledging, ACKNOWLEDGE_PROGRESS)
            }
            Self::Completed(_) => ItemPatch::enter(UploadStatus::Completed, 100),
            Self::Failed { error, .. } => ItemPatch::failed(error.user_message()),
        }
    }

    /// Advance on the result of the current state's step.
    ///
    /// Terminal states absorb every input. An output that does not belong to
    /// the current step is treated as a failure of that step.
    pub fn next(self, result: Result<StepOutput, TransferError>) -> Self {
        if self.is_terminal() {
            return self;
        }

        let output = match result {
            Ok(output) => output,
            Err(error) => {
                let record = self.record().cloned();
                return Self::Failed { error, record };
            }
        };

        match (self, output) {
            (Self::Creating, StepOutput::Created(record)) => Self::Uploading(record),
            (Self::Uploading(record), StepOutput::Uploaded) => Self::Acknowledging(record),
            (Self::Acknowledging(record), StepOutput::Acknowledged) => Self::Completed(record),
            (state, output) => {
                let message = format!("unexpected step result {output:?}");
                let error = match state {
                    Self::Creating => TransferError::Create(message),
                    Self::Uploading(_) => TransferError::Upload(message),
                    _ => TransferError::Acknowledge(message),
                };
                let record = state.record().cloned();
                Self::Failed { error, record }
            }
        }
    }
}

/// Final result of one file's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed { remote_file_id: String },
    Failed {
        error: TransferError,
        remote_file_id: Option<String>,
    },
    /// The item was removed from the tracker.
    Cancelled,
    /// The whole batch was aborted while the item was still tracked.
    Interrupted,
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Runs the three remote steps for one file at a time.
pub struct TransferExecutor<A: ?Sized> {
    api: Arc<A>,
    knowledge_id: String,
    orphan_policy: OrphanPolicy,
}

impl<A: KnowledgeApi + ?Sized> TransferExecutor<A> {
    pub fn new(api: Arc<A>, knowledge_id: impl Into<String>) -> Self {
        Self {
            api,
            knowledge_id: knowledge_id.into(),
            orphan_policy: OrphanPolicy::default(),
        }
    }

    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    pub fn knowledge_id(&self) -> &str {
        &self.knowledge_id
    }

    /// Drive one job to a terminal state.
    ///
    /// Step failures end up on the item; this never returns an error.
    pub async fn run(&self, job: &TransferJob, updater: &TrackerUpdater) -> TransferOutcome {
        let span = info_span!("transfer", item = %job.id, file_name = %job.file_name);
        self.run_inner(job, updater).instrument(span).await
    }

    async fn run_inner(&self, job: &TransferJob, updater: &TrackerUpdater) -> TransferOutcome {
        if job.interrupt.is_cancelled() {
            debug!("Batch interrupted, leaving item pending");
            return TransferOutcome::Interrupted;
        }
        if job.cancel.is_cancelled() {
            debug!("Skipping cancelled item");
            return TransferOutcome::Cancelled;
        }

        let mut state = TransferState::Creating;
        updater.update(&job.id, state.entry_patch());

        while !state.is_terminal() {
            let result = tokio::select! {
                biased;
                () = job.cancel.cancelled() => Err(TransferError::Cancelled),
                result = self.perform(&state, job, updater) => result,
            };
            state = state.next(result);
            debug!(status = %state.status(), "Step settled");
            updater.update(&job.id, state.entry_patch());
        }

        match state {
            TransferState::Completed(record) => {
                info!(remote_file_id = %record.id, "Upload completed");
                TransferOutcome::Completed {
                    remote_file_id: record.id,
                }
            }
            TransferState::Failed { error, record } => {
                if let Some(record) = &record {
                    self.handle_orphan(record).await;
                }
                if error == TransferError::Cancelled && job.interrupt.is_cancelled() {
                    info!("Upload interrupted");
                    TransferOutcome::Interrupted
                } else if error == TransferError::Cancelled {
                    info!("Upload cancelled");
                    TransferOutcome::Cancelled
                } else {
                    warn!(%error, "Upload failed");
                    TransferOutcome::Failed {
                        error,
                        remote_file_id: record.map(|r| r.id),
                    }
                }
            }
            // The loop only exits on a terminal state.
            _ => TransferOutcome::Cancelled,
        }
    }

    async fn perform(
        &self,
        state: &TransferState,
        job: &TransferJob,
        updater: &TrackerUpdater,
    ) -> Result<StepOutput, TransferError> {
        match state {
            TransferState::Creating => {
                let request = CreateFileRecord {
                    knowledge_id: self.knowledge_id.clone(),
                    file_name: job.file_name.clone(),
                    mime_type: job.mime_type.clone(),
                    file_size: job.size,
                    is_active: true,
                };
                self.api
                    .create_file_record(&request)
                    .await
                    .map(StepOutput::Created)
                    .map_err(|e| TransferError::Create(e.to_string()))
            }
            TransferState::Uploading(record) => {
                let payload = TransferPayload {
                    source: job.file.clone(),
                    size: job.size,
                    mime_type: job.mime_type.clone(),
                };
                self.api
                    .transfer(record, payload, progress_reporter(job, updater))
                    .await
                    .map(|()| StepOutput::Uploaded)
                    .map_err(|e| TransferError::Upload(e.to_string()))
            }
            TransferState::Acknowledging(record) => self
                .api
                .acknowledge(&record.id, job.size)
                .await
                .map(|()| StepOutput::Acknowledged)
                .map_err(|e| TransferError::Acknowledge(e.to_string())),
            TransferState::Completed(_) | TransferState::Failed { .. } => {
                Err(TransferError::Acknowledge("pipeline already finished".to_owned()))
            }
        }
    }

    async fn handle_orphan(&self, record: &RemoteRecord) {
        match self.orphan_policy {
            OrphanPolicy::Keep => {
                warn!(remote_file_id = %record.id, "Leaving orphaned file record");
            }
            OrphanPolicy::DeleteBestEffort => {
                if let Err(e) = self.api.delete_file_record(&record.id).await {
                    warn!(remote_file_id = %record.id, error = %e, "Failed to delete orphaned file record");
                } else {
                    debug!(remote_file_id = %record.id, "Deleted orphaned file record");
                }
            }
        }
    }
}

/// Translate cumulative bytes into percentage patches, only sending when the
/// percentage changes.
fn progress_reporter(job: &TransferJob, updater: &TrackerUpdater) -> ProgressFn {
    let id = job.id.clone();
    let total = job.size;
    let updater = updater.clone();
    let last = AtomicU8::new(0);

    Arc::new(move |sent: u64| {
        let percent = if total == 0 {
            100
        } else {
            (sent.min(total) * 100 / total) as u8
        };
        if last.fetch_max(percent, Ordering::Relaxed) < percent {
            updater.update(&id, ItemPatch::progress(percent));
        }
    })
}
