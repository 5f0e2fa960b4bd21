//! Knowledge-file upload workflow.
//!
//! Files are validated at intake, tracked as [`UploadItem`]s and sent to the
//! knowledge API one at a time: register a record, write the bytes to the
//! presigned target, acknowledge. See [`BatchOrchestrator`] for the entry
//! point.

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod intake;
pub mod item;
pub mod orchestrator;
pub mod tracker;

pub use api::{CreateFileRecord, HttpKnowledgeApi, KnowledgeApi, ProgressFn, RemoteRecord, TransferPayload};
pub use config::{BusinessConfig, IntakePolicy, OrphanPolicy};
pub use error::{ApiError, IntakeError, TransferError};
pub use executor::{StepOutput, TransferExecutor, TransferOutcome, TransferState};
pub use intake::{IntakeRejection, IntakeReport, LocalFile, intake, validate};
pub use item::{FileSource, ItemId, ItemPatch, UploadItem, UploadStatus, format_size};
pub use orchestrator::{BatchObserver, BatchOrchestrator, BatchOutcome, BatchReport, NoopObserver};
pub use tracker::{TrackerSummary, TrackerUpdater, TransferJob, UploadTracker};

#[cfg(test)]
mod test_utils;
