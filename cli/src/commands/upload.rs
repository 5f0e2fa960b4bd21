//! Upload command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use kbase_business::{
    BatchObserver, BatchOrchestrator, BatchReport, BusinessConfig, HttpKnowledgeApi,
    IntakePolicy, IntakeRejection, IntakeReport, ItemId, LocalFile, OrphanPolicy,
    TransferExecutor, TransferOutcome, UploadTracker, intake,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cli::{IntakeArgs, UploadArgs};
use crate::output::Output;
use crate::progress::UploadProgress;

/// How often progress is pulled from the tracker.
const TICK: Duration = Duration::from_millis(100);

/// Intake policy from the command-line overrides.
pub fn intake_policy(args: &IntakeArgs) -> IntakePolicy {
    let defaults = IntakePolicy::default();
    let extensions = if args.allow_ext.is_empty() {
        defaults.allowed_extensions
    } else {
        args.allow_ext.clone()
    };
    IntakePolicy::new(extensions, args.max_size.unwrap_or(defaults.max_file_size))
}

/// Read the given paths and run them through intake.
///
/// Paths that cannot be read are reported alongside policy rejections.
pub fn select_files(
    paths: &[PathBuf],
    policy: &IntakePolicy,
    tracker: &mut UploadTracker,
) -> IntakeReport {
    let mut unreadable = Vec::new();
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match LocalFile::from_path(path) {
            Ok(file) => files.push(file),
            Err(error) => unreadable.push(IntakeRejection {
                file_name: path.display().to_string(),
                error,
            }),
        }
    }

    let mut report = intake(files, policy, tracker);
    report.rejected.extend(unreadable);
    report
}

/// Logs batch events; the CLI keeps no cached listings to refresh.
struct TracingObserver;

impl BatchObserver for TracingObserver {
    fn on_item_settled(&self, id: &ItemId, outcome: &TransferOutcome) {
        debug!(item = %id, ?outcome, "Item settled");
    }

    fn on_success(&self, report: &BatchReport) {
        info!(completed = report.completed.len(), "Knowledge base updated");
    }

    fn on_interrupted(&self, report: &BatchReport) {
        warn!(interrupted = report.interrupted.len(), "Upload interrupted");
    }
}

/// Apply the upload flags to the library configuration.
pub fn configure(mut config: BusinessConfig, args: &UploadArgs) -> BusinessConfig {
    config.intake = intake_policy(&args.intake);
    if args.cleanup_orphans {
        config.orphan_policy = OrphanPolicy::DeleteBestEffort;
    }
    config.request_timeout = args.timeout_secs.map(Duration::from_secs);
    config
}

#[instrument(skip_all, name = "upload", fields(knowledge_id = %args.knowledge, files = args.files.len()))]
pub async fn run_upload(config: BusinessConfig, args: UploadArgs, out: &Output) -> Result<BatchReport> {
    if config.token().is_none() {
        bail!("Not logged in. Run `kbase login` first.");
    }
    let config = configure(config, &args);

    let mut tracker = UploadTracker::new();
    let selection = select_files(&args.files, &config.intake, &mut tracker);
    out.rejections(&selection.rejected);
    if tracker.is_empty() {
        bail!("No valid files to upload");
    }

    let executor = TransferExecutor::new(Arc::new(HttpKnowledgeApi::new(&config)), args.knowledge.clone())
        .with_orphan_policy(config.orphan_policy);
    let orchestrator = BatchOrchestrator::new(executor).with_observer(Arc::new(TracingObserver));

    let interrupt = CancellationToken::new();
    let watcher = tokio::spawn({
        let interrupt = interrupt.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        }
    });

    out.info(format!(
        "Uploading {} file(s) to knowledge base {}",
        tracker.len(),
        args.knowledge
    ));

    let mut progress = UploadProgress::new(args.quiet)?;
    let report = orchestrator
        .run_tracked(&mut tracker, TICK, |tracker| {
            if interrupt.is_cancelled() {
                tracker.cancel_all();
            }
            progress.render(tracker);
        })
        .await;

    watcher.abort();
    progress.finish();
    out.batch_summary(&tracker, &report);
    Ok(report)
}
