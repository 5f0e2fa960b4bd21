//! Styled terminal output.

use std::fmt::Display;

use console::{Term, style};
use kbase_business::{BatchOutcome, BatchReport, IntakeRejection, UploadStatus, UploadTracker};

/// Writes styled lines to stdout. Write errors (closed pipe) are ignored.
pub struct Output {
    term: Term,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }

    fn line(&self, text: &str) {
        drop(self.term.write_line(text));
    }

    pub fn success(&self, message: impl Display) {
        self.line(&format!("{} {message}", style("✓").green().bold()));
    }

    pub fn error(&self, message: impl Display) {
        self.line(&format!("{} {message}", style("✗").red().bold()));
    }

    pub fn warning(&self, message: impl Display) {
        self.line(&format!("{} {message}", style("⚠").yellow().bold()));
    }

    pub fn info(&self, message: impl Display) {
        self.line(&format!("{} {message}", style("ℹ").blue().bold()));
    }

    pub fn print(&self, message: impl Display) {
        self.line(&message.to_string());
    }

    pub fn newline(&self) {
        self.line("");
    }

    pub fn dim(&self, message: impl Display) {
        self.line(&style(message).dim().to_string());
    }

    /// One line per file refused at intake.
    pub fn rejections(&self, rejected: &[IntakeRejection]) {
        for rejection in rejected {
            self.error(format!(
                "{}: {}",
                style(&rejection.file_name).bold(),
                rejection.error
            ));
        }
    }

    /// Final per-file lines plus a one-line batch verdict.
    pub fn batch_summary(&self, tracker: &UploadTracker, report: &BatchReport) {
        for item in tracker.items() {
            match item.status {
                UploadStatus::Completed => {
                    self.success(format!("{} ({})", item.file_name, style(&item.size_label).dim()));
                }
                UploadStatus::Error => self.error(format!(
                    "{}: {}",
                    item.file_name,
                    item.error_message.as_deref().unwrap_or("unknown error")
                )),
                status => self.dim(format!("  {} [{status}]", item.file_name)),
            }
        }

        self.newline();
        match &report.outcome {
            BatchOutcome::Success => self.success(format!(
                "Uploaded {} file(s) successfully",
                report.completed.len()
            )),
            BatchOutcome::PartialFailure => self.warning(format!(
                "{} uploaded, {} failed",
                report.completed.len(),
                report.failed.len()
            )),
            BatchOutcome::Interrupted => self.warning(format!(
                "Interrupted: {} uploaded, {} not finished",
                report.completed.len(),
                report.interrupted.len()
            )),
            BatchOutcome::Failed(message) => self.error(format!("Upload failed: {message}")),
            BatchOutcome::Empty => self.dim("Nothing was uploaded."),
        }

        if !report.cancelled.is_empty() {
            self.dim(format!("{} upload(s) cancelled", report.cancelled.len()));
        }
    }
}
