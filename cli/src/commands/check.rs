//! Check command: intake only, nothing is sent.

use anyhow::Result;
use kbase_business::UploadTracker;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::cli::CheckArgs;
use crate::commands::upload::{intake_policy, select_files};
use crate::output::Output;

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Type")]
    mime_type: String,
    #[tabled(rename = "Result")]
    result: String,
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    } else {
        s.to_owned()
    }
}

/// Returns the number of rejected files.
#[instrument(skip_all, name = "check", fields(files = args.files.len()))]
pub fn run_check(args: &CheckArgs, out: &Output) -> Result<usize> {
    let policy = intake_policy(&args.intake);
    let mut tracker = UploadTracker::new();
    let report = select_files(&args.files, &policy, &mut tracker);

    let mut rows: Vec<CheckRow> = tracker
        .items()
        .iter()
        .map(|item| CheckRow {
            file: truncate(&item.file_name, 40),
            size: item.size_label.clone(),
            mime_type: item.mime_type.clone(),
            result: "ok".to_owned(),
        })
        .collect();
    rows.extend(report.rejected.iter().map(|rejection| CheckRow {
        file: truncate(&rejection.file_name, 40),
        size: String::new(),
        mime_type: String::new(),
        result: rejection.error.to_string(),
    }));

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    out.print(table.to_string());
    out.newline();
    out.dim(format!(
        "Allowed: {}; limit {}",
        policy.allowed_label(),
        kbase_business::format_size(policy.max_file_size)
    ));

    if report.rejected.is_empty() {
        out.success(format!("{} file(s) ready to upload", tracker.len()));
    } else {
        out.warning(format!(
            "{} accepted, {} rejected",
            tracker.len(),
            report.rejected.len()
        ));
    }
    Ok(report.rejected.len())
}
