//! File intake: turns a local selection into tracked, pending upload items.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{IntakePolicy, normalize_extension};
use crate::error::IntakeError;
use crate::item::{FileSource, ItemId, UploadItem, format_size};
use crate::tracker::UploadTracker;

/// A file picked by the user, before validation.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub file_name: String,
    pub size: u64,
    pub source: FileSource,
}

impl LocalFile {
    /// Describe a file on disk. Size comes from filesystem metadata.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, IntakeError> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| IntakeError::Unreadable(format!("{} has no file name", path.display())))?;

        let metadata = std::fs::metadata(&path)
            .map_err(|e| IntakeError::Unreadable(format!("{}: {e}", path.display())))?;
        if !metadata.is_file() {
            return Err(IntakeError::Unreadable(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        Ok(Self {
            file_name,
            size: metadata.len(),
            source: FileSource::Path(path),
        })
    }

    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            file_name: file_name.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Lowercased extension with a leading dot, empty if the name has none.
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| normalize_extension(&ext.to_string_lossy()))
            .unwrap_or_default()
    }
}

/// A file refused at intake, with the reason shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeRejection {
    pub file_name: String,
    pub error: IntakeError,
}

/// Outcome of one intake call.
#[derive(Debug, Default)]
pub struct IntakeReport {
    pub accepted: Vec<ItemId>,
    pub rejected: Vec<IntakeRejection>,
}

/// Validate one file against the policy.
///
/// The extension is checked first; the size ceiling applies whatever the
/// extension.
pub fn validate(file: &LocalFile, policy: &IntakePolicy) -> Result<(), IntakeError> {
    let extension = file.extension();
    if !policy.allows_extension(&extension) {
        return Err(IntakeError::UnsupportedExtension {
            extension: if extension.is_empty() {
                "(none)".to_owned()
            } else {
                extension
            },
            allowed: policy.allowed_label(),
        });
    }

    if file.size > policy.max_file_size {
        return Err(IntakeError::FileTooLarge {
            size: file.size,
            size_label: format_size(file.size),
            limit_label: format_size(policy.max_file_size),
        });
    }

    Ok(())
}

/// Validate every file independently and append one pending item per
/// accepted file. No network activity happens here.
///
/// The selection is consumed, so the caller starts from an empty selection
/// afterwards and may pick the same file again.
pub fn intake(
    files: Vec<LocalFile>,
    policy: &IntakePolicy,
    tracker: &mut UploadTracker,
) -> IntakeReport {
    let mut report = IntakeReport::default();

    for file in files {
        if let Err(error) = validate(&file, policy) {
            log::debug!("Rejected {}: {error}", file.file_name);
            report.rejected.push(IntakeRejection {
                file_name: file.file_name,
                error,
            });
            continue;
        }

        let extension = file.extension();
        let mime_type = mime_guess::from_path(&file.file_name)
            .first_or_octet_stream()
            .to_string();
        let item = UploadItem::new(file.source, file.file_name, file.size, extension, mime_type);
        report.accepted.push(tracker.push(item));
    }

    tracing::debug!(
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        "Intake finished"
    );
    report
}
