//! Tracked upload items and the patches that mutate them.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Opaque, locally generated tracking key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(Arc<str>);

impl ItemId {
    pub fn generate() -> Self {
        Self(Arc::from(uuid::Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

/// Where the bytes of a selected file live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// A file on the local filesystem, streamed at transfer time.
    Path(PathBuf),
    /// An in-memory payload (clipboard, generated content, tests).
    Memory(Arc<[u8]>),
}

/// Status of a tracked upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UploadStatus {
    #[default]
    Pending,
    Creating,
    Uploading,
    Acknowledging,
    Completed,
    Error,
}

impl UploadStatus {
    /// `Completed` and `Error` end the pipeline.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// A remote step is running for the item.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Creating | Self::Uploading | Self::Acknowledging)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Creating => "creating",
            Self::Uploading => "uploading",
            Self::Acknowledging => "acknowledging",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One file selected for upload.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: ItemId,
    pub file: FileSource,
    pub file_name: String,
    pub size: u64,
    pub size_label: String,
    /// Lowercased extension including the leading dot, e.g. `.pdf`.
    pub extension: String,
    pub mime_type: String,
    pub status: UploadStatus,
    pub progress: u8,
    pub error_message: Option<String>,
    pub remote_file_id: Option<String>,
    pub upload_target: Option<String>,
    pub(crate) cancel: CancellationToken,
}

impl UploadItem {
    pub(crate) fn new(
        file: FileSource,
        file_name: String,
        size: u64,
        extension: String,
        mime_type: String,
    ) -> Self {
        Self {
            id: ItemId::generate(),
            file,
            file_name,
            size,
            size_label: format_size(size),
            extension,
            mime_type,
            status: UploadStatus::Pending,
            progress: 0,
            error_message: None,
            remote_file_id: None,
            upload_target: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelled when the item is removed from the tracker.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Merge a patch into the item.
    ///
    /// Progress never decreases within a step: a lower value is only taken
    /// when the patch also moves the item into a new status. The remote id
    /// and upload target are written once and ignored afterwards. Once the
    /// item is `Completed` or `Error`, patches are ignored.
    pub fn apply(&mut self, patch: ItemPatch) {
        if self.status.is_terminal() {
            log::trace!("Ignoring patch for finished item {}", self.id);
            return;
        }

        let status_changed = match patch.status {
            Some(status) if status != self.status => {
                self.status = status;
                true
            }
            _ => false,
        };

        if let Some(progress) = patch.progress {
            let progress = progress.min(100);
            if status_changed || progress >= self.progress {
                self.progress = progress;
            }
        }

        if self.status == UploadStatus::Error {
            if let Some(message) = patch.error_message {
                self.error_message = Some(message);
            }
        } else {
            self.error_message = None;
        }

        if self.remote_file_id.is_none()
            && let Some((remote_id, target)) = patch.remote
        {
            self.remote_file_id = Some(remote_id);
            self.upload_target = Some(target);
        }
    }
}

/// Partial update for an [`UploadItem`], merged by [`UploadItem::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub status: Option<UploadStatus>,
    pub progress: Option<u8>,
    pub error_message: Option<String>,
    /// Remote record id and upload target, always set as a pair.
    pub remote: Option<(String, String)>,
}

impl ItemPatch {
    /// Enter a new status with the given progress.
    pub fn enter(status: UploadStatus, progress: u8) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(UploadStatus::Error),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_remote(mut self, remote_file_id: String, upload_target: String) -> Self {
        self.remote = Some((remote_file_id, upload_target));
        self
    }
}

/// Human-readable byte size, as shown next to each selected file.
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let value = bytes as f64;
    if bytes < 1024 {
        format!("{bytes} B")
    } else if value < KIB * KIB {
        format!("{:.1} KB", value / KIB)
    } else if value < KIB * KIB * KIB {
        format!("{:.1} MB", value / (KIB * KIB))
    } else {
        format!("{:.2} GB", value / (KIB * KIB * KIB))
    }
}
