use std::time::Duration;

/// Default allow-list for knowledge documents.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".txt", ".doc", ".docx"];

/// Default per-file size ceiling: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// What to do with a metadata record whose bytes never made it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Leave the record on the backend.
    #[default]
    Keep,
    /// Issue a delete for the record after an upload or acknowledge failure.
    /// Failure of the delete itself is logged and ignored.
    DeleteBestEffort,
}

/// Validation rules applied at intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakePolicy {
    /// Lowercased extensions with a leading dot.
    pub allowed_extensions: Vec<String>,
    pub max_file_size: u64,
}

impl IntakePolicy {
    pub fn new<I, S>(allowed_extensions: I, max_file_size: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .filter(|ext| ext.len() > 1)
                .collect(),
            max_file_size,
        }
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        let extension = normalize_extension(extension);
        self.allowed_extensions.iter().any(|e| *e == extension)
    }

    pub fn allowed_label(&self) -> String {
        self.allowed_extensions.join(", ")
    }
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_EXTENSIONS.iter().copied(), DEFAULT_MAX_FILE_SIZE)
    }
}

/// `pdf`, `.PDF` and ` .pdf ` all become `.pdf`.
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().trim_start_matches('.');
    format!(".{}", trimmed.to_lowercase())
}

#[derive(Debug, Clone)]
pub struct BusinessConfig {
    pub api_base_url: String,
    /// Bearer token sent to the knowledge API (never to presigned URLs).
    pub token: Option<String>,
    pub intake: IntakePolicy,
    pub orphan_policy: OrphanPolicy,
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl BusinessConfig {
    pub fn new(base_url: String) -> Self {
        Self {
            api_base_url: base_url,
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn api_url(&self) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        if base.is_empty() {
            "/api".to_owned()
        } else {
            format!("{base}/api")
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_owned(),
            token: None,
            intake: IntakePolicy::default(),
            orphan_policy: OrphanPolicy::default(),
            request_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let config = BusinessConfig::new("https://console.example.com/".to_owned());
        assert_eq!(config.api_url(), "https://console.example.com/api");

        let config = BusinessConfig::new(String::new());
        assert_eq!(config.api_url(), "/api");
    }

    #[test]
    fn test_default_intake_policy() {
        let policy = IntakePolicy::default();
        assert_eq!(policy.max_file_size, 10 * 1024 * 1024);
        assert!(policy.allows_extension(".pdf"));
        assert!(policy.allows_extension("DOCX"));
        assert!(!policy.allows_extension(".exe"));
        assert_eq!(policy.allowed_label(), ".pdf, .txt, .doc, .docx");
    }

    #[test]
    fn test_custom_policy_normalizes() {
        let policy = IntakePolicy::new(["MD", ".Csv", "", "."], 1024);
        assert_eq!(policy.allowed_extensions, vec![".md", ".csv"]);
    }

    #[test]
    fn test_defaults_keep_orphans_and_never_time_out() {
        let config = BusinessConfig::default();
        assert_eq!(config.orphan_policy, OrphanPolicy::Keep);
        assert!(config.request_timeout.is_none());
        assert!(config.token().is_none());
    }
}
