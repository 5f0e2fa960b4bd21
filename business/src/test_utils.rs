//! Test utilities for the upload workflow.
//!
//! Two ways to drive the pipeline in tests:
//!
//! - [`TestContext`] starts a `wiremock` server playing both the knowledge
//!   API and the presigned storage endpoint, for end-to-end runs through
//!   [`HttpKnowledgeApi`].
//! - [`ScriptedApi`] is an in-process [`KnowledgeApi`] whose failures and
//!   stalls are scripted per file name, for orchestration edge cases.
//!
//! # Example
//!
//! ```ignore
//! let ctx = TestContext::new().await;
//! ctx.mock_file_upload("kb-1", "report.pdf", "file-1").await;
//!
//! let mut tracker = UploadTracker::new();
//! intake(vec![LocalFile::from_bytes("report.pdf", vec![1; 10])], &ctx.config.intake, &mut tracker);
//! let report = ctx.orchestrator("kb-1").run(tracker.pending_jobs(), tracker.updater()).await;
//! ```

#![cfg(all(test, not(target_arch = "wasm32")))]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

use crate::{
    ApiError, BatchObserver, BatchOrchestrator, BatchReport, BusinessConfig, CreateFileRecord,
    HttpKnowledgeApi, ItemId, KnowledgeApi, ProgressFn, RemoteRecord, TransferExecutor,
    TransferOutcome, TransferPayload, http::Method,
};

pub const TEST_TOKEN: &str = "test_token";

/// Mock server plus a config pointing at it.
pub struct TestContext {
    pub mock_server: MockServer,
    pub config: BusinessConfig,
}

impl TestContext {
    pub async fn new() -> Self {
        let mock_server = MockServer::start().await;
        let config =
            BusinessConfig::new(mock_server.uri()).with_token(Some(TEST_TOKEN.to_owned()));
        Self {
            mock_server,
            config,
        }
    }

    pub fn api(&self) -> Arc<HttpKnowledgeApi> {
        Arc::new(HttpKnowledgeApi::new(&self.config))
    }

    pub fn orchestrator(&self, knowledge_id: &str) -> BatchOrchestrator<HttpKnowledgeApi> {
        BatchOrchestrator::new(TransferExecutor::new(self.api(), knowledge_id))
    }

    pub fn storage_url(&self, record_id: &str) -> String {
        format!("{}/storage/{record_id}", self.mock_server.uri())
    }

    // =========================================================================
    // Mock endpoint helpers
    // =========================================================================

    /// Mock the create-record call for one file name.
    pub async fn mock_create(&self, knowledge_id: &str, file_name: &str, record_id: &str) {
        let response = ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": record_id,
            "upload_url": self.storage_url(record_id),
            "method": "PUT"
        }));

        Mock::given(method("POST"))
            .and(path(format!("/api/v1/knowledge/{knowledge_id}/files")))
            .and(header("Authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .and(body_partial_json(serde_json::json!({ "file_name": file_name })))
            .respond_with(response)
            .mount(&self.mock_server)
            .await;
    }

    /// Mock the create-record call failing for one file name.
    pub async fn mock_create_error(&self, knowledge_id: &str, file_name: &str, status: u16, error: &str) {
        let response = ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "error": error
        }));

        Mock::given(method("POST"))
            .and(path(format!("/api/v1/knowledge/{knowledge_id}/files")))
            .and(body_partial_json(serde_json::json!({ "file_name": file_name })))
            .respond_with(response)
            .mount(&self.mock_server)
            .await;
    }

    /// Mock the presigned storage PUT.
    pub async fn mock_storage(&self, record_id: &str, status: u16) {
        Mock::given(method("PUT"))
            .and(path(format!("/storage/{record_id}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.mock_server)
            .await;
    }

    /// Mock the acknowledge call.
    pub async fn mock_acknowledge(&self, record_id: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/api/v1/knowledge/files/{record_id}/complete")))
            .and(header("Authorization", format!("Bearer {TEST_TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({})))
            .mount(&self.mock_server)
            .await;
    }

    /// Mock all three steps succeeding for one file.
    pub async fn mock_file_upload(&self, knowledge_id: &str, file_name: &str, record_id: &str) {
        self.mock_create(knowledge_id, file_name, record_id).await;
        self.mock_storage(record_id, 200).await;
        self.mock_acknowledge(record_id, 200).await;
    }

    /// Requests received so far as `METHOD path` strings.
    pub async fn received(&self) -> Vec<String> {
        self.mock_server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| format!("{} {}", r.method, r.url.path()))
            .collect()
    }
}

/// Step at which [`ScriptedApi`] fails a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Create,
    Transfer,
    Acknowledge,
}

/// In-process API with per-file scripted behaviour.
#[derive(Default)]
pub struct ScriptedApi {
    failures: Mutex<HashMap<String, FailAt>>,
    hold_transfer: Mutex<Option<String>>,
    panic_on_create: Mutex<Option<String>>,
    released: Notify,
    calls: Mutex<Vec<String>>,
    records: Mutex<HashMap<String, String>>,
    next_id: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, file_name: &str, at: FailAt) {
        self.failures
            .lock()
            .unwrap()
            .insert(file_name.to_owned(), at);
    }

    /// Make the transfer of `file_name` wait until [`Self::release`].
    pub fn hold_transfer(&self, file_name: &str) {
        *self.hold_transfer.lock().unwrap() = Some(file_name.to_owned());
    }

    pub fn release(&self) {
        self.released.notify_one();
    }

    pub fn panic_on_create(&self, file_name: &str) {
        *self.panic_on_create.lock().unwrap() = Some(file_name.to_owned());
    }

    /// Calls so far, as `step:file_name` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, step: &str, file_name: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{step}:{file_name}"));
    }

    fn file_for(&self, record_id: &str) -> String {
        self.records
            .lock()
            .unwrap()
            .get(record_id)
            .cloned()
            .unwrap_or_default()
    }

    fn fails_at(&self, file_name: &str, at: FailAt) -> bool {
        self.failures.lock().unwrap().get(file_name) == Some(&at)
    }
}

#[async_trait]
impl KnowledgeApi for ScriptedApi {
    async fn create_file_record(&self, request: &CreateFileRecord) -> Result<RemoteRecord, ApiError> {
        self.record("create", &request.file_name);
        if self.panic_on_create.lock().unwrap().as_deref() == Some(request.file_name.as_str()) {
            panic!("create exploded");
        }
        if self.fails_at(&request.file_name, FailAt::Create) {
            return Err(ApiError::Status {
                status: 500,
                message: "database unavailable".to_owned(),
            });
        }

        let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.records
            .lock()
            .unwrap()
            .insert(id.clone(), request.file_name.clone());
        Ok(RemoteRecord {
            upload_url: format!("https://storage.test/{id}"),
            id,
            method: Method::Put,
        })
    }

    async fn transfer(
        &self,
        record: &RemoteRecord,
        payload: TransferPayload,
        on_progress: ProgressFn,
    ) -> Result<(), ApiError> {
        let file_name = self.file_for(&record.id);
        self.record("transfer", &file_name);

        on_progress(payload.size / 2);

        let held = self.hold_transfer.lock().unwrap().as_deref() == Some(file_name.as_str());
        if held {
            self.released.notified().await;
        }

        if self.fails_at(&file_name, FailAt::Transfer) {
            return Err(ApiError::Status {
                status: 403,
                message: "signature expired".to_owned(),
            });
        }
        on_progress(payload.size);
        Ok(())
    }

    async fn acknowledge(&self, record_id: &str, _confirmed_size: u64) -> Result<(), ApiError> {
        let file_name = self.file_for(record_id);
        self.record("acknowledge", &file_name);
        if self.fails_at(&file_name, FailAt::Acknowledge) {
            return Err(ApiError::Status {
                status: 502,
                message: "bad gateway".to_owned(),
            });
        }
        Ok(())
    }

    async fn delete_file_record(&self, record_id: &str) -> Result<(), ApiError> {
        let file_name = self.file_for(record_id);
        self.record("delete", &file_name);
        Ok(())
    }
}

/// Observer counting what the batch reported.
#[derive(Default)]
pub struct CountingObserver {
    pub settled: Mutex<Vec<(ItemId, TransferOutcome)>>,
    pub successes: AtomicUsize,
    pub partial_failures: AtomicUsize,
    pub interrupted: AtomicUsize,
    pub failures: Mutex<Vec<String>>,
}

impl BatchObserver for CountingObserver {
    fn on_item_settled(&self, id: &ItemId, outcome: &TransferOutcome) {
        self.settled
            .lock()
            .unwrap()
            .push((id.clone(), outcome.clone()));
    }

    fn on_success(&self, _report: &BatchReport) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_partial_failure(&self, _report: &BatchReport) {
        self.partial_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_interrupted(&self, _report: &BatchReport) {
        self.interrupted.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, message: &str) {
        self.failures.lock().unwrap().push(message.to_owned());
    }
}
