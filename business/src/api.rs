//! Knowledge-file backend contracts.
//!
//! The upload pipeline talks to three endpoints: register a file record,
//! write the bytes to the presigned target it returns, then acknowledge the
//! upload. [`KnowledgeApi`] is the seam the executor is written against;
//! [`HttpKnowledgeApi`] is the production implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt as _, TryStreamExt as _, stream};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::BusinessConfig;
use crate::error::ApiError;
use crate::http::{Client, HttpError, Method};
use crate::item::FileSource;

/// Chunk size used when streaming in-memory payloads.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Body of the create-file-record call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateFileRecord {
    #[serde(skip)]
    pub knowledge_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub is_active: bool,
}

/// A registered file record and its single-use write destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: String,
    pub upload_url: String,
    pub method: Method,
}

/// Bytes to write to a presigned target.
#[derive(Debug, Clone)]
pub struct TransferPayload {
    pub source: FileSource,
    pub size: u64,
    pub mime_type: String,
}

/// Called with the cumulative number of bytes handed to the transport.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

#[async_trait]
pub trait KnowledgeApi: Send + Sync {
    /// Register the intended upload and obtain its write destination.
    async fn create_file_record(&self, request: &CreateFileRecord) -> Result<RemoteRecord, ApiError>;

    /// Write the raw bytes to the record's upload target.
    async fn transfer(
        &self,
        record: &RemoteRecord,
        payload: TransferPayload,
        on_progress: ProgressFn,
    ) -> Result<(), ApiError>;

    /// Tell the backend the bytes are in place.
    async fn acknowledge(&self, record_id: &str, confirmed_size: u64) -> Result<(), ApiError>;

    /// Remove a record whose upload did not finish.
    async fn delete_file_record(&self, record_id: &str) -> Result<(), ApiError>;
}

#[derive(Deserialize)]
struct CreateFileRecordResponse {
    id: String,
    upload_url: String,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Serialize)]
struct AcknowledgeRequest {
    file_size: u64,
}

/// [`KnowledgeApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpKnowledgeApi {
    client: Client,
    api_url: String,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpKnowledgeApi {
    pub fn new(config: &BusinessConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url(),
            token: config.token.clone(),
            timeout: config.request_timeout,
        }
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_elapsed| ApiError::Timeout(limit.as_secs()))?,
            None => fut.await,
        }
    }
}

#[async_trait]
impl KnowledgeApi for HttpKnowledgeApi {
    #[tracing::instrument(skip_all, fields(file_name = %request.file_name, size = request.file_size))]
    async fn create_file_record(&self, request: &CreateFileRecord) -> Result<RemoteRecord, ApiError> {
        let url = format!("{}/v1/knowledge/{}/files", self.api_url, request.knowledge_id);
        let builder = self
            .client
            .post(&url)
            .bearer(self.token.as_deref())
            .json(request)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let response = self.with_timeout(async { builder.send().await.map_err(ApiError::from) }).await?;
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }

        let created: CreateFileRecordResponse = response
            .json()
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let method = match created.method.as_deref() {
            None => Method::Put,
            Some(name) => Method::parse(name).ok_or_else(|| {
                ApiError::InvalidResponse(format!("unsupported upload method \"{name}\""))
            })?,
        };

        Ok(RemoteRecord {
            id: created.id,
            upload_url: created.upload_url,
            method,
        })
    }

    #[tracing::instrument(skip_all, fields(record_id = %record.id, size = payload.size))]
    async fn transfer(
        &self,
        record: &RemoteRecord,
        payload: TransferPayload,
        on_progress: ProgressFn,
    ) -> Result<(), ApiError> {
        let body = progress_body(payload.source, on_progress).await?;

        // Presigned URLs carry their own authorization; no bearer token here.
        let builder = self
            .client
            .request(record.method, &record.upload_url)
            .header("Content-Type", payload.mime_type)
            .header("Content-Length", payload.size.to_string())
            .stream_body(body);

        let response = self.with_timeout(async { builder.send().await.map_err(ApiError::from) }).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }

    #[tracing::instrument(skip(self))]
    async fn acknowledge(&self, record_id: &str, confirmed_size: u64) -> Result<(), ApiError> {
        let url = format!("{}/v1/knowledge/files/{record_id}/complete", self.api_url);
        let builder = self
            .client
            .post(&url)
            .bearer(self.token.as_deref())
            .json(&AcknowledgeRequest {
                file_size: confirmed_size,
            })
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        let response = self.with_timeout(async { builder.send().await.map_err(ApiError::from) }).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete_file_record(&self, record_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/v1/knowledge/files/{record_id}", self.api_url);
        let builder = self.client.delete(&url).bearer(self.token.as_deref());

        let response = self.with_timeout(async { builder.send().await.map_err(ApiError::from) }).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }
}

/// Wrap a file source in a streamed body that reports bytes as they are read.
async fn progress_body(source: FileSource, on_progress: ProgressFn) -> Result<reqwest::Body, ApiError> {
    let chunks = match source {
        FileSource::Path(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| HttpError::new(format!("{}: {e}", path.display())))?;
            ReaderStream::new(file).boxed()
        }
        FileSource::Memory(bytes) => {
            let pieces: Vec<std::io::Result<Bytes>> = bytes
                .chunks(STREAM_CHUNK_SIZE)
                .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                .collect();
            stream::iter(pieces).boxed()
        }
    };

    let mut sent = 0u64;
    let counted = chunks.inspect_ok(move |chunk| {
        sent += chunk.len() as u64;
        on_progress(sent);
    });

    Ok(reqwest::Body::wrap_stream(counted))
}
