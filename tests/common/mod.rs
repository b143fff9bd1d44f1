//! Common Test Infrastructure
//!
//! Provides shared utilities for server tests:
//! - An in-memory storage adapter that records provider calls
//! - A test server bound on an OS-assigned port

#![allow(dead_code)]

use async_trait::async_trait;
use s3_upload_signer::config::{Config, ConfigLoader};
use s3_upload_signer::s3::{
    CompletedPart, CompletedUpload, CreateMultipartUpload, CreatedUpload, Part, PartsPage,
    PresignedUrl, PutObjectOptions, StorageAdapter, StorageError,
};
use s3_upload_signer::server::Server;
use s3_upload_signer::upload::{UploadHandler, UploadSettings};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub const TEST_BUCKET: &str = "test-bucket";
pub const FAKE_ENDPOINT: &str = "https://fake-s3.test";

/// Provider calls seen by [`FakeStorage`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PresignPut { key: String, content_type: String },
    PresignPart { key: String, upload_id: String, part_number: i32 },
    Create { key: String, content_type: String },
    ListParts { key: String, marker: Option<String> },
    Complete { key: String, parts: Vec<CompletedPart> },
    Abort { key: String, upload_id: String },
}

/// In-memory storage adapter
///
/// Signs URLs of the form `https://fake-s3.test/<bucket>/<key>?...` and serves
/// ListParts from canned pages.
#[derive(Default)]
pub struct FakeStorage {
    calls: Mutex<Vec<Call>>,
    pages: Vec<PartsPage>,
    failing_code: Option<String>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, pages: Vec<PartsPage>) -> Self {
        self.pages = pages;
        self
    }

    /// Fail every provider call with the given error code
    pub fn failing(mut self, code: &str) -> Self {
        self.failing_code = Some(code.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, operation: &'static str) -> Result<(), StorageError> {
        match self.failing_code {
            Some(ref code) => Err(StorageError::Provider {
                operation,
                code: Some(code.clone()),
                message: format!("{} rejected by fake storage", operation),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl StorageAdapter for FakeStorage {
    fn bucket(&self) -> &str {
        TEST_BUCKET
    }

    async fn temporary_upload_url(
        &self,
        key: &str,
        expires_in: Duration,
        options: &PutObjectOptions,
    ) -> Result<PresignedUrl, StorageError> {
        self.record(Call::PresignPut {
            key: key.to_string(),
            content_type: options.content_type.clone(),
        });
        Ok(PresignedUrl {
            url: format!(
                "{}/{}/{}?X-Amz-Expires={}",
                FAKE_ENDPOINT,
                TEST_BUCKET,
                key,
                expires_in.as_secs()
            ),
            method: "PUT".into(),
            headers: vec![],
        })
    }

    async fn temporary_upload_part_url(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError> {
        self.record(Call::PresignPart {
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            part_number,
        });
        Ok(PresignedUrl {
            url: format!(
                "{}/{}/{}?partNumber={}&uploadId={}&X-Amz-Expires={}",
                FAKE_ENDPOINT,
                TEST_BUCKET,
                key,
                part_number,
                upload_id,
                expires_in.as_secs()
            ),
            method: "PUT".into(),
            headers: vec![],
        })
    }

    async fn create_multipart_upload(
        &self,
        request: &CreateMultipartUpload,
    ) -> Result<CreatedUpload, StorageError> {
        self.record(Call::Create {
            key: request.key.clone(),
            content_type: request.content_type.clone(),
        });
        self.check("CreateMultipartUpload")?;
        Ok(CreatedUpload {
            key: request.key.clone(),
            upload_id: "fake-upload-id".into(),
        })
    }

    async fn list_parts(
        &self,
        key: &str,
        _upload_id: &str,
        part_number_marker: Option<String>,
    ) -> Result<PartsPage, StorageError> {
        let page_index = self
            .calls()
            .iter()
            .filter(|call| matches!(call, Call::ListParts { .. }))
            .count();
        self.record(Call::ListParts {
            key: key.to_string(),
            marker: part_number_marker,
        });
        self.check("ListParts")?;
        Ok(self.pages.get(page_index).cloned().unwrap_or_default())
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        _upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<CompletedUpload, StorageError> {
        self.record(Call::Complete {
            key: key.to_string(),
            parts: parts.to_vec(),
        });
        self.check("CompleteMultipartUpload")?;
        Ok(CompletedUpload {
            location: Some(format!("{}/{}/{}", FAKE_ENDPOINT, TEST_BUCKET, key)),
        })
    }

    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.record(Call::Abort {
            key: key.to_string(),
            upload_id: upload_id.to_string(),
        });
        self.check("AbortMultipartUpload")
    }
}

pub fn part(part_number: i32) -> Part {
    Part {
        part_number,
        etag: format!("\"etag-{}\"", part_number),
        size: 5 * 1024 * 1024,
    }
}

/// Minimal valid configuration bound to an OS-assigned port
pub fn test_config() -> Config {
    ConfigLoader::from_yaml(
        r#"
server:
  address: "127.0.0.1:0"
storage:
  bucket: test-bucket
  region: us-east-1
"#,
    )
    .unwrap()
}

/// Test server environment
///
/// Runs the server in the background until dropped.
pub struct TestEnv {
    pub server_addr: SocketAddr,
    pub storage: Arc<FakeStorage>,
    pub client: reqwest::Client,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with(test_config(), FakeStorage::new()).await
    }

    pub async fn with_storage(storage: FakeStorage) -> Self {
        Self::with(test_config(), storage).await
    }

    pub async fn with(config: Config, storage: FakeStorage) -> Self {
        let storage = Arc::new(storage);
        let handler = UploadHandler::new(storage.clone(), UploadSettings::from(&config.upload));
        let server = Server::new(&config, handler).await.unwrap();
        let server_addr = server.local_addr();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = server
                .run_until(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            server_addr,
            storage,
            client,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.server_addr, path)
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
