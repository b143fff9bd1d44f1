//! Upload handlers
//!
//! One method per endpoint of the uploader protocol. Each validates its input,
//! delegates to the injected [`StorageAdapter`] and reshapes the result into
//! the JSON payload the browser uploader expects.
//!
//! Inputs arrive as JSON objects: the parsed query string (see
//! [`crate::router::query`]) or the decoded request body.

use crate::config::UploadConfig;
use crate::metrics;
use crate::s3::{
    CreateMultipartUpload, Metadata, Part, PutObjectOptions, StorageAdapter, StorageError,
};
use crate::validation::{ValidationErrors, Validator, MAX_PART_NUMBER, MIN_PART_NUMBER};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod key;
pub mod metadata;
pub mod parts;

use key::generate_key;
use metadata::encode_metadata;
use parts::list_all_parts;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Signing behavior taken from the `upload` config section
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub expiration: Duration,
    pub allow_metadata: bool,
    pub acl: Option<String>,
}

impl From<&UploadConfig> for UploadSettings {
    fn from(config: &UploadConfig) -> Self {
        Self {
            expiration: config.expiration(),
            allow_metadata: config.allow_metadata,
            acl: config.acl.clone(),
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

/// Form fields returned with simple upload parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFields {
    pub key: String,
}

/// `GET /s3/params` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadParameters {
    pub method: String,
    pub url: String,
    pub fields: UploadFields,
    pub expires: u64,
}

/// `POST /s3/multipart` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUploadCreated {
    pub key: String,
    pub upload_id: String,
}

/// `GET /s3/multipart/{uploadId}/{partNumber}` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedPart {
    pub url: String,
    pub expires: u64,
}

/// `GET /s3/multipart/{uploadId}/batch` response
///
/// URLs are keyed by the part number as given, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSignedParts {
    pub presigned_urls: Map<String, Value>,
}

/// `POST /s3/multipart/{uploadId}/complete` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadCompleted {
    pub location: Option<String>,
}

/// Handlers for the seven upload endpoints
pub struct UploadHandler {
    adapter: Arc<dyn StorageAdapter>,
    settings: UploadSettings,
}

impl UploadHandler {
    /// Create a handler over an injected storage adapter
    pub fn new(adapter: Arc<dyn StorageAdapter>, settings: UploadSettings) -> Self {
        Self { adapter, settings }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Signed link lifetime in seconds, as reported to clients
    fn expires(&self) -> u64 {
        self.settings.expiration.as_secs()
    }

    fn record_storage_result<T>(&self, operation: &str, result: &Result<T, StorageError>) {
        if result.is_err() {
            metrics::record_storage_error(self.adapter.bucket(), operation);
        }
    }

    /// Parameters for a direct single-request upload
    ///
    /// Query: `filename`, `type`, `metadata[name]=value`.
    #[tracing::instrument(name = "upload.parameters", skip(self, query), err)]
    pub async fn upload_parameters(
        &self,
        query: &Map<String, Value>,
    ) -> Result<UploadParameters, UploadError> {
        let mut validator = Validator::new(query);
        let filename = validator.required_string("filename");
        let content_type = validator.required_string("type");
        let metadata = validator.metadata("metadata");
        validator.finish()?;

        let key = generate_key(&filename);
        let options = PutObjectOptions {
            content_type,
            metadata: if self.settings.allow_metadata {
                encode_metadata(&metadata)
            } else {
                Metadata::new()
            },
            acl: self.settings.acl.clone(),
        };

        let result = self
            .adapter
            .temporary_upload_url(&key, self.settings.expiration, &options)
            .await;
        self.record_storage_result("PutObject", &result);
        let presigned = result?;

        metrics::record_signed_urls("put_object", 1);
        tracing::info!(key = %key, "Signed direct upload");

        Ok(UploadParameters {
            method: "PUT".to_string(),
            url: presigned.url,
            fields: UploadFields { key },
            expires: self.expires(),
        })
    }

    /// Start a multipart upload
    ///
    /// Body: `filename`, `type`, `metadata` object.
    #[tracing::instrument(name = "upload.create", skip(self, body), err)]
    pub async fn create(
        &self,
        body: &Map<String, Value>,
    ) -> Result<MultipartUploadCreated, UploadError> {
        let mut validator = Validator::new(body);
        let filename = validator.required_string("filename");
        let content_type = validator.required_string("type");
        let metadata = validator.metadata("metadata");
        validator.finish()?;

        let request = CreateMultipartUpload {
            key: generate_key(&filename),
            content_type,
            metadata: encode_metadata(&metadata),
            acl: self.settings.acl.clone(),
        };

        let result = self.adapter.create_multipart_upload(&request).await;
        self.record_storage_result("CreateMultipartUpload", &result);
        let created = result?;

        metrics::record_multipart_created(self.adapter.bucket());

        Ok(MultipartUploadCreated {
            key: created.key,
            upload_id: created.upload_id,
        })
    }

    /// Every part uploaded so far
    ///
    /// Query: `key`.
    #[tracing::instrument(name = "upload.uploaded_parts", skip(self, query), err)]
    pub async fn uploaded_parts(
        &self,
        upload_id: &str,
        query: &Map<String, Value>,
    ) -> Result<Vec<Part>, UploadError> {
        let mut validator = Validator::new(query);
        let key = validator.required_string("key");
        validator.finish()?;

        let result = list_all_parts(self.adapter.as_ref(), &key, upload_id).await;
        self.record_storage_result("ListParts", &result);
        Ok(result?)
    }

    /// Signed URL for one part
    ///
    /// `part_number` is the raw path segment (digits only, enforced by the
    /// router). Query: `key`.
    #[tracing::instrument(name = "upload.sign_part", skip(self, query), err)]
    pub async fn sign_part(
        &self,
        upload_id: &str,
        part_number: &str,
        query: &Map<String, Value>,
    ) -> Result<SignedPart, UploadError> {
        let mut validator = Validator::new(query);
        let key = validator.required_string("key");
        let part_number = match part_number.parse::<i32>() {
            Ok(n) if (MIN_PART_NUMBER..=MAX_PART_NUMBER).contains(&n) => n,
            _ => {
                validator.fail(
                    "partNumber",
                    format!(
                        "The part number field must be between {} and {}.",
                        MIN_PART_NUMBER, MAX_PART_NUMBER
                    ),
                );
                0
            }
        };
        validator.finish()?;

        let result = self
            .adapter
            .temporary_upload_part_url(&key, upload_id, part_number, self.settings.expiration)
            .await;
        self.record_storage_result("UploadPart", &result);
        let presigned = result?;

        metrics::record_signed_urls("upload_part", 1);

        Ok(SignedPart {
            url: presigned.url,
            expires: self.expires(),
        })
    }

    /// Signed URLs for several parts at once
    ///
    /// Query: `key`, `partNumbers` (comma separated, e.g. `3,1,2`).
    #[tracing::instrument(name = "upload.batch_sign_parts", skip(self, query), err)]
    pub async fn batch_sign_parts(
        &self,
        upload_id: &str,
        query: &Map<String, Value>,
    ) -> Result<BatchSignedParts, UploadError> {
        let mut validator = Validator::new(query);
        let key = validator.required_string("key");
        let part_numbers = validator.part_numbers("partNumbers");
        validator.finish()?;

        let mut presigned_urls = Map::new();
        for part_number in &part_numbers {
            let result = self
                .adapter
                .temporary_upload_part_url(&key, upload_id, *part_number, self.settings.expiration)
                .await;
            self.record_storage_result("UploadPart", &result);
            presigned_urls.insert(part_number.to_string(), Value::String(result?.url));
        }

        metrics::record_signed_urls("upload_part", part_numbers.len());
        tracing::info!(parts = part_numbers.len(), "Signed part batch");

        Ok(BatchSignedParts { presigned_urls })
    }

    /// Cancel a multipart upload
    ///
    /// Query: `key`.
    #[tracing::instrument(name = "upload.abort", skip(self, query), err)]
    pub async fn abort(
        &self,
        upload_id: &str,
        query: &Map<String, Value>,
    ) -> Result<(), UploadError> {
        let mut validator = Validator::new(query);
        let key = validator.required_string("key");
        validator.finish()?;

        let result = self.adapter.abort_multipart_upload(&key, upload_id).await;
        self.record_storage_result("AbortMultipartUpload", &result);
        result?;

        metrics::record_multipart_aborted(self.adapter.bucket());
        Ok(())
    }

    /// Combine the uploaded parts into the final object
    ///
    /// Query: `key`. Body: `parts` array of `{PartNumber, ETag}`, forwarded
    /// in the given order.
    #[tracing::instrument(name = "upload.complete", skip(self, query, body), err)]
    pub async fn complete(
        &self,
        upload_id: &str,
        query: &Map<String, Value>,
        body: &Map<String, Value>,
    ) -> Result<UploadCompleted, UploadError> {
        let mut validator = Validator::new(query);
        let key = validator.required_string("key");
        validator.finish()?;

        let mut validator = Validator::new(body);
        let parts = validator.completed_parts("parts");
        validator.finish()?;

        let result = self
            .adapter
            .complete_multipart_upload(&key, upload_id, &parts)
            .await;
        self.record_storage_result("CompleteMultipartUpload", &result);
        let completed = result?;

        metrics::record_multipart_completed(self.adapter.bucket(), parts.len());

        Ok(UploadCompleted {
            location: completed.location,
        })
    }
}
