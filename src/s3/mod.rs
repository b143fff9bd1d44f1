//! Storage adapter module
//!
//! Defines the [`StorageAdapter`] capability the upload handlers depend on and
//! its AWS SDK backed implementation, [`S3Adapter`].
//!
//! # Operations
//!
//! | Operation | Span Name | Provider call |
//! |-----------|-----------|---------------|
//! | Presign PUT | `s3.presign_put_object` | none (local signing) |
//! | Presign part | `s3.presign_upload_part` | none (local signing) |
//! | Create | `s3.create_multipart_upload` | CreateMultipartUpload |
//! | List parts | `s3.list_parts` | ListParts (one page) |
//! | Complete | `s3.complete_multipart_upload` | CompleteMultipartUpload |
//! | Abort | `s3.abort_multipart_upload` | AbortMultipartUpload |
//!
//! Any backend able to produce S3-compatible presigned URLs can implement the
//! trait; handlers never see the SDK types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

mod client;
pub mod credentials;

pub use client::S3Adapter;

/// Object metadata, already encoded for the provider
pub type Metadata = BTreeMap<String, String>;

/// Storage adapter errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{operation} failed: {message}")]
    Provider {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },

    #[error("{operation} response is missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("Presign error: {0}")]
    Presign(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Provider error code (e.g. `NoSuchUpload`), when the provider sent one
    pub fn code(&self) -> Option<&str> {
        match self {
            StorageError::Provider { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// A presigned request the client performs directly against the provider
#[derive(Debug, Clone, PartialEq)]
pub struct PresignedUrl {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
}

/// Options signed into a single-request PUT upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutObjectOptions {
    pub content_type: String,
    pub metadata: Metadata,
    pub acl: Option<String>,
}

/// Parameters for starting a multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMultipartUpload {
    pub key: String,
    pub content_type: String,
    pub metadata: Metadata,
    pub acl: Option<String>,
}

/// Result of starting a multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedUpload {
    pub key: String,
    pub upload_id: String,
}

/// An uploaded part as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(rename = "PartNumber")]
    pub part_number: i32,
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(rename = "Size")]
    pub size: i64,
}

/// One page of a ListParts listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartsPage {
    pub parts: Vec<Part>,
    pub is_truncated: bool,
    pub next_part_number_marker: Option<String>,
}

/// A part reported by the client when completing an upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: i32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Result of completing a multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedUpload {
    pub location: Option<String>,
}

/// Upload-signing capability over an S3-compatible object store
///
/// Keys passed in are client-facing keys; implementations apply any
/// configured key prefix themselves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Bucket this adapter signs uploads for
    fn bucket(&self) -> &str;

    /// Presign a single-request PUT upload of `key`
    async fn temporary_upload_url(
        &self,
        key: &str,
        expires_in: Duration,
        options: &PutObjectOptions,
    ) -> Result<PresignedUrl, StorageError>;

    /// Presign the upload of one part of an in-progress multipart upload
    async fn temporary_upload_part_url(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError>;

    /// Start a multipart upload
    async fn create_multipart_upload(
        &self,
        request: &CreateMultipartUpload,
    ) -> Result<CreatedUpload, StorageError>;

    /// Fetch one page of uploaded parts, starting after `part_number_marker`
    async fn list_parts(
        &self,
        key: &str,
        upload_id: &str,
        part_number_marker: Option<String>,
    ) -> Result<PartsPage, StorageError>;

    /// Combine the given parts into the final object
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<CompletedUpload, StorageError>;

    /// Cancel a multipart upload and discard its parts
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str)
        -> Result<(), StorageError>;
}
