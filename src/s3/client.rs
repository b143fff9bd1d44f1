//! AWS SDK backed storage adapter

use super::credentials::static_credentials;
use super::{
    CompletedPart, CompletedUpload, CreateMultipartUpload, CreatedUpload, Part, PartsPage,
    PresignedUrl, PutObjectOptions, StorageAdapter, StorageError,
};
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region, RequestChecksumCalculation};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::{PresignedRequest, PresigningConfig};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, ObjectCannedAcl};
use aws_sdk_s3::Client;
use hyper::Uri;
use std::time::Duration;

/// Storage adapter over `aws_sdk_s3::Client`
///
/// The client is cheap to clone and safe to share between concurrent
/// requests; one adapter is built at startup and injected into the handlers.
#[derive(Debug, Clone)]
pub struct S3Adapter {
    client: Client,
    bucket: String,
    root: Option<String>,
    temporary_url: Option<Uri>,
}

impl S3Adapter {
    /// Build an adapter from the storage configuration
    ///
    /// Static keys from the config are used when present; otherwise the SDK's
    /// default credential chain applies.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        let credentials =
            static_credentials(config.access_key.as_deref(), config.secret_key.as_deref())
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;
        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(credentials);
        }

        if let Some(ref endpoint) = config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            // Presigned URLs must not pin a checksum of the empty placeholder body
            .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
            .build();

        Self::new(Client::from_conf(s3_config), config)
    }

    /// Wrap an existing SDK client
    pub fn new(client: Client, config: &StorageConfig) -> Result<Self, StorageError> {
        let temporary_url = match config.temporary_url {
            Some(ref base) => Some(base.parse::<Uri>().map_err(|e| {
                StorageError::ConfigError(format!("Invalid temporary_url '{}': {}", base, e))
            })?),
            None => None,
        };

        let root = config
            .root
            .as_deref()
            .map(|root| root.trim_matches('/'))
            .filter(|root| !root.is_empty())
            .map(str::to_string);

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            root,
            temporary_url,
        })
    }

    /// Object key as stored at the provider
    pub fn path(&self, key: &str) -> String {
        match self.root {
            Some(ref root) => format!("{}/{}", root, key.trim_start_matches('/')),
            None => key.to_string(),
        }
    }

    /// Replace scheme and authority of a generated URL with `temporary_url`
    fn replace_base_url(&self, url: &str) -> Result<String, StorageError> {
        let Some(ref base) = self.temporary_url else {
            return Ok(url.to_string());
        };

        let uri: Uri = url
            .parse()
            .map_err(|e| StorageError::Presign(format!("Generated URL is invalid: {}", e)))?;
        let mut parts = uri.into_parts();
        parts.scheme = base.scheme().cloned();
        parts.authority = base.authority().cloned();

        Uri::from_parts(parts)
            .map(|uri| uri.to_string())
            .map_err(|e| StorageError::Presign(format!("Cannot apply temporary_url: {}", e)))
    }

    fn presigned_url(&self, request: PresignedRequest) -> Result<PresignedUrl, StorageError> {
        Ok(PresignedUrl {
            url: self.replace_base_url(request.uri())?,
            method: request.method().to_string(),
            headers: request
                .headers()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        })
    }
}

fn presigning_config(expires_in: Duration) -> Result<PresigningConfig, StorageError> {
    PresigningConfig::expires_in(expires_in)
        .map_err(|e| StorageError::Presign(format!("invalid presign config: {}", e)))
}

/// Presigning never reaches the provider; its failures are local signing errors
fn presign_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    StorageError::Presign(format!(
        "{} presign failed: {}",
        operation,
        DisplayErrorContext(&err)
    ))
}

/// Map an SDK failure to a provider error, keeping the provider's error code
fn provider_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err
        .as_service_error()
        .and_then(|service| service.code())
        .map(str::to_string);
    tracing::warn!(
        operation = operation,
        code = ?code,
        error = %DisplayErrorContext(&err),
        "Storage provider call failed"
    );
    StorageError::Provider {
        operation,
        code,
        message: DisplayErrorContext(&err).to_string(),
    }
}

#[async_trait]
impl StorageAdapter for S3Adapter {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[tracing::instrument(
        name = "s3.presign_put_object",
        skip(self, options),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %key,
            http.method = "PUT",
            presign.expires_in = expires_in.as_secs()
        ),
        err
    )]
    async fn temporary_upload_url(
        &self,
        key: &str,
        expires_in: Duration,
        options: &PutObjectOptions,
    ) -> Result<PresignedUrl, StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.path(key))
            .content_type(&options.content_type);

        for (name, value) in &options.metadata {
            request = request.metadata(name, value);
        }

        if let Some(ref acl) = options.acl {
            request = request.acl(ObjectCannedAcl::from(acl.as_str()));
        }

        let presigned = request
            .presigned(presigning_config(expires_in)?)
            .await
            .map_err(|e| presign_error("PutObject", e))?;

        self.presigned_url(presigned)
    }

    #[tracing::instrument(
        name = "s3.presign_upload_part",
        skip(self),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            s3.part_number = part_number,
            presign.expires_in = expires_in.as_secs()
        ),
        err
    )]
    async fn temporary_upload_part_url(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> Result<PresignedUrl, StorageError> {
        let presigned = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(self.path(key))
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from_static(b""))
            .presigned(presigning_config(expires_in)?)
            .await
            .map_err(|e| presign_error("UploadPart", e))?;

        self.presigned_url(presigned)
    }

    #[tracing::instrument(
        name = "s3.create_multipart_upload",
        skip(self, request),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %request.key,
            http.method = "POST",
            s3.upload_id = tracing::field::Empty
        ),
        err
    )]
    async fn create_multipart_upload(
        &self,
        request: &CreateMultipartUpload,
    ) -> Result<CreatedUpload, StorageError> {
        let mut builder = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(self.path(&request.key))
            .content_type(&request.content_type);

        for (name, value) in &request.metadata {
            builder = builder.metadata(name, value);
        }

        if let Some(ref acl) = request.acl {
            builder = builder.acl(ObjectCannedAcl::from(acl.as_str()));
        }

        let output = builder
            .send()
            .await
            .map_err(|e| provider_error("CreateMultipartUpload", e))?;

        let upload_id = output
            .upload_id()
            .ok_or(StorageError::MissingField {
                operation: "CreateMultipartUpload",
                field: "UploadId",
            })?
            .to_string();

        tracing::Span::current().record("s3.upload_id", upload_id.as_str());
        tracing::info!(upload_id = %upload_id, "CreateMultipartUpload completed");

        Ok(CreatedUpload {
            key: request.key.clone(),
            upload_id,
        })
    }

    #[tracing::instrument(
        name = "s3.list_parts",
        skip(self),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            http.method = "GET"
        ),
        err
    )]
    async fn list_parts(
        &self,
        key: &str,
        upload_id: &str,
        part_number_marker: Option<String>,
    ) -> Result<PartsPage, StorageError> {
        let output = self
            .client
            .list_parts()
            .bucket(&self.bucket)
            .key(self.path(key))
            .upload_id(upload_id)
            .set_part_number_marker(part_number_marker)
            .send()
            .await
            .map_err(|e| provider_error("ListParts", e))?;

        let parts = output
            .parts()
            .iter()
            .map(|part| Part {
                part_number: part.part_number().unwrap_or_default(),
                etag: part.e_tag().unwrap_or_default().to_string(),
                size: part.size().unwrap_or_default(),
            })
            .collect();

        Ok(PartsPage {
            parts,
            is_truncated: output.is_truncated().unwrap_or(false),
            next_part_number_marker: output.next_part_number_marker().map(str::to_string),
        })
    }

    #[tracing::instrument(
        name = "s3.complete_multipart_upload",
        skip(self, parts),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            http.method = "POST",
            parts_count = parts.len()
        ),
        err
    )]
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<CompletedUpload, StorageError> {
        let completed = parts
            .iter()
            .map(|part| {
                aws_sdk_s3::types::CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(&part.etag)
                    .build()
            })
            .collect();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(self.path(key))
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| provider_error("CompleteMultipartUpload", e))?;

        tracing::info!(parts = parts.len(), "CompleteMultipartUpload completed");

        Ok(CompletedUpload {
            location: output.location().map(str::to_string),
        })
    }

    #[tracing::instrument(
        name = "s3.abort_multipart_upload",
        skip(self),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %key,
            s3.upload_id = %upload_id,
            http.method = "DELETE"
        ),
        err
    )]
    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(self.path(key))
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| provider_error("AbortMultipartUpload", e))?;

        Ok(())
    }
}
