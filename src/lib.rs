//! S3 Upload Signer Library
//!
//! Signs direct and multipart uploads to S3-compatible storage for the Uppy
//! browser uploader. File bytes never pass through this service: it hands out
//! presigned URLs and drives the multipart lifecycle (create, list, complete,
//! abort) on the client's behalf.
//!
//! # Features
//!
//! - **Direct uploads**: presigned `PUT` URLs with content type and metadata
//! - **Multipart uploads**: per-part and batch signing, paginated part listing
//! - **Pluggable storage**: handlers depend on the [`s3::StorageAdapter`] trait
//! - **Uppy compatible**: request and response shapes match the AWS S3 plugin
//!
//! # Example
//!
//! ```no_run
//! use s3_upload_signer::{config::Config, s3::S3Adapter, server::Server};
//! use s3_upload_signer::upload::{UploadHandler, UploadSettings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let adapter = S3Adapter::from_config(&config.storage).await?;
//!     let handler = UploadHandler::new(Arc::new(adapter), UploadSettings::from(&config.upload));
//!     Server::new(&config, handler).await?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod router;
pub mod s3;
pub mod server;
pub mod upload;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use s3::{S3Adapter, StorageAdapter};
pub use server::Server;
pub use upload::UploadHandler;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
