//! S3 Upload Signer - presigned upload endpoints for Uppy

use clap::Parser;
use s3_upload_signer::metrics::server::{MetricsServer, MetricsServerConfig};
use s3_upload_signer::upload::{UploadHandler, UploadSettings};
use s3_upload_signer::{config::Config, s3::S3Adapter, server::Server, VERSION};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// S3 Upload Signer - signs direct and multipart S3 uploads for Uppy
#[derive(Parser, Debug)]
#[command(name = "s3-upload-signer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("Starting S3 Upload Signer v{}", VERSION);

    let config = Config::load(&args.config)?;
    info!(
        path = ?args.config,
        bucket = %config.storage.bucket,
        prefix = %config.routes.prefix,
        "Loaded configuration"
    );

    let mut metrics_server = if config.metrics.enabled {
        let mut server = MetricsServer::new(MetricsServerConfig::from(&config.metrics));
        server.start().await?;
        Some(server)
    } else {
        None
    };

    let adapter = S3Adapter::from_config(&config.storage).await?;
    let handler = UploadHandler::new(Arc::new(adapter), UploadSettings::from(&config.upload));

    let server = Server::new(&config, handler).await?;
    server.run().await?;

    if let Some(server) = metrics_server.as_mut() {
        server.shutdown().await;
    }

    Ok(())
}
