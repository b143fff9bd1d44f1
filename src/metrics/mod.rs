//! Metrics module
//!
//! Prometheus metrics for the signing endpoints and provider calls, exposed
//! by [`server::MetricsServer`].

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Histogram,
    HistogramVec,
};

lazy_static! {
    // HTTP metrics
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "uppy_signer_requests_total",
        "Total number of signing requests",
        &["route", "status"]
    ).unwrap();

    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "uppy_signer_request_duration_seconds",
        "Request duration in seconds",
        &["route"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();

    // Signing metrics
    pub static ref SIGNED_URLS_TOTAL: CounterVec = register_counter_vec!(
        "uppy_signer_signed_urls_total",
        "Presigned URLs issued",
        &["kind"]  // "put_object" or "upload_part"
    ).unwrap();

    // Multipart metrics
    pub static ref MULTIPART_UPLOADS: CounterVec = register_counter_vec!(
        "uppy_signer_multipart_uploads_total",
        "Multipart uploads by lifecycle event",
        &["bucket", "event"]
    ).unwrap();

    pub static ref MULTIPART_PARTS: Histogram = register_histogram!(
        "uppy_signer_multipart_parts",
        "Number of parts per completed multipart upload",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 10000.0]
    ).unwrap();

    // Error metrics
    pub static ref STORAGE_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "uppy_signer_storage_errors_total",
        "Failed storage provider calls",
        &["bucket", "operation"]
    ).unwrap();
}

/// Record a finished HTTP request
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    REQUESTS_TOTAL
        .with_label_values(&[route, status.as_str()])
        .inc();
    REQUEST_DURATION
        .with_label_values(&[route])
        .observe(duration_secs);
}

/// Record issued presigned URLs
pub fn record_signed_urls(kind: &str, count: usize) {
    SIGNED_URLS_TOTAL
        .with_label_values(&[kind])
        .inc_by(count as f64);
}

pub fn record_multipart_created(bucket: &str) {
    MULTIPART_UPLOADS.with_label_values(&[bucket, "created"]).inc();
}

/// Record a completed multipart upload and its part count
pub fn record_multipart_completed(bucket: &str, parts_count: usize) {
    MULTIPART_UPLOADS
        .with_label_values(&[bucket, "completed"])
        .inc();
    MULTIPART_PARTS.observe(parts_count as f64);
}

pub fn record_multipart_aborted(bucket: &str) {
    MULTIPART_UPLOADS.with_label_values(&[bucket, "aborted"]).inc();
}

/// Record a failed provider call
pub fn record_storage_error(bucket: &str, operation: &str) {
    STORAGE_ERRORS_TOTAL
        .with_label_values(&[bucket, operation])
        .inc();
}
