//! Metadata encoding for provider requests
//!
//! S3 only carries ASCII in `x-amz-meta-*` headers. Values with any non-ASCII
//! character are sent as an RFC 2047 encoded-word (`=?UTF-8?B?<base64>?=`);
//! ASCII values pass through unchanged. Keys are header tokens already, see
//! [`crate::validation::is_header_token`].

use crate::s3::Metadata;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Encode one header word if it contains non-ASCII characters
pub fn encode_if_non_ascii(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

/// Encode every value of a validated metadata map
pub fn encode_metadata(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .map(|(key, value)| (key.clone(), encode_if_non_ascii(value)))
        .collect()
}
