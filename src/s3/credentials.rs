//! S3 Credentials
//!
//! Resolves the credentials handed to the AWS SDK.
//!
//! Static keys from the configuration take precedence. When none are set the
//! SDK's default provider chain (environment, profile, IMDS, ...) is used, so
//! this module only has to deal with the explicit case.
//!
//! # Example
//!
//! ```
//! use s3_upload_signer::s3::credentials::static_credentials;
//!
//! let creds = static_credentials(Some("access-key"), Some("secret-key")).unwrap();
//! assert!(creds.is_some());
//! ```

use aws_credential_types::Credentials;
use thiserror::Error;

/// Name reported by the SDK for credentials coming from the config file
pub const PROVIDER_NAME: &str = "s3-upload-signer-config";

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Build static credentials from configured keys
///
/// Returns `Ok(None)` when neither key is configured, meaning the SDK default
/// chain should be used instead.
pub fn static_credentials(
    access_key: Option<&str>,
    secret_key: Option<&str>,
) -> Result<Option<Credentials>, CredentialsError> {
    match (access_key, secret_key) {
        (None, None) => Ok(None),
        (Some(access), Some(secret)) => Ok(Some(Credentials::new(
            access,
            secret,
            None,
            None,
            PROVIDER_NAME,
        ))),
        (Some(_), None) => Err(CredentialsError::MissingCredentials(
            "secret_key not set in config".into(),
        )),
        (None, Some(_)) => Err(CredentialsError::MissingCredentials(
            "access_key not set in config".into(),
        )),
    }
}
