//! Uploader API Router
//!
//! Maps request method and path onto one of the seven upload endpoints,
//! mounted under the configured route prefix:
//!
//! | Method | Path | Route |
//! |--------|------|-------|
//! | GET | `/{prefix}/s3/params` | [`Route::UploadParameters`] |
//! | POST | `/{prefix}/s3/multipart` | [`Route::Create`] |
//! | GET | `/{prefix}/s3/multipart/{uploadId}` | [`Route::UploadedParts`] |
//! | GET | `/{prefix}/s3/multipart/{uploadId}/batch` | [`Route::BatchSignParts`] |
//! | POST | `/{prefix}/s3/multipart/{uploadId}/complete` | [`Route::Complete`] |
//! | GET | `/{prefix}/s3/multipart/{uploadId}/{partNumber}` | [`Route::SignPart`] |
//! | DELETE | `/{prefix}/s3/multipart/{uploadId}` | [`Route::Abort`] |

use crate::config::RoutesConfig;
use hyper::Method;
use percent_encoding::percent_decode_str;
use thiserror::Error;

pub mod query;

/// Router errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    #[error("No route for path: {0}")]
    NotFound(String),

    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: &'static str,
    },
}

/// A matched endpoint with its decoded path parameters
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    UploadParameters,
    Create,
    UploadedParts { upload_id: String },
    BatchSignParts { upload_id: String },
    Complete { upload_id: String },
    SignPart { upload_id: String, part_number: String },
    Abort { upload_id: String },
}

impl Route {
    /// Operation part of the route name
    pub fn operation(&self) -> &'static str {
        match self {
            Route::UploadParameters => "uploadParameters",
            Route::Create => "create",
            Route::UploadedParts { .. } => "uploadedParts",
            Route::BatchSignParts { .. } => "batchSignParts",
            Route::Complete { .. } => "complete",
            Route::SignPart { .. } => "signPart",
            Route::Abort { .. } => "abort",
        }
    }
}

/// Route table for one prefix
#[derive(Debug, Clone)]
pub struct RouteTable {
    prefix: Vec<String>,
    name: String,
}

impl RouteTable {
    pub fn new(config: &RoutesConfig) -> Self {
        let prefix = config
            .prefix
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            prefix,
            name: config.name.clone(),
        }
    }

    /// Full route name, e.g. `uppy.signPart`
    pub fn route_name(&self, route: &Route) -> String {
        format!("{}{}", self.name, route.operation())
    }

    /// Resolve a request to a route
    pub fn match_route(&self, method: &Method, path: &str) -> Result<Route, RouterError> {
        let not_found = || RouterError::NotFound(path.to_string());
        let not_allowed = |allowed: &'static str| RouterError::MethodNotAllowed {
            method: method.to_string(),
            path: path.to_string(),
            allowed,
        };

        let trimmed = path.trim_matches('/');
        let segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        if segments.len() < self.prefix.len()
            || segments
                .iter()
                .zip(&self.prefix)
                .any(|(segment, expected)| segment != expected)
        {
            return Err(not_found());
        }

        let rest = &segments[self.prefix.len()..];
        let Some((&"s3", rest)) = rest.split_first() else {
            return Err(not_found());
        };

        match rest {
            ["params"] => match *method {
                Method::GET => Ok(Route::UploadParameters),
                _ => Err(not_allowed("GET")),
            },
            ["multipart"] => match *method {
                Method::POST => Ok(Route::Create),
                _ => Err(not_allowed("POST")),
            },
            ["multipart", upload_id] => {
                let upload_id = decode_segment(upload_id).ok_or_else(not_found)?;
                match *method {
                    Method::GET => Ok(Route::UploadedParts { upload_id }),
                    Method::DELETE => Ok(Route::Abort { upload_id }),
                    _ => Err(not_allowed("GET, DELETE")),
                }
            }
            ["multipart", upload_id, "batch"] => {
                let upload_id = decode_segment(upload_id).ok_or_else(not_found)?;
                match *method {
                    Method::GET => Ok(Route::BatchSignParts { upload_id }),
                    _ => Err(not_allowed("GET")),
                }
            }
            ["multipart", upload_id, "complete"] => {
                let upload_id = decode_segment(upload_id).ok_or_else(not_found)?;
                match *method {
                    Method::POST => Ok(Route::Complete { upload_id }),
                    _ => Err(not_allowed("POST")),
                }
            }
            ["multipart", upload_id, part_number]
                if !part_number.is_empty() && part_number.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let upload_id = decode_segment(upload_id).ok_or_else(not_found)?;
                match *method {
                    Method::GET => Ok(Route::SignPart {
                        upload_id,
                        part_number: part_number.to_string(),
                    }),
                    _ => Err(not_allowed("GET")),
                }
            }
            _ => Err(not_found()),
        }
    }
}

/// Percent-decode one path segment; empty or non UTF-8 segments do not match
fn decode_segment(segment: &str) -> Option<String> {
    let decoded = percent_decode_str(segment).decode_utf8().ok()?;
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}
