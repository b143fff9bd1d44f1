//! Route middleware
//!
//! - `trace`: one `http.request` span per request, tagged with a generated
//!   request id that is echoed back as `x-request-id`.
//! - `cors`: answers `OPTIONS` preflights and adds `Access-Control-Allow-*`
//!   headers to every response.

use crate::config::RoutesConfig;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::Method;
use tracing::Span;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const ALLOW_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const DEFAULT_ALLOW_HEADERS: &str = "Content-Type";
const MAX_AGE_SECONDS: &str = "86400";

/// Middleware enabled for the upload routes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Middleware {
    pub trace: bool,
    pub cors: bool,
}

impl From<&RoutesConfig> for Middleware {
    fn from(config: &RoutesConfig) -> Self {
        let enabled = |name: &str| config.middleware.iter().any(|m| m == name);
        Self {
            trace: enabled("trace"),
            cors: enabled("cors"),
        }
    }
}

/// Root span for one request
///
/// `route` and `http.status_code` are recorded once known.
pub fn request_span(method: &Method, path: &str, request_id: &str) -> Span {
    tracing::info_span!(
        "http.request",
        http.method = %method,
        http.target = %path,
        request_id = %request_id,
        route = tracing::field::Empty,
        http.status_code = tracing::field::Empty,
    )
}

/// Add CORS headers to a response
///
/// Preflights additionally advertise the allowed methods and echo the
/// requested headers.
pub fn apply_cors(request_headers: &HeaderMap, headers: &mut HeaderMap, preflight: bool) {
    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        hyper::header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("x-request-id"),
    );

    if !preflight {
        return;
    }

    headers.insert(
        hyper::header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    let allow_headers = request_headers
        .get(hyper::header::ACCESS_CONTROL_REQUEST_HEADERS)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ALLOW_HEADERS));
    headers.insert(hyper::header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
    headers.insert(
        hyper::header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE_SECONDS),
    );
}
