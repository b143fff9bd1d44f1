//! API error mapping and endpoint dispatch

use crate::router::{Route, RouterError};
use crate::s3::StorageError;
use crate::upload::{UploadError, UploadHandler};
use crate::validation::ValidationErrors;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Largest request body read; valid bodies are small JSON objects
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Errors surfaced to API clients
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Storage(StorageError),

    #[error("Malformed JSON body: {0}")]
    MalformedBody(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Route(#[from] RouterError),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(errors) => ApiError::Validation(errors),
            UploadError::Storage(err) => ApiError::Storage(err),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Storage(StorageError::Provider { .. })
            | ApiError::Storage(StorageError::MissingField { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Storage(_) | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Route(RouterError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Route(RouterError::MethodNotAllowed { .. }) => {
                StatusCode::METHOD_NOT_ALLOWED
            }
        }
    }

    /// Client-facing JSON body
    ///
    /// Provider and internal failures carry no internal detail beyond the
    /// provider error code.
    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!({
                "message": errors.summary(),
                "errors": errors.to_json(),
            }),
            ApiError::Storage(StorageError::Provider { operation, code, .. }) => {
                let mut body = json!({"message": format!("{} failed", operation)});
                if let Some(code) = code {
                    body["code"] = Value::String(code.clone());
                }
                body
            }
            ApiError::Storage(StorageError::MissingField { operation, .. }) => {
                json!({"message": format!("{} returned an incomplete response", operation)})
            }
            ApiError::Storage(_) | ApiError::Encode(_) => {
                json!({"message": "Server Error"})
            }
            ApiError::MalformedBody(_) => json!({"message": "Malformed JSON body"}),
            ApiError::PayloadTooLarge(_) => json!({"message": "Payload Too Large"}),
            ApiError::Route(RouterError::NotFound(_)) => json!({"message": "Not Found"}),
            ApiError::Route(RouterError::MethodNotAllowed { .. }) => {
                json!({"message": "Method Not Allowed"})
            }
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = json_response(self.status(), &self.body());
        if let ApiError::Route(RouterError::MethodNotAllowed { allowed, .. }) = self {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(allowed));
        }
        response
    }
}

/// JSON response with the given status
pub fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Decode a JSON object request body; an empty body is an empty object
pub fn parse_body(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::MalformedBody("expected a JSON object".into())),
        Err(e) => Err(ApiError::MalformedBody(e.to_string())),
    }
}

/// Run one endpoint and serialize its result
pub async fn dispatch(
    handler: &UploadHandler,
    route: &Route,
    query: &Map<String, Value>,
    body: &Map<String, Value>,
) -> Result<Value, ApiError> {
    let value = match route {
        Route::UploadParameters => serde_json::to_value(handler.upload_parameters(query).await?)?,
        Route::Create => serde_json::to_value(handler.create(body).await?)?,
        Route::UploadedParts { upload_id } => {
            serde_json::to_value(handler.uploaded_parts(upload_id, query).await?)?
        }
        Route::BatchSignParts { upload_id } => {
            serde_json::to_value(handler.batch_sign_parts(upload_id, query).await?)?
        }
        Route::Complete { upload_id } => {
            serde_json::to_value(handler.complete(upload_id, query, body).await?)?
        }
        Route::SignPart {
            upload_id,
            part_number,
        } => serde_json::to_value(handler.sign_part(upload_id, part_number, query).await?)?,
        Route::Abort { upload_id } => {
            handler.abort(upload_id, query).await?;
            Value::Object(Map::new())
        }
    };
    Ok(value)
}
