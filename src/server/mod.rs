//! HTTP server module
//!
//! Serves the upload endpoints over HTTP/1.1 with `hyper`, one tokio task per
//! connection. Request flow:
//!
//! 1. `trace` middleware opens the request span and assigns a request id
//! 2. `cors` middleware answers preflights
//! 3. `GET /health` is answered directly
//! 4. the router resolves the endpoint, the body (at most 1 MiB) is decoded,
//!    the handler runs
//! 5. errors become JSON responses (422, 502, 500, 400, 413, 404, 405)
//!
//! # Example
//!
//! ```no_run
//! use s3_upload_signer::config::Config;
//! use s3_upload_signer::s3::S3Adapter;
//! use s3_upload_signer::server::Server;
//! use s3_upload_signer::upload::{UploadHandler, UploadSettings};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let adapter = S3Adapter::from_config(&config.storage).await?;
//! let handler = UploadHandler::new(Arc::new(adapter), UploadSettings::from(&config.upload));
//! let server = Server::new(&config, handler).await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod middleware;

use crate::config::Config;
use crate::metrics;
use crate::router::{query::parse_query, RouteTable};
use crate::upload::UploadHandler;
use api::{dispatch, json_response, parse_body, ApiError, MAX_BODY_BYTES};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use middleware::{apply_cors, request_span, Middleware, REQUEST_ID_HEADER};
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Instrument, Span};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),
}

/// Shared request state
struct AppState {
    handler: UploadHandler,
    routes: RouteTable,
    middleware: Middleware,
}

/// HTTP server for the upload endpoints
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind to `server.address`
    ///
    /// Binding happens immediately; with port 0 the OS picks a port, see
    /// [`Server::local_addr`].
    pub async fn new(config: &Config, handler: UploadHandler) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!(address = %local_addr, "Server bound");

        Ok(Self {
            state: Arc::new(AppState {
                handler,
                routes: RouteTable::new(&config.routes),
                middleware: Middleware::from(&config.routes),
            }),
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        };
        self.run_until(shutdown).await
    }

    /// Serve until `shutdown` resolves, then stop accepting connections
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr, "Starting server");
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
            };

            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { Ok::<_, Infallible>(handle_request(req, state).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(peer = %peer_addr, error = %e, "Error serving connection");
                }
            });
        }

        info!("Shutting down server");
        Ok(())
    }
}

/// Handle one request with middleware applied
async fn handle_request(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let started = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let request_headers = req.headers().clone();
    let preflight = state.middleware.cors && req.method() == Method::OPTIONS;

    let span = if state.middleware.trace {
        request_span(req.method(), req.uri().path(), &request_id)
    } else {
        Span::none()
    };

    let (route_name, mut response) = if preflight {
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = StatusCode::NO_CONTENT;
        ("preflight".to_string(), response)
    } else {
        route_request(req, &state).instrument(span.clone()).await
    };

    let status = response.status();
    span.record("route", route_name.as_str());
    span.record("http.status_code", status.as_u16());
    span.in_scope(|| {
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed");
        } else {
            info!(status = status.as_u16(), "Request completed");
        }
    });

    if state.middleware.cors {
        apply_cors(&request_headers, response.headers_mut(), preflight);
    }
    if state.middleware.trace {
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
    }

    metrics::record_request(
        &route_name,
        status.as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Route a request and run its endpoint
///
/// Returns the route name used for logs and metrics with the response.
async fn route_request(
    req: Request<Incoming>,
    state: &AppState,
) -> (String, Response<Full<Bytes>>) {
    if req.method() == Method::GET && req.uri().path() == "/health" {
        return (
            "health".to_string(),
            json_response(StatusCode::OK, &json!({"status": "ok"})),
        );
    }

    let route = match state.routes.match_route(req.method(), req.uri().path()) {
        Ok(route) => route,
        Err(e) => {
            info!(error = %e, "No matching route");
            return ("unmatched".to_string(), ApiError::from(e).into_response());
        }
    };
    let route_name = state.routes.route_name(&route);

    let query = parse_query(req.uri().query());
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => parse_body(&collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(ApiError::PayloadTooLarge(MAX_BODY_BYTES)),
        Err(e) => Err(ApiError::MalformedBody(e.to_string())),
    };

    let result = match body {
        Ok(body) => dispatch(&state.handler, &route, &query, &body).await,
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => {
            if e.status().is_server_error() {
                error!(route = %route_name, error = %e, "Request failed");
            } else {
                warn!(route = %route_name, error = %e, "Request rejected");
            }
            e.into_response()
        }
    };

    (route_name, response)
}
