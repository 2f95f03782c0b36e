//! Embedded HTTP server
//!
//! Serves the sensor endpoints and records every request in the [`RequestLog`].

mod routes;

use crate::models::{CaptureResult, MediaKind};
use crate::storage::RequestLog;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub use routes::LogSummary;

const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to listen on, 0 picks a free port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Boxed future returned by sensor providers
pub type SensorFuture<'a> = Pin<Box<dyn Future<Output = CaptureResult> + Send + 'a>>;

/// Device sensors, implemented by the host application.
pub trait SensorProvider: Send + Sync {
    fn capture_photo(&self) -> SensorFuture<'_>;
    fn current_location(&self) -> SensorFuture<'_>;
}

/// Sensor provider for hosts without camera or location access.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSensors;

impl SensorProvider for UnavailableSensors {
    fn capture_photo(&self) -> SensorFuture<'_> {
        Box::pin(async { CaptureResult::failure(MediaKind::Photo, "camera not available") })
    }

    fn current_location(&self) -> SensorFuture<'_> {
        Box::pin(async { CaptureResult::failure(MediaKind::Location, "location not available") })
    }
}

/// Shared state handed to every connection
pub struct ServerState {
    pub log: Arc<RequestLog>,
    pub sensors: Arc<dyn SensorProvider>,
    started: Instant,
}

impl ServerState {
    pub fn new(log: Arc<RequestLog>, sensors: Arc<dyn SensorProvider>) -> Self {
        Self {
            log,
            sensors,
            started: Instant::now(),
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Bind the listening socket described by `config`.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// Accept connections until `shutdown` fires or its sender is dropped.
pub async fn run_server(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Sensor server listening on {}", addr);
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((socket, peer_addr)) => {
                    tracing::debug!("Connection from {}", peer_addr);
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            handle_request(req, peer_addr, Arc::clone(&state))
                        });
                        if let Err(e) = http1::Builder::new()
                            .serve_connection(TokioIo::new(socket), service)
                            .await
                        {
                            tracing::debug!("Connection from {} closed: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => tracing::error!("Accept error: {}", e),
            },
            _ = &mut shutdown => break,
        }
    }

    tracing::info!("Sensor server stopped");
    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    peer_addr: SocketAddr,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let req_start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let client_address = peer_addr.ip().to_string();

    let body = Limited::new(req.into_body(), MAX_REQUEST_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes());

    let (id, reply) = match body {
        Ok(bytes) => {
            let request_body =
                (!bytes.is_empty()).then(|| String::from_utf8_lossy(&bytes).into_owned());
            let id = state.log.begin(
                method.as_str(),
                &path,
                &client_address,
                user_agent,
                request_body,
            );
            let reply = routes::route(&method, &path, &state).await;
            (id, reply)
        }
        Err(err) => {
            tracing::warn!("Rejecting request body for {} {}: {}", method, path, err);
            let id = state
                .log
                .begin(method.as_str(), &path, &client_address, user_agent, None);
            (id, routes::body_error_reply(&*err))
        }
    };

    let elapsed_ms = req_start.elapsed().as_millis() as u64;
    state.log.resolve(
        &id,
        reply.status_code,
        elapsed_ms,
        Some(reply.body.clone()),
        Some(reply.kind),
    );

    let mut response = Response::new(Full::new(Bytes::from(reply.body)));
    *response.status_mut() =
        StatusCode::from_u16(reply.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(routes::content_type_for(reply.kind)),
    );
    Ok(response)
}
