//! Bridge API for Flutter
//!
//! Entry points the mobile shell calls to bootstrap logging, run the embedded
//! server and read the request log.

use crate::models::{ApiResult, LogRecord, RecordFilter};
use crate::render::{self, EmbeddedImage};
use crate::server::{self, SensorProvider, ServerConfig, ServerState};
use crate::storage::RequestLog;
use flutter_rust_bridge::frb;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// How many consecutive ports to try when the requested one is taken
const PORT_FALLBACK_TRIES: u16 = 20;

/// Get the version of the Sensor Bridge core library
#[frb(sync)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Initialize logging (call once at startup)
/// `storage_path` is used to store log files in release mode
#[allow(unused_variables)]
pub fn init_core(storage_path: Option<String>) -> Result<bool, String> {
    let filter = log_filter();

    #[cfg(debug_assertions)]
    {
        // Debug mode: log to console (stderr)
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    #[cfg(not(debug_assertions))]
    {
        use anyhow::Context;

        // Release mode: log to file
        let log_dir = storage_path
            .as_ref()
            .map(|p| std::path::PathBuf::from(p).join("logs"))
            .unwrap_or_else(|| std::path::PathBuf::from("logs"));

        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))
            .map_err(|e| format!("{:#}", e))?;
        let file_appender = tracing_appender::rolling::daily(&log_dir, "sensorbridge_core");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // Logging lasts until the process exits.
        std::mem::forget(guard);

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .try_init();
    }

    tracing::info!(
        "Sensor Bridge core initialized v{}",
        env!("CARGO_PKG_VERSION")
    );
    Ok(true)
}

/// `RUST_LOG` directives, or `info` when unset or unparsable
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[frb(sync)]
pub fn create_default_config() -> ServerConfig {
    ServerConfig::default()
}

/// Server status information
#[derive(Debug, Clone, PartialEq, Eq)]
#[frb]
pub struct ServerStatus {
    /// Whether the server is accepting connections
    pub is_running: bool,
    /// Port actually bound
    pub port: u16,
    /// Bind address
    pub bind_address: String,
    /// Records currently in the request log
    pub logged_requests: u32,
    /// Requests still waiting for a response
    pub ongoing_requests: u32,
}

/// Running server. Dropping the handle without calling [`ServerHandle::stop`]
/// also shuts the server down.
#[frb(opaque)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    log: Arc<RequestLog>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn log(&self) -> Arc<RequestLog> {
        Arc::clone(&self.log)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            is_running: self.is_running(),
            port: self.local_addr.port(),
            bind_address: self.local_addr.ip().to_string(),
            logged_requests: self.log.len() as u32,
            ongoing_requests: self.log.ongoing_count() as u32,
        }
    }

    /// Stop accepting connections and wait for the accept loop to exit
    pub async fn stop(mut self) -> Result<bool, String> {
        tracing::info!("Stopping sensor server on {}", self.local_addr);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        (&mut self.task).await.map_err(|e| e.to_string())?;
        Ok(true)
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Start the embedded server, falling back to the next free port when the
/// requested one is taken. Port 0 lets the OS choose.
pub async fn start_server(
    config: ServerConfig,
    log: Arc<RequestLog>,
    sensors: Arc<dyn SensorProvider>,
) -> Result<ServerHandle, String> {
    let listener = bind_with_fallback(&config).await?;
    let local_addr = listener.local_addr().map_err(|e| e.to_string())?;
    if config.port != 0 && local_addr.port() != config.port {
        tracing::warn!(
            "Port {} in use, falling back to {}",
            config.port,
            local_addr.port()
        );
    }

    let state = Arc::new(ServerState::new(Arc::clone(&log), sensors));
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        if let Err(e) = server::run_server(listener, state, shutdown_rx).await {
            tracing::error!("Sensor server error: {}", e);
        }
    });

    Ok(ServerHandle {
        local_addr,
        log,
        shutdown: Some(shutdown_tx),
        task,
    })
}

async fn bind_with_fallback(config: &ServerConfig) -> Result<TcpListener, String> {
    use std::io::ErrorKind;

    let tries = if config.port == 0 { 1 } else { PORT_FALLBACK_TRIES };
    for offset in 0..tries {
        let candidate = ServerConfig {
            port: config.port.saturating_add(offset),
            bind_address: config.bind_address.clone(),
        };
        match server::bind(&candidate).await {
            Ok(listener) => return Ok(listener),
            Err(server::ServerError::Bind { source, .. })
                if source.kind() == ErrorKind::AddrInUse =>
            {
                continue
            }
            Err(err) => return Err(format!("{:#}", anyhow::Error::from(err))),
        }
    }

    Err(format!(
        "No available port found in range {}-{}",
        config.port,
        config.port.saturating_add(tries.saturating_sub(1))
    ))
}

/// Records matching the filter, newest first
pub fn list_records(log: &RequestLog, filter: Option<RecordFilter>) -> Vec<LogRecord> {
    let filter = filter.unwrap_or_default();
    log.query(&filter)
        .into_iter()
        .map(|record| (*record).clone())
        .collect()
}

pub fn get_record(log: &RequestLog, id: &str) -> Option<LogRecord> {
    log.get(id).map(|record| (*record).clone())
}

pub fn clear_records(log: &RequestLog) {
    log.clear();
}

/// Display text for a stored record's response
#[frb(sync)]
pub fn render_record(record: &LogRecord) -> String {
    if record.is_ongoing() {
        return format!("Waiting for response… ({})", record.duration_str());
    }
    render::render_api_result(&ApiResult::from_record(record))
}

/// Decoded image from a stored record's response, if it still has one
#[frb(sync)]
pub fn record_image(record: &LogRecord) -> Option<EmbeddedImage> {
    record
        .response_body
        .as_deref()
        .and_then(render::extract_embedded_image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponseKind;
    use serial_test::serial;

    #[test]
    #[serial]
    fn init_core_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = Some(dir.path().to_string_lossy().to_string());
        assert_eq!(init_core(path.clone()), Ok(true));
        assert_eq!(init_core(path), Ok(true));
    }

    #[test]
    #[serial]
    fn log_filter_follows_rust_log() {
        use tracing::level_filters::LevelFilter;

        std::env::set_var("RUST_LOG", "warn");
        assert_eq!(log_filter().max_level_hint(), Some(LevelFilter::WARN));
        std::env::set_var("RUST_LOG", "rust_lib_sensorbridge=debug,hyper=warn");
        assert_eq!(log_filter().max_level_hint(), Some(LevelFilter::DEBUG));
        std::env::set_var("RUST_LOG", "rust_lib_sensorbridge=loud");
        assert_eq!(log_filter().max_level_hint(), Some(LevelFilter::INFO));
        std::env::remove_var("RUST_LOG");
        assert_eq!(log_filter().max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn render_record_handles_ongoing_and_images() {
        let log = RequestLog::default();
        let id = log.begin("GET", "/api/camera", "127.0.0.1", None, None);
        let ongoing = get_record(&log, &id).unwrap();
        assert!(render_record(&ongoing).starts_with("Waiting for response"));
        assert!(record_image(&ongoing).is_none());

        log.resolve(
            &id,
            200,
            15,
            Some(r#"{"type":"photo","image":"data:image/png;base64,iVBORw0KGgo="}"#.into()),
            Some(ResponseKind::Image),
        );
        let done = get_record(&log, &id).unwrap();
        let rendered = render_record(&done);
        assert!(rendered.contains("[IMAGE_DISPLAYED_BELOW]"));
        assert!(rendered.ends_with("Image: PNG\nSize: 9B"));
        assert_eq!(record_image(&done).unwrap().bytes.len(), 8);
    }

    #[test]
    fn list_and_clear_records() {
        let log = RequestLog::default();
        log.begin("GET", "/api/status", "127.0.0.1", None, None);
        log.begin("GET", "/api/camera", "127.0.0.1", None, None);

        let cameras = list_records(
            &log,
            Some(RecordFilter {
                path_contains: Some("camera".into()),
                ..Default::default()
            }),
        );
        assert_eq!(cameras.len(), 1);
        assert_eq!(list_records(&log, None).len(), 2);

        clear_records(&log);
        assert!(list_records(&log, None).is_empty());
    }

    #[test]
    fn default_config_binds_localhost() {
        let config = create_default_config();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 8080);
    }
}
