//! Desktop development server for Sensor Bridge.
//!
//! Runs the embedded server with canned sensor data so the API and the request
//! log can be exercised without a device.
//!
//! Usage:
//! ```
//! cargo run --bin sensorbridge_devserver -- --port 8080
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rust_lib_sensorbridge::api::bridge_api::{init_core, render_record, start_server};
use rust_lib_sensorbridge::models::{CaptureResult, MediaKind};
use rust_lib_sensorbridge::server::{SensorFuture, SensorProvider, ServerConfig};
use rust_lib_sensorbridge::storage::{LogStoreConfig, RequestLog};

/// JFIF header and end marker, enough for viewers to sniff the type
const SAMPLE_PHOTO_BASE64: &str = "/9j/4AAQSkZJRgABAQAAAQABAAD/2Q==";

/// Fixed sensor readings for desktop use
struct CannedSensors;

impl SensorProvider for CannedSensors {
    fn capture_photo(&self) -> SensorFuture<'_> {
        Box::pin(async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            CaptureResult::success(MediaKind::Photo, SAMPLE_PHOTO_BASE64.to_string(), 150)
        })
    }

    fn current_location(&self) -> SensorFuture<'_> {
        Box::pin(async {
            let fix = r#"{"latitude":52.3676,"longitude":4.9041,"accuracy":12.5}"#;
            CaptureResult::success(MediaKind::Location, fix.to_string(), 20)
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_core(None).map_err(anyhow::Error::msg)?;
    let config = parse_args();

    let log = Arc::new(RequestLog::new(LogStoreConfig::from_env()));
    let ticker = log.spawn_ongoing_ticker(Duration::from_secs(1));

    let handle = start_server(config, Arc::clone(&log), Arc::new(CannedSensors))
        .await
        .map_err(anyhow::Error::msg)?;
    tracing::info!("Dev server ready at http://{}", handle.local_addr());

    let mut snapshots = Box::pin(log.snapshot_stream());
    let mut last_resolved: Option<String> = None;

    loop {
        tokio::select! {
            snapshot = snapshots.next() => {
                let Some(snapshot) = snapshot else { break };
                let Some(newest) = snapshot.iter().find(|record| !record.is_ongoing()) else {
                    continue;
                };
                if last_resolved.as_deref() == Some(newest.id.as_str()) {
                    continue;
                }
                last_resolved = Some(newest.id.clone());
                tracing::info!(
                    "{} {} -> {} in {}\n{}",
                    newest.method,
                    newest.path,
                    newest.status_str(),
                    newest.duration_str(),
                    render_record(newest)
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ticker.abort();
    handle.stop().await.map_err(anyhow::Error::msg)?;
    Ok(())
}

fn parse_args() -> ServerConfig {
    let mut args = std::env::args().skip(1);
    let mut config = ServerConfig::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                if let Some(port) = args.next().and_then(|p| p.parse().ok()) {
                    config.port = port;
                }
            }
            "--bind" => {
                if let Some(address) = args.next() {
                    config.bind_address = address;
                }
            }
            "--help" | "-h" => {
                eprintln!("Sensor Bridge development server");
                eprintln!();
                eprintln!("Usage: sensorbridge_devserver [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --port <PORT>      Port to listen on (default: 8080)");
                eprintln!("  --bind <ADDRESS>   Bind address (default: 127.0.0.1)");
                eprintln!("  --help, -h         Show this help");
                eprintln!();
                eprintln!("Environment: RUST_LOG, SENSORBRIDGE_MAX_RECORDS, SENSORBRIDGE_MAX_IMAGES");
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {arg}");
            }
        }
    }

    config
}
