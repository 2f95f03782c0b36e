use std::sync::Arc;
use std::time::Duration;

use rust_lib_sensorbridge::api::bridge_api::{render_record, start_server};
use rust_lib_sensorbridge::models::{CaptureResult, MediaKind, ResponseKind};
use rust_lib_sensorbridge::server::{SensorFuture, SensorProvider, ServerConfig};
use rust_lib_sensorbridge::storage::{LogStoreConfig, RequestLog};

struct StubSensors;

impl SensorProvider for StubSensors {
    fn capture_photo(&self) -> SensorFuture<'_> {
        Box::pin(async { CaptureResult::success(MediaKind::Photo, "AAAAAAAA".into(), 4) })
    }

    fn current_location(&self) -> SensorFuture<'_> {
        Box::pin(async { CaptureResult::failure(MediaKind::Location, "permission denied") })
    }
}

fn local_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        bind_address: "127.0.0.1".to_string(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_logs_requests_and_stops() {
    let log = Arc::new(RequestLog::default());
    let handle = start_server(local_config(), Arc::clone(&log), Arc::new(StubSensors))
        .await
        .expect("server starts");
    assert!(handle.is_running());
    let base = format!("http://{}", handle.local_addr());
    let client = reqwest::Client::new();

    let status = client
        .get(format!("{base}/api/status"))
        .header("User-Agent", "lifecycle-test")
        .send()
        .await
        .expect("status request");
    assert_eq!(status.status().as_u16(), 200);
    let body: serde_json::Value = status.json().await.expect("json body");
    assert_eq!(body["status"], "ok");

    let location = client
        .get(format!("{base}/api/location"))
        .send()
        .await
        .expect("location request");
    assert_eq!(location.status().as_u16(), 503);

    let records = log.snapshot();
    assert_eq!(records.len(), 2);
    let newest = &records[0];
    assert_eq!(newest.path, "/api/location");
    assert_eq!(newest.status_code, Some(503));
    let oldest = &records[1];
    assert_eq!(oldest.path, "/api/status");
    assert_eq!(oldest.user_agent.as_deref(), Some("lifecycle-test"));
    assert_eq!(oldest.client_address, "127.0.0.1");
    assert_eq!(oldest.response_kind, Some(ResponseKind::Json));
    assert!(records.iter().all(|record| !record.is_ongoing()));

    assert_eq!(handle.status().logged_requests, 2);
    handle.stop().await.expect("server stops");
    // Pooled connections outlive the listener, so probe with a fresh client.
    assert!(reqwest::Client::new()
        .get(format!("{base}/api/status"))
        .timeout(Duration::from_secs(2))
        .send()
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn old_camera_captures_are_redacted() {
    let log = Arc::new(RequestLog::new(LogStoreConfig {
        max_records: 10,
        max_image_retained: 1,
        ..LogStoreConfig::default()
    }));
    let handle = start_server(local_config(), Arc::clone(&log), Arc::new(StubSensors))
        .await
        .expect("server starts");
    let base = format!("http://{}", handle.local_addr());
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let response = client
            .get(format!("{base}/api/camera"))
            .send()
            .await
            .expect("camera request");
        assert_eq!(response.status().as_u16(), 200);
        let text = response.text().await.expect("body");
        assert!(text.contains("data:image/jpeg;base64,AAAAAAAA"));
    }

    let records = log.snapshot();
    assert_eq!(records.len(), 3);
    assert!(records[0].has_inline_image());
    for older in &records[1..] {
        let body = older.response_body.as_deref().unwrap_or_default();
        assert!(body.contains("[IMAGE_JPEG_6B]"), "unexpected body {body}");
    }

    let rendered = render_record(&records[0]);
    assert!(rendered.contains("[IMAGE_DISPLAYED_BELOW]"));
    assert!(rendered.ends_with("Image: JPEG\nSize: 6B"));

    handle.stop().await.expect("server stops");
}
