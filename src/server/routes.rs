//! Endpoint routing

use super::ServerState;
use crate::models::{EndpointReply, LogRecord, ResponseKind};
use http_body_util::LengthLimitError;
use hyper::Method;
use serde::Serialize;
use serde_json::json;

/// Row of the `/api/logs` listing. Bodies are left out so that listing the
/// log never copies earlier listings into new records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogSummary {
    pub id: String,
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub client_address: String,
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    pub ongoing: bool,
    pub response_kind: Option<ResponseKind>,
}

impl From<&LogRecord> for LogSummary {
    fn from(record: &LogRecord) -> Self {
        Self {
            id: record.id.clone(),
            timestamp: record.timestamp.clone(),
            method: record.method.clone(),
            path: record.path.clone(),
            client_address: record.client_address.clone(),
            status_code: record.status_code,
            duration_ms: record.current_duration_ms(),
            ongoing: record.is_ongoing(),
            response_kind: record.response_kind,
        }
    }
}

pub(super) async fn route(method: &Method, path: &str, state: &ServerState) -> EndpointReply {
    let known = matches!(
        path,
        "/api/status" | "/api/camera" | "/api/location" | "/api/logs"
    );
    if known && method != Method::GET {
        return json_reply(405, json!({ "error": "method not allowed" }).to_string());
    }

    match path {
        "/api/status" => json_reply(
            200,
            json!({
                "status": "ok",
                "version": crate::VERSION,
                "uptimeMs": state.uptime_ms(),
            })
            .to_string(),
        ),
        "/api/camera" => state.sensors.capture_photo().await.into_response(),
        "/api/location" => state.sensors.current_location().await.into_response(),
        "/api/logs" => {
            let snapshot = state.log.snapshot();
            let rows: Vec<LogSummary> = snapshot
                .iter()
                .map(|record| LogSummary::from(&**record))
                .collect();
            match serde_json::to_string(&rows) {
                Ok(body) => json_reply(200, body),
                Err(err) => {
                    tracing::error!("Failed to serialize log listing: {}", err);
                    json_reply(500, json!({ "error": "internal error" }).to_string())
                }
            }
        }
        _ => json_reply(404, json!({ "error": "not found", "path": path }).to_string()),
    }
}

/// 413 when the body exceeded the size limit, 400 for any other read failure.
pub(super) fn body_error_reply(
    err: &(dyn std::error::Error + Send + Sync + 'static),
) -> EndpointReply {
    if err.downcast_ref::<LengthLimitError>().is_some() {
        json_reply(413, json!({ "error": "request body too large" }).to_string())
    } else {
        json_reply(400, json!({ "error": "failed to read request body" }).to_string())
    }
}

pub(super) fn content_type_for(kind: ResponseKind) -> &'static str {
    match kind {
        // Image captures are JSON documents carrying a data URI.
        ResponseKind::Json | ResponseKind::Image => "application/json",
        ResponseKind::Text => "text/plain; charset=utf-8",
        ResponseKind::Unknown => "application/octet-stream",
    }
}

fn json_reply(status_code: u16, body: String) -> EndpointReply {
    EndpointReply {
        status_code,
        body,
        kind: ResponseKind::Json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaptureResult, MediaKind};
    use crate::server::{SensorFuture, SensorProvider, UnavailableSensors};
    use crate::storage::RequestLog;
    use std::sync::Arc;

    struct FixedSensors;

    impl SensorProvider for FixedSensors {
        fn capture_photo(&self) -> SensorFuture<'_> {
            Box::pin(async { CaptureResult::success(MediaKind::Photo, "AAAA".into(), 8) })
        }

        fn current_location(&self) -> SensorFuture<'_> {
            Box::pin(async {
                CaptureResult::success(MediaKind::Location, r#"{"latitude":1.5}"#.into(), 2)
            })
        }
    }

    fn state(sensors: Arc<dyn SensorProvider>) -> ServerState {
        ServerState::new(Arc::new(RequestLog::default()), sensors)
    }

    #[tokio::test]
    async fn status_reports_version() {
        let state = state(Arc::new(UnavailableSensors));
        let reply = route(&Method::GET, "/api/status", &state).await;
        assert_eq!(reply.status_code, 200);
        let body: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], crate::VERSION);
    }

    #[tokio::test]
    async fn sensor_routes_delegate_to_provider() {
        let state = state(Arc::new(FixedSensors));
        let photo = route(&Method::GET, "/api/camera", &state).await;
        assert_eq!(photo.kind, ResponseKind::Image);
        assert!(photo.body.contains("data:image/jpeg;base64,AAAA"));

        let location = route(&Method::GET, "/api/location", &state).await;
        assert_eq!(location.kind, ResponseKind::Json);
        assert!(location.body.contains("\"latitude\":1.5"));
    }

    #[test]
    fn unavailable_sensors_return_503() {
        let state = state(Arc::new(UnavailableSensors));
        let camera = tokio_test::block_on(route(&Method::GET, "/api/camera", &state));
        assert_eq!(camera.status_code, 503);
        assert_eq!(camera.body, r#"{"error":"camera not available"}"#);
        let location = tokio_test::block_on(route(&Method::GET, "/api/location", &state));
        assert_eq!(location.status_code, 503);
    }

    #[tokio::test]
    async fn rejects_unknown_paths_and_methods() {
        let state = state(Arc::new(UnavailableSensors));
        assert_eq!(route(&Method::GET, "/nope", &state).await.status_code, 404);
        assert_eq!(route(&Method::POST, "/api/status", &state).await.status_code, 405);
    }

    #[tokio::test]
    async fn body_errors_distinguish_oversize_from_io() {
        use bytes::Bytes;
        use http_body_util::{BodyExt, Full, Limited};

        let oversize = match Limited::new(Full::new(Bytes::from_static(b"0123456789")), 4)
            .collect()
            .await
        {
            Err(err) => err,
            Ok(_) => panic!("body over the limit was accepted"),
        };
        assert_eq!(body_error_reply(&*oversize).status_code, 413);

        let reset: Box<dyn std::error::Error + Send + Sync> = Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ));
        let reply = body_error_reply(&*reset);
        assert_eq!(reply.status_code, 400);
        assert_eq!(reply.kind, ResponseKind::Json);
    }

    #[tokio::test]
    async fn logs_listing_omits_bodies() {
        let state = state(Arc::new(FixedSensors));
        let id = state.log.begin("GET", "/api/camera", "127.0.0.1", None, None);
        state
            .log
            .resolve(&id, 200, 4, Some("secret body".into()), Some(ResponseKind::Image));

        let reply = route(&Method::GET, "/api/logs", &state).await;
        assert!(!reply.body.contains("secret body"));
        let rows: serde_json::Value = serde_json::from_str(&reply.body).unwrap();
        assert_eq!(rows[0]["id"], id.as_str());
        assert_eq!(rows[0]["statusCode"], 200);
        assert_eq!(rows[0]["responseKind"], "image");
        assert_eq!(rows[0]["ongoing"], false);
    }
}
