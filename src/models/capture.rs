//! Sensor capture models
//!
//! Results produced by the camera and location collaborators, and their mapping
//! onto HTTP responses.

use crate::models::ResponseKind;
use flutter_rust_bridge::frb;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Kind of media a sensor produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[frb]
pub enum MediaKind {
    /// JPEG still from the camera, payload is base64
    Photo,
    /// Location fix, payload is a JSON object
    Location,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Location => "location",
        }
    }
}

/// Outcome of a single sensor acquisition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[frb]
pub struct CaptureResult {
    pub media_kind: MediaKind,
    pub payload: Option<String>,
    pub error_message: Option<String>,
    pub capture_duration_ms: u64,
}

/// Status, body and kind of a response produced by an endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointReply {
    pub status_code: u16,
    pub body: String,
    pub kind: ResponseKind,
}

impl CaptureResult {
    pub fn success(media_kind: MediaKind, payload: String, capture_duration_ms: u64) -> Self {
        Self {
            media_kind,
            payload: Some(payload),
            error_message: None,
            capture_duration_ms,
        }
    }

    pub fn failure(media_kind: MediaKind, message: impl Into<String>) -> Self {
        Self {
            media_kind,
            payload: None,
            error_message: Some(message.into()),
            capture_duration_ms: 0,
        }
    }

    /// Turn the capture into a status code, JSON body and response kind.
    ///
    /// Photos are embedded as a `data:image/jpeg;base64,...` value under the
    /// `"image"` key so the renderer can find them. Failures map to 503.
    pub fn into_response(self) -> EndpointReply {
        let payload = match (self.payload, self.error_message) {
            (_, Some(message)) => return Self::unavailable(&message),
            (None, None) => return Self::unavailable("sensor returned no data"),
            (Some(payload), None) => payload,
        };

        let (body, kind) = match self.media_kind {
            MediaKind::Photo => (
                json!({
                    "type": self.media_kind.as_str(),
                    "image": format!("data:image/jpeg;base64,{}", payload),
                    "durationMs": self.capture_duration_ms,
                }),
                ResponseKind::Image,
            ),
            MediaKind::Location => {
                let data = serde_json::from_str::<Value>(&payload).unwrap_or(Value::String(payload));
                (
                    json!({
                        "type": self.media_kind.as_str(),
                        "data": data,
                        "durationMs": self.capture_duration_ms,
                    }),
                    ResponseKind::Json,
                )
            }
        };

        EndpointReply {
            status_code: 200,
            body: body.to_string(),
            kind,
        }
    }

    fn unavailable(message: &str) -> EndpointReply {
        EndpointReply {
            status_code: 503,
            body: json!({ "error": message }).to_string(),
            kind: ResponseKind::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_capture_embeds_data_uri() {
        let response = CaptureResult::success(MediaKind::Photo, "AAAA".into(), 120).into_response();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.kind, ResponseKind::Image);

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["image"], "data:image/jpeg;base64,AAAA");
        assert_eq!(body["durationMs"], 120);
    }

    #[test]
    fn location_capture_keeps_structured_payload() {
        let payload = r#"{"latitude":52.1,"longitude":4.3,"accuracy":5.0}"#.to_string();
        let response = CaptureResult::success(MediaKind::Location, payload, 30).into_response();
        assert_eq!(response.kind, ResponseKind::Json);

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["type"], "location");
        assert_eq!(body["data"]["latitude"], 52.1);
    }

    #[test]
    fn failures_map_to_service_unavailable() {
        let response =
            CaptureResult::failure(MediaKind::Photo, "camera permission denied").into_response();
        assert_eq!(response.status_code, 503);
        assert_eq!(
            response.body,
            r#"{"error":"camera permission denied"}"#.to_string()
        );

        let empty = CaptureResult {
            media_kind: MediaKind::Location,
            payload: None,
            error_message: None,
            capture_duration_ms: 3,
        };
        assert_eq!(empty.into_response().status_code, 503);
    }
}
