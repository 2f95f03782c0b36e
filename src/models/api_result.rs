//! Completed API call result, as handed to the response renderer.

use crate::models::LogRecord;
use flutter_rust_bridge::frb;
use serde::{Deserialize, Serialize};

/// Result of calling one of the server's endpoints from the test tooling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[frb]
pub struct ApiResult {
    pub status_code: Option<u16>,
    pub content_type: Option<String>,
    pub body: String,
    /// Transport-level failure; when set the body is ignored
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ApiResult {
    pub fn ok(status_code: u16, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status_code: Some(status_code),
            content_type: content_type.map(str::to_string),
            body: body.into(),
            error: None,
            duration_ms: 0,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Build a result from a stored log record.
    ///
    /// The record only keeps a coarse kind, so it is mapped back to a
    /// representative content type. Image records carry JSON bodies with an
    /// embedded data URI, which the renderer detects on its own.
    pub fn from_record(record: &LogRecord) -> Self {
        use crate::models::ResponseKind;

        let content_type = match record.response_kind {
            Some(ResponseKind::Json) => Some("application/json"),
            Some(ResponseKind::Text) => Some("text/plain"),
            Some(ResponseKind::Image) | Some(ResponseKind::Unknown) | None => None,
        };
        Self {
            status_code: record.status_code,
            content_type: content_type.map(str::to_string),
            body: record.response_body.clone().unwrap_or_default(),
            error: None,
            duration_ms: record.current_duration_ms(),
        }
    }
}
