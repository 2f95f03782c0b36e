//! Request log record model
//!
//! Represents a single HTTP request/response pair handled by the embedded server.

use chrono::{Local, Utc};
use flutter_rust_bridge::frb;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Broad classification of a response body, used to pick a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[frb]
pub enum ResponseKind {
    Json,
    Image,
    Text,
    Unknown,
}

impl ResponseKind {
    /// Parse from a short tag ("json", "image", ...) or a full content type.
    pub fn from_tag_lossy(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        match tag.as_str() {
            "json" => ResponseKind::Json,
            "image" => ResponseKind::Image,
            "text" => ResponseKind::Text,
            _ if tag.contains("application/json") || tag.ends_with("+json") => ResponseKind::Json,
            _ if tag.starts_with("image/") => ResponseKind::Image,
            _ if tag.starts_with("text/") => ResponseKind::Text,
            _ => ResponseKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Json => "json",
            ResponseKind::Image => "image",
            ResponseKind::Text => "text",
            ResponseKind::Unknown => "unknown",
        }
    }

    #[frb(sync)]
    pub fn to_string(&self) -> String {
        self.as_str().to_string()
    }
}

impl std::str::FromStr for ResponseKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ResponseKind::from_tag_lossy(s))
    }
}

/// A single request handled by the embedded server.
///
/// A record starts out ongoing (no status code) and is resolved exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[frb]
pub struct LogRecord {
    /// Unique identifier, fixed at creation
    pub id: String,
    /// Creation time formatted for display (local `HH:MM:SS.mmm`)
    pub timestamp: String,
    /// Creation time in milliseconds since epoch
    pub created_at_ms: i64,

    // Request data
    pub method: String,
    pub path: String,
    pub client_address: String,
    pub user_agent: Option<String>,
    pub request_body: Option<String>,

    // Response data
    /// HTTP status code, `None` while the request is in flight
    pub status_code: Option<u16>,
    /// Total handling time in ms, zero while the request is in flight
    pub response_time_ms: u64,
    pub response_body: Option<String>,
    pub response_kind: Option<ResponseKind>,

    /// Monotonic creation instant used for live elapsed time
    #[serde(skip, default = "Instant::now")]
    pub started_at: Instant,
}

impl LogRecord {
    /// Create a new ongoing record for an incoming request
    pub fn new(
        method: &str,
        path: &str,
        client_address: &str,
        user_agent: Option<String>,
        request_body: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
            created_at_ms: Utc::now().timestamp_millis(),
            method: method.to_string(),
            path: path.to_string(),
            client_address: client_address.to_string(),
            user_agent,
            request_body,
            status_code: None,
            response_time_ms: 0,
            response_body: None,
            response_kind: None,
            started_at: Instant::now(),
        }
    }

    /// Whether the record is still waiting for its response
    #[frb(sync)]
    pub fn is_ongoing(&self) -> bool {
        self.status_code.is_none()
    }

    /// Set the terminal fields. The record stops being ongoing.
    pub fn resolve(
        &mut self,
        status_code: u16,
        response_time_ms: u64,
        response_body: Option<String>,
        response_kind: Option<ResponseKind>,
    ) {
        self.status_code = Some(status_code);
        self.response_time_ms = response_time_ms;
        self.response_body = response_body;
        self.response_kind = response_kind;
    }

    /// Duration in ms: live elapsed time while ongoing, stored time afterwards.
    pub fn current_duration_ms(&self) -> u64 {
        if self.is_ongoing() {
            self.started_at.elapsed().as_millis() as u64
        } else {
            self.response_time_ms
        }
    }

    /// Get duration as formatted string
    #[frb(sync)]
    pub fn duration_str(&self) -> String {
        let ms = self.current_duration_ms();
        let formatted = if ms < 1000 {
            format!("{}ms", ms)
        } else {
            format!("{:.1}s", ms as f64 / 1000.0)
        };
        if self.is_ongoing() {
            format!("{}…", formatted)
        } else {
            formatted
        }
    }

    /// Get status as formatted string
    #[frb(sync)]
    pub fn status_str(&self) -> String {
        match self.status_code {
            Some(code) => code.to_string(),
            None => "-".to_string(),
        }
    }

    /// Whether the response body still carries inline base64 image data
    pub fn has_inline_image(&self) -> bool {
        self.response_kind == Some(ResponseKind::Image)
            && self
                .response_body
                .as_deref()
                .map(|body| body.contains("data:image/"))
                .unwrap_or(false)
    }
}

/// Filter options for querying the request log
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[frb]
pub struct RecordFilter {
    /// Match a specific HTTP method (case-insensitive)
    pub method: Option<String>,
    /// Case-insensitive path substring
    pub path_contains: Option<String>,
    /// Minimum HTTP status (inclusive)
    pub status_min: Option<u16>,
    /// Maximum HTTP status (inclusive)
    pub status_max: Option<u16>,
    /// Only records still in flight
    pub ongoing_only: bool,
    /// Match a specific response kind
    pub response_kind: Option<ResponseKind>,
}

impl RecordFilter {
    pub fn matches(&self, record: &LogRecord) -> bool {
        if let Some(method) = &self.method {
            if !record.method.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(path) = &self.path_contains {
            if !record
                .path
                .to_ascii_lowercase()
                .contains(&path.to_ascii_lowercase())
            {
                return false;
            }
        }
        if let Some(min) = self.status_min {
            match record.status_code {
                Some(code) if code >= min => {}
                _ => return false,
            }
        }
        if let Some(max) = self.status_max {
            match record.status_code {
                Some(code) if code <= max => {}
                _ => return false,
            }
        }
        if self.ongoing_only && !record.is_ongoing() {
            return false;
        }
        if let Some(kind) = self.response_kind {
            if record.response_kind != Some(kind) {
                return false;
            }
        }
        true
    }
}
