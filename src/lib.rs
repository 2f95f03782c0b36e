//! # Sensor Bridge Core
#![allow(unexpected_cfgs)]

//! Embedded HTTP server core for the Sensor Bridge mobile application. Exposes
//! the device camera and location as API endpoints and keeps a live request log
//! for the developer tooling screens.
//!
//! ## Features
//!
//! - Embedded HTTP/1.1 server with sensor endpoints
//! - Bounded in-memory request log with live snapshots
//! - Inline base64 image redaction for stored and displayed bodies
//! - JSON pretty-printing for the response viewer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Flutter UI (Dart)                     │
//! ├─────────────────────────────────────────────────────────┤
//! │               flutter_rust_bridge (FFI)                  │
//! ├─────────────────────────────────────────────────────────┤
//! │                Sensor Bridge Core (Rust)                 │
//! │  ┌─────────┐  ┌──────────┐  ┌─────────────┐              │
//! │  │  HTTP   │  │ Request  │  │  Response   │              │
//! │  │ Server  │──│   Log    │──│  Renderer   │              │
//! │  └─────────┘  └──────────┘  └─────────────┘              │
//! └─────────────────────────────────────────────────────────┘
//! ```

// Public modules
pub mod api;
pub mod models;
pub mod render;
pub mod server;
pub mod storage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
