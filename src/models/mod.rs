//! Data models for Sensor Bridge
//!
//! These models are shared between Rust and Flutter via flutter_rust_bridge.

pub mod api_result;
pub mod capture;
pub mod log_record;

pub use api_result::*;
pub use capture::*;
pub use log_record::*;
