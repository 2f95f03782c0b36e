//! Sensor Bridge API - Flutter-Rust Bridge Interface
//!
//! This module defines the public API that Flutter can call.

pub mod bridge_api;
