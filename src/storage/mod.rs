//! Request log storage
//!
//! Records live only in memory; there is one [`RequestLog`] per running server,
//! shared by `Arc` between the server task and the UI.

mod request_log;

pub use request_log::{LogSnapshot, LogStoreConfig, RequestLog};
