//! In-memory request log
//!
//! Bounded, newest-first ledger of requests handled by the embedded server.
//! Every mutation publishes a complete snapshot to subscribers.

use crate::models::{LogRecord, RecordFilter, ResponseKind};
use crate::render::{
    contains_capturable_image, contains_inline_image, hide_remaining_images,
    replace_image_payloads, HIDDEN_IMAGE_PLACEHOLDER,
};
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const DEFAULT_MAX_RECORDS: usize = 100;
const DEFAULT_MAX_IMAGE_RETAINED: usize = 50;
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Complete, immutable view of the log as of one publish.
pub type LogSnapshot = Arc<Vec<Arc<LogRecord>>>;

/// Limits for the request log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStoreConfig {
    /// Maximum number of records kept; the oldest are evicted first
    pub max_records: usize,
    /// Maximum number of image records that keep their inline base64 data
    pub max_image_retained: usize,
    /// Buffered snapshots per subscriber before it starts lagging
    pub channel_capacity: usize,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            max_image_retained: DEFAULT_MAX_IMAGE_RETAINED,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl LogStoreConfig {
    /// Defaults overridden by `SENSORBRIDGE_MAX_RECORDS`, `SENSORBRIDGE_MAX_IMAGES`
    /// and `SENSORBRIDGE_CHANNEL_CAPACITY`.
    pub fn from_env() -> Self {
        Self {
            max_records: env_limit("SENSORBRIDGE_MAX_RECORDS", DEFAULT_MAX_RECORDS),
            max_image_retained: env_limit("SENSORBRIDGE_MAX_IMAGES", DEFAULT_MAX_IMAGE_RETAINED),
            channel_capacity: env_limit(
                "SENSORBRIDGE_CHANNEL_CAPACITY",
                DEFAULT_CHANNEL_CAPACITY,
            ),
        }
    }
}

fn env_limit(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<usize>() {
            Ok(value) if value > 0 => value,
            _ => {
                tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// Request log shared between the server (writer) and the UI (reader).
///
/// All mutations run under one lock and publish while holding it, so
/// subscribers see snapshots in mutation order and never a half-pruned list.
pub struct RequestLog {
    records: Mutex<VecDeque<Arc<LogRecord>>>,
    config: LogStoreConfig,
    events: broadcast::Sender<LogSnapshot>,
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new(LogStoreConfig::default())
    }
}

impl RequestLog {
    pub fn new(config: LogStoreConfig) -> Self {
        let (events, _rx) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            records: Mutex::new(VecDeque::with_capacity(config.max_records)),
            config,
            events,
        }
    }

    pub fn config(&self) -> LogStoreConfig {
        self.config
    }

    /// Record the arrival of a request and return its id.
    pub fn begin(
        &self,
        method: &str,
        path: &str,
        client_address: &str,
        user_agent: Option<String>,
        request_body: Option<String>,
    ) -> String {
        let record = LogRecord::new(method, path, client_address, user_agent, request_body);
        let id = record.id.clone();

        let mut records = self.lock();
        records.push_front(Arc::new(record));
        records.truncate(self.config.max_records);
        self.prune_and_publish(&mut records);

        tracing::debug!("Request {} started: {} {}", id, method, path);
        id
    }

    /// Attach the response to the record with `id`.
    ///
    /// Returns `false`, without publishing, when the record no longer exists
    /// (for example it was evicted while the request was in flight).
    pub fn resolve(
        &self,
        id: &str,
        status_code: u16,
        response_time_ms: u64,
        response_body: Option<String>,
        response_kind: Option<ResponseKind>,
    ) -> bool {
        let mut records = self.lock();
        let Some(record) = records.iter_mut().find(|record| record.id == id) else {
            tracing::debug!("Ignoring response for unknown request {}", id);
            return false;
        };

        Arc::make_mut(record).resolve(status_code, response_time_ms, response_body, response_kind);
        self.prune_and_publish(&mut records);

        tracing::debug!(
            "Request {} finished with {} in {}ms",
            id,
            status_code,
            response_time_ms
        );
        true
    }

    /// Live elapsed time for ongoing records, stored response time otherwise.
    pub fn current_duration(record: &LogRecord) -> u64 {
        record.current_duration_ms()
    }

    /// Re-publish the current snapshot so observers can redraw elapsed times.
    ///
    /// Does nothing when no record is ongoing. Returns whether it published.
    pub fn refresh_ongoing(&self) -> bool {
        let records = self.lock();
        if !records.iter().any(|record| record.is_ongoing()) {
            return false;
        }
        self.publish(&records);
        true
    }

    /// Remove every record and publish an empty snapshot.
    pub fn clear(&self) {
        let mut records = self.lock();
        let cleared = records.len();
        records.clear();
        self.publish(&records);
        tracing::info!("Cleared {} request log records", cleared);
    }

    /// Receive the full snapshot after every mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<LogSnapshot> {
        self.events.subscribe()
    }

    /// Snapshots as a stream. Lagging consumers skip straight to newer snapshots.
    pub fn snapshot_stream(&self) -> impl Stream<Item = LogSnapshot> + Send + 'static {
        stream::unfold(self.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(snapshot) => return Some((snapshot, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Log subscriber lagged by {} snapshots", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Current records, newest first.
    pub fn snapshot(&self) -> LogSnapshot {
        let records = self.lock();
        Arc::new(records.iter().cloned().collect())
    }

    pub fn get(&self, id: &str) -> Option<Arc<LogRecord>> {
        self.lock().iter().find(|record| record.id == id).cloned()
    }

    /// Records matching the filter, newest first.
    pub fn query(&self, filter: &RecordFilter) -> Vec<Arc<LogRecord>> {
        self.lock()
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ongoing_count(&self) -> usize {
        self.lock().iter().filter(|record| record.is_ongoing()).count()
    }

    /// Call [`RequestLog::refresh_ongoing`] every `period` until the handle is
    /// aborted or the log is dropped.
    pub fn spawn_ongoing_ticker(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let log: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match log.upgrade() {
                    Some(log) => {
                        log.refresh_ongoing();
                    }
                    None => break,
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<LogRecord>>> {
        // Every mutation leaves the list consistent, so a poisoned lock is still usable.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune_and_publish(&self, records: &mut VecDeque<Arc<LogRecord>>) {
        let pruned = prune_inline_images(records, self.config.max_image_retained);
        if pruned > 0 {
            tracing::debug!("Redacted inline images from {} older records", pruned);
        }
        self.publish(records);
    }

    fn publish(&self, records: &VecDeque<Arc<LogRecord>>) {
        let snapshot: LogSnapshot = Arc::new(records.iter().cloned().collect());
        // No subscribers is fine.
        let _ = self.events.send(snapshot);
    }
}

/// Strip inline image data from all but the `keep` newest image records.
///
/// Returns the number of records rewritten.
fn prune_inline_images(records: &mut VecDeque<Arc<LogRecord>>, keep: usize) -> usize {
    let mut retained = 0;
    let mut pruned = 0;
    for record in records.iter_mut() {
        if !record.has_inline_image() {
            continue;
        }
        if retained < keep {
            retained += 1;
            continue;
        }
        let record = Arc::make_mut(record);
        if let Some(body) = record.response_body.take() {
            record.response_body = Some(redact_stored_body(&body));
        }
        pruned += 1;
    }
    pruned
}

/// Replace each image with its placeholder. Malformed leftovers are hidden in
/// place; a body with no describable image at all is hidden wholesale.
fn redact_stored_body(body: &str) -> String {
    if !contains_capturable_image(body) {
        return HIDDEN_IMAGE_PLACEHOLDER.to_string();
    }
    let redacted = replace_image_payloads(body);
    if contains_inline_image(&redacted) {
        hide_remaining_images(&redacted)
    } else {
        redacted.into_owned()
    }
}
