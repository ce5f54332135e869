//! Live log delivery by polling for new blocks
//!
//! The first poll only records the chain head; every later poll queries the
//! registered log kinds over `(cursor, latest]` and hands each log to its
//! handler in chain order (block, then log index). The cursor only advances once every query for
//! the range succeeded, so a failed poll is retried without re-delivering.
//!
//! Delivered events carry their origin nested under `log`, the shape live
//! listener payloads use.

use super::backoff::ExponentialBackoff;
use super::{LiveSubscription, LogHandler, LogSource, SourceError};
use crate::types::{EventOrigin, LogKind, LogLocation, RawLogEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

const MAX_POLL_RETRIES: u32 = 6;

type HandlerMap = Arc<Mutex<HashMap<LogKind, LogHandler>>>;

pub struct PollingSubscription {
    source: Arc<dyn LogSource>,
    poll_interval: Duration,
    handlers: HandlerMap,
    task: Option<JoinHandle<()>>,
}

impl PollingSubscription {
    pub fn new(source: Arc<dyn LogSource>, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            handlers: Arc::new(Mutex::new(HashMap::new())),
            task: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.task.is_some()
    }

    fn start(&mut self) -> Result<(), SourceError> {
        if self.task.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SourceError::Unavailable(format!("no async runtime for live polling: {}", e)))?;

        let source = self.source.clone();
        let handlers = self.handlers.clone();
        let interval = self.poll_interval;

        self.task = Some(runtime.spawn(async move {
            poll_loop(source, handlers, interval).await;
        }));

        log::info!("📡 Live polling started (interval: {}ms)", interval.as_millis());
        Ok(())
    }
}

impl LiveSubscription for PollingSubscription {
    fn subscribe(&mut self, kind: LogKind, handler: LogHandler) -> Result<(), SourceError> {
        lock(&self.handlers).insert(kind, handler);
        self.start()
    }

    fn unsubscribe_all(&mut self) {
        lock(&self.handlers).clear();
        if let Some(task) = self.task.take() {
            task.abort();
            log::info!("🔌 Live polling stopped");
        }
    }

    fn handler_count(&self) -> usize {
        lock(&self.handlers).len()
    }
}

impl Drop for PollingSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock(handlers: &HandlerMap) -> MutexGuard<'_, HashMap<LogKind, LogHandler>> {
    handlers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn poll_loop(source: Arc<dyn LogSource>, handlers: HandlerMap, interval: Duration) {
    let mut backoff = ExponentialBackoff::new(interval, interval * 16, MAX_POLL_RETRIES);
    let mut cursor = None;
    let mut timer = tokio::time::interval(interval);

    loop {
        timer.tick().await;

        match poll_once(source.as_ref(), &handlers, &mut cursor).await {
            Ok(delivered) => {
                backoff.reset();
                if delivered > 0 {
                    log::debug!("📥 Delivered {} live logs (head {:?})", delivered, cursor);
                }
            }
            Err(e) => {
                log::warn!("⚠️  Live poll failed: {}", e);
                if backoff.sleep().await.is_err() {
                    log::error!(
                        "❌ Live poll failing after {} retries, continuing at base interval",
                        MAX_POLL_RETRIES
                    );
                    backoff.reset();
                }
            }
        }
    }
}

async fn poll_once(
    source: &dyn LogSource,
    handlers: &HandlerMap,
    cursor: &mut Option<u64>,
) -> Result<usize, SourceError> {
    let latest = source.latest_block_number().await?;

    let from = match *cursor {
        None => {
            *cursor = Some(latest);
            return Ok(0);
        }
        Some(seen) if latest <= seen => return Ok(0),
        Some(seen) => seen + 1,
    };

    let kinds: Vec<LogKind> = lock(handlers).keys().copied().collect();

    let mut batch = Vec::new();
    for kind in kinds {
        batch.extend(source.query_logs(kind, from, latest).await?);
    }
    batch.sort_by_key(|event| event.origin.chain_position());

    let mut delivered = 0;
    for event in batch {
        let handler = lock(handlers).get(&event.kind()).cloned();
        if let Some(handler) = handler {
            handler(into_live_shape(event));
            delivered += 1;
        }
    }

    *cursor = Some(latest);
    Ok(delivered)
}

fn into_live_shape(event: RawLogEvent) -> RawLogEvent {
    let location = LogLocation {
        block_number: event.origin.block_number(),
        transaction_hash: event.origin.transaction_hash().map(str::to_string),
        log_index: event.origin.log_index(),
    };

    RawLogEvent {
        payload: event.payload,
        origin: EventOrigin {
            block_number: None,
            transaction_hash: None,
            log_index: None,
            log: Some(location),
        },
    }
}
