//! Collaborators the reconciler reads from
//!
//! The reconciler only sees these traits. `contract::SessionContract` backs
//! them with an alloy provider against the deployed contract and
//! `poller::PollingSubscription` provides live delivery; tests substitute
//! in-memory fakes.

pub mod abi;
pub mod backoff;
pub mod contract;
pub mod poller;

use crate::types::{LogKind, Overview, RawDetailRecord, RawLogEvent};
use alloy::transports::TransportError;
use async_trait::async_trait;
use std::sync::Arc;

pub use contract::{connect, Connection, SessionContract};
pub use poller::PollingSubscription;

#[derive(Debug)]
pub enum SourceError {
    Transport(String),
    Rpc { code: i64, message: String },
    Decode(String),
    Unavailable(String),
}

impl From<TransportError> for SourceError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => SourceError::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
            },
            None => SourceError::Transport(err.to_string()),
        }
    }
}

impl From<alloy::contract::Error> for SourceError {
    fn from(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(e) => e.into(),
            other => SourceError::Decode(other.to_string()),
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Transport(e) => write!(f, "Transport error: {}", e),
            SourceError::Rpc { code, message } => write!(f, "RPC error {}: {}", code, message),
            SourceError::Decode(e) => write!(f, "Decode error: {}", e),
            SourceError::Unavailable(e) => write!(f, "Unavailable: {}", e),
        }
    }
}

impl std::error::Error for SourceError {}

/// Historical log queries and block lookups
#[async_trait]
pub trait LogSource: Send + Sync {
    /// All logs of `kind` in `[from_block, to_block]`
    async fn query_logs(
        &self,
        kind: LogKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLogEvent>, SourceError>;

    async fn latest_block_number(&self) -> Result<u64, SourceError>;

    /// `Ok(None)` when the node knows no such block
    async fn block_timestamp(&self, block_number: u64) -> Result<Option<u64>, SourceError>;
}

/// Per-session detail lookup keyed by session id
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn record_detail(&self, session_id: &str) -> Result<RawDetailRecord, SourceError>;
}

/// Contract-wide totals that cannot be derived from the session index
#[async_trait]
pub trait OverviewSource: Send + Sync {
    async fn overview(&self) -> Result<Overview, SourceError>;
}

/// Callback invoked for every live log of the kind it was registered for
pub type LogHandler = Arc<dyn Fn(RawLogEvent) + Send + Sync>;

/// Push delivery of new logs as blocks are mined
pub trait LiveSubscription: Send {
    fn subscribe(&mut self, kind: LogKind, handler: LogHandler) -> Result<(), SourceError>;

    /// Drops every registered handler; safe to call when nothing is registered
    fn unsubscribe_all(&mut self);

    fn handler_count(&self) -> usize;
}

/// The read-side collaborators bundled for one configured source
#[derive(Clone)]
pub struct Sources {
    pub logs: Arc<dyn LogSource>,
    pub details: Arc<dyn DetailSource>,
    pub overview: Arc<dyn OverviewSource>,
}

impl Sources {
    /// All three roles served by one object, as the contract client does
    pub fn from_shared<T>(source: Arc<T>) -> Self
    where
        T: LogSource + DetailSource + OverviewSource + 'static,
    {
        Self {
            logs: source.clone(),
            details: source.clone(),
            overview: source,
        }
    }
}
