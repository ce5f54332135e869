//! User-visible notices and change callbacks
//!
//! Notices are the toast-style messages a display layer shows. Change
//! events fire after each mutating pass and carry the aggregate computed
//! from the index at that moment, so a listener never renders counts that
//! disagree with the session list it reads next.

use crate::types::AggregateSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => log::info!("✅ {}", notice.message),
            NoticeLevel::Info => log::info!("ℹ️  {}", notice.message),
            NoticeLevel::Error => log::error!("❌ {}", notice.message),
        }
    }
}

/// Keeps notices in memory until a display layer drains them
#[derive(Default)]
pub struct NoticeBuffer {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notice> {
        let mut notices = self.notices.lock().unwrap_or_else(|p| p.into_inner());
        std::mem::take(&mut *notices)
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for NoticeBuffer {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(notice);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// Backfill finished or a live session event was applied
    Sessions,
    /// Funding ledger rebuilt
    Funding,
    /// Contract totals reloaded
    Overview,
    /// Everything dropped by a reset or reconfiguration
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub change: Change,
    pub aggregate: AggregateSnapshot,
}

pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + Send + Sync>;
