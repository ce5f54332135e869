//! Block timestamp memoization
//!
//! Every block is fetched at most once per configuration. A failed or empty
//! lookup is stored as `None` and served from the cache from then on; only
//! `clear` (on reconfiguration) allows a block to be fetched again.

use crate::source::LogSource;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TimestampCache {
    entries: HashMap<u64, Option<u64>>,
}

impl TimestampCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached timestamp of `block_number`, fetching it on first use
    pub async fn resolve(&mut self, source: &dyn LogSource, block_number: u64) -> Option<u64> {
        if let Some(cached) = self.entries.get(&block_number) {
            return *cached;
        }

        let resolved = match source.block_timestamp(block_number).await {
            Ok(timestamp) => timestamp,
            Err(e) => {
                log::warn!("⚠️  Unable to fetch timestamp for block {}: {}", block_number, e);
                None
            }
        };

        self.entries.insert(block_number, resolved);
        resolved
    }

    /// `Some(entry)` when the block was already resolved, successfully or not
    pub fn cached(&self, block_number: u64) -> Option<Option<u64>> {
        self.entries.get(&block_number).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use crate::types::{LogKind, RawLogEvent};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingBlocks {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LogSource for CountingBlocks {
        async fn query_logs(&self, _: LogKind, _: u64, _: u64) -> Result<Vec<RawLogEvent>, SourceError> {
            Ok(Vec::new())
        }

        async fn latest_block_number(&self) -> Result<u64, SourceError> {
            Ok(0)
        }

        async fn block_timestamp(&self, block_number: u64) -> Result<Option<u64>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match block_number {
                13 => Err(SourceError::Unavailable("pruned".to_string())),
                99 => Ok(None),
                n => Ok(Some(n * 10)),
            }
        }
    }

    #[tokio::test]
    async fn test_hit_skips_fetch() {
        let source = CountingBlocks::default();
        let mut cache = TimestampCache::new();

        assert_eq!(cache.resolve(&source, 5).await, Some(50));
        assert_eq!(cache.resolve(&source, 5).await, Some(50));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached(5), Some(Some(50)));
        assert_eq!(cache.cached(6), None);
    }

    #[tokio::test]
    async fn test_failures_are_permanent() {
        let source = CountingBlocks::default();
        let mut cache = TimestampCache::new();

        assert_eq!(cache.resolve(&source, 13).await, None);
        assert_eq!(cache.resolve(&source, 13).await, None);
        assert_eq!(cache.resolve(&source, 99).await, None);
        assert_eq!(cache.resolve(&source, 99).await, None);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.cached(13), Some(None));
    }

    #[tokio::test]
    async fn test_clear_allows_refetch() {
        let source = CountingBlocks::default();
        let mut cache = TimestampCache::new();

        cache.resolve(&source, 13).await;
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        cache.resolve(&source, 13).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
