//! Historical session collection over a block range
//!
//! Detail lookups for every `SessionRecorded` log are issued together and
//! joined before anything is returned. A log without a session id, or whose
//! lookup fails, is skipped; only the log query itself can fail the pass.

use crate::normalizer;
use crate::source::{SourceError, Sources};
use crate::types::{LogKind, SessionEntity};
use futures::future::join_all;

#[derive(Debug, Default)]
pub struct BackfillOutcome {
    /// In log order
    pub sessions: Vec<SessionEntity>,
    pub logs_scanned: usize,
    pub skipped: usize,
}

pub async fn collect_sessions(
    sources: &Sources,
    from_block: u64,
    to_block: u64,
) -> Result<BackfillOutcome, SourceError> {
    let logs = sources
        .logs
        .query_logs(LogKind::SessionRecorded, from_block, to_block)
        .await?;

    let lookups = logs.iter().map(|event| async move {
        let Some(session_id) = normalizer::business_key(event) else {
            log::debug!("Skipping SessionRecorded log without a session id");
            return None;
        };

        match normalizer::hydrate(sources.details.as_ref(), session_id, Some(&event.origin)).await {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("⚠️  Unable to load session details for {}: {}", session_id, e);
                None
            }
        }
    });

    let results = join_all(lookups).await;

    let logs_scanned = results.len();
    let sessions: Vec<SessionEntity> = results.into_iter().flatten().collect();
    let skipped = logs_scanned - sessions.len();

    log::info!(
        "📚 Backfill {}..={}: {} sessions from {} logs ({} skipped)",
        from_block,
        to_block,
        sessions.len(),
        logs_scanned,
        skipped
    );

    Ok(BackfillOutcome {
        sessions,
        logs_scanned,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DetailSource, LogSource, OverviewSource};
    use crate::types::{EventOrigin, LogPayload, Overview, RawDetailRecord, RawLogEvent};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Chain {
        ids: Vec<Option<&'static str>>,
        broken: &'static str,
        fail_query: bool,
    }

    #[async_trait]
    impl LogSource for Chain {
        async fn query_logs(&self, kind: LogKind, from: u64, _: u64) -> Result<Vec<RawLogEvent>, SourceError> {
            if self.fail_query {
                return Err(SourceError::Unavailable("range too large".to_string()));
            }
            assert_eq!(kind, LogKind::SessionRecorded);
            Ok(self
                .ids
                .iter()
                .enumerate()
                .map(|(i, id)| RawLogEvent {
                    payload: LogPayload::SessionRecorded {
                        session_id: id.map(str::to_string),
                        payer: None,
                        session_type: None,
                        tree_count: None,
                        donation_amount: None,
                    },
                    origin: EventOrigin::flat(from + i as u64, format!("0x{}", i)),
                })
                .collect())
        }

        async fn latest_block_number(&self) -> Result<u64, SourceError> {
            Ok(100)
        }

        async fn block_timestamp(&self, _: u64) -> Result<Option<u64>, SourceError> {
            Ok(None)
        }
    }

    #[async_trait]
    impl DetailSource for Chain {
        async fn record_detail(&self, session_id: &str) -> Result<RawDetailRecord, SourceError> {
            if session_id == self.broken {
                return Err(SourceError::Rpc { code: 3, message: "execution reverted".to_string() });
            }
            Ok(RawDetailRecord {
                timestamp: Some(1_000),
                ..Default::default()
            })
        }
    }

    #[async_trait]
    impl OverviewSource for Chain {
        async fn overview(&self) -> Result<Overview, SourceError> {
            Ok(Overview::default())
        }
    }

    #[tokio::test]
    async fn test_skips_failed_and_keyless_logs() {
        let chain = Chain {
            ids: vec![Some("s1"), Some("s2"), None, Some(""), Some("s3")],
            broken: "s2",
            fail_query: false,
        };
        let sources = Sources::from_shared(Arc::new(chain));

        let outcome = collect_sessions(&sources, 10, 20).await.unwrap();

        let ids: Vec<&str> = outcome.sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s3"]);
        assert_eq!(outcome.logs_scanned, 5);
        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.sessions[1].block_number, Some(14));
    }

    #[tokio::test]
    async fn test_query_failure_fails_the_pass() {
        let chain = Chain { ids: vec![Some("s1")], broken: "", fail_query: true };
        let sources = Sources::from_shared(Arc::new(chain));
        assert!(collect_sessions(&sources, 0, 1).await.is_err());
    }
}
