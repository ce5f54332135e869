//! Funding ledger: deposits and payouts in one list, newest first
//!
//! The ledger is always rebuilt from a full re-query of both log kinds.
//! Entries whose block timestamp could not be resolved sort as timestamp 0,
//! which places them after every resolved entry.

use crate::cache::TimestampCache;
use crate::source::{LogSource, SourceError};
use crate::types::{FundingEvent, LogKind, RawLogEvent};
use alloy::primitives::U256;

pub async fn rebuild_funding_ledger(
    logs: &dyn LogSource,
    cache: &mut TimestampCache,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<FundingEvent>, SourceError> {
    let deposits = logs
        .query_logs(LogKind::FundsDeposited, from_block, to_block)
        .await?;
    let payouts = logs
        .query_logs(LogKind::DonationPayout, from_block, to_block)
        .await?;

    let mut ledger = Vec::with_capacity(deposits.len() + payouts.len());

    for event in deposits.iter().chain(payouts.iter()) {
        let Some(mut entry) = funding_entry(event) else {
            continue;
        };
        if let Some(block_number) = entry.block_number {
            entry.timestamp = cache.resolve(logs, block_number).await;
        }
        ledger.push(entry);
    }

    sort_ledger(&mut ledger);

    log::info!(
        "💸 Funding ledger {}..={}: {} deposits, {} payouts",
        from_block,
        to_block,
        deposits.len(),
        payouts.len()
    );

    Ok(ledger)
}

/// Unresolved funding entry for a deposit or payout log
pub fn funding_entry(event: &RawLogEvent) -> Option<FundingEvent> {
    let (kind, amount, counterparty) = event.payload.funding()?;
    Some(FundingEvent {
        kind,
        amount: amount.unwrap_or(U256::ZERO),
        counterparty: counterparty.map(str::to_string),
        block_number: event.origin.block_number(),
        timestamp: None,
        transaction_hash: event.origin.transaction_hash().map(str::to_string),
    })
}

/// Stable sort, newest first, unresolved timestamps as 0
pub fn sort_ledger(ledger: &mut [FundingEvent]) {
    ledger.sort_by(|a, b| b.sort_timestamp().cmp(&a.sort_timestamp()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventOrigin, FundingKind, LogPayload};
    use async_trait::async_trait;

    fn entry(kind: FundingKind, timestamp: Option<u64>) -> FundingEvent {
        FundingEvent {
            kind,
            amount: U256::from(1),
            counterparty: None,
            block_number: None,
            timestamp,
            transaction_hash: None,
        }
    }

    #[test]
    fn test_sort_pins_unknown_last() {
        let mut ledger = vec![
            entry(FundingKind::Payout, None),
            entry(FundingKind::Deposit, Some(10)),
            entry(FundingKind::Deposit, Some(30)),
            entry(FundingKind::Payout, Some(0)),
            entry(FundingKind::Payout, Some(20)),
        ];
        sort_ledger(&mut ledger);

        let order: Vec<u64> = ledger.iter().map(|e| e.sort_timestamp()).collect();
        assert_eq!(order, vec![30, 20, 10, 0, 0]);
        // stable among equal keys
        assert_eq!(ledger[3].timestamp, None);
        assert_eq!(ledger[4].timestamp, Some(0));
    }

    struct Funding;

    #[async_trait]
    impl LogSource for Funding {
        async fn query_logs(&self, kind: LogKind, _: u64, _: u64) -> Result<Vec<RawLogEvent>, SourceError> {
            Ok(match kind {
                LogKind::FundsDeposited => vec![
                    RawLogEvent {
                        payload: LogPayload::FundsDeposited { from: Some("0xabc".to_string()), amount: Some(U256::from(7)) },
                        origin: EventOrigin::flat(3, "0x03"),
                    },
                    RawLogEvent {
                        payload: LogPayload::FundsDeposited { from: None, amount: None },
                        origin: EventOrigin::default(),
                    },
                ],
                LogKind::DonationPayout => vec![RawLogEvent {
                    payload: LogPayload::DonationPayout { recipient: Some("0xdef".to_string()), amount: Some(U256::from(9)) },
                    origin: EventOrigin::flat(8, "0x08"),
                }],
                _ => Vec::new(),
            })
        }

        async fn latest_block_number(&self) -> Result<u64, SourceError> {
            Ok(8)
        }

        async fn block_timestamp(&self, block_number: u64) -> Result<Option<u64>, SourceError> {
            Ok(Some(block_number * 100))
        }
    }

    #[tokio::test]
    async fn test_rebuild_merges_and_orders() {
        let mut cache = TimestampCache::new();
        let ledger = rebuild_funding_ledger(&Funding, &mut cache, 0, 8).await.unwrap();

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger[0].kind, FundingKind::Payout);
        assert_eq!(ledger[0].timestamp, Some(800));
        assert_eq!(ledger[0].counterparty.as_deref(), Some("0xdef"));
        assert_eq!(ledger[1].kind, FundingKind::Deposit);
        assert_eq!(ledger[1].timestamp, Some(300));
        assert_eq!(ledger[1].transaction_hash.as_deref(), Some("0x03"));
        // no block, so no lookup and no timestamp
        assert_eq!(ledger[2].amount, U256::ZERO);
        assert_eq!(ledger[2].timestamp, None);
        assert_eq!(cache.len(), 2);
    }
}
