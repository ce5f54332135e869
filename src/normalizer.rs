//! Raw detail record → canonical session entity
//!
//! Decoding rules:
//! - session type `1` is Monthly, every other code is Hourly
//! - missing tree counts and amounts are zero
//! - a zero timestamp means "unknown" and is kept as 0
//! - a missing verified flag is false
//! - block and transaction come from the origin's flat fields, then its
//!   nested `log`, and are null when neither is present

use crate::source::{DetailSource, SourceError};
use crate::types::{EventOrigin, RawDetailRecord, RawLogEvent, SessionEntity, SessionKind, ZERO_ADDRESS};
use alloy::primitives::U256;

pub fn normalize(
    session_id: &str,
    detail: &RawDetailRecord,
    origin: Option<&EventOrigin>,
) -> SessionEntity {
    SessionEntity {
        session_id: session_id.to_string(),
        payer: detail
            .payer
            .clone()
            .filter(|payer| !payer.is_empty())
            .unwrap_or_else(|| ZERO_ADDRESS.to_string()),
        kind: SessionKind::from_code(detail.session_type.unwrap_or(0)),
        tree_count: detail.tree_count.unwrap_or(U256::ZERO),
        donation_amount: detail.donation_amount.unwrap_or(U256::ZERO),
        timestamp: detail.timestamp.unwrap_or(0),
        verified: detail.verified.unwrap_or(false),
        block_number: origin.and_then(EventOrigin::block_number),
        transaction_hash: origin.and_then(|o| o.transaction_hash()).map(str::to_string),
    }
}

/// Business key of a session log, if the payload carries one
pub fn business_key(event: &RawLogEvent) -> Option<&str> {
    event.payload.session_id()
}

/// Fetches the detail record for `session_id` and normalizes it. A failed
/// fetch is returned to the caller, which decides whether to skip.
pub async fn hydrate(
    details: &dyn DetailSource,
    session_id: &str,
    origin: Option<&EventOrigin>,
) -> Result<SessionEntity, SourceError> {
    let detail = details.record_detail(session_id).await?;
    Ok(normalize(session_id, &detail, origin))
}
