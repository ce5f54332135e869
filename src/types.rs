//! Core records shared by the reconciler, its sources and the display layer
//!
//! Raw shapes (`RawLogEvent`, `RawDetailRecord`) are what the chain hands us.
//! Canonical shapes (`SessionEntity`, `FundingEvent`) are what the index and
//! the funding ledger hold after normalization.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amounts in the stablecoin's smallest unit, full uint256 range
pub type TokenAmount = U256;

/// Zero address used when a detail record carries no payer
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    Hourly,
    Monthly,
}

impl SessionKind {
    /// Raw discriminant `1` is monthly, anything else is hourly
    pub fn from_code(code: u64) -> Self {
        if code == 1 {
            SessionKind::Monthly
        } else {
            SessionKind::Hourly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Hourly => "Hourly",
            SessionKind::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metered usage record, keyed by its externally assigned session id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntity {
    pub session_id: String,
    pub payer: String,
    pub kind: SessionKind,
    pub tree_count: U256,
    pub donation_amount: TokenAmount,
    /// Seconds since epoch, 0 when unknown
    pub timestamp: u64,
    pub verified: bool,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundingKind {
    Deposit,
    Payout,
}

impl FundingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundingKind::Deposit => "deposit",
            FundingKind::Payout => "payout",
        }
    }
}

/// One deposit into, or donation payout out of, the contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingEvent {
    pub kind: FundingKind,
    pub amount: TokenAmount,
    pub counterparty: Option<String>,
    pub block_number: Option<u64>,
    /// None when the block lookup failed or the block was unknown
    pub timestamp: Option<u64>,
    pub transaction_hash: Option<String>,
}

impl FundingEvent {
    /// Sort key for the ledger; unresolved timestamps count as 0
    pub fn sort_timestamp(&self) -> u64 {
        self.timestamp.unwrap_or(0)
    }
}

/// Log types the reconciler reads, historically and live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogKind {
    SessionRecorded,
    SessionVerified,
    FundsDeposited,
    DonationPayout,
}

impl LogKind {
    pub fn all() -> [LogKind; 4] {
        [
            LogKind::SessionRecorded,
            LogKind::SessionVerified,
            LogKind::FundsDeposited,
            LogKind::DonationPayout,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::SessionRecorded => "SessionRecorded",
            LogKind::SessionVerified => "SessionVerified",
            LogKind::FundsDeposited => "FundsDeposited",
            LogKind::DonationPayout => "DonationPayout",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded event arguments. Every field is optional: a payload that could
/// not be decoded still travels, and consumers decide what a gap means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LogPayload {
    #[serde(rename_all = "camelCase")]
    SessionRecorded {
        session_id: Option<String>,
        payer: Option<String>,
        session_type: Option<u8>,
        tree_count: Option<U256>,
        donation_amount: Option<TokenAmount>,
    },
    #[serde(rename_all = "camelCase")]
    SessionVerified {
        session_id: Option<String>,
        verifier: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    FundsDeposited {
        from: Option<String>,
        amount: Option<TokenAmount>,
    },
    #[serde(rename_all = "camelCase")]
    DonationPayout {
        recipient: Option<String>,
        amount: Option<TokenAmount>,
    },
}

impl LogPayload {
    pub fn kind(&self) -> LogKind {
        match self {
            LogPayload::SessionRecorded { .. } => LogKind::SessionRecorded,
            LogPayload::SessionVerified { .. } => LogKind::SessionVerified,
            LogPayload::FundsDeposited { .. } => LogKind::FundsDeposited,
            LogPayload::DonationPayout { .. } => LogKind::DonationPayout,
        }
    }

    /// Business key carried by session logs; empty ids count as absent
    pub fn session_id(&self) -> Option<&str> {
        match self {
            LogPayload::SessionRecorded { session_id, .. }
            | LogPayload::SessionVerified { session_id, .. } => {
                session_id.as_deref().filter(|id| !id.is_empty())
            }
            _ => None,
        }
    }

    /// Amount and counterparty of a funding log
    pub fn funding(&self) -> Option<(FundingKind, Option<TokenAmount>, Option<&str>)> {
        match self {
            LogPayload::FundsDeposited { from, amount } => {
                Some((FundingKind::Deposit, *amount, from.as_deref()))
            }
            LogPayload::DonationPayout { recipient, amount } => {
                Some((FundingKind::Payout, *amount, recipient.as_deref()))
            }
            _ => None,
        }
    }
}

/// Location of a log inside the chain, as carried by a nested `log` field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLocation {
    pub block_number: Option<u64>,
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<u64>,
}

/// Event metadata in either of the two shapes sources produce: flat
/// (`blockNumber` on the event itself, as historical queries return) or
/// nested under `log` (as live listener payloads carry it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOrigin {
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub log: Option<LogLocation>,
}

impl EventOrigin {
    pub fn flat(block_number: u64, transaction_hash: impl Into<String>) -> Self {
        Self {
            block_number: Some(block_number),
            transaction_hash: Some(transaction_hash.into()),
            log_index: None,
            log: None,
        }
    }

    pub fn nested(block_number: u64, transaction_hash: impl Into<String>) -> Self {
        Self {
            block_number: None,
            transaction_hash: None,
            log_index: None,
            log: Some(LogLocation {
                block_number: Some(block_number),
                transaction_hash: Some(transaction_hash.into()),
                log_index: None,
            }),
        }
    }

    /// Position of the log inside its block, in whichever shape is in use
    pub fn with_log_index(mut self, log_index: u64) -> Self {
        match self.log.as_mut() {
            Some(location) => location.log_index = Some(log_index),
            None => self.log_index = Some(log_index),
        }
        self
    }

    /// Flat field first, then the nested log
    pub fn block_number(&self) -> Option<u64> {
        self.block_number
            .or_else(|| self.log.as_ref().and_then(|log| log.block_number))
    }

    pub fn transaction_hash(&self) -> Option<&str> {
        self.transaction_hash
            .as_deref()
            .or_else(|| self.log.as_ref().and_then(|log| log.transaction_hash.as_deref()))
    }

    pub fn log_index(&self) -> Option<u64> {
        self.log_index
            .or_else(|| self.log.as_ref().and_then(|log| log.log_index))
    }

    /// Chain order: block first, then position in the block. Unknown
    /// positions sort first.
    pub fn chain_position(&self) -> (Option<u64>, Option<u64>) {
        (self.block_number(), self.log_index())
    }
}

/// A log as delivered by a log source or live subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogEvent {
    pub payload: LogPayload,
    #[serde(default)]
    pub origin: EventOrigin,
}

impl RawLogEvent {
    pub fn kind(&self) -> LogKind {
        self.payload.kind()
    }
}

/// Session detail as returned by the contract's `getSession` lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetailRecord {
    pub session_id: Option<String>,
    pub payer: Option<String>,
    pub session_type: Option<u64>,
    pub tree_count: Option<U256>,
    pub donation_amount: Option<TokenAmount>,
    pub timestamp: Option<u64>,
    pub verified: Option<bool>,
}

/// Derived view over the session index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub total: usize,
    pub verified: usize,
    pub awaiting: usize,
    /// Absent when no sessions are loaded, which is not the same as 0%
    pub verified_rate_percent: Option<f64>,
}

/// Contract-wide totals read directly from the contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub total_sessions: U256,
    pub total_trees: U256,
    pub donation_per_tree: TokenAmount,
    pub payout_threshold: TokenAmount,
    pub total_owed: TokenAmount,
    pub trees_org: String,
    pub contract_balance: TokenAmount,
}

/// Stablecoin the contract settles in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Option<String>,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for TokenInfo {
    fn default() -> Self {
        Self {
            address: None,
            symbol: "TOKEN".to_string(),
            decimals: 6,
        }
    }
}
