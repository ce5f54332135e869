//! Display formatting for amounts, counts, addresses and times

use crate::source::abi;
use crate::types::{FundingEvent, FundingKind, TokenAmount, TokenInfo};
use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use std::fmt::Display;

pub const PLACEHOLDER: &str = "—";

/// Thousands-separated integer, `1,234,567`
pub fn number(value: impl Display) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Token amount as US dollars with two decimals, e.g. `$1,234.50`.
/// Falls back to `{raw} {symbol}` when the decimals cannot be represented.
pub fn currency(amount: TokenAmount, token: &TokenInfo) -> String {
    let hundred = U256::from(100);
    match to_cents(amount, token.decimals) {
        Some(cents) => format!("${}.{:0>2}", number(cents / hundred), (cents % hundred).to_string()),
        None => format!("{} {}", amount, token.symbol),
    }
}

pub fn optional_currency(amount: Option<TokenAmount>, token: &TokenInfo) -> String {
    amount
        .map(|amount| currency(amount, token))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Rounds half up to whole cents
fn to_cents(amount: TokenAmount, decimals: u8) -> Option<U256> {
    let ten = U256::from(10);
    if decimals >= 2 {
        let divisor = ten.checked_pow(U256::from(decimals - 2))?;
        let cents = amount / divisor;
        let remainder = amount % divisor;
        if remainder.checked_mul(U256::from(2))? >= divisor {
            cents.checked_add(U256::from(1))
        } else {
            Some(cents)
        }
    } else {
        amount.checked_mul(ten.checked_pow(U256::from(2 - decimals))?)
    }
}

/// `0x5aAe…eAed`; missing addresses render as the placeholder and
/// malformed ones are returned unchanged
pub fn short_address(address: Option<&str>) -> String {
    let Some(address) = address.filter(|a| !a.is_empty()) else {
        return PLACEHOLDER.to_string();
    };

    match abi::checksum_address(address) {
        Some(checksummed) => format!("{}…{}", &checksummed[..6], &checksummed[checksummed.len() - 4..]),
        None => address.to_string(),
    }
}

fn datetime(timestamp: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(timestamp).ok()?;
    DateTime::<Utc>::from_timestamp(secs, 0)
}

/// Session record time; 0 is unknown
pub fn record_time(timestamp: u64) -> String {
    if timestamp == 0 {
        return PLACEHOLDER.to_string();
    }
    datetime(timestamp)
        .map(|dt| dt.format("%b %-d, %Y, %H:%M UTC").to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Funding entry time; unresolved lookups are spelled out
pub fn ledger_time(timestamp: Option<u64>) -> String {
    match timestamp.filter(|ts| *ts > 0).and_then(datetime) {
        Some(dt) => dt.format("%b %-d, %Y, %H:%M UTC").to_string(),
        None => "Timestamp unavailable".to_string(),
    }
}

pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One funding feed line: `Deposit $5.00 • From 0x5aAe…eAed • Block 100 • Nov 14, 2023, 22:13 UTC`
pub fn funding_line(event: &FundingEvent, token: &TokenInfo) -> String {
    let direction = match event.kind {
        FundingKind::Deposit => "From",
        FundingKind::Payout => "To",
    };
    let block = event
        .block_number
        .map(|b| b.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    format!(
        "{} {} • {} {} • Block {} • {}",
        capitalize(event.kind.as_str()),
        currency(event.amount, token),
        direction,
        short_address(event.counterparty.as_deref()),
        block,
        ledger_time(event.timestamp)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> TokenInfo {
        TokenInfo {
            address: None,
            symbol: "USDC".to_string(),
            decimals: 6,
        }
    }

    #[test]
    fn test_number() {
        assert_eq!(number(0), "0");
        assert_eq!(number(999), "999");
        assert_eq!(number(1_000), "1,000");
        assert_eq!(number(1_234_567), "1,234,567");
        assert_eq!(number(U256::from(1_000_000u64)), "1,000,000");
    }

    #[test]
    fn test_currency() {
        let token = usdc();
        assert_eq!(currency(U256::ZERO, &token), "$0.00");
        assert_eq!(currency(U256::from(1_500_000), &token), "$1.50");
        assert_eq!(currency(U256::from(1_234_565_000u64), &token), "$1,234.57");
        assert_eq!(currency(U256::from(4_999), &token), "$0.00");
        assert_eq!(currency(U256::from(5_000), &token), "$0.01");
        assert_eq!(currency(U256::from(5), &token), "$0.00");
        assert_eq!(currency(U256::from(70_000), &token), "$0.07");

        let whole = TokenInfo { decimals: 0, ..usdc() };
        assert_eq!(currency(U256::from(12), &whole), "$12.00");

        let absurd = TokenInfo { decimals: 90, ..usdc() };
        assert_eq!(currency(U256::from(12), &absurd), "12 USDC");

        assert_eq!(optional_currency(None, &token), "—");
    }

    #[test]
    fn test_currency_beyond_u128() {
        // 2^128 whole dollars at 6 decimals
        let dollars = U256::from(1) << 128;
        let amount = dollars * U256::from(1_000_000);
        assert_eq!(
            currency(amount, &usdc()),
            "$340,282,366,920,938,463,463,374,607,431,768,211,456.00"
        );

        let whole = TokenInfo { decimals: 0, ..usdc() };
        assert_eq!(currency(U256::MAX, &whole), format!("{} USDC", U256::MAX));
    }

    #[test]
    fn test_short_address() {
        assert_eq!(
            short_address(Some("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed")),
            "0x5aAe…eAed"
        );
        assert_eq!(short_address(None), "—");
        assert_eq!(short_address(Some("")), "—");
        assert_eq!(short_address(Some("treasury")), "treasury");
    }

    #[test]
    fn test_times() {
        assert_eq!(record_time(0), "—");
        assert_eq!(record_time(1_700_000_000), "Nov 14, 2023, 22:13 UTC");
        assert_eq!(ledger_time(None), "Timestamp unavailable");
        assert_eq!(ledger_time(Some(0)), "Timestamp unavailable");
        assert_eq!(ledger_time(Some(1_700_000_000)), "Nov 14, 2023, 22:13 UTC");
    }

    #[test]
    fn test_funding_line() {
        let event = FundingEvent {
            kind: FundingKind::Payout,
            amount: U256::from(5_000_000),
            counterparty: Some("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".to_string()),
            block_number: Some(100),
            timestamp: None,
            transaction_hash: None,
        };
        assert_eq!(
            funding_line(&event, &usdc()),
            "Payout $5.00 • To 0x5aAe…eAed • Block 100 • Timestamp unavailable"
        );
        assert_eq!(capitalize("deposit"), "Deposit");
        assert_eq!(capitalize(""), "");
    }
}
