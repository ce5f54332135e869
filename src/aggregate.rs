use crate::format;
use crate::types::{AggregateSnapshot, SessionEntity};

pub fn project(sessions: &[SessionEntity]) -> AggregateSnapshot {
    let total = sessions.len();
    let verified = sessions.iter().filter(|s| s.verified).count();

    let verified_rate_percent = if total > 0 {
        let percent = verified as f64 / total as f64 * 100.0;
        Some((percent * 10.0).round() / 10.0)
    } else {
        None
    };

    AggregateSnapshot {
        total,
        verified,
        awaiting: total - verified,
        verified_rate_percent,
    }
}

/// "66.7% verified", or empty when nothing is loaded
pub fn rate_label(aggregate: &AggregateSnapshot) -> String {
    aggregate
        .verified_rate_percent
        .map(|rate| format!("{:.1}% verified", rate))
        .unwrap_or_default()
}

pub fn verification_summary(aggregate: &AggregateSnapshot) -> String {
    if aggregate.total == 0 {
        return "No sessions loaded yet".to_string();
    }
    format!(
        "{} verified • {} awaiting",
        format::number(aggregate.verified),
        format::number(aggregate.awaiting)
    )
}
