use crate::error::ReconcileError;
use crate::types::{AggregateSnapshot, FundingEvent, Overview, SessionEntity, TokenInfo};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Where and how often the dashboard view is exported
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub file_path: String,
    pub autosave_interval: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            file_path: "dashboard.json".to_string(),
            autosave_interval: Duration::from_secs(60),
        }
    }
}

/// Point-in-time dashboard view handed to display layers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub contract_address: Option<String>,
    pub token: TokenInfo,
    pub overview: Option<Overview>,
    pub sessions: Vec<SessionEntity>,
    pub funding: Vec<FundingEvent>,
    pub aggregate: AggregateSnapshot,
    pub saved_at: i64,
}

/// Writes the snapshot as pretty JSON, replacing the file atomically
pub fn save_snapshot(snapshot: &DashboardSnapshot, file_path: &str) -> Result<(), ReconcileError> {
    let json = serde_json::to_string_pretty(snapshot)?;

    let tmp_path = format!("{}.tmp", file_path);
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, file_path)?;

    log::debug!(
        "💾 Saved {} sessions and {} funding events to {}",
        snapshot.sessions.len(),
        snapshot.funding.len(),
        file_path
    );
    Ok(())
}

/// `Ok(None)` when no snapshot has been written yet
pub fn load_snapshot(file_path: &str) -> Result<Option<DashboardSnapshot>, ReconcileError> {
    if !Path::new(file_path).exists() {
        log::info!("No existing snapshot file found: {}", file_path);
        return Ok(None);
    }

    let json = fs::read_to_string(file_path)?;
    let snapshot: DashboardSnapshot = serde_json::from_str(&json)?;

    log::info!(
        "Loaded snapshot of {} sessions from {}",
        snapshot.sessions.len(),
        file_path
    );
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FundingKind, SessionKind};
    use alloy::primitives::U256;
    use tempfile::TempDir;

    fn sample() -> DashboardSnapshot {
        DashboardSnapshot {
            contract_address: Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string()),
            token: TokenInfo::default(),
            overview: Some(Overview {
                total_sessions: U256::from(1),
                total_trees: U256::from(3),
                ..Default::default()
            }),
            sessions: vec![SessionEntity {
                session_id: "cs_1".to_string(),
                payer: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
                kind: SessionKind::Monthly,
                tree_count: U256::from(3),
                donation_amount: U256::from(3_000_000),
                timestamp: 1_700_000_000,
                verified: false,
                block_number: Some(12),
                transaction_hash: Some("0x12".to_string()),
            }],
            funding: vec![FundingEvent {
                kind: FundingKind::Deposit,
                amount: U256::from(10_000_000),
                counterparty: None,
                block_number: Some(11),
                timestamp: None,
                transaction_hash: None,
            }],
            aggregate: AggregateSnapshot {
                total: 1,
                verified: 0,
                awaiting: 1,
                verified_rate_percent: Some(0.0),
            },
            saved_at: 1_700_000_100,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dashboard.json");
        let path = path.to_str().unwrap();

        save_snapshot(&sample(), path).unwrap();
        let loaded = load_snapshot(path).unwrap().unwrap();
        assert_eq!(loaded, sample());

        let raw = std::fs::read_to_string(path).unwrap();
        assert!(raw.contains("\"kind\": \"deposit\""));
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        assert!(load_snapshot(path.to_str().unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_snapshot(path.to_str().unwrap()),
            Err(ReconcileError::Serialization(_))
        ));
    }
}
