//! treeflow - session and funding reconciler
//!
//! Connects to the session contract, loads every session and funding
//! movement since `START_BLOCK`, then follows new blocks and keeps a JSON
//! view of the dashboard at `SNAPSHOT_PATH`.
//!
//! Usage:
//!   cargo run --release --bin treeflow
//!
//! Environment variables:
//!   CONTRACT_ADDRESS - session contract (required)
//!   RPC_URL - JSON-RPC endpoint (required)
//!   START_BLOCK - first block to read (default: 0)
//!   STABLECOIN_DECIMALS - decimals when the token does not report them
//!   POLL_INTERVAL_MS - live polling interval (default: 4000)
//!   SNAPSHOT_PATH - dashboard export file (default: dashboard.json)
//!   AUTOSAVE_INTERVAL_SECS - export interval (default: 60)
//!   RUST_LOG - log filter (default: info)
//!
//! Send SIGHUP to trigger a manual refresh.

use dotenv::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use treeflow::aggregate;
use treeflow::format;
use treeflow::notify::LogNotifier;
use treeflow::runtime::{self, EngineHandle};
use treeflow::snapshot::PersistenceConfig;
use treeflow::{Config, Reconciler, Trigger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.rust_log.as_str()))
        .init();

    info!("🌳 treeflow reconciler");
    info!("   ├─ Contract: {}", config.contract_address);
    info!("   ├─ RPC: {}", config.rpc_url);
    info!("   ├─ Start block: {}", config.from_block());
    info!("   ├─ Poll interval: {}ms", config.poll_interval_ms);
    info!("   └─ Snapshot: {} (every {}s)", config.snapshot_path, config.autosave_interval_secs);

    let mut reconciler = Reconciler::new(Arc::new(LogNotifier));
    reconciler.on_change(Box::new(|event| {
        log::debug!(
            "🔁 {:?} changed: {} | {}",
            event.change,
            aggregate::verification_summary(&event.aggregate),
            aggregate::rate_label(&event.aggregate)
        );
    }));

    let persistence = PersistenceConfig {
        file_path: config.snapshot_path.clone(),
        autosave_interval: Duration::from_secs(config.autosave_interval_secs),
    };

    let (handle, task) = runtime::start(reconciler, Some(persistence));
    // connect failures are reported through the notifier like any failed load
    handle.connect(config.clone(), Trigger::User);

    spawn_refresh_on_hangup(handle.clone());

    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    handle.shutdown();
    let reconciler = task.await?;

    let dashboard = reconciler.dashboard();
    info!("📊 Final view:");
    info!("   ├─ Sessions: {}", format::number(dashboard.sessions.len()));
    info!("   ├─ {}", aggregate::verification_summary(&dashboard.aggregate));
    if let Some(overview) = &dashboard.overview {
        info!("   ├─ Trees planted: {}", format::number(overview.total_trees));
        info!("   ├─ Owed: {}", format::currency(overview.total_owed, &dashboard.token));
        info!("   ├─ Balance: {}", format::currency(overview.contract_balance, &dashboard.token));
    }
    for event in dashboard.funding.iter().take(5) {
        info!("   ├─ {}", format::funding_line(event, &dashboard.token));
    }
    info!("   └─ Funding events: {}", dashboard.funding.len());

    info!("✅ treeflow stopped");
    Ok(())
}

#[cfg(unix)]
fn spawn_refresh_on_hangup(handle: EngineHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("⚠️  SIGHUP refresh unavailable: {}", e);
                return;
            }
        };

        while hangup.recv().await.is_some() {
            info!("🔄 SIGHUP received, refreshing");
            if !handle.refresh(Trigger::User) {
                break;
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_refresh_on_hangup(_handle: EngineHandle) {}
