//! Single-task engine loop
//!
//! All reconciler mutation happens here, one message at a time:
//! 1. Live deliveries forwarded by subscription handlers
//! 2. Configure / refresh / reset requests from the embedding application
//! 3. Periodic snapshot export
//!
//! Live deliveries that arrive while a pass is running wait in the channel
//! and are applied after it, so a backfill's clear-and-repopulate can never
//! interleave with a live upsert.

use crate::config::Config;
use crate::engine::{Reconciler, Trigger};
use crate::live::LiveDelivery;
use crate::snapshot::{save_snapshot, PersistenceConfig};
use crate::source::Connection;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

pub enum EngineMessage {
    Live(LiveDelivery),
    /// Open a connection for the config, then configure against it
    Connect {
        config: Config,
        trigger: Trigger,
    },
    Configure {
        connection: Connection,
        from_block: u64,
        trigger: Trigger,
    },
    Refresh(Trigger),
    Reset,
    Shutdown,
}

/// Cloneable front door to a running engine loop
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl EngineHandle {
    /// False once the loop has stopped
    pub fn connect(&self, config: Config, trigger: Trigger) -> bool {
        self.send(EngineMessage::Connect { config, trigger })
    }

    pub fn configure(&self, connection: Connection, from_block: u64, trigger: Trigger) -> bool {
        self.send(EngineMessage::Configure {
            connection,
            from_block,
            trigger,
        })
    }

    pub fn refresh(&self, trigger: Trigger) -> bool {
        self.send(EngineMessage::Refresh(trigger))
    }

    pub fn reset(&self) -> bool {
        self.send(EngineMessage::Reset)
    }

    pub fn shutdown(&self) -> bool {
        self.send(EngineMessage::Shutdown)
    }

    fn send(&self, message: EngineMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Spawns the engine loop. The join handle yields the reconciler back once
/// the loop stops.
pub fn start(
    mut reconciler: Reconciler,
    persistence: Option<PersistenceConfig>,
) -> (EngineHandle, JoinHandle<Reconciler>) {
    let (tx, rx) = mpsc::unbounded_channel();
    reconciler.attach_live_sink(tx.clone());

    let task = tokio::spawn(run(reconciler, rx, persistence));
    (EngineHandle { tx }, task)
}

async fn run(
    mut reconciler: Reconciler,
    mut rx: mpsc::UnboundedReceiver<EngineMessage>,
    persistence: Option<PersistenceConfig>,
) -> Reconciler {
    let autosave_every = persistence
        .as_ref()
        .map(|p| p.autosave_interval)
        .unwrap_or(std::time::Duration::from_secs(60));

    log::info!("🚀 Starting reconciler loop");
    match &persistence {
        Some(p) => log::info!("   └─ Autosave: {} every {}s", p.file_path, p.autosave_interval.as_secs()),
        None => log::info!("   └─ Autosave: disabled"),
    }

    let mut autosave = interval(autosave_every);
    let mut live_applied = 0u64;

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    log::warn!("⚠️  Engine channel closed, stopping");
                    break;
                };

                match message {
                    EngineMessage::Live(delivery) => {
                        reconciler.apply_live(delivery).await;
                        live_applied += 1;
                    }
                    // outcomes are already reported through the notifier
                    EngineMessage::Connect { config, trigger } => {
                        let _ = reconciler.connect(&config, trigger).await;
                    }
                    EngineMessage::Configure { connection, from_block, trigger } => {
                        let _ = reconciler.configure(connection, from_block, trigger).await;
                    }
                    EngineMessage::Refresh(trigger) => {
                        let _ = reconciler.refresh(trigger).await;
                    }
                    EngineMessage::Reset => reconciler.reset(),
                    EngineMessage::Shutdown => {
                        log::info!("🛑 Shutdown requested");
                        break;
                    }
                }
            }

            _ = autosave.tick(), if persistence.is_some() => {
                if let Some(p) = &persistence {
                    autosave_snapshot(&reconciler, p);
                }
                log::debug!("Live deliveries applied since start: {}", live_applied);
            }
        }
    }

    reconciler.shutdown();
    if let Some(p) = &persistence {
        log::info!("🔄 Writing final snapshot...");
        autosave_snapshot(&reconciler, p);
    }

    log::info!("✅ Reconciler loop stopped");
    reconciler
}

fn autosave_snapshot(reconciler: &Reconciler, persistence: &PersistenceConfig) {
    if !reconciler.is_configured() {
        return;
    }
    if let Err(e) = save_snapshot(&reconciler.dashboard(), &persistence.file_path) {
        log::warn!("⚠️  Failed to save snapshot: {}", e);
    }
}
