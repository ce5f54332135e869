//! Reconciliation engine
//!
//! `Reconciler` owns every piece of read-side state: the session index, the
//! block timestamp cache, the funding ledger and the contract overview. It
//! is driven from a single task (see `runtime`), so each pass applies its
//! results in one step before the next message is looked at. Network calls
//! inside a pass may run concurrently; their results are applied only after
//! all of them settle, each on its own, so one failed query does not
//! discard what the others loaded.
//!
//! Failures of user-triggered operations produce one summarized error
//! notice. Passive operations (live events, automatic reloads) only log.

use crate::aggregate;
use crate::backfill;
use crate::cache::TimestampCache;
use crate::config::Config;
use crate::error::ReconcileError;
use crate::format;
use crate::index::SessionIndex;
use crate::ledger;
use crate::live::{LiveDelivery, LiveRegistration, LiveState};
use crate::normalizer;
use crate::notify::{Change, ChangeEvent, ChangeListener, Notice, Notifier};
use crate::runtime::EngineMessage;
use crate::snapshot::DashboardSnapshot;
use crate::source::{Connection, LiveSubscription, SourceError, Sources};
use crate::types::{
    AggregateSnapshot, FundingEvent, FundingKind, LogKind, Overview, RawLogEvent, SessionEntity,
    TokenInfo,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Who asked for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Direct user action; failures are summarized in a notice
    User,
    /// Background or automatic; failures are only logged
    Passive,
}

pub struct Reconciler {
    sources: Option<Sources>,
    subscription: Option<Box<dyn LiveSubscription>>,
    live: LiveRegistration,
    live_sink: Option<UnboundedSender<EngineMessage>>,
    contract_address: Option<String>,
    token: TokenInfo,
    from_block: u64,
    index: SessionIndex,
    cache: TimestampCache,
    funding: Vec<FundingEvent>,
    overview: Option<Overview>,
    notifier: Arc<dyn Notifier>,
    listeners: Vec<ChangeListener>,
}

impl Reconciler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            sources: None,
            subscription: None,
            live: LiveRegistration::new(),
            live_sink: None,
            contract_address: None,
            token: TokenInfo::default(),
            from_block: 0,
            index: SessionIndex::new(),
            cache: TimestampCache::new(),
            funding: Vec::new(),
            overview: None,
            notifier,
            listeners: Vec::new(),
        }
    }

    /// Channel live handlers forward their deliveries into. Without one,
    /// `configure` loads data but registers no live handlers.
    pub fn attach_live_sink(&mut self, sink: UnboundedSender<EngineMessage>) {
        self.live_sink = Some(sink);
    }

    pub fn on_change(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    pub fn is_configured(&self) -> bool {
        self.sources.is_some()
    }

    /// Opens a connection for `config` and configures against it. A
    /// connection that cannot be opened is reported like a failed load.
    pub async fn connect(&mut self, config: &Config, trigger: Trigger) -> Result<(), ReconcileError> {
        match crate::source::connect(config).await {
            Ok(connection) => self.configure(connection, config.from_block(), trigger).await,
            Err(e) => {
                let result = Err(ReconcileError::from(e));
                self.report(trigger, "loading dashboard", &result, "Dashboard data loaded.");
                result
            }
        }
    }

    /// Swaps in a new source: tears down live handlers, drops all state
    /// (timestamp cache included), registers fresh handlers and runs a full
    /// load over `[from_block, latest]`.
    pub async fn configure(
        &mut self,
        connection: Connection,
        from_block: u64,
        trigger: Trigger,
    ) -> Result<(), ReconcileError> {
        self.disconnect();

        let Connection {
            sources,
            mut subscription,
            token,
            contract_address,
        } = connection;

        log::info!("🔧 Configuring reconciler for {} from block {}", contract_address, from_block);

        self.sources = Some(sources);
        self.token = token;
        self.contract_address = Some(contract_address);
        self.from_block = from_block;

        match &self.live_sink {
            Some(sink) => {
                if let Err(e) = self.live.register(subscription.as_mut(), sink) {
                    log::warn!("⚠️  Live updates unavailable: {}", e);
                }
            }
            None => log::debug!("No live sink attached, skipping live registration"),
        }
        self.subscription = Some(subscription);

        let result = self.load_all().await;
        self.report(trigger, "loading dashboard", &result, "Dashboard data loaded.");
        result
    }

    /// Reloads overview, sessions and funding for the configured source
    pub async fn refresh(&mut self, trigger: Trigger) -> Result<(), ReconcileError> {
        if !self.is_configured() {
            if trigger == Trigger::User {
                self.notifier.notify(Notice::error("Load the dashboard first."));
            }
            return Err(ReconcileError::NotConfigured);
        }

        let result = self.load_all().await;
        self.report(trigger, "refreshing dashboard", &result, "Dashboard refreshed.");
        result
    }

    /// Drops the source, its live handlers and every piece of derived state
    pub fn reset(&mut self) {
        self.disconnect();
        self.contract_address = None;
        self.token = TokenInfo::default();
        self.from_block = 0;
        log::info!("🧹 Reconciler reset");
    }

    /// Removes live handlers and keeps the loaded state
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.as_mut() {
            self.live.teardown(subscription.as_mut());
        }
    }

    /// Clears the index, then rebuilds it from `SessionRecorded` logs in
    /// `[from_block, to_block]`. Returns the number of sessions indexed.
    pub async fn backfill(&mut self, from_block: u64, to_block: u64) -> Result<usize, ReconcileError> {
        let sources = self.sources()?;
        self.index.clear();

        let outcome = backfill::collect_sessions(&sources, from_block, to_block).await?;
        Ok(self.apply_sessions(outcome.sessions))
    }

    /// Re-derives the funding ledger over `[from_block, to_block]` and
    /// replaces the previous one
    pub async fn rebuild_funding(&mut self, from_block: u64, to_block: u64) -> Result<usize, ReconcileError> {
        let sources = self.sources()?;
        let rebuilt =
            ledger::rebuild_funding_ledger(sources.logs.as_ref(), &mut self.cache, from_block, to_block)
                .await?;
        Ok(self.apply_funding(rebuilt))
    }

    pub async fn refresh_overview(&mut self) -> Result<(), ReconcileError> {
        let sources = self.sources()?;
        let overview = sources.overview.overview().await?;
        self.apply_overview(overview);
        Ok(())
    }

    async fn load_all(&mut self) -> Result<(), ReconcileError> {
        let sources = self.sources()?;
        let from_block = self.from_block;
        let latest = sources.logs.latest_block_number().await?;

        self.index.clear();

        let (overview, outcome, rebuilt) = tokio::join!(
            sources.overview.overview(),
            backfill::collect_sessions(&sources, from_block, latest),
            ledger::rebuild_funding_ledger(sources.logs.as_ref(), &mut self.cache, from_block, latest),
        );

        let mut errors = Vec::new();

        match overview {
            Ok(overview) => self.apply_overview(overview),
            Err(e) => {
                log::error!("❌ Overview load failed: {}", e);
                errors.push(e);
            }
        }

        let indexed = match outcome {
            Ok(outcome) => self.apply_sessions(outcome.sessions),
            Err(e) => {
                log::error!("❌ Session backfill failed: {}", e);
                errors.push(e);
                self.index.len()
            }
        };

        let funding = match rebuilt {
            Ok(rebuilt) => self.apply_funding(rebuilt),
            Err(e) => {
                log::error!("❌ Funding ledger rebuild failed: {}", e);
                errors.push(e);
                self.funding.len()
            }
        };

        log::info!(
            "📊 Loaded blocks {}..={}: {} sessions, {} funding events ({} failed)",
            from_block,
            latest,
            indexed,
            funding,
            errors.len()
        );

        // overview, sessions, funding: the earliest failure is the one reported
        match errors.into_iter().next() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Applies one live delivery. Deliveries from a superseded registration
    /// are dropped; any failure is logged and suppresses the notice.
    pub async fn apply_live(&mut self, delivery: LiveDelivery) {
        let kind = delivery.event.kind();

        if !self.live.accepts(delivery.generation) {
            log::debug!(
                "Discarding stale live {} (generation {}, state {:?})",
                kind,
                delivery.generation,
                self.live.state()
            );
            return;
        }

        let outcome = match kind {
            LogKind::SessionRecorded => self.on_session_recorded(&delivery.event).await,
            LogKind::SessionVerified => self.on_session_verified(&delivery.event).await,
            LogKind::FundsDeposited | LogKind::DonationPayout => self.on_funding(&delivery.event).await,
        };

        match outcome {
            Ok(message) => self.notifier.notify(Notice::success(message)),
            Err(e) => log::error!("❌ Error processing live {} event: {}", kind, e),
        }
    }

    async fn on_session_recorded(&mut self, event: &RawLogEvent) -> Result<String, ReconcileError> {
        let sources = self.sources()?;
        let session_id = required_key(event)?;

        let session =
            normalizer::hydrate(sources.details.as_ref(), &session_id, Some(&event.origin)).await?;
        self.index.upsert(session);
        self.emit(Change::Sessions);

        // totals such as trees planted are not derivable from the index
        let overview = sources.overview.overview().await?;
        self.apply_overview(overview);

        Ok(format!("Session {} recorded.", session_id))
    }

    async fn on_session_verified(&mut self, event: &RawLogEvent) -> Result<String, ReconcileError> {
        let sources = self.sources()?;
        let session_id = required_key(event)?;

        // verification logs carry no origin worth keeping
        let session = normalizer::hydrate(sources.details.as_ref(), &session_id, None).await?;
        self.index.upsert(session);
        self.emit(Change::Sessions);

        Ok(format!("Session {} verified.", session_id))
    }

    async fn on_funding(&mut self, event: &RawLogEvent) -> Result<String, ReconcileError> {
        let sources = self.sources()?;
        let (kind, amount, counterparty) = event
            .payload
            .funding()
            .ok_or_else(|| SourceError::Decode(format!("{} is not a funding log", event.kind())))?;

        let overview = sources.overview.overview().await?;
        self.apply_overview(overview);

        let latest = sources.logs.latest_block_number().await?;
        let rebuilt =
            ledger::rebuild_funding_ledger(sources.logs.as_ref(), &mut self.cache, self.from_block, latest)
                .await?;
        self.apply_funding(rebuilt);

        let amount = format::optional_currency(amount, &self.token);
        let counterparty = format::short_address(counterparty);
        Ok(match kind {
            FundingKind::Deposit => format!("Deposit of {} from {}.", amount, counterparty),
            FundingKind::Payout => format!("Donation payout of {} to {}.", amount, counterparty),
        })
    }

    pub fn session_snapshot(&self) -> Vec<SessionEntity> {
        self.index.snapshot()
    }

    pub fn funding_snapshot(&self) -> Vec<FundingEvent> {
        self.funding.clone()
    }

    pub fn aggregate_snapshot(&self) -> AggregateSnapshot {
        aggregate::project(&self.index.snapshot())
    }

    pub fn overview(&self) -> Option<&Overview> {
        self.overview.as_ref()
    }

    pub fn token(&self) -> &TokenInfo {
        &self.token
    }

    pub fn contract_address(&self) -> Option<&str> {
        self.contract_address.as_deref()
    }

    pub fn from_block(&self) -> u64 {
        self.from_block
    }

    pub fn live_state(&self) -> LiveState {
        self.live.state()
    }

    pub fn cached_timestamps(&self) -> usize {
        self.cache.len()
    }

    /// Everything a display layer renders, taken at one instant
    pub fn dashboard(&self) -> DashboardSnapshot {
        let sessions = self.index.snapshot();
        DashboardSnapshot {
            contract_address: self.contract_address.clone(),
            token: self.token.clone(),
            overview: self.overview.clone(),
            aggregate: aggregate::project(&sessions),
            sessions,
            funding: self.funding.clone(),
            saved_at: chrono::Utc::now().timestamp(),
        }
    }

    fn sources(&self) -> Result<Sources, ReconcileError> {
        self.sources.clone().ok_or(ReconcileError::NotConfigured)
    }

    fn disconnect(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            self.live.teardown(subscription.as_mut());
        }
        self.live.forget();
        self.sources = None;

        self.index.clear();
        self.cache.clear();
        self.funding.clear();
        self.overview = None;
        self.emit(Change::Cleared);
    }

    fn apply_sessions(&mut self, sessions: Vec<SessionEntity>) -> usize {
        for session in sessions {
            self.index.upsert(session);
        }
        self.emit(Change::Sessions);
        self.index.len()
    }

    fn apply_funding(&mut self, rebuilt: Vec<FundingEvent>) -> usize {
        self.funding = rebuilt;
        self.emit(Change::Funding);
        self.funding.len()
    }

    fn apply_overview(&mut self, overview: Overview) {
        self.overview = Some(overview);
        self.emit(Change::Overview);
    }

    fn emit(&self, change: Change) {
        if self.listeners.is_empty() {
            return;
        }
        let event = ChangeEvent {
            change,
            aggregate: aggregate::project(&self.index.snapshot()),
        };
        for listener in &self.listeners {
            listener(&event);
        }
    }

    fn report(&self, trigger: Trigger, context: &str, result: &Result<(), ReconcileError>, success: &str) {
        match result {
            Ok(()) => {
                if trigger == Trigger::User {
                    self.notifier.notify(Notice::success(success));
                }
            }
            Err(e) => {
                log::error!("❌ Error {}: {}", context, e);
                if trigger == Trigger::User {
                    self.notifier.notify(Notice::error(format!(
                        "{} failed: {}",
                        format::capitalize(context),
                        e.summary()
                    )));
                }
            }
        }
    }
}

fn required_key(event: &RawLogEvent) -> Result<String, ReconcileError> {
    normalizer::business_key(event)
        .map(str::to_string)
        .ok_or_else(|| {
            ReconcileError::Source(SourceError::Decode(format!("{} log without a session id", event.kind())))
        })
}
