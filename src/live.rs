//! Live subscription lifecycle
//!
//! ```text
//! Unregistered --register--> Active { generation } --teardown--> Unregistered
//! ```
//!
//! Registering while active tears the previous registration down first, so
//! a reconnect never leaves two handlers per log kind. Each registration
//! gets a fresh generation; handlers stamp their deliveries with it and the
//! engine drops deliveries whose generation is no longer active.

use crate::runtime::EngineMessage;
use crate::source::{LiveSubscription, LogHandler, SourceError};
use crate::types::{LogKind, RawLogEvent};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveDelivery {
    pub generation: u64,
    pub event: RawLogEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    Unregistered,
    Active { generation: u64 },
}

#[derive(Debug)]
pub struct LiveRegistration {
    state: LiveState,
    last_generation: u64,
}

impl Default for LiveRegistration {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveRegistration {
    pub fn new() -> Self {
        Self {
            state: LiveState::Unregistered,
            last_generation: 0,
        }
    }

    pub fn state(&self) -> LiveState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, LiveState::Active { .. })
    }

    /// Registers one handler per log kind, each forwarding into `sink`.
    /// Any earlier registration is torn down first.
    pub fn register(
        &mut self,
        subscription: &mut dyn LiveSubscription,
        sink: &UnboundedSender<EngineMessage>,
    ) -> Result<u64, SourceError> {
        self.teardown(subscription);

        self.last_generation += 1;
        let generation = self.last_generation;

        for kind in LogKind::all() {
            if let Err(e) = subscription.subscribe(kind, forwarding_handler(generation, sink.clone())) {
                self.teardown(subscription);
                return Err(e);
            }
        }

        self.state = LiveState::Active { generation };
        log::info!(
            "👂 Live handlers registered (generation {}, {} kinds)",
            generation,
            subscription.handler_count()
        );
        Ok(generation)
    }

    /// Safe to call in any state
    pub fn teardown(&mut self, subscription: &mut dyn LiveSubscription) {
        subscription.unsubscribe_all();
        if let LiveState::Active { generation } = self.state {
            log::info!("🔇 Live handlers removed (generation {})", generation);
        }
        self.state = LiveState::Unregistered;
    }

    /// Marks the registration gone when the subscription itself was dropped
    pub fn forget(&mut self) {
        self.state = LiveState::Unregistered;
    }

    /// True when `generation` is the active registration
    pub fn accepts(&self, generation: u64) -> bool {
        self.state == LiveState::Active { generation }
    }
}

fn forwarding_handler(generation: u64, sink: UnboundedSender<EngineMessage>) -> LogHandler {
    std::sync::Arc::new(move |event: RawLogEvent| {
        let kind = event.kind();
        if sink
            .send(EngineMessage::Live(LiveDelivery { generation, event }))
            .is_err()
        {
            log::debug!("Dropping live {} delivery, engine stopped", kind);
        }
    })
}
