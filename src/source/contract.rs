//! Session contract client
//!
//! Serves all three read roles (`LogSource`, `DetailSource`,
//! `OverviewSource`) from one alloy provider. Calls and events go through
//! the `ILettuceTrees` bindings; amounts keep their full uint256 width.

use super::abi::{IERC20Metadata, ILettuceTrees};
use super::poller::PollingSubscription;
use super::{DetailSource, LiveSubscription, LogSource, OverviewSource, SourceError, Sources};
use crate::config::Config;
use crate::types::{
    EventOrigin, LogKind, LogPayload, Overview, RawDetailRecord, RawLogEvent, TokenInfo,
};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Log};
use alloy::sol_types::SolEvent;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_DECIMALS: u8 = 6;
const DEFAULT_SYMBOL: &str = "TOKEN";

type ContractInstance = ILettuceTrees::ILettuceTreesInstance<DynProvider>;
type TokenInstance = IERC20Metadata::IERC20MetadataInstance<DynProvider>;

pub fn event_topic(kind: LogKind) -> B256 {
    match kind {
        LogKind::SessionRecorded => ILettuceTrees::SessionRecorded::SIGNATURE_HASH,
        LogKind::SessionVerified => ILettuceTrees::SessionVerified::SIGNATURE_HASH,
        LogKind::FundsDeposited => ILettuceTrees::FundsDeposited::SIGNATURE_HASH,
        LogKind::DonationPayout => ILettuceTrees::DonationPayout::SIGNATURE_HASH,
    }
}

pub struct SessionContract {
    provider: DynProvider,
    contract: ContractInstance,
    stable_coin: Option<TokenInstance>,
}

impl SessionContract {
    pub fn new(provider: DynProvider, address: Address) -> Self {
        Self {
            contract: ILettuceTrees::new(address, provider.clone()),
            provider,
            stable_coin: None,
        }
    }

    pub fn address(&self) -> Address {
        *self.contract.address()
    }

    pub fn with_stable_coin(mut self, token: Address) -> Self {
        self.stable_coin = Some(IERC20Metadata::new(token, self.provider.clone()));
        self
    }

    pub async fn stable_coin_address(&self) -> Result<Address, SourceError> {
        Ok(self.contract.stableCoin().call().await?)
    }

    /// Reads decimals and symbol from the stablecoin, falling back to the
    /// configured override, then to 6 decimals and the `TOKEN` symbol
    pub async fn token_info(&self, decimals_override: Option<u8>) -> TokenInfo {
        let Some(token) = &self.stable_coin else {
            return TokenInfo {
                address: None,
                symbol: DEFAULT_SYMBOL.to_string(),
                decimals: decimals_override.unwrap_or(DEFAULT_DECIMALS),
            };
        };

        let decimals = match token.decimals().call().await {
            Ok(decimals) => Some(decimals),
            Err(e) => {
                log::warn!("Stablecoin decimals unavailable, using override/default: {}", e);
                None
            }
        };

        let symbol = match token.symbol().call().await {
            Ok(symbol) => Some(symbol),
            Err(e) => {
                log::warn!("Stablecoin symbol unavailable: {}", e);
                None
            }
        };

        TokenInfo {
            address: Some(token.address().to_checksum(None)),
            symbol: symbol
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
            decimals: decimals.or(decimals_override).unwrap_or(DEFAULT_DECIMALS),
        }
    }
}

#[async_trait]
impl LogSource for SessionContract {
    async fn query_logs(
        &self,
        kind: LogKind,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLogEvent>, SourceError> {
        if from_block > to_block {
            return Err(SourceError::Unavailable(format!(
                "invalid block range {}..={}",
                from_block, to_block
            )));
        }

        let filter = Filter::new()
            .address(self.address())
            .event_signature(event_topic(kind))
            .from_block(from_block)
            .to_block(to_block);
        let logs = self.provider.get_logs(&filter).await?;

        log::debug!(
            "📜 {} {} logs in blocks {}..={}",
            logs.len(),
            kind,
            from_block,
            to_block
        );

        Ok(logs.iter().map(|log| decode_log(kind, log)).collect())
    }

    async fn latest_block_number(&self) -> Result<u64, SourceError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<Option<u64>, SourceError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await?;
        Ok(block.map(|block| block.header.timestamp))
    }
}

#[async_trait]
impl DetailSource for SessionContract {
    async fn record_detail(&self, session_id: &str) -> Result<RawDetailRecord, SourceError> {
        let session = self.contract.getSession(session_id.to_string()).call().await?;
        Ok(session_detail(session))
    }
}

#[async_trait]
impl OverviewSource for SessionContract {
    async fn overview(&self) -> Result<Overview, SourceError> {
        let contract = &self.contract;
        let (total_sessions, total_trees, donation_per_tree, payout_threshold, total_owed, trees_org) = tokio::try_join!(
            async { contract.totalSessions().call().await },
            async { contract.totalTreesPlanted().call().await },
            async { contract.donationPerTree().call().await },
            async { contract.payoutThreshold().call().await },
            async { contract.totalOwedAmount().call().await },
            async { contract.treesOrg().call().await },
        )?;

        let contract_balance = match &self.stable_coin {
            Some(token) => match token.balanceOf(self.address()).call().await {
                Ok(balance) => balance,
                Err(e) => {
                    log::warn!("Unable to load contract balance: {}", e);
                    U256::ZERO
                }
            },
            None => U256::ZERO,
        };

        Ok(Overview {
            total_sessions,
            total_trees,
            donation_per_tree,
            payout_threshold,
            total_owed,
            trees_org: trees_org.to_checksum(None),
            contract_balance,
        })
    }
}

/// Flattens a `getSession` return value. Timestamps past `u64` saturate.
pub fn session_detail(session: ILettuceTrees::Session) -> RawDetailRecord {
    RawDetailRecord {
        session_id: Some(session.sessionId),
        payer: Some(session.payer.to_checksum(None)),
        session_type: Some(u64::from(session.sessionType)),
        tree_count: Some(session.treeCount),
        donation_amount: Some(session.donationAmount),
        timestamp: Some(session.timestamp.saturating_to::<u64>()),
        verified: Some(session.verified),
    }
}

/// Decodes a log into a flat-origin event. A log whose data does not
/// decode still travels, with an empty payload.
pub fn decode_log(kind: LogKind, log: &Log) -> RawLogEvent {
    let payload = match kind {
        LogKind::SessionRecorded => match log.log_decode::<ILettuceTrees::SessionRecorded>() {
            Ok(decoded) => {
                let event = decoded.inner.data;
                LogPayload::SessionRecorded {
                    session_id: Some(event.sessionId),
                    payer: Some(event.payer.to_checksum(None)),
                    session_type: Some(event.sessionType),
                    tree_count: Some(event.treeCount),
                    donation_amount: Some(event.donationAmount),
                }
            }
            Err(e) => undecoded(kind, e),
        },
        LogKind::SessionVerified => match log.log_decode::<ILettuceTrees::SessionVerified>() {
            Ok(decoded) => {
                let event = decoded.inner.data;
                LogPayload::SessionVerified {
                    session_id: Some(event.sessionId),
                    verifier: Some(event.verifier.to_checksum(None)),
                }
            }
            Err(e) => undecoded(kind, e),
        },
        LogKind::FundsDeposited => match log.log_decode::<ILettuceTrees::FundsDeposited>() {
            Ok(decoded) => {
                let event = decoded.inner.data;
                LogPayload::FundsDeposited {
                    from: Some(event.from.to_checksum(None)),
                    amount: Some(event.amount),
                }
            }
            Err(e) => undecoded(kind, e),
        },
        LogKind::DonationPayout => match log.log_decode::<ILettuceTrees::DonationPayout>() {
            Ok(decoded) => {
                let event = decoded.inner.data;
                LogPayload::DonationPayout {
                    recipient: Some(event.recipient.to_checksum(None)),
                    amount: Some(event.amount),
                }
            }
            Err(e) => undecoded(kind, e),
        },
    };

    RawLogEvent {
        payload,
        origin: EventOrigin {
            block_number: log.block_number,
            transaction_hash: log.transaction_hash.map(|hash| hash.to_string()),
            log_index: log.log_index,
            log: None,
        },
    }
}

fn undecoded(kind: LogKind, err: alloy::sol_types::Error) -> LogPayload {
    log::debug!("Undecodable {} log: {}", kind, err);
    match kind {
        LogKind::SessionRecorded => LogPayload::SessionRecorded {
            session_id: None,
            payer: None,
            session_type: None,
            tree_count: None,
            donation_amount: None,
        },
        LogKind::SessionVerified => LogPayload::SessionVerified {
            session_id: None,
            verifier: None,
        },
        LogKind::FundsDeposited => LogPayload::FundsDeposited {
            from: None,
            amount: None,
        },
        LogKind::DonationPayout => LogPayload::DonationPayout {
            recipient: None,
            amount: None,
        },
    }
}

/// A configured read source and its live subscription
pub struct Connection {
    pub sources: Sources,
    pub subscription: Box<dyn LiveSubscription>,
    pub token: TokenInfo,
    pub contract_address: String,
}

/// Resolves the stablecoin, reads its token info and wires the polling
/// subscription, all against `config.rpc_url`
pub async fn connect(config: &Config) -> Result<Connection, SourceError> {
    let url: Url = config
        .rpc_url
        .parse()
        .map_err(|e| SourceError::Unavailable(format!("invalid RPC URL {}: {}", config.rpc_url, e)))?;
    let address = Address::from_str(&config.contract_address)
        .map_err(|e| SourceError::Decode(format!("invalid contract address {}: {}", config.contract_address, e)))?;

    let provider = ProviderBuilder::new().connect_http(url).erased();
    let contract = SessionContract::new(provider, address);

    let stable_coin = contract.stable_coin_address().await?;
    let contract = contract.with_stable_coin(stable_coin);
    let token = contract.token_info(config.decimals_override).await;

    log::info!("🔗 Connected to {}", config.contract_address);
    log::info!("   ├─ RPC: {}", config.rpc_url);
    log::info!("   └─ Stablecoin: {} ({} decimals) at {}", token.symbol, token.decimals, stable_coin);

    let contract = Arc::new(contract);
    let subscription = PollingSubscription::new(
        contract.clone(),
        Duration::from_millis(config.poll_interval_ms),
    );

    Ok(Connection {
        sources: Sources::from_shared(contract),
        subscription: Box::new(subscription),
        token,
        contract_address: config.contract_address.clone(),
    })
}
