//! Chain Data Source - blockchain state, broadcast and fee estimates.
//!
//! Two static profiles, one active at a time:
//!
//! | Profile | Transport | Knobs |
//! |---------|-----------|-------|
//! | Electrum | `bdk_electrum` | url, socks5, retry, timeout, stop-gap, domain validation |
//! | Esplora | `bdk_esplora` (blocking) | base url, concurrency, stop-gap, timeout, proxy |
//!
//! A connection is opened per operation and dropped afterwards. Nothing is
//! pooled, so one bad connection cannot poison later calls.

#[cfg(feature = "electrum")]
mod electrum;
#[cfg(feature = "esplora")]
mod esplora;

use crate::config::Network;
use crate::wallet::SatPerVb;
use bdk_wallet::bitcoin::Transaction;
use bdk_wallet::chain::spk_client::FullScanRequest;
use bdk_wallet::{KeychainKind, Update};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("connect: {0}")]
    Connect(String),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// An open connection to a chain data source. Blocking.
pub trait ChainSource: Send {
    /// Scan every keychain of the request up to the configured stop-gap.
    fn full_scan(&self, request: FullScanRequest<KeychainKind>) -> Result<Update, ChainError>;
    fn broadcast(&self, tx: &Transaction) -> Result<(), ChainError>;
    /// Fee rate needed to confirm within `target_blocks`, in sat/vB.
    fn estimate_fee(&self, target_blocks: u16) -> Result<SatPerVb, ChainError>;
}

/// Opens a fresh [`ChainSource`] per operation.
pub trait ChainConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn ChainSource>, ChainError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainSourceKind { Electrum, Esplora }

impl ChainSourceKind {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "electrum" => Some(ChainSourceKind::Electrum),
            "esplora" | "http" => Some(ChainSourceKind::Esplora),
            _ => None,
        }
    }
}

// Reference endpoints and knobs
pub const ESPLORA_URL_BITCOIN: &str = "https://blockstream.info/api/";
pub const ESPLORA_URL_TESTNET: &str = "https://blockstream.info/testnet/api";
pub const ESPLORA_URL_SIGNET: &str = "https://mempool.space/signet/api";
pub const ESPLORA_URL_REGTEST: &str = "http://127.0.0.1:3002";
pub const ESPLORA_TIMEOUT: u64 = 1000;
pub const ESPLORA_STOPGAP: usize = 20;
pub const ESPLORA_CONCURRENCY: usize = 4;

pub const ELECTRUM_URL_BITCOIN: &str = "ssl://electrum.blockstream.info:50002";
pub const ELECTRUM_URL_TESTNET: &str = "ssl://electrum.blockstream.info:60002";
pub const ELECTRUM_URL_SIGNET: &str = "ssl://mempool.space:60602";
pub const ELECTRUM_URL_REGTEST: &str = "tcp://127.0.0.1:60401";
pub const ELECTRUM_RETRY: u8 = 5;
pub const ELECTRUM_STOPGAP: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectrumConfig {
    pub url: String,
    pub socks5: Option<String>,
    pub retry: u8,
    /// Seconds; `None` leaves the client default.
    pub timeout: Option<u8>,
    pub stop_gap: usize,
    pub validate_domain: bool,
}

impl ElectrumConfig {
    pub fn for_network(network: Network) -> Self {
        let url = match network {
            Network::Bitcoin => ELECTRUM_URL_BITCOIN,
            Network::Testnet => ELECTRUM_URL_TESTNET,
            Network::Signet => ELECTRUM_URL_SIGNET,
            Network::Regtest => ELECTRUM_URL_REGTEST,
        };
        Self { url: url.into(), socks5: None, retry: ELECTRUM_RETRY, timeout: None, stop_gap: ELECTRUM_STOPGAP, validate_domain: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsploraConfig {
    pub base_url: String,
    pub proxy: Option<String>,
    /// Parallel requests during a scan.
    pub concurrency: usize,
    pub stop_gap: usize,
    /// Seconds.
    pub timeout: u64,
}

impl EsploraConfig {
    pub fn for_network(network: Network) -> Self {
        let url = match network {
            Network::Bitcoin => ESPLORA_URL_BITCOIN,
            Network::Testnet => ESPLORA_URL_TESTNET,
            Network::Signet => ESPLORA_URL_SIGNET,
            Network::Regtest => ESPLORA_URL_REGTEST,
        };
        Self { base_url: url.into(), proxy: None, concurrency: ESPLORA_CONCURRENCY, stop_gap: ESPLORA_STOPGAP, timeout: ESPLORA_TIMEOUT }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainConfig {
    Electrum(ElectrumConfig),
    Esplora(EsploraConfig),
}

impl ChainConfig {
    pub fn for_network(kind: ChainSourceKind, network: Network) -> Self {
        match kind {
            ChainSourceKind::Electrum => ChainConfig::Electrum(ElectrumConfig::for_network(network)),
            ChainSourceKind::Esplora => ChainConfig::Esplora(EsploraConfig::for_network(network)),
        }
    }

    pub fn kind(&self) -> ChainSourceKind {
        match self { ChainConfig::Electrum(_) => ChainSourceKind::Electrum, ChainConfig::Esplora(_) => ChainSourceKind::Esplora }
    }

    pub fn url(&self) -> &str {
        match self { ChainConfig::Electrum(c) => &c.url, ChainConfig::Esplora(c) => &c.base_url }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        match &mut self {
            ChainConfig::Electrum(c) => c.url = url.into(),
            ChainConfig::Esplora(c) => c.base_url = url.into(),
        }
        self
    }

    pub fn stop_gap(&self) -> usize {
        match self { ChainConfig::Electrum(c) => c.stop_gap, ChainConfig::Esplora(c) => c.stop_gap }
    }
}

impl ChainConnector for ChainConfig {
    fn connect(&self) -> Result<Box<dyn ChainSource>, ChainError> {
        tracing::debug!(url = self.url(), "Opening chain source");
        match self {
            #[cfg(feature = "electrum")]
            ChainConfig::Electrum(c) => electrum::connect(c),
            #[cfg(not(feature = "electrum"))]
            ChainConfig::Electrum(_) => Err(ChainError::Connect("electrum support not compiled in".into())),
            #[cfg(feature = "esplora")]
            ChainConfig::Esplora(c) => esplora::connect(c),
            #[cfg(not(feature = "esplora"))]
            ChainConfig::Esplora(_) => Err(ChainError::Connect("esplora support not compiled in".into())),
        }
    }
}
