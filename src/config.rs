//! Wallet configuration. Static; chosen once at startup.

use crate::chain::{ChainConfig, ChainSourceKind};
use crate::keys::DescriptorKind;
use crate::seed::WordCount;
use crate::wallet::SatPerVb;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network { Bitcoin, #[default] Testnet, Signet, Regtest }

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self { Network::Bitcoin => "bitcoin", Network::Testnet => "testnet", Network::Signet => "signet", Network::Regtest => "regtest" }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "mainnet" | "main" => Some(Network::Bitcoin),
            "testnet" | "test" => Some(Network::Testnet),
            "signet" => Some(Network::Signet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }

    /// BIP44 coin type: 0 on mainnet, 1 on every test network.
    pub fn coin_type(&self) -> u32 {
        match self { Network::Bitcoin => 0, _ => 1 }
    }

    pub fn to_bdk(&self) -> bdk_wallet::bitcoin::Network {
        match self { Network::Bitcoin => bdk_wallet::bitcoin::Network::Bitcoin, Network::Testnet => bdk_wallet::bitcoin::Network::Testnet, Network::Signet => bdk_wallet::bitcoin::Network::Signet, Network::Regtest => bdk_wallet::bitcoin::Network::Regtest }
    }
}

/// Where the seed phrase is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    Dir(PathBuf),
}

impl Default for StorageConfig {
    fn default() -> Self { StorageConfig::Dir(default_data_dir()) }
}

/// Wallet handle persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DatabaseConfig {
    #[default]
    Memory,
    Disk(PathBuf),
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("beewallet")
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub network: Network,
    pub descriptor: DescriptorKind,
    pub word_count: WordCount,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    /// Used when the caller gives no rate, and when estimation is unavailable.
    pub default_fee_rate: SatPerVb,
    /// Confirmation target for `send_with_target` when the caller gives none.
    pub fee_target_blocks: u16,
    /// Start a sync as soon as the wallet is loaded.
    pub auto_sync: bool,
}

impl Default for WalletConfig {
    fn default() -> Self { Self::for_network(Network::default()) }
}

impl WalletConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            descriptor: DescriptorKind::default(),
            word_count: WordCount::default(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            chain: ChainConfig::for_network(ChainSourceKind::Electrum, network),
            default_fee_rate: SatPerVb::DEFAULT,
            fee_target_blocks: 6,
            auto_sync: true,
        }
    }

    pub fn mainnet() -> Self { Self::for_network(Network::Bitcoin) }
    pub fn testnet() -> Self { Self::for_network(Network::Testnet) }

    pub fn with_descriptor(mut self, kind: DescriptorKind) -> Self { self.descriptor = kind; self }
    pub fn with_word_count(mut self, wc: WordCount) -> Self { self.word_count = wc; self }
    pub fn with_storage(mut self, storage: StorageConfig) -> Self { self.storage = storage; self }
    pub fn with_database(mut self, database: DatabaseConfig) -> Self { self.database = database; self }
    pub fn with_chain(mut self, chain: ChainConfig) -> Self { self.chain = chain; self }
    pub fn with_default_fee_rate(mut self, rate: SatPerVb) -> Self { self.default_fee_rate = rate; self }
    pub fn with_fee_target_blocks(mut self, blocks: u16) -> Self { self.fee_target_blocks = blocks.max(1); self }
    pub fn with_auto_sync(mut self, auto_sync: bool) -> Self { self.auto_sync = auto_sync; self }

    /// Defaults overridden by `BEEWALLET_*` environment variables.
    pub fn from_env() -> Self {
        let network = std::env::var("BEEWALLET_NETWORK")
            .ok()
            .and_then(|v| Network::from_str(&v))
            .unwrap_or_default();
        let mut config = Self::for_network(network);

        if let Some(kind) = std::env::var("BEEWALLET_DESCRIPTOR").ok().and_then(|v| DescriptorKind::from_str(&v)) {
            config.descriptor = kind;
        }

        let source = std::env::var("BEEWALLET_CHAIN")
            .ok()
            .and_then(|v| ChainSourceKind::from_str(&v))
            .unwrap_or(ChainSourceKind::Electrum);
        config.chain = ChainConfig::for_network(source, network);
        if let Some(url) = std::env::var("BEEWALLET_CHAIN_URL").ok().filter(|s| !s.is_empty()) {
            config.chain = config.chain.with_url(url);
        }

        if let Some(blocks) = std::env::var("BEEWALLET_FEE_TARGET").ok().and_then(|v| v.trim().parse::<u16>().ok()) {
            config = config.with_fee_target_blocks(blocks);
        }

        let data_dir = std::env::var("BEEWALLET_DATA_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        config.storage = StorageConfig::Dir(data_dir.clone());
        if std::env::var("BEEWALLET_DB").map(|v| v == "disk").unwrap_or(false) {
            config.database = DatabaseConfig::Disk(data_dir.join(format!("wallet-{}.db", network.as_str())));
        }

        config
    }
}
