//! Beewallet: single-keychain Bitcoin wallet controller.
//!
//! # Architecture
//!
//! ```text
//! WalletController (explicit context, observable state)
//!   │
//!   ├── SeedStore ──── KeyValueStore (memory | directory)
//!   │     └── SeedPhrase (BIP39, persisted once)
//!   │
//!   ├── keys::derive_descriptor (wpkh m/84'/c'/0'/0 | tr m/86'/c'/0'/0)
//!   │
//!   ├── WalletEngine → WalletHandle (bdk_wallet, memory | file store)
//!   │
//!   └── ChainConnector → ChainSource (Electrum | Esplora), fresh per operation
//! ```
//!
//! # Operations
//!
//! | Operation | Requires | Effect |
//! |-----------|----------|--------|
//! | `load()` | `Empty` | `Loading` then `Loaded` or `Failed`, address refresh, background sync |
//! | `sync()` | `Loaded` | `Syncing` then `Synced` or `Failed`, balance refresh |
//! | `send(amount, address, rate)` | `Loaded` | build, sign, broadcast → `TransactionReceipt` |
//! | `estimate_fee(target)` | - | sat/vB, or `EstimationUnavailable` |
//!
//! # Features
//!
//! - `electrum` - Electrum-protocol chain source (default)
//! - `esplora` - HTTP indexer chain source (default)
//!
//! # Usage
//!
//! ```ignore
//! use beewallet::{WalletConfig, WalletController};
//!
//! let wallet = WalletController::new(WalletConfig::testnet())?;
//! wallet.load().await?;
//! wallet.settle().await;
//!
//! println!("receive at {:?}, balance {}", wallet.address(), wallet.balance().total);
//! let receipt = wallet.send(1000, "tb1q...", None).await?;
//! ```

pub mod amount;
pub mod chain;
pub mod config;
pub mod controller;
pub mod error;
pub mod keys;
pub mod logging;
pub mod runtime;
pub mod seed;
pub mod wallet;

pub use amount::{format_btc, parse_btc};
pub use chain::{ChainConfig, ChainConnector, ChainError, ChainSource, ChainSourceKind, ElectrumConfig, EsploraConfig};
pub use config::{DatabaseConfig, Network, StorageConfig, WalletConfig};
pub use controller::{SyncState, WalletController, WalletEvent, WalletHandleRef, WalletState};
pub use error::{WalletError, WalletResult};
pub use keys::{derive_descriptor, derive_descriptor_at, Descriptor, DescriptorKind};
pub use runtime::Shutdown;
pub use seed::{DirStore, KeyValueStore, MemoryStore, SeedPhrase, SeedStore, WordCount};
pub use wallet::{
    Balance, BdkEngine, PaymentRequest, SatPerVb, TransactionDetails, TransactionReceipt, WalletEngine, WalletHandle,
};

/// Re-exported so callers and test doubles can name engine types.
pub use bdk_wallet;
