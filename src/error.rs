//! Errors - one taxonomy for load, sync, send and fee operations.
//!
//! `WalletError` is `Clone` so it can live inside `WalletState::Failed` and
//! `SyncState::Failed` and travel to observers.

use thiserror::Error;

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Stored seed failed validation. Never regenerated automatically.
    #[error("Stored seed phrase is corrupt: {0}")]
    CorruptSeed(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Wallet initialization failed: {0}")]
    WalletInit(String),

    #[error("Sync failed: {0}")]
    Sync(String),

    #[error("No wallet loaded")]
    NoWallet,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: requested {requested} sats, balance {available} sats")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("Invalid fee rate: {0}")]
    InvalidFeeRate(String),

    #[error("Transaction build failed: {0}")]
    BuildFailed(String),

    #[error("Signing failed: {0}")]
    SignFailed(String),

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("Fee estimate unavailable: {0}")]
    EstimationUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl WalletError {
    /// Stable identifier for the error kind, independent of the message.
    pub fn kind(&self) -> &'static str {
        match self {
            WalletError::CorruptSeed(_) => "corrupt_seed",
            WalletError::Derivation(_) => "derivation",
            WalletError::WalletInit(_) => "wallet_init",
            WalletError::Sync(_) => "sync",
            WalletError::NoWallet => "no_wallet",
            WalletError::InvalidAddress(_) => "invalid_address",
            WalletError::InvalidAmount(_) => "invalid_amount",
            WalletError::InsufficientFunds { .. } => "insufficient_funds",
            WalletError::InvalidFeeRate(_) => "invalid_fee_rate",
            WalletError::BuildFailed(_) => "build_failed",
            WalletError::SignFailed(_) => "sign_failed",
            WalletError::BroadcastFailed(_) => "broadcast_failed",
            WalletError::EstimationUnavailable(_) => "estimation_unavailable",
            WalletError::Storage(_) => "storage",
            WalletError::Cancelled => "cancelled",
        }
    }

    /// Whether retrying the same operation later can succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            WalletError::CorruptSeed(_) | WalletError::Derivation(_) | WalletError::WalletInit(_)
        )
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        WalletError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_distinct_per_kind() {
        let errors = [
            WalletError::CorruptSeed("checksum".into()),
            WalletError::Derivation("path".into()),
            WalletError::WalletInit("descriptor".into()),
            WalletError::Sync("timeout".into()),
            WalletError::NoWallet,
            WalletError::InvalidAddress("bech32".into()),
            WalletError::InvalidAmount("zero".into()),
            WalletError::InsufficientFunds { requested: 10, available: 5 },
            WalletError::BuildFailed("coin selection".into()),
            WalletError::SignFailed("missing key".into()),
            WalletError::BroadcastFailed("rejected".into()),
            WalletError::EstimationUnavailable("no data".into()),
        ];
        let messages: std::collections::HashSet<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(messages.len(), errors.len());
        let kinds: std::collections::HashSet<&str> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn seed_and_load_errors_are_fatal() {
        assert!(!WalletError::CorruptSeed("x".into()).is_recoverable());
        assert!(!WalletError::Derivation("x".into()).is_recoverable());
        assert!(WalletError::Sync("x".into()).is_recoverable());
        assert!(WalletError::EstimationUnavailable("x".into()).is_recoverable());
    }
}
