//! Wallet Engine capability: what the controller needs from a wallet library.

use crate::chain::ChainSource;
use crate::config::{DatabaseConfig, Network};
use crate::error::WalletResult;
use crate::keys::Descriptor;
use crate::wallet::SatPerVb;
use bdk_wallet::bitcoin::{Amount, Psbt, ScriptBuf, Transaction};
use serde::Serialize;

/// Balance snapshot in sats. Replaced wholesale, never patched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub immature: u64,
    pub trusted_pending: u64,
    pub untrusted_pending: u64,
    pub confirmed: u64,
    pub spendable: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDetails {
    pub txid: String,
    /// Sum of wallet-owned inputs.
    pub sent: u64,
    /// Sum of outputs paying back to the wallet.
    pub received: u64,
    pub fee: Option<u64>,
    /// Block time (unix seconds); `None` while unconfirmed.
    pub confirmation_time: Option<u64>,
    pub block_height: Option<u32>,
}

/// Built, unsigned transaction plus what it does to the wallet.
#[derive(Debug, Clone)]
pub struct UnsignedTx {
    pub psbt: Psbt,
    pub details: TransactionDetails,
}

#[derive(Debug, Clone)]
pub struct SignedTx {
    pub tx: Transaction,
    pub details: TransactionDetails,
}

/// Constructs wallet handles.
pub trait WalletEngine: Send + Sync {
    fn new_wallet(
        &self,
        descriptor: &Descriptor,
        change_descriptor: Option<&Descriptor>,
        network: Network,
        database: &DatabaseConfig,
    ) -> WalletResult<Box<dyn WalletHandle>>;
}

/// Live wallet: UTXOs, keys, address indices. Blocking; one operation at
/// a time (callers hold the handle lock).
pub trait WalletHandle: Send {
    fn network(&self) -> Network;

    /// Bring the local view of chain state up to date.
    fn sync(&mut self, chain: &dyn ChainSource) -> WalletResult<()>;

    fn balance(&self) -> WalletResult<Balance>;

    /// Reveal the next receive address, advancing the index.
    fn new_address(&mut self) -> WalletResult<String>;

    /// One recipient output; change goes to a wallet-chosen path.
    fn build_tx(&mut self, recipient: ScriptBuf, amount: Amount, fee_rate: SatPerVb) -> WalletResult<UnsignedTx>;

    fn sign(&mut self, unsigned: UnsignedTx) -> WalletResult<SignedTx>;

    /// Record a transaction the chain source accepted.
    fn apply_broadcast(&mut self, tx: &Transaction) -> WalletResult<()>;

    fn transactions(&self, limit: usize) -> WalletResult<Vec<TransactionDetails>>;
}
