//! BDK - Wallet Engine over bdk_wallet 2.x
//!
//! Thin wrapper with two persistence backends: in-memory, or bdk_file_store.
//! Receives derived descriptors; the seed phrase never crosses this boundary.

use super::engine::{Balance, SignedTx, TransactionDetails, UnsignedTx, WalletEngine, WalletHandle};
use super::SatPerVb;
use crate::chain::ChainSource;
use crate::config::{DatabaseConfig, Network};
use crate::error::{WalletError, WalletResult};
use crate::keys::Descriptor;
use bdk_wallet::{
    bitcoin::{Amount, ScriptBuf, Transaction},
    chain::ChainPosition,
    file_store::Store as FileStore,
    ChangeSet, KeychainKind, PersistedWallet, SignOptions, Wallet,
};
use std::path::Path;

const MAGIC: &[u8] = b"beewallet0";

type PW = PersistedWallet<FileStore<ChangeSet>>;

enum Backend {
    Memory(Wallet),
    Disk { wallet: PW, db: FileStore<ChangeSet> },
}

/// Default engine: bdk_wallet.
#[derive(Debug, Default, Clone, Copy)]
pub struct BdkEngine;

impl WalletEngine for BdkEngine {
    fn new_wallet(
        &self,
        descriptor: &Descriptor,
        change_descriptor: Option<&Descriptor>,
        network: Network,
        database: &DatabaseConfig,
    ) -> WalletResult<Box<dyn WalletHandle>> {
        let backend = match database {
            DatabaseConfig::Memory => Backend::Memory(create_in_memory(descriptor, change_descriptor, network)?),
            DatabaseConfig::Disk(path) => {
                let (wallet, db) = open_on_disk(descriptor, change_descriptor, network, path)?;
                Backend::Disk { wallet, db }
            }
        };
        tracing::debug!(kind = descriptor.kind().as_str(), network = network.as_str(), "Wallet handle constructed");
        Ok(Box::new(BdkHandle { backend, network }))
    }
}

fn create_in_memory(descriptor: &Descriptor, change: Option<&Descriptor>, network: Network) -> WalletResult<Wallet> {
    let external = descriptor.secret().to_string();
    let created = match change {
        Some(change) => Wallet::create(external, change.secret().to_string())
            .network(network.to_bdk())
            .create_wallet_no_persist(),
        None => Wallet::create_single(external)
            .network(network.to_bdk())
            .create_wallet_no_persist(),
    };
    created.map_err(|e| WalletError::WalletInit(format!("Create wallet: {}", e)))
}

fn open_on_disk(
    descriptor: &Descriptor,
    change: Option<&Descriptor>,
    network: Network,
    db_path: &Path,
) -> WalletResult<(PW, FileStore<ChangeSet>)> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| WalletError::WalletInit(format!("Data dir: {}", e)))?;
    }
    let mut db: FileStore<ChangeSet> = FileStore::load_or_create(MAGIC, db_path)
        .map_err(|e| WalletError::WalletInit(format!("FileStore: {}", e)))?
        .0;

    let external = descriptor.secret().to_string();
    let mut params = Wallet::load()
        .descriptor(KeychainKind::External, Some(external.clone()))
        .extract_keys()
        .check_network(network.to_bdk());
    if let Some(change) = change {
        params = params.descriptor(KeychainKind::Internal, Some(change.secret().to_string()));
    }

    // Stored descriptors must match this seed; a mismatch is an error, not a reset.
    let loaded = params
        .load_wallet(&mut db)
        .map_err(|e| WalletError::WalletInit(format!("Load wallet: {}", e)))?;

    let wallet = match loaded {
        Some(w) => w,
        None => {
            let params = match change {
                Some(change) => Wallet::create(external, change.secret().to_string()),
                None => Wallet::create_single(external),
            };
            params
                .network(network.to_bdk())
                .create_wallet(&mut db)
                .map_err(|e| WalletError::WalletInit(format!("Create wallet: {}", e)))?
        }
    };

    Ok((wallet, db))
}

pub struct BdkHandle {
    backend: Backend,
    network: Network,
}

impl BdkHandle {
    fn wallet(&self) -> &Wallet {
        match &self.backend {
            Backend::Memory(wallet) => wallet,
            Backend::Disk { wallet, .. } => &**wallet,
        }
    }

    fn wallet_mut(&mut self) -> &mut Wallet {
        match &mut self.backend {
            Backend::Memory(wallet) => wallet,
            Backend::Disk { wallet, .. } => &mut **wallet,
        }
    }

    fn persist(&mut self) -> WalletResult<()> {
        if let Backend::Disk { wallet, db } = &mut self.backend {
            wallet.persist(db).map_err(|e| WalletError::Storage(format!("Persist: {}", e)))?;
        }
        Ok(())
    }

    fn describe(&self, tx: &Transaction, fee: Option<Amount>) -> TransactionDetails {
        let (sent, received) = self.wallet().sent_and_received(tx);
        TransactionDetails {
            txid: tx.compute_txid().to_string(),
            sent: sent.to_sat(),
            received: received.to_sat(),
            fee: fee.map(|f| f.to_sat()),
            confirmation_time: None,
            block_height: None,
        }
    }
}

impl WalletHandle for BdkHandle {
    fn network(&self) -> Network { self.network }

    fn sync(&mut self, chain: &dyn ChainSource) -> WalletResult<()> {
        let request = self.wallet().start_full_scan().build();
        let update = chain.full_scan(request).map_err(|e| WalletError::Sync(e.to_string()))?;
        self.wallet_mut()
            .apply_update(update)
            .map_err(|e| WalletError::Sync(format!("Apply: {}", e)))?;
        self.persist()
    }

    fn balance(&self) -> WalletResult<Balance> {
        let b = self.wallet().balance();
        Ok(Balance {
            immature: b.immature.to_sat(),
            trusted_pending: b.trusted_pending.to_sat(),
            untrusted_pending: b.untrusted_pending.to_sat(),
            confirmed: b.confirmed.to_sat(),
            spendable: b.trusted_spendable().to_sat(),
            total: b.total().to_sat(),
        })
    }

    fn new_address(&mut self) -> WalletResult<String> {
        let addr = self
            .wallet_mut()
            .reveal_next_address(KeychainKind::External)
            .address
            .to_string();
        self.persist()?;
        Ok(addr)
    }

    fn build_tx(&mut self, recipient: ScriptBuf, amount: Amount, fee_rate: SatPerVb) -> WalletResult<UnsignedTx> {
        let psbt = {
            let wallet = self.wallet_mut();
            let mut builder = wallet.build_tx();
            builder.add_recipient(recipient, amount).fee_rate(fee_rate.to_fee_rate());
            builder.finish().map_err(|e| WalletError::BuildFailed(e.to_string()))?
        };
        let fee = psbt.fee().map_err(|e| WalletError::BuildFailed(format!("Fee: {}", e)))?;
        let details = self.describe(&psbt.unsigned_tx, Some(fee));
        // Building reveals a change index; keep it.
        self.persist()?;
        Ok(UnsignedTx { psbt, details })
    }

    fn sign(&mut self, unsigned: UnsignedTx) -> WalletResult<SignedTx> {
        let UnsignedTx { mut psbt, details } = unsigned;
        #[allow(deprecated)]
        let finalized = self
            .wallet_mut()
            .sign(&mut psbt, SignOptions::default())
            .map_err(|e| WalletError::SignFailed(e.to_string()))?;
        if !finalized {
            return Err(WalletError::SignFailed("inputs left unfinalized".into()));
        }
        let tx = psbt.extract_tx().map_err(|e| WalletError::SignFailed(format!("Extract: {}", e)))?;
        let details = TransactionDetails { txid: tx.compute_txid().to_string(), ..details };
        Ok(SignedTx { tx, details })
    }

    fn apply_broadcast(&mut self, tx: &Transaction) -> WalletResult<()> {
        let seen_at = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        self.wallet_mut().apply_unconfirmed_txs([(tx.clone(), seen_at)]);
        self.persist()
    }

    fn transactions(&self, limit: usize) -> WalletResult<Vec<TransactionDetails>> {
        let wallet = self.wallet();
        let mut txs: Vec<_> = wallet.transactions().collect();
        // Newest first: unconfirmed, then by descending height.
        txs.sort_by_key(|tx| std::cmp::Reverse(match tx.chain_position {
            ChainPosition::Confirmed { anchor, .. } => anchor.block_id.height,
            ChainPosition::Unconfirmed { .. } => u32::MAX,
        }));
        Ok(txs.into_iter().take(limit).map(|tx| {
            let (confirmation_time, block_height) = match tx.chain_position {
                ChainPosition::Confirmed { anchor, .. } =>
                    (Some(anchor.confirmation_time), Some(anchor.block_id.height)),
                ChainPosition::Unconfirmed { .. } => (None, None),
            };
            let (sent, received) = wallet.sent_and_received(&tx.tx_node.tx);
            TransactionDetails {
                txid: tx.tx_node.txid.to_string(),
                sent: sent.to_sat(),
                received: received.to_sat(),
                fee: wallet.calculate_fee(&tx.tx_node.tx).ok().map(|f| f.to_sat()),
                confirmation_time,
                block_height,
            }
        }).collect())
    }
}
