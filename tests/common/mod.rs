//! Test doubles: an in-memory wallet engine, a scripted chain source and a
//! write-counting seed store. No network access.

#![allow(dead_code)]

use beewallet::bdk_wallet::bitcoin::{absolute::LockTime, transaction::Version, Amount, Psbt, ScriptBuf, Transaction, TxOut};
use beewallet::bdk_wallet::chain::spk_client::FullScanRequest;
use beewallet::bdk_wallet::{KeychainKind, Update};
use beewallet::wallet::{SignedTx, UnsignedTx};
use beewallet::{
    Balance, ChainConnector, ChainError, ChainSource, DatabaseConfig, Descriptor, KeyValueStore, MemoryStore, Network,
    SatPerVb, StorageConfig, TransactionDetails, WalletConfig, WalletController, WalletEngine, WalletError,
    WalletHandle, WalletResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

// m/84'/1'/0'/0/0 and m/84'/0'/0'/0/0 of TEST_MNEMONIC
pub const TESTNET_ADDR: &str = "tb1q6rz28mcfaxtmd6v789l9rrlrusdprr9pqcpvkl";
pub const MAINNET_ADDR: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";

/// Virtual size the mock engine charges for every payment.
pub const MOCK_TX_VSIZE: f32 = 141.0;

pub fn init_logging() {
    beewallet::logging::init_test_logging();
}

pub fn seed_payload(phrase: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "mnemonic": phrase })).expect("payload")
}

// =============================================================================
// Seed storage
// =============================================================================

/// Memory store that counts writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub writes: AtomicUsize,
}

impl CountingStore {
    pub fn with_entry(key: &str, value: &[u8]) -> Self {
        let store = Self::default();
        store.inner.set(key, value).expect("seed entry");
        store
    }

    pub fn writes(&self) -> usize { self.writes.load(Ordering::SeqCst) }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> { self.inner.get(key).expect("get") }
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> WalletResult<Option<Vec<u8>>> { self.inner.get(key) }

    fn set(&self, key: &str, value: &[u8]) -> WalletResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }
}

// =============================================================================
// Wallet engine
// =============================================================================

/// State shared by every handle the mock engine hands out.
#[derive(Default)]
pub struct Ledger {
    pub confirmed: u64,
    pub history: Vec<TransactionDetails>,
    pub pending: HashMap<String, TransactionDetails>,
    pub revealed: u32,
    pub syncs: u32,
    pub fail_balance: bool,
    pub fail_address: bool,
    pub fail_sign: bool,
    nonce: u32,
}

#[derive(Default)]
pub struct MockEngine {
    pub ledger: Arc<Mutex<Ledger>>,
    pub fail_init: AtomicBool,
    pub panic_on_build: Arc<AtomicBool>,
    pub load_delay: Mutex<Duration>,
    pub loads: AtomicUsize,
    pub descriptors: Mutex<Vec<String>>,
}

impl MockEngine {
    pub fn with_balance(confirmed: u64) -> Self {
        let engine = Self::default();
        engine.ledger().confirmed = confirmed;
        engine
    }

    pub fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> { self.ledger.lock().expect("ledger") }

    pub fn loads(&self) -> usize { self.loads.load(Ordering::SeqCst) }

    pub fn set_load_delay(&self, delay: Duration) { *self.load_delay.lock().expect("delay") = delay; }
}

impl WalletEngine for MockEngine {
    fn new_wallet(
        &self,
        descriptor: &Descriptor,
        _change_descriptor: Option<&Descriptor>,
        network: Network,
        _database: &DatabaseConfig,
    ) -> WalletResult<Box<dyn WalletHandle>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.load_delay.lock().expect("delay");
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.fail_init.load(Ordering::SeqCst) {
            return Err(WalletError::WalletInit("mock engine refused".into()));
        }
        self.descriptors.lock().expect("descriptors").push(descriptor.public().to_string());
        Ok(Box::new(MockHandle { ledger: self.ledger.clone(), panic_on_build: self.panic_on_build.clone(), network }))
    }
}

pub struct MockHandle {
    ledger: Arc<Mutex<Ledger>>,
    panic_on_build: Arc<AtomicBool>,
    network: Network,
}

impl MockHandle {
    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> { self.ledger.lock().expect("ledger") }
}

impl WalletHandle for MockHandle {
    fn network(&self) -> Network { self.network }

    fn sync(&mut self, chain: &dyn ChainSource) -> WalletResult<()> {
        chain
            .full_scan(FullScanRequest::builder_at(0).build())
            .map_err(|e| WalletError::Sync(e.to_string()))?;
        let mut ledger = self.ledger();
        ledger.syncs += 1;
        let height = 100 + ledger.syncs;
        for tx in ledger.history.iter_mut().filter(|tx| tx.block_height.is_none()) {
            tx.block_height = Some(height);
            tx.confirmation_time = Some(1_700_000_000 + u64::from(height));
        }
        Ok(())
    }

    fn balance(&self) -> WalletResult<Balance> {
        let ledger = self.ledger();
        if ledger.fail_balance {
            return Err(WalletError::Storage("balance unavailable".into()));
        }
        Ok(Balance { confirmed: ledger.confirmed, spendable: ledger.confirmed, total: ledger.confirmed, ..Balance::default() })
    }

    fn new_address(&mut self) -> WalletResult<String> {
        let mut ledger = self.ledger();
        if ledger.fail_address {
            return Err(WalletError::Storage("address unavailable".into()));
        }
        let address = format!("tb1qmock{:04}", ledger.revealed);
        ledger.revealed += 1;
        Ok(address)
    }

    fn build_tx(&mut self, recipient: ScriptBuf, amount: Amount, fee_rate: SatPerVb) -> WalletResult<UnsignedTx> {
        if self.panic_on_build.load(Ordering::SeqCst) {
            panic!("coin selection blew up");
        }
        let mut ledger = self.ledger();
        let fee = (MOCK_TX_VSIZE * fee_rate.as_f32()).ceil() as u64;
        let total = ledger.confirmed;
        if amount.to_sat() + fee > total {
            return Err(WalletError::BuildFailed(format!("needs {} sats, have {}", amount.to_sat() + fee, total)));
        }
        ledger.nonce += 1;
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::from_consensus(ledger.nonce),
            input: vec![],
            output: vec![TxOut { value: amount, script_pubkey: recipient }],
        };
        let details = TransactionDetails {
            txid: tx.compute_txid().to_string(),
            sent: total,
            received: total - amount.to_sat() - fee,
            fee: Some(fee),
            confirmation_time: None,
            block_height: None,
        };
        let psbt = Psbt::from_unsigned_tx(tx).map_err(|e| WalletError::BuildFailed(e.to_string()))?;
        ledger.pending.insert(details.txid.clone(), details.clone());
        Ok(UnsignedTx { psbt, details })
    }

    fn sign(&mut self, unsigned: UnsignedTx) -> WalletResult<SignedTx> {
        if self.ledger().fail_sign {
            return Err(WalletError::SignFailed("mock key missing".into()));
        }
        Ok(SignedTx { tx: unsigned.psbt.unsigned_tx, details: unsigned.details })
    }

    fn apply_broadcast(&mut self, tx: &Transaction) -> WalletResult<()> {
        let mut ledger = self.ledger();
        let txid = tx.compute_txid().to_string();
        let details = match ledger.pending.remove(&txid) {
            Some(details) => details,
            None => {
                let out: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
                let total = ledger.confirmed;
                TransactionDetails {
                    txid,
                    sent: total,
                    received: total.saturating_sub(out),
                    fee: None,
                    confirmation_time: None,
                    block_height: None,
                }
            }
        };
        ledger.confirmed = details.received;
        ledger.history.push(details);
        Ok(())
    }

    fn transactions(&self, limit: usize) -> WalletResult<Vec<TransactionDetails>> {
        Ok(self.ledger().history.iter().rev().take(limit).cloned().collect())
    }
}

// =============================================================================
// Chain source
// =============================================================================

#[derive(Default)]
pub struct ChainScript {
    pub connects: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_scan: AtomicBool,
    pub fail_broadcast: AtomicBool,
    pub fee: Mutex<Option<f32>>,
    pub scan_delay: Mutex<Duration>,
    pub broadcast_delay: Mutex<Duration>,
    pub broadcasts: Mutex<Vec<String>>,
    pub fee_targets: Mutex<Vec<u16>>,
}

#[derive(Default, Clone)]
pub struct MockConnector {
    pub script: Arc<ChainScript>,
}

impl MockConnector {
    pub fn connects(&self) -> usize { self.script.connects.load(Ordering::SeqCst) }

    pub fn broadcasts(&self) -> Vec<String> { self.script.broadcasts.lock().expect("broadcasts").clone() }

    pub fn set_fee(&self, fee: Option<f32>) { *self.script.fee.lock().expect("fee") = fee; }

    pub fn set_scan_delay(&self, delay: Duration) { *self.script.scan_delay.lock().expect("delay") = delay; }

    pub fn set_broadcast_delay(&self, delay: Duration) { *self.script.broadcast_delay.lock().expect("delay") = delay; }

    pub fn fee_targets(&self) -> Vec<u16> { self.script.fee_targets.lock().expect("targets").clone() }
}

impl ChainConnector for MockConnector {
    fn connect(&self) -> Result<Box<dyn ChainSource>, ChainError> {
        self.script.connects.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_connect.load(Ordering::SeqCst) {
            return Err(ChainError::Connect("connection refused".into()));
        }
        Ok(Box::new(MockSource { script: self.script.clone() }))
    }
}

struct MockSource {
    script: Arc<ChainScript>,
}

impl ChainSource for MockSource {
    fn full_scan(&self, _request: FullScanRequest<KeychainKind>) -> Result<Update, ChainError> {
        let delay = *self.script.scan_delay.lock().expect("delay");
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.script.fail_scan.load(Ordering::SeqCst) {
            return Err(ChainError::Protocol("scan timed out".into()));
        }
        Ok(Update::default())
    }

    fn broadcast(&self, tx: &Transaction) -> Result<(), ChainError> {
        let delay = *self.script.broadcast_delay.lock().expect("delay");
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.script.fail_broadcast.load(Ordering::SeqCst) {
            return Err(ChainError::Protocol("transaction rejected".into()));
        }
        self.script.broadcasts.lock().expect("broadcasts").push(tx.compute_txid().to_string());
        Ok(())
    }

    fn estimate_fee(&self, target_blocks: u16) -> Result<SatPerVb, ChainError> {
        self.script.fee_targets.lock().expect("targets").push(target_blocks);
        match *self.script.fee.lock().expect("fee") {
            Some(rate) => SatPerVb::new(rate).map_err(|e| ChainError::Protocol(e.to_string())),
            None => Err(ChainError::Unavailable("not enough blocks".into())),
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub controller: WalletController,
    pub engine: Arc<MockEngine>,
    pub chain: MockConnector,
    pub storage: Arc<CountingStore>,
}

pub fn test_config() -> WalletConfig {
    WalletConfig::testnet().with_storage(StorageConfig::Memory).with_auto_sync(false)
}

pub fn harness_with(config: WalletConfig, engine: MockEngine, storage: CountingStore) -> Harness {
    init_logging();
    let engine = Arc::new(engine);
    let chain = MockConnector::default();
    let storage = Arc::new(storage);
    let controller = WalletController::with_parts(config, storage.clone(), engine.clone(), Arc::new(chain.clone()));
    Harness { controller, engine, chain, storage }
}

pub fn harness(balance: u64) -> Harness {
    harness_with(test_config(), MockEngine::with_balance(balance), CountingStore::default())
}

/// Every event published so far, in order.
pub fn drain(events: &mut tokio::sync::broadcast::Receiver<beewallet::WalletEvent>) -> Vec<beewallet::WalletEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
