//! Wallet Controller - the single owner of observable wallet state
//!
//! # Architecture
//!
//! ```text
//! WalletController (Clone, Arc<Inner>)
//!     │
//!     ├── load()  : SeedStore → derive_descriptor → WalletEngine::new_wallet
//!     │               commit Loaded → on_loaded (address) → spawn sync
//!     ├── sync()  : ChainConnector::connect → WalletHandle::sync
//!     │               commit Synced → on_synced (balance)
//!     ├── send()  : validate → build → sign → broadcast → receipt
//!     └── estimate_fee()
//!
//! observed: Mutex<Observed>  (WalletState, SyncState, Balance, address)
//! events:   broadcast::Sender<WalletEvent>, sent under the same lock
//! ```
//!
//! Commits happen in one place (`Inner::commit_*`). The std mutex guarding
//! observed state is never held across an `.await`.

mod payments;
mod state;
mod sync;

pub use state::{SyncState, WalletEvent, WalletHandleRef, WalletState};

use crate::chain::ChainConnector;
use crate::config::{Network, StorageConfig, WalletConfig};
use crate::error::{WalletError, WalletResult};
use crate::keys::derive_descriptor;
use crate::runtime::Shutdown;
use crate::seed::{DirStore, KeyValueStore, MemoryStore, SeedStore};
use crate::wallet::{Balance, BdkEngine, WalletEngine, WalletHandle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Observed {
    wallet: WalletState,
    sync: SyncState,
    balance: Balance,
    address: Option<String>,
}

struct Inner {
    config: WalletConfig,
    seeds: SeedStore,
    engine: Arc<dyn WalletEngine>,
    chain: Arc<dyn ChainConnector>,
    observed: Mutex<Observed>,
    events: broadcast::Sender<WalletEvent>,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes load and reload.
    loading: tokio::sync::Mutex<()>,
}

/// Explicit wallet context: state, collaborators and background work.
#[derive(Clone)]
pub struct WalletController {
    inner: Arc<Inner>,
}

impl WalletController {
    /// Controller over the configured seed storage, `bdk_wallet` and chain profile.
    pub fn new(config: WalletConfig) -> WalletResult<Self> {
        let storage: Arc<dyn KeyValueStore> = match &config.storage {
            StorageConfig::Memory => Arc::new(MemoryStore::new()),
            StorageConfig::Dir(path) => Arc::new(DirStore::open(path)?),
        };
        let chain = Arc::new(config.chain.clone());
        Ok(Self::with_parts(config, storage, Arc::new(BdkEngine), chain))
    }

    /// Controller over explicit collaborators.
    pub fn with_parts(
        config: WalletConfig,
        storage: Arc<dyn KeyValueStore>,
        engine: Arc<dyn WalletEngine>,
        chain: Arc<dyn ChainConnector>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                seeds: SeedStore::new(storage),
                engine,
                chain,
                observed: Mutex::new(Observed::default()),
                events,
                shutdown: Shutdown::new(),
                tasks: Mutex::new(Vec::new()),
                loading: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &WalletConfig { &self.inner.config }
    pub fn network(&self) -> Network { self.inner.config.network }

    pub fn wallet_state(&self) -> WalletState { self.inner.observed().wallet.clone() }
    pub fn sync_state(&self) -> SyncState { self.inner.observed().sync.clone() }
    /// Last refreshed balance; zero before the first successful sync.
    pub fn balance(&self) -> Balance { self.inner.observed().balance }
    /// Current receive address; `None` until the first refresh succeeds.
    pub fn address(&self) -> Option<String> { self.inner.observed().address.clone() }

    /// Receiver for every commit from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> { self.inner.events.subscribe() }

    /// Signal that cancels in-flight network work when triggered.
    pub fn shutdown_signal(&self) -> Shutdown { self.inner.shutdown.clone() }

    /// Load the wallet from `Empty`.
    ///
    /// Already loading or loaded: no-op. Failed: returns the recorded error;
    /// use [`reload`](Self::reload) to retry. A load whose future is dropped
    /// before it finishes is recorded as `Failed(Cancelled)`.
    pub async fn load(&self) -> WalletResult<()> {
        let _loading = self.inner.loading.lock().await;
        match self.wallet_state() {
            WalletState::Empty => self.load_locked().await,
            WalletState::Failed(e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Drop the current handle and load again from the stored seed.
    pub async fn reload(&self) -> WalletResult<()> {
        let _loading = self.inner.loading.lock().await;
        self.abort_tasks();
        self.inner.reset_sync_state();
        tracing::info!(from = self.wallet_state().name(), "Reloading wallet");
        self.load_locked().await
    }

    async fn load_locked(&self) -> WalletResult<()> {
        self.ensure_running()?;
        self.inner.commit_wallet_state(WalletState::Loading);
        let mut pending = PendingLoad { inner: &self.inner, armed: true };

        let inner = self.inner.clone();
        let built = tokio::task::spawn_blocking(move || inner.build_handle())
            .await
            .map_err(|e| WalletError::WalletInit(format!("load task: {}", e)))
            .and_then(|result| result);
        pending.armed = false;

        match built {
            Ok(handle) => {
                let handle = WalletHandleRef::new(handle);
                self.inner.commit_wallet_state(WalletState::Loaded(handle.clone()));
                tracing::info!(network = self.network().as_str(), "Wallet loaded");
                self.on_loaded().await;
                if self.inner.config.auto_sync {
                    self.spawn_sync();
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, kind = e.kind(), "Wallet load failed");
                self.inner.commit_wallet_state(WalletState::Failed(e.clone()));
                Err(e)
            }
        }
    }

    async fn on_loaded(&self) {
        if let Err(e) = self.refresh_address().await {
            tracing::warn!(error = %e, "Address refresh failed; keeping previous address");
        }
    }

    async fn on_synced(&self) {
        if let Err(e) = self.refresh_balance().await {
            tracing::warn!(error = %e, "Balance refresh failed; keeping previous balance");
        }
    }

    /// Reveal the next receive address and make it current.
    ///
    /// On error the previous address stays in place.
    pub async fn refresh_address(&self) -> WalletResult<String> {
        let handle = self.loaded_handle()?;
        let address = handle.run(WalletError::Storage, |wallet| wallet.new_address()).await?;
        self.inner.commit_address(&handle, address.clone());
        Ok(address)
    }

    /// Query the handle's balance and make it current.
    ///
    /// On error the previous balance stays in place.
    pub async fn refresh_balance(&self) -> WalletResult<Balance> {
        let handle = self.loaded_handle()?;
        let balance = handle.run(WalletError::Storage, |wallet| wallet.balance()).await?;
        self.inner.commit_balance(&handle, balance);
        Ok(balance)
    }

    fn loaded_handle(&self) -> WalletResult<WalletHandleRef> {
        self.inner.observed().wallet.handle().cloned().ok_or(WalletError::NoWallet)
    }

    fn ensure_running(&self) -> WalletResult<()> {
        if self.inner.shutdown.is_triggered() {
            return Err(WalletError::Cancelled);
        }
        Ok(())
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn abort_tasks(&self) {
        let tasks = std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
    }

    /// Wait for background work (the post-load sync) to finish.
    pub async fn settle(&self) {
        loop {
            let next = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner).pop();
            match next {
                Some(task) => {
                    let _ = task.await;
                }
                None => break,
            }
        }
    }

    /// Cancel in-flight network work and abort background tasks.
    ///
    /// Nothing half-done is committed: a cancelled sync restores its
    /// previous state and cancelled calls return [`WalletError::Cancelled`].
    /// Aborted tasks stay tracked; [`settle`](Self::settle) waits until they are gone.
    pub fn shutdown(&self) {
        tracing::info!("Wallet controller shutting down");
        self.inner.shutdown.trigger();
        for task in self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner).iter() {
            task.abort();
        }
    }

    /// Run [`shutdown`](Self::shutdown) on SIGTERM/SIGINT (Ctrl+C elsewhere),
    /// or when the shutdown signal is triggered by other means.
    pub fn install_signal_handlers(&self) -> JoinHandle<()> {
        let signals = crate::runtime::install_signal_handlers(self.inner.shutdown.clone());
        let controller = self.clone();
        tokio::spawn(async move {
            controller.inner.shutdown.cancelled().await;
            signals.abort();
            controller.shutdown();
        })
    }
}

/// Records a load abandoned mid-flight, so `Loading` is never left behind.
struct PendingLoad<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.abandon_load();
        }
    }
}

impl Inner {
    fn observed(&self) -> MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: WalletEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn build_handle(&self) -> WalletResult<Box<dyn WalletHandle>> {
        let seed = self.seeds.load_or_create(self.config.word_count)?;
        let descriptor = derive_descriptor(&seed, self.config.descriptor, self.config.network)?;
        tracing::debug!(kind = descriptor.kind().as_str(), path = descriptor.path(), "Descriptor derived");
        self.engine.new_wallet(&descriptor, None, self.config.network, &self.config.database)
    }

    fn commit_wallet_state(&self, next: WalletState) {
        let mut observed = self.observed();
        debug_assert!(
            observed.wallet.allows(&next),
            "wallet state {} -> {}",
            observed.wallet.name(),
            next.name()
        );
        tracing::debug!(from = observed.wallet.name(), to = next.name(), "Wallet state");
        observed.wallet = next.clone();
        self.publish(WalletEvent::WalletState(next));
    }

    fn abandon_load(&self) {
        let mut observed = self.observed();
        if observed.wallet != WalletState::Loading {
            return;
        }
        tracing::warn!("Wallet load abandoned");
        observed.wallet = WalletState::Failed(WalletError::Cancelled);
        self.publish(WalletEvent::WalletState(observed.wallet.clone()));
    }

    /// `Syncing` if no sync is running; returns the state it replaced.
    fn begin_sync(&self, handle: &WalletHandleRef) -> Option<SyncState> {
        let mut observed = self.observed();
        if observed.sync.is_syncing() || !observed.wallet.handle().is_some_and(|h| h.same_as(handle)) {
            return None;
        }
        let previous = std::mem::replace(&mut observed.sync, SyncState::Syncing);
        self.publish(WalletEvent::SyncState(SyncState::Syncing));
        Some(previous)
    }

    /// Commit the outcome of a sync started by [`begin_sync`](Self::begin_sync).
    ///
    /// Returns false when the handle was replaced meanwhile; nothing is committed then.
    fn finish_sync(&self, handle: &WalletHandleRef, next: SyncState) -> bool {
        let mut observed = self.observed();
        if !observed.wallet.handle().is_some_and(|h| h.same_as(handle)) || !observed.sync.is_syncing() {
            return false;
        }
        debug_assert!(observed.sync.allows(&next));
        tracing::debug!(from = observed.sync.name(), to = next.name(), "Sync state");
        observed.sync = next.clone();
        self.publish(WalletEvent::SyncState(next));
        true
    }

    fn reset_sync_state(&self) {
        let mut observed = self.observed();
        if observed.sync != SyncState::Empty {
            observed.sync = SyncState::Empty;
            self.publish(WalletEvent::SyncState(SyncState::Empty));
        }
    }

    fn commit_balance(&self, handle: &WalletHandleRef, balance: Balance) {
        let mut observed = self.observed();
        if !observed.wallet.handle().is_some_and(|h| h.same_as(handle)) {
            return;
        }
        observed.balance = balance;
        self.publish(WalletEvent::Balance(balance));
    }

    fn commit_address(&self, handle: &WalletHandleRef, address: String) {
        let mut observed = self.observed();
        if !observed.wallet.handle().is_some_and(|h| h.same_as(handle)) {
            return;
        }
        observed.address = Some(address.clone());
        self.publish(WalletEvent::Address(address));
    }
}
