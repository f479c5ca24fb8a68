//! Observable wallet state: the two state machines and the events they emit.

use crate::error::{WalletError, WalletResult};
use crate::wallet::{Balance, WalletHandle};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared reference to the live wallet handle.
///
/// The mutex is the per-handle operation lock: sync, send and the
/// balance/address queries each hold it for their whole blocking section.
#[derive(Clone)]
pub struct WalletHandleRef(Arc<Mutex<Box<dyn WalletHandle>>>);

impl WalletHandleRef {
    pub(crate) fn new(handle: Box<dyn WalletHandle>) -> Self {
        Self(Arc::new(Mutex::new(handle)))
    }

    /// Run `f` on a blocking thread with the handle locked.
    ///
    /// `on_panic` maps a failed blocking task into the caller's error kind.
    pub(crate) async fn run<R, F>(&self, on_panic: fn(String) -> WalletError, f: F) -> WalletResult<R>
    where
        F: FnOnce(&mut dyn WalletHandle) -> WalletResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let mut guard = self.0.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || f(&mut **guard))
            .await
            .map_err(|e| on_panic(format!("wallet task: {}", e)))?
    }

    pub fn same_as(&self, other: &WalletHandleRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for WalletHandleRef {
    fn eq(&self, other: &Self) -> bool { self.same_as(other) }
}

impl fmt::Debug for WalletHandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletHandle(..)")
    }
}

/// `Empty → Loading → Loaded | Failed`; `Loaded | Failed → Loading` only via reload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WalletState {
    #[default]
    Empty,
    Loading,
    Loaded(WalletHandleRef),
    Failed(WalletError),
}

impl WalletState {
    pub fn name(&self) -> &'static str {
        match self {
            WalletState::Empty => "empty",
            WalletState::Loading => "loading",
            WalletState::Loaded(_) => "loaded",
            WalletState::Failed(_) => "failed",
        }
    }

    pub fn is_loaded(&self) -> bool { matches!(self, WalletState::Loaded(_)) }

    pub fn handle(&self) -> Option<&WalletHandleRef> {
        match self {
            WalletState::Loaded(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&WalletError> {
        match self {
            WalletState::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Whether `self → next` is an edge of the wallet state machine.
    pub fn allows(&self, next: &WalletState) -> bool {
        matches!(
            (self, next),
            (WalletState::Empty, WalletState::Loading)
                | (WalletState::Loading, WalletState::Loaded(_))
                | (WalletState::Loading, WalletState::Failed(_))
                | (WalletState::Loaded(_), WalletState::Loading)
                | (WalletState::Failed(_), WalletState::Loading)
        )
    }
}

/// `Empty | Synced | Failed → Syncing → Synced | Failed`.
///
/// A cancelled sync restores the state it started from, and a reload resets
/// to `Empty`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Empty,
    Syncing,
    Synced,
    Failed(WalletError),
}

impl SyncState {
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Empty => "empty",
            SyncState::Syncing => "syncing",
            SyncState::Synced => "synced",
            SyncState::Failed(_) => "failed",
        }
    }

    pub fn is_syncing(&self) -> bool { matches!(self, SyncState::Syncing) }

    pub fn allows(&self, next: &SyncState) -> bool {
        match (self, next) {
            (SyncState::Syncing, SyncState::Syncing) => false,
            (_, SyncState::Syncing) => true,
            (SyncState::Syncing, _) => true,
            (_, SyncState::Empty) => true,
            _ => false,
        }
    }
}

/// Published after every commit, in commit order.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    WalletState(WalletState),
    SyncState(SyncState),
    Balance(Balance),
    Address(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_state_edges() {
        let failed = WalletState::Failed(WalletError::NoWallet);
        assert!(WalletState::Empty.allows(&WalletState::Loading));
        assert!(WalletState::Loading.allows(&failed));
        assert!(failed.allows(&WalletState::Loading));
        assert!(!WalletState::Empty.allows(&failed));
        assert!(!WalletState::Loading.allows(&WalletState::Loading));
        assert!(!failed.allows(&WalletState::Empty));
    }

    #[test]
    fn test_sync_state_edges() {
        let failed = SyncState::Failed(WalletError::Sync("timeout".into()));
        for from in [SyncState::Empty, SyncState::Synced, failed.clone()] {
            assert!(from.allows(&SyncState::Syncing));
        }
        assert!(SyncState::Syncing.allows(&SyncState::Synced));
        assert!(SyncState::Syncing.allows(&failed));
        assert!(!SyncState::Syncing.allows(&SyncState::Syncing));
        assert!(!SyncState::Empty.allows(&SyncState::Synced));
        assert!(!SyncState::Synced.allows(&failed));
    }
}
