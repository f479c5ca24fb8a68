//! Sync Orchestrator

use super::{Inner, SyncState, WalletController, WalletHandleRef};
use crate::error::{WalletError, WalletResult};

impl WalletController {
    /// Synchronize the loaded wallet against a fresh chain connection.
    ///
    /// `NoWallet` unless the wallet is loaded. A call while another sync is
    /// running is skipped and returns `Ok`. Failures land in
    /// `SyncState::Failed` and are returned; the wallet state is untouched.
    /// Cancelled or dropped before it finishes, the sync restores the state
    /// it started from.
    pub async fn sync(&self) -> WalletResult<()> {
        let handle = self.loaded_handle()?;
        self.ensure_running()?;
        let Some(previous) = self.inner.begin_sync(&handle) else {
            tracing::debug!("Sync already running; skipped");
            return Ok(());
        };
        let mut running = RunningSync { inner: &self.inner, handle: &handle, previous: Some(previous) };
        tracing::info!(url = self.inner.config.chain.url(), "Sync started");

        let chain = self.inner.chain.clone();
        let work = handle.run(WalletError::Sync, move |wallet| {
            let source = chain.connect().map_err(|e| WalletError::Sync(e.to_string()))?;
            wallet.sync(source.as_ref())
        });

        let result = tokio::select! {
            result = work => result,
            _ = self.inner.shutdown.cancelled() => return Err(WalletError::Cancelled),
        };
        running.previous = None;

        match result {
            Ok(()) => {
                if self.inner.finish_sync(&handle, SyncState::Synced) {
                    tracing::info!("Sync finished");
                    self.on_synced().await;
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sync failed");
                self.inner.finish_sync(&handle, SyncState::Failed(e.clone()));
                Err(e)
            }
        }
    }

    /// Start a tracked background sync; its outcome is recorded in `SyncState`.
    pub(super) fn spawn_sync(&self) {
        let controller = self.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = controller.sync().await {
                tracing::debug!(error = %e, "Background sync ended with error");
            }
        });
        self.track(task);
    }
}

/// Puts back the pre-sync state unless the sync reached its own commit.
struct RunningSync<'a> {
    inner: &'a Inner,
    handle: &'a WalletHandleRef,
    previous: Option<SyncState>,
}

impl Drop for RunningSync<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if self.inner.finish_sync(self.handle, previous) {
                tracing::info!("Sync cancelled");
            }
        }
    }
}
