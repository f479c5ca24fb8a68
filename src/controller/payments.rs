//! Payment Builder and Fee Estimator operations.

use super::WalletController;
use crate::error::{WalletError, WalletResult};
use crate::wallet::{PaymentRequest, SatPerVb, TransactionDetails, TransactionReceipt};

impl WalletController {
    /// Pay `amount` sats to `address` at `fee_rate` (configured default if `None`).
    ///
    /// Preconditions are checked in order, without touching the network:
    /// wallet loaded, address valid for the network, `0 < amount < total`.
    /// The total is the last refreshed balance and ignores fees; the build
    /// step does the fee-aware check.
    ///
    /// Shutdown is honored up to the broadcast. Once the transaction is
    /// handed to the chain source the call runs to completion and reports
    /// the real outcome.
    pub async fn send(&self, amount: u64, address: &str, fee_rate: Option<SatPerVb>) -> WalletResult<TransactionReceipt> {
        let handle = self.loaded_handle()?;
        self.ensure_running()?;
        let fee_rate = fee_rate.unwrap_or(self.inner.config.default_fee_rate);
        let payment = PaymentRequest::new(address, amount, fee_rate).validate(self.network(), &self.balance())?;
        tracing::info!(amount, fee_rate = %fee_rate, address = %payment.address, "Sending payment");

        let chain = self.inner.chain.clone();
        let shutdown = self.inner.shutdown.clone();
        let receipt = handle.run(WalletError::BuildFailed, move |wallet| {
            let unsigned = wallet.build_tx(payment.recipient, payment.amount, payment.fee_rate)?;
            let signed = wallet.sign(unsigned)?;
            if shutdown.is_triggered() {
                return Err(WalletError::Cancelled);
            }
            let source = chain.connect().map_err(|e| WalletError::BroadcastFailed(e.to_string()))?;
            source.broadcast(&signed.tx).map_err(|e| WalletError::BroadcastFailed(e.to_string()))?;
            if let Err(e) = wallet.apply_broadcast(&signed.tx) {
                tracing::warn!(error = %e, "Broadcast accepted but not recorded locally");
            }
            Ok(TransactionReceipt::from(signed.details))
        })
        .await;

        match receipt {
            Ok(receipt) => {
                tracing::info!(txid = %receipt.txid, fee = ?receipt.fee, "Payment broadcast");
                if let Err(e) = self.refresh_balance().await {
                    tracing::warn!(error = %e, "Balance refresh after send failed");
                }
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "Payment failed");
                Err(e)
            }
        }
    }

    /// Like [`send`](Self::send), with a rate estimated for `target_blocks`
    /// (the configured fee target if `None`).
    ///
    /// Falls back to the configured default rate when no estimate is available.
    pub async fn send_with_target(
        &self,
        amount: u64,
        address: &str,
        target_blocks: Option<u16>,
    ) -> WalletResult<TransactionReceipt> {
        self.loaded_handle()?;
        PaymentRequest::new(address, amount, self.inner.config.default_fee_rate)
            .validate(self.network(), &self.balance())?;
        let target_blocks = target_blocks.unwrap_or(self.inner.config.fee_target_blocks);
        let fee_rate = self.estimate_fee_or_default(target_blocks).await?;
        self.send(amount, address, Some(fee_rate)).await
    }

    /// Fee rate (sat/vB) to confirm within `target_blocks`, over a fresh
    /// connection. Any failure is `EstimationUnavailable`; treat it as
    /// "use a default", not as fatal.
    pub async fn estimate_fee(&self, target_blocks: u16) -> WalletResult<SatPerVb> {
        self.ensure_running()?;
        let target_blocks = target_blocks.max(1);
        let chain = self.inner.chain.clone();
        let work = tokio::task::spawn_blocking(move || {
            let source = chain.connect().map_err(|e| WalletError::EstimationUnavailable(e.to_string()))?;
            source
                .estimate_fee(target_blocks)
                .map_err(|e| WalletError::EstimationUnavailable(e.to_string()))
        });

        let rate = tokio::select! {
            result = work => result.map_err(|e| WalletError::EstimationUnavailable(format!("estimate task: {}", e)))?,
            _ = self.inner.shutdown.cancelled() => return Err(WalletError::Cancelled),
        }?;
        tracing::debug!(target_blocks, rate = %rate, "Fee estimated");
        Ok(rate)
    }

    /// [`estimate_fee`](Self::estimate_fee), substituting the configured
    /// default rate when the estimate is unavailable.
    pub async fn estimate_fee_or_default(&self, target_blocks: u16) -> WalletResult<SatPerVb> {
        match self.estimate_fee(target_blocks).await {
            Err(WalletError::EstimationUnavailable(reason)) => {
                let fallback = self.inner.config.default_fee_rate;
                tracing::warn!(%reason, fallback = %fallback, "Fee estimate unavailable; using default rate");
                Ok(fallback)
            }
            other => other,
        }
    }

    /// Most recent wallet transactions, at most `limit`.
    pub async fn transactions(&self, limit: usize) -> WalletResult<Vec<TransactionDetails>> {
        let handle = self.loaded_handle()?;
        handle.run(WalletError::Storage, move |wallet| wallet.transactions(limit)).await
    }
}
