//! HTTP indexer (Esplora) chain source.

use super::{ChainError, ChainSource, EsploraConfig};
use crate::wallet::SatPerVb;
use bdk_esplora::esplora_client::{BlockingClient, Builder};
use bdk_esplora::EsploraExt;
use bdk_wallet::bitcoin::Transaction;
use bdk_wallet::chain::spk_client::FullScanRequest;
use bdk_wallet::{KeychainKind, Update};
use std::collections::HashMap;

pub(super) struct EsploraSource {
    client: BlockingClient,
    stop_gap: usize,
    concurrency: usize,
}

pub(super) fn connect(config: &EsploraConfig) -> Result<Box<dyn ChainSource>, ChainError> {
    if config.base_url.is_empty() {
        return Err(ChainError::Connect("empty Esplora base url".into()));
    }
    let mut builder = Builder::new(&config.base_url).timeout(config.timeout);
    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(proxy);
    }
    Ok(Box::new(EsploraSource {
        client: builder.build_blocking(),
        stop_gap: config.stop_gap,
        concurrency: config.concurrency.max(1),
    }))
}

impl ChainSource for EsploraSource {
    fn full_scan(&self, request: FullScanRequest<KeychainKind>) -> Result<Update, ChainError> {
        let response = self
            .client
            .full_scan(request, self.stop_gap, self.concurrency)
            .map_err(|e| ChainError::Protocol(format!("Esplora scan: {}", e)))?;
        Ok(response.into())
    }

    fn broadcast(&self, tx: &Transaction) -> Result<(), ChainError> {
        self.client
            .broadcast(tx)
            .map(|_| ())
            .map_err(|e| ChainError::Protocol(format!("Esplora broadcast: {}", e)))
    }

    fn estimate_fee(&self, target_blocks: u16) -> Result<SatPerVb, ChainError> {
        let estimates = self
            .client
            .get_fee_estimates()
            .map_err(|e| ChainError::Unavailable(format!("Esplora estimate: {}", e)))?;
        pick_estimate(&estimates, target_blocks)
    }
}

/// Rate of the largest published target that still confirms within `target_blocks`.
pub(super) fn pick_estimate(estimates: &HashMap<u16, f64>, target_blocks: u16) -> Result<SatPerVb, ChainError> {
    let rate = estimates
        .iter()
        .filter(|(blocks, _)| **blocks <= target_blocks)
        .max_by_key(|(blocks, _)| **blocks)
        .map(|(_, rate)| *rate)
        .ok_or_else(|| ChainError::Unavailable(format!("no estimate for {} blocks", target_blocks)))?;
    SatPerVb::new(rate as f32).map_err(|e| ChainError::Unavailable(e.to_string()))
}
