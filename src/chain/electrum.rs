//! Electrum-protocol chain source.

use super::{ChainError, ChainSource, ElectrumConfig};
use crate::wallet::SatPerVb;
use bdk_electrum::electrum_client::{Client, ConfigBuilder, ElectrumApi, Socks5Config};
use bdk_electrum::BdkElectrumClient;
use bdk_wallet::bitcoin::Transaction;
use bdk_wallet::chain::spk_client::FullScanRequest;
use bdk_wallet::{KeychainKind, Update};
use std::sync::Once;

const BATCH_SIZE: usize = 10;

// Electrum reports BTC/kvB; 1e8 sat / 1000 vB.
const BTC_PER_KVB_TO_SAT_PER_VB: f64 = 100_000.0;

static CRYPTO_INIT: Once = Once::new();

fn init_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

pub(super) struct ElectrumSource {
    client: BdkElectrumClient<Client>,
    stop_gap: usize,
}

pub(super) fn connect(config: &ElectrumConfig) -> Result<Box<dyn ChainSource>, ChainError> {
    init_crypto();
    let electrum_config = ConfigBuilder::new()
        .retry(config.retry)
        .timeout(config.timeout)
        .validate_domain(config.validate_domain)
        .socks5(config.socks5.as_ref().map(|proxy| Socks5Config::new(proxy.as_str())))
        .build();
    let client = Client::from_config(&config.url, electrum_config)
        .map_err(|e| ChainError::Connect(format!("Electrum {}: {}", config.url, e)))?;
    Ok(Box::new(ElectrumSource { client: BdkElectrumClient::new(client), stop_gap: config.stop_gap }))
}

impl ChainSource for ElectrumSource {
    fn full_scan(&self, request: FullScanRequest<KeychainKind>) -> Result<Update, ChainError> {
        let response = self
            .client
            .full_scan(request, self.stop_gap, BATCH_SIZE, false)
            .map_err(|e| ChainError::Protocol(format!("Electrum scan: {}", e)))?;
        Ok(response.into())
    }

    fn broadcast(&self, tx: &Transaction) -> Result<(), ChainError> {
        self.client
            .inner
            .transaction_broadcast(tx)
            .map(|_| ())
            .map_err(|e| ChainError::Protocol(format!("Electrum broadcast: {}", e)))
    }

    fn estimate_fee(&self, target_blocks: u16) -> Result<SatPerVb, ChainError> {
        let btc_per_kvb = self
            .client
            .inner
            .estimate_fee(usize::from(target_blocks))
            .map_err(|e| ChainError::Unavailable(format!("Electrum estimate: {}", e)))?;
        sat_per_vb_from_btc_per_kvb(btc_per_kvb, target_blocks)
    }
}

/// Convert an Electrum `blockchain.estimatefee` answer to sat/vB.
///
/// Servers answer -1 when they lack data for the target.
pub(super) fn sat_per_vb_from_btc_per_kvb(btc_per_kvb: f64, target_blocks: u16) -> Result<SatPerVb, ChainError> {
    if !btc_per_kvb.is_finite() || btc_per_kvb <= 0.0 {
        return Err(ChainError::Unavailable(format!("no estimate for {} blocks", target_blocks)));
    }
    SatPerVb::new((btc_per_kvb * BTC_PER_KVB_TO_SAT_PER_VB) as f32).map_err(|e| ChainError::Unavailable(e.to_string()))
}
