//! Payment Builder - request validation and the receipt handed back.

use super::engine::{Balance, TransactionDetails};
use super::SatPerVb;
use crate::amount::format_btc;
use crate::config::Network;
use crate::error::{WalletError, WalletResult};
use bdk_wallet::bitcoin::{Address, Amount, ScriptBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Transient send input. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub address: String,
    pub amount: u64,
    pub fee_rate: SatPerVb,
}

/// A request that passed every precondition.
#[derive(Debug, Clone)]
pub struct ValidatedPayment {
    pub address: Address,
    pub recipient: ScriptBuf,
    pub amount: Amount,
    pub fee_rate: SatPerVb,
}

impl PaymentRequest {
    pub fn new(address: impl Into<String>, amount: u64, fee_rate: SatPerVb) -> Self {
        Self { address: address.into(), amount, fee_rate }
    }

    /// Check address, then amount, against `network` and the last known
    /// balance. Fee is not considered here: the build step does the
    /// authoritative fee-aware check.
    pub fn validate(&self, network: Network, balance: &Balance) -> WalletResult<ValidatedPayment> {
        let address = parse_address(&self.address, network)?;
        if self.amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be greater than zero".into()));
        }
        if self.amount >= balance.total {
            return Err(WalletError::InsufficientFunds { requested: self.amount, available: balance.total });
        }
        Ok(ValidatedPayment {
            recipient: address.script_pubkey(),
            address,
            amount: Amount::from_sat(self.amount),
            fee_rate: self.fee_rate,
        })
    }
}

/// Parse an address and require it to belong to `network`.
pub fn parse_address(address: &str, network: Network) -> WalletResult<Address> {
    let address = address.trim();
    if address.is_empty() {
        return Err(WalletError::InvalidAddress("empty".into()));
    }
    Address::from_str(address)
        .map_err(|e| WalletError::InvalidAddress(format!("{}: {}", address, e)))?
        .require_network(network.to_bdk())
        .map_err(|e| WalletError::InvalidAddress(format!("{} on {}: {}", address, network.as_str(), e)))
}

/// Result of a broadcast the chain source accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionReceipt {
    pub txid: String,
    /// Wallet-owned input value spent.
    pub sent: u64,
    /// Value returned to the wallet (change).
    pub received: u64,
    pub fee: Option<u64>,
    /// Unix seconds; `None` right after broadcast.
    pub confirmation_time: Option<u64>,
}

impl TransactionReceipt {
    /// Value that left the wallet: recipient amount plus fee.
    pub fn net_sent(&self) -> u64 { self.sent.saturating_sub(self.received) }

    pub fn confirmation_date(&self) -> Option<DateTime<Utc>> {
        self.confirmation_time
            .and_then(|t| i64::try_from(t).ok())
            .and_then(|t| DateTime::from_timestamp(t, 0))
    }
}

impl From<TransactionDetails> for TransactionReceipt {
    fn from(d: TransactionDetails) -> Self {
        Self { txid: d.txid, sent: d.sent, received: d.received, fee: d.fee, confirmation_time: d.confirmation_time }
    }
}

impl fmt::Display for TransactionReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sent {} BTC, received {} BTC", self.txid, format_btc(self.sent), format_btc(self.received))?;
        if let Some(fee) = self.fee {
            write!(f, ", fee {} BTC", format_btc(fee))?;
        }
        match self.confirmation_date() {
            Some(date) => write!(f, ", confirmed {}", date.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, ", unconfirmed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP84 vector, m/84'/1'/0'/0/0 of the "abandon ... about" mnemonic
    const TESTNET_ADDR: &str = "tb1q6rz28mcfaxtmd6v789l9rrlrusdprr9pqcpvkl";
    const MAINNET_ADDR: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";

    fn balance(total: u64) -> Balance { Balance { total, confirmed: total, spendable: total, ..Balance::default() } }

    #[test]
    fn test_valid_request() {
        let req = PaymentRequest::new(TESTNET_ADDR, 1000, SatPerVb::DEFAULT);
        let ok = req.validate(Network::Testnet, &balance(100_000)).unwrap();
        assert_eq!(ok.amount, Amount::from_sat(1000));
        assert_eq!(ok.recipient, ok.address.script_pubkey());
    }

    #[test]
    fn test_zero_amount() {
        let req = PaymentRequest::new(TESTNET_ADDR, 0, SatPerVb::DEFAULT);
        assert!(matches!(req.validate(Network::Testnet, &balance(100_000)), Err(WalletError::InvalidAmount(_))));
    }

    #[test]
    fn test_amount_at_or_above_total() {
        for amount in [100_000, 100_001] {
            let req = PaymentRequest::new(TESTNET_ADDR, amount, SatPerVb::DEFAULT);
            let err = req.validate(Network::Testnet, &balance(100_000)).unwrap_err();
            assert_eq!(err, WalletError::InsufficientFunds { requested: amount, available: 100_000 });
        }
    }

    #[test]
    fn test_invalid_and_foreign_addresses() {
        let req = PaymentRequest::new("not-a-valid-address", 1000, SatPerVb::DEFAULT);
        assert!(matches!(req.validate(Network::Testnet, &balance(0)), Err(WalletError::InvalidAddress(_))));
        let req = PaymentRequest::new(MAINNET_ADDR, 1000, SatPerVb::DEFAULT);
        assert!(matches!(req.validate(Network::Testnet, &balance(100_000)), Err(WalletError::InvalidAddress(_))));
        assert!(parse_address(TESTNET_ADDR, Network::Signet).is_ok());
    }

    #[test]
    fn test_receipt_net_sent_and_display() {
        let receipt = TransactionReceipt { txid: "ab".repeat(32), sent: 100_000, received: 98_859, fee: Some(141), confirmation_time: None };
        assert_eq!(receipt.net_sent(), 1141);
        let text = receipt.to_string();
        assert!(text.contains("unconfirmed"));
        assert!(text.contains("0.00000141"));
    }
}
