//! Wallet module - engine capability, BDK implementation, payments
//!
//! # Architecture
//!
//! ```text
//! WalletController
//!     │
//!     ├── WalletEngine::new_wallet(descriptor, change?, network, database)
//!     │         └── Box<dyn WalletHandle>  (BdkHandle: memory | bdk_file_store)
//!     │
//!     └── PaymentRequest::validate → build_tx → sign → broadcast → TransactionReceipt
//! ```

mod bdk;
mod engine;
mod fees;
mod payment;

pub use bdk::{BdkEngine, BdkHandle};
pub use engine::{Balance, SignedTx, TransactionDetails, UnsignedTx, WalletEngine, WalletHandle};
pub use fees::SatPerVb;
pub use payment::{parse_address, PaymentRequest, TransactionReceipt, ValidatedPayment};
