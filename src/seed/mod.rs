//! Seed Store - load-or-create the wallet's BIP39 phrase.
//!
//! The phrase is serialized once, on first run, under [`SEED_STORAGE_KEY`].
//! A stored phrase that fails validation is reported as
//! [`WalletError::CorruptSeed`] and left untouched: regenerating it would
//! orphan any funds held by the old one.

mod storage;

pub use storage::{DirStore, KeyValueStore, MemoryStore};

use crate::error::{WalletError, WalletResult};
use bip39::Mnemonic;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Fixed storage key for the serialized phrase.
pub const SEED_STORAGE_KEY: &str = "single_mnemonic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordCount {
    #[default]
    Words12,
    Words15,
    Words18,
    Words21,
    Words24,
}

impl WordCount {
    pub fn words(&self) -> usize {
        match self {
            WordCount::Words12 => 12,
            WordCount::Words15 => 15,
            WordCount::Words18 => 18,
            WordCount::Words21 => 21,
            WordCount::Words24 => 24,
        }
    }

    fn entropy_bytes(&self) -> usize { self.words() / 3 * 4 }

    pub fn from_words(words: usize) -> Option<Self> {
        match words {
            12 => Some(WordCount::Words12),
            15 => Some(WordCount::Words15),
            18 => Some(WordCount::Words18),
            21 => Some(WordCount::Words21),
            24 => Some(WordCount::Words24),
            _ => None,
        }
    }
}

/// Validated BIP39 phrase. Immutable.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedPhrase(Mnemonic);

impl SeedPhrase {
    /// Parse and validate (word list, word count, checksum).
    pub fn parse(phrase: &str) -> WalletResult<Self> {
        Mnemonic::parse_normalized(phrase)
            .map(SeedPhrase)
            .map_err(|e| WalletError::CorruptSeed(e.to_string()))
    }

    pub fn generate(word_count: WordCount) -> WalletResult<Self> {
        let mut entropy = Zeroizing::new(vec![0u8; word_count.entropy_bytes()]);
        rand::rngs::OsRng.fill_bytes(&mut entropy);
        Mnemonic::from_entropy(&entropy)
            .map(SeedPhrase)
            .map_err(|e| WalletError::Storage(format!("Seed generation: {}", e)))
    }

    pub fn word_count(&self) -> usize { self.0.word_count() }

    /// Canonical space-separated form, as persisted.
    pub fn phrase(&self) -> Zeroizing<String> { Zeroizing::new(self.0.to_string()) }

    /// 64-byte BIP39 seed with an empty passphrase.
    pub fn to_seed(&self) -> Zeroizing<[u8; 64]> { Zeroizing::new(self.0.to_seed("")) }
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedPhrase({} words)", self.word_count())
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredSeed {
    mnemonic: String,
}

/// Owns the phrase for the process lifetime.
pub struct SeedStore {
    storage: Arc<dyn KeyValueStore>,
    cached: Mutex<Option<SeedPhrase>>,
}

impl SeedStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage, cached: Mutex::new(None) }
    }

    /// Return the persisted phrase, or create and persist a new one.
    ///
    /// The first successful call fixes the phrase for this process; later
    /// calls return it without touching storage.
    pub fn load_or_create(&self, word_count: WordCount) -> WalletResult<SeedPhrase> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(seed) = cached.as_ref() {
            return Ok(seed.clone());
        }

        let seed = match self.storage.get(SEED_STORAGE_KEY)? {
            Some(bytes) => {
                let bytes = Zeroizing::new(bytes);
                let stored: StoredSeed = serde_json::from_slice(&bytes)
                    .map_err(|e| WalletError::CorruptSeed(format!("payload: {}", e)))?;
                let seed = SeedPhrase::parse(&stored.mnemonic)?;
                if seed.word_count() != word_count.words() {
                    tracing::warn!(
                        stored = seed.word_count(),
                        requested = word_count.words(),
                        "Stored seed length differs from requested; keeping stored seed"
                    );
                }
                tracing::debug!("Seed restored from storage");
                seed
            }
            None => {
                let seed = SeedPhrase::generate(word_count)?;
                let payload = StoredSeed { mnemonic: seed.phrase().to_string() };
                let bytes = Zeroizing::new(
                    serde_json::to_vec(&payload).map_err(|e| WalletError::Storage(e.to_string()))?,
                );
                self.storage.set(SEED_STORAGE_KEY, &bytes)?;
                tracing::info!(words = seed.word_count(), "New seed generated and persisted");
                seed
            }
        };

        *cached = Some(seed.clone());
        Ok(seed)
    }
}
