//! Key Derivation - seed phrase to single-key output descriptor.
//!
//! Pure and deterministic: the same (seed, path, kind, network) always yields
//! byte-identical descriptor strings. No I/O.

use crate::config::Network;
use crate::error::{WalletError, WalletResult};
use crate::seed::SeedPhrase;
use bdk_wallet::bitcoin::bip32::{DerivationPath, Xpriv};
use bdk_wallet::bitcoin::secp256k1::Secp256k1;
use bdk_wallet::miniscript::{Descriptor as ScriptDescriptor, DescriptorPublicKey};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Output-script template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptorKind {
    /// Native segwit v0, BIP84
    Wpkh,
    /// Taproot single key, BIP86
    #[default]
    Tr,
}

impl DescriptorKind {
    pub fn as_str(&self) -> &'static str {
        match self { DescriptorKind::Wpkh => "wpkh", DescriptorKind::Tr => "tr" }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wpkh" | "bip84" | "segwit" => Some(DescriptorKind::Wpkh),
            "tr" | "bip86" | "taproot" => Some(DescriptorKind::Tr),
            _ => None,
        }
    }

    fn purpose(&self) -> u32 {
        match self { DescriptorKind::Wpkh => 84, DescriptorKind::Tr => 86 }
    }

    /// Fixed external-chain path for this template, e.g. `m/86'/1'/0'/0`.
    pub fn default_path(&self, network: Network) -> String {
        format!("m/{}'/{}'/0'/0", self.purpose(), network.coin_type())
    }
}

/// A derived output descriptor. Holds secret key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Descriptor {
    kind: DescriptorKind,
    network: Network,
    path: String,
    secret: Zeroizing<String>,
    public: String,
}

impl Descriptor {
    pub fn kind(&self) -> DescriptorKind { self.kind }
    pub fn network(&self) -> Network { self.network }
    pub fn path(&self) -> &str { &self.path }

    /// Checksummed descriptor with extended public key; safe to share.
    pub fn public(&self) -> &str { &self.public }

    /// Descriptor with extended private key, for wallet construction.
    pub fn secret(&self) -> &str { &self.secret }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("kind", &self.kind)
            .field("network", &self.network)
            .field("path", &self.path)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Derive the descriptor for `kind` at its fixed path.
pub fn derive_descriptor(seed: &SeedPhrase, kind: DescriptorKind, network: Network) -> WalletResult<Descriptor> {
    derive_descriptor_at(seed, &kind.default_path(network), kind, network)
}

/// Derive the descriptor for `kind` at an explicit path template.
pub fn derive_descriptor_at(
    seed: &SeedPhrase,
    path_template: &str,
    kind: DescriptorKind,
    network: Network,
) -> WalletResult<Descriptor> {
    let path = DerivationPath::from_str(path_template)
        .map_err(|e| WalletError::Derivation(format!("path {:?}: {}", path_template, e)))?;

    let secp = Secp256k1::new();
    let seed_bytes = seed.to_seed();
    let master = Xpriv::new_master(network.to_bdk(), &seed_bytes[..])
        .map_err(|e| WalletError::Derivation(format!("master key: {}", e)))?;
    let derived = master
        .derive_priv(&secp, &path)
        .map_err(|e| WalletError::Derivation(format!("child key: {}", e)))?;

    let origin = path_template.trim_start_matches('m').trim_start_matches('/');
    let key_origin = if origin.is_empty() {
        format!("[{}]", master.fingerprint(&secp))
    } else {
        format!("[{}/{}]", master.fingerprint(&secp), origin)
    };
    let raw = Zeroizing::new(format!("{}({}{}/*)", kind.as_str(), key_origin, derived));

    let (descriptor, keymap) = ScriptDescriptor::<DescriptorPublicKey>::parse_descriptor(&secp, &raw)
        .map_err(|e| WalletError::Derivation(format!("descriptor: {}", e)))?;

    Ok(Descriptor {
        kind,
        network,
        path: path_template.to_string(),
        secret: Zeroizing::new(descriptor.to_string_with_secret(&keymap)),
        public: descriptor.to_string(),
    })
}
