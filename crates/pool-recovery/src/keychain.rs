//! Wallet key derivation and trader/auctioneer key agreement.

use std::str::FromStr;

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use bitcoin::secp256k1::ecdh::SharedSecret;
use bitcoin::secp256k1::{All, PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::account::{KeyDescriptor, KeyLocator};
use crate::error::{Error, Result};
use crate::network::Network;

/// Purpose field of the wallet's BIP43 key tree.
pub const KEY_PURPOSE: u32 = 1017;

/// `(family, index) -> public key`. Must be deterministic and idempotent.
pub trait KeyDerivation {
    fn derive_key(&self, locator: KeyLocator) -> Result<KeyDescriptor>;
}

/// `(peer key, our key locator) -> 32-byte secret`.
pub trait SharedSecretDerivation {
    fn derive_shared_secret(&self, peer: &PublicKey, locator: &KeyLocator) -> Result<[u8; 32]>;
}

/// Keyring backed by a BIP32 root key, deriving along
/// `m/1017'/coin_type'/family'/0/index`.
pub struct SeedKeyRing {
    root: Xpriv,
    coin_type: u32,
    secp: Secp256k1<All>,
}

impl SeedKeyRing {
    pub fn from_xpriv(root: Xpriv, network: Network) -> Self {
        Self {
            root,
            coin_type: network.coin_type(),
            secp: Secp256k1::new(),
        }
    }

    /// Parse a base58 extended private key (`xprv…` / `tprv…`).
    pub fn from_xpriv_str(xpriv: &str, network: Network) -> Result<Self> {
        let root = Xpriv::from_str(xpriv).map_err(|e| Error::KeyRing(e.to_string()))?;
        Ok(Self::from_xpriv(root, network))
    }

    /// Build the root from raw seed bytes (e.g. a BIP39 seed).
    pub fn from_seed(seed: &[u8], network: Network) -> Result<Self> {
        let root = Xpriv::new_master(network.into_bitcoin(), seed)
            .map_err(|e| Error::KeyRing(e.to_string()))?;
        Ok(Self::from_xpriv(root, network))
    }

    /// Build the root from a BIP39 mnemonic and optional passphrase.
    pub fn from_mnemonic(phrase: &str, passphrase: &str, network: Network) -> Result<Self> {
        let mnemonic: bip39::Mnemonic = phrase
            .parse()
            .map_err(|e: bip39::Error| Error::KeyRing(format!("invalid mnemonic: {e}")))?;
        let seed = Zeroizing::new(mnemonic.to_seed(passphrase));
        Self::from_seed(&seed[..], network)
    }

    pub fn derivation_path(&self, locator: &KeyLocator) -> Result<DerivationPath> {
        let hardened = |i: u32| {
            ChildNumber::from_hardened_idx(i).map_err(|e| Error::KeyDerivation {
                index: locator.index,
                reason: e.to_string(),
            })
        };
        let normal = |i: u32| {
            ChildNumber::from_normal_idx(i).map_err(|e| Error::KeyDerivation {
                index: locator.index,
                reason: e.to_string(),
            })
        };
        Ok(DerivationPath::from(vec![
            hardened(KEY_PURPOSE)?,
            hardened(self.coin_type)?,
            hardened(locator.family)?,
            normal(0)?,
            normal(locator.index)?,
        ]))
    }

    fn private_key(&self, locator: &KeyLocator) -> Result<SecretKey> {
        let path = self.derivation_path(locator)?;
        let child = self
            .root
            .derive_priv(&self.secp, &path)
            .map_err(|e| Error::KeyDerivation {
                index: locator.index,
                reason: e.to_string(),
            })?;
        Ok(child.private_key)
    }
}

impl KeyDerivation for SeedKeyRing {
    fn derive_key(&self, locator: KeyLocator) -> Result<KeyDescriptor> {
        let sk = self.private_key(&locator)?;
        Ok(KeyDescriptor {
            locator,
            pubkey: PublicKey::from_secret_key(&self.secp, &sk),
        })
    }
}

impl SharedSecretDerivation for SeedKeyRing {
    fn derive_shared_secret(&self, peer: &PublicKey, locator: &KeyLocator) -> Result<[u8; 32]> {
        let sk = self
            .private_key(locator)
            .map_err(|e| Error::SharedSecret {
                index: locator.index,
                reason: e.to_string(),
            })?;
        // SHA256 of the compressed shared point.
        Ok(SharedSecret::new(peer, &sk).secret_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::ACCOUNT_KEY_FAMILY;

    fn keyring() -> SeedKeyRing {
        SeedKeyRing::from_seed(&[0x5a; 32], Network::Regtest).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = keyring().derive_key(KeyLocator::account(3)).unwrap();
        let b = keyring().derive_key(KeyLocator::account(3)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.locator.family, ACCOUNT_KEY_FAMILY);
    }

    #[test]
    fn indices_and_families_give_distinct_keys() {
        let ring = keyring();
        let k0 = ring.derive_key(KeyLocator::account(0)).unwrap();
        let k1 = ring.derive_key(KeyLocator::account(1)).unwrap();
        let other = ring
            .derive_key(KeyLocator {
                family: 0,
                index: 0,
            })
            .unwrap();
        assert_ne!(k0.pubkey, k1.pubkey);
        assert_ne!(k0.pubkey, other.pubkey);
    }

    #[test]
    fn path_layout() {
        let ring = keyring();
        let path = ring.derivation_path(&KeyLocator::account(9)).unwrap();
        assert_eq!(path, DerivationPath::from_str("m/1017'/1'/220'/0/9").unwrap());
    }

    #[test]
    fn shared_secret_agrees_with_peer() {
        let secp = Secp256k1::new();
        let ring = keyring();
        let locator = KeyLocator::account(0);
        let trader = ring.derive_key(locator).unwrap();

        let auctioneer_sk = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let auctioneer_pk = PublicKey::from_secret_key(&secp, &auctioneer_sk);

        let ours = ring.derive_shared_secret(&auctioneer_pk, &locator).unwrap();
        let theirs = SharedSecret::new(&trader.pubkey, &auctioneer_sk).secret_bytes();
        assert_eq!(ours, theirs);
    }

    #[test]
    fn out_of_range_index_is_a_derivation_error() {
        let ring = keyring();
        let err = ring.derive_key(KeyLocator::account(1 << 31)).unwrap_err();
        assert!(matches!(err, Error::KeyDerivation { .. }));
    }

    #[test]
    fn mnemonic_passphrase_changes_keys() {
        let phrase = "abandon abandon abandon abandon abandon abandon \
                      abandon abandon abandon abandon abandon about";
        let plain = SeedKeyRing::from_mnemonic(phrase, "", Network::Testnet).unwrap();
        let salted = SeedKeyRing::from_mnemonic(phrase, "TREZOR", Network::Testnet).unwrap();
        let loc = KeyLocator::account(0);
        assert_ne!(
            plain.derive_key(loc).unwrap().pubkey,
            salted.derive_key(loc).unwrap().pubkey
        );
        assert!(matches!(
            SeedKeyRing::from_mnemonic("abandon abandon", "", Network::Testnet),
            Err(Error::KeyRing(_))
        ));
    }

    #[test]
    fn bad_xpriv_is_rejected() {
        assert!(matches!(
            SeedKeyRing::from_xpriv_str("xprvnotakey", Network::Mainnet),
            Err(Error::KeyRing(_))
        ));
    }
}
