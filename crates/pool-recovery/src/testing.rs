//! Fixtures for exercising recovery without a wallet or a chain backend.
//!
//! Keys are derived from fixed secret scalars so every run sees the same
//! points, and transactions are built directly with the outputs a test needs.

use std::cell::Cell;
use std::collections::BTreeSet;

use bitcoin::secp256k1::ecdh::SharedSecret;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::{
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness, absolute,
    transaction,
};

use crate::account::{Account, CandidateAccount, KeyDescriptor, KeyLocator};
use crate::error::{Error, Result};
use crate::keychain::{KeyDerivation, SharedSecretDerivation};
use crate::recovery::RecoveryConfig;
use crate::script::{AccountScriptBuilder, PoolAccountScript};

fn key_from_byte(byte: u8) -> PublicKey {
    let sk = SecretKey::from_slice(&[byte; 32]).expect("valid secret key");
    PublicKey::from_secret_key(&Secp256k1::new(), &sk)
}

pub fn test_auctioneer_key() -> PublicKey {
    key_from_byte(0x02)
}

pub fn test_batch_key() -> PublicKey {
    key_from_byte(0x03)
}

/// Distinct trader keys for small `n`.
pub fn test_trader_key(n: u8) -> PublicKey {
    key_from_byte(0x20 + n)
}

/// Candidates `0..n` with fixed keys and secrets, skipping the keyring.
pub fn test_candidates(n: u32) -> Vec<CandidateAccount> {
    (0..n)
        .map(|index| CandidateAccount {
            trader_key: KeyDescriptor {
                locator: KeyLocator::account(index),
                pubkey: test_trader_key(index as u8),
            },
            auctioneer_key: test_auctioneer_key(),
            secret: [index as u8 + 1; 32],
        })
        .collect()
}

/// Expiry range `[100, 200)` and three batch key generations.
pub fn test_config(account_target: u32) -> RecoveryConfig {
    RecoveryConfig {
        account_target,
        first_block: 100,
        last_block: 200,
        generation_ceiling: 3,
        initial_batch_key: test_batch_key(),
        auctioneer_key: test_auctioneer_key(),
    }
}

fn outputs(outs: Vec<(u64, ScriptBuf)>) -> Vec<TxOut> {
    outs.into_iter()
        .map(|(sats, script_pubkey)| TxOut {
            value: Amount::from_sat(sats),
            script_pubkey,
        })
        .collect()
}

/// A transaction spending `prev` and paying `outs`.
pub fn spending_tx(prev: OutPoint, outs: Vec<(u64, ScriptBuf)>) -> Transaction {
    Transaction {
        version: transaction::Version::TWO,
        lock_time: absolute::LockTime::ZERO,
        input: vec![TxIn {
            previous_output: prev,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: outputs(outs),
    }
}

/// A transaction with a placeholder input and the given outputs.
pub fn tx_with_outputs(outs: Vec<(u64, ScriptBuf)>) -> Transaction {
    spending_tx(OutPoint::null(), outs)
}

/// A creation transaction holding `candidate`'s account at output 0.
pub fn account_tx(
    protocol: &PoolAccountScript,
    candidate: &CandidateAccount,
    expiry: u32,
    batch_key: &PublicKey,
    sats: u64,
) -> Transaction {
    let script = protocol
        .account_script(
            expiry,
            &candidate.trader_key.pubkey,
            &candidate.auctioneer_key,
            batch_key,
            &candidate.secret,
        )
        .expect("account script");
    tx_with_outputs(vec![(sats, script)])
}

/// A batch transaction spending `account` and re-creating it at output 0.
pub fn update_tx(
    protocol: &PoolAccountScript,
    account: &Account,
    expiry: u32,
    batch_key: &PublicKey,
    sats: u64,
) -> Transaction {
    let script = protocol
        .account_script(
            expiry,
            &account.trader_key.pubkey,
            &account.auctioneer_key,
            batch_key,
            &account.secret,
        )
        .expect("account script");
    spending_tx(account.outpoint, vec![(sats, script)])
}

/// Script builder that counts every reconstruction attempt.
pub struct CountingScriptBuilder<'a> {
    inner: &'a PoolAccountScript,
    calls: Cell<u64>,
}

impl<'a> CountingScriptBuilder<'a> {
    pub fn new(inner: &'a PoolAccountScript) -> Self {
        Self {
            inner,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.get()
    }
}

impl AccountScriptBuilder for CountingScriptBuilder<'_> {
    fn account_script(
        &self,
        expiry: u32,
        trader_key: &PublicKey,
        auctioneer_key: &PublicKey,
        batch_key: &PublicKey,
        secret: &[u8; 32],
    ) -> Result<ScriptBuf> {
        self.calls.set(self.calls.get() + 1);
        self.inner
            .account_script(expiry, trader_key, auctioneer_key, batch_key, secret)
    }
}

/// Script builder that always fails for one trader key.
pub struct FailingScriptBuilder<'a> {
    inner: &'a PoolAccountScript,
    failing: PublicKey,
}

impl<'a> FailingScriptBuilder<'a> {
    pub fn new(inner: &'a PoolAccountScript, failing: PublicKey) -> Self {
        Self { inner, failing }
    }
}

impl AccountScriptBuilder for FailingScriptBuilder<'_> {
    fn account_script(
        &self,
        expiry: u32,
        trader_key: &PublicKey,
        auctioneer_key: &PublicKey,
        batch_key: &PublicKey,
        secret: &[u8; 32],
    ) -> Result<ScriptBuf> {
        if *trader_key == self.failing {
            return Err(Error::Script("point at infinity".into()));
        }
        self.inner
            .account_script(expiry, trader_key, auctioneer_key, batch_key, secret)
    }
}

/// In-memory keyring whose keys are `(0x30 || index + 1)` scalars.
#[derive(Default)]
pub struct MockKeyRing {
    fail_keys: BTreeSet<u32>,
    fail_secrets: BTreeSet<u32>,
    keys_derived: Cell<usize>,
}

impl MockKeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_key_at(mut self, index: u32) -> Self {
        self.fail_keys.insert(index);
        self
    }

    pub fn fail_secret_at(mut self, index: u32) -> Self {
        self.fail_secrets.insert(index);
        self
    }

    pub fn keys_derived(&self) -> usize {
        self.keys_derived.get()
    }

    pub fn secret_key(index: u32) -> SecretKey {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x30;
        bytes[28..].copy_from_slice(&(index + 1).to_be_bytes());
        SecretKey::from_slice(&bytes).expect("valid secret key")
    }
}

impl KeyDerivation for MockKeyRing {
    fn derive_key(&self, locator: KeyLocator) -> Result<KeyDescriptor> {
        self.keys_derived.set(self.keys_derived.get() + 1);
        if self.fail_keys.contains(&locator.index) {
            return Err(Error::KeyDerivation {
                index: locator.index,
                reason: "wallet locked".into(),
            });
        }
        let sk = Self::secret_key(locator.index);
        Ok(KeyDescriptor {
            locator,
            pubkey: PublicKey::from_secret_key(&Secp256k1::new(), &sk),
        })
    }
}

impl SharedSecretDerivation for MockKeyRing {
    fn derive_shared_secret(&self, peer: &PublicKey, locator: &KeyLocator) -> Result<[u8; 32]> {
        if self.fail_secrets.contains(&locator.index) {
            return Err(Error::SharedSecret {
                index: locator.index,
                reason: "signer offline".into(),
            });
        }
        Ok(SharedSecret::new(peer, &Self::secret_key(locator.index)).secret_bytes())
    }
}
