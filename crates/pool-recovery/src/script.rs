//! Account script construction and the batch key evolution it depends on.
//!
//! The recovery engine only talks to [`AccountScriptBuilder`] and
//! [`BatchKeyEvolution`]; [`PoolAccountScript`] is the secp256k1
//! implementation of both used by the auctioneer's v0 account outputs.

use std::sync::LazyLock;

use bitcoin::opcodes::all::{OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_CLTV, OP_ENDIF, OP_IFDUP, OP_NOTIF};
use bitcoin::script::Builder;
use bitcoin::secp256k1::{All, PublicKey, Scalar, Secp256k1, constants};
use bitcoin::{OutPoint, Script, ScriptBuf, Transaction};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Builds the output script an account is locked to.
pub trait AccountScriptBuilder {
    /// Reconstruct the script pubkey for the given account parameters.
    ///
    /// Fails on structurally invalid inputs such as a tweak that lands on
    /// the point at infinity.
    fn account_script(
        &self,
        expiry: u32,
        trader_key: &PublicKey,
        auctioneer_key: &PublicKey,
        batch_key: &PublicKey,
        secret: &[u8; 32],
    ) -> Result<ScriptBuf>;
}

/// Steps the auctioneer's batch key one generation forward or backward.
pub trait BatchKeyEvolution {
    fn increment(&self, key: &PublicKey) -> Result<PublicKey>;

    fn decrement(&self, key: &PublicKey) -> Result<PublicKey>;
}

/// The curve generator `G`. Its `y` coordinate is even.
static GENERATOR: LazyLock<PublicKey> = LazyLock::new(|| {
    let mut compressed = [0x02; constants::PUBLIC_KEY_SIZE];
    compressed[1..].copy_from_slice(&constants::GENERATOR_X);
    PublicKey::from_slice(&compressed).expect("secp256k1 generator is on the curve")
});

/// secp256k1 implementation of the v0 account script and `P ± G` batch key
/// evolution.
pub struct PoolAccountScript {
    secp: Secp256k1<All>,
    generator: PublicKey,
    neg_generator: PublicKey,
}

impl PoolAccountScript {
    pub fn new() -> Self {
        let secp = Secp256k1::new();
        let generator = *GENERATOR;
        let neg_generator = generator.negate(&secp);
        Self {
            secp,
            generator,
            neg_generator,
        }
    }

    /// The witness script whose P2WSH hash is the account's script pubkey.
    ///
    /// ```text
    /// <trader_key + tweak_t·G> OP_CHECKSIGVERIFY
    /// <auctioneer_key + tweak_a·G> OP_CHECKSIG
    /// OP_IFDUP OP_NOTIF
    ///     <expiry> OP_CHECKLOCKTIMEVERIFY
    /// OP_ENDIF
    /// ```
    pub fn witness_script(
        &self,
        expiry: u32,
        trader_key: &PublicKey,
        auctioneer_key: &PublicKey,
        batch_key: &PublicKey,
        secret: &[u8; 32],
    ) -> Result<ScriptBuf> {
        let trader_tweak = trader_key_tweak(batch_key, secret, trader_key);
        let tweaked_trader = self.tweak(trader_key, trader_tweak)?;
        let auctioneer_tweak = auctioneer_key_tweak(&tweaked_trader, auctioneer_key);
        let tweaked_auctioneer = self.tweak(auctioneer_key, auctioneer_tweak)?;

        Ok(Builder::new()
            .push_key(&bitcoin::PublicKey::new(tweaked_trader))
            .push_opcode(OP_CHECKSIGVERIFY)
            .push_key(&bitcoin::PublicKey::new(tweaked_auctioneer))
            .push_opcode(OP_CHECKSIG)
            .push_opcode(OP_IFDUP)
            .push_opcode(OP_NOTIF)
            .push_int(i64::from(expiry))
            .push_opcode(OP_CLTV)
            .push_opcode(OP_ENDIF)
            .into_script())
    }

    fn tweak(&self, key: &PublicKey, tweak: [u8; 32]) -> Result<PublicKey> {
        let scalar = Scalar::from_be_bytes(tweak)
            .map_err(|_| Error::Script("tweak exceeds curve order".into()))?;
        key.add_exp_tweak(&self.secp, &scalar)
            .map_err(|e| Error::Script(e.to_string()))
    }
}

impl Default for PoolAccountScript {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountScriptBuilder for PoolAccountScript {
    fn account_script(
        &self,
        expiry: u32,
        trader_key: &PublicKey,
        auctioneer_key: &PublicKey,
        batch_key: &PublicKey,
        secret: &[u8; 32],
    ) -> Result<ScriptBuf> {
        let witness_script =
            self.witness_script(expiry, trader_key, auctioneer_key, batch_key, secret)?;
        Ok(ScriptBuf::new_p2wsh(&witness_script.wscript_hash()))
    }
}

impl BatchKeyEvolution for PoolAccountScript {
    fn increment(&self, key: &PublicKey) -> Result<PublicKey> {
        key.combine(&self.generator)
            .map_err(|e| Error::BatchKey(format!("increment: {e}")))
    }

    fn decrement(&self, key: &PublicKey) -> Result<PublicKey> {
        key.combine(&self.neg_generator)
            .map_err(|e| Error::BatchKey(format!("decrement: {e}")))
    }
}

/// ```text
/// tweak_t = SHA256(batch_key || secret || trader_key)
/// ```
pub fn trader_key_tweak(
    batch_key: &PublicKey,
    secret: &[u8; 32],
    trader_key: &PublicKey,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(batch_key.serialize());
    hasher.update(secret);
    hasher.update(trader_key.serialize());
    hasher.finalize().into()
}

/// ```text
/// tweak_a = SHA256(tweaked_trader_key || auctioneer_key)
/// ```
pub fn auctioneer_key_tweak(
    tweaked_trader_key: &PublicKey,
    auctioneer_key: &PublicKey,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tweaked_trader_key.serialize());
    hasher.update(auctioneer_key.serialize());
    hasher.finalize().into()
}

/// Index of the first output of `tx` whose script pubkey equals `script`.
pub fn locate_output_script(tx: &Transaction, script: &Script) -> Option<u32> {
    tx.output
        .iter()
        .position(|out| out.script_pubkey.as_script() == script)
        .map(|idx| idx as u32)
}

/// Whether `tx` consumes `outpoint` as one of its inputs.
pub fn spends_outpoint(tx: &Transaction, outpoint: &OutPoint) -> bool {
    tx.input.iter().any(|txin| txin.previous_output == *outpoint)
}
