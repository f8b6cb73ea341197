//! Account recovery entry point.

use bitcoin::Transaction;
use bitcoin::secp256k1::PublicKey;

use crate::account::{
    Account, CandidateAccount, DEFAULT_ACCOUNT_KEY_WINDOW, DEFAULT_GENERATION_CEILING,
};
use crate::cancel::CancellationToken;
use crate::candidates::generate_candidates;
use crate::error::{Error, Result};
use crate::keychain::{KeyDerivation, SharedSecretDerivation};
use crate::replay::update_account_states;
use crate::script::{AccountScriptBuilder, BatchKeyEvolution};
use crate::search::{SearchStats, find_accounts};

/// Parameters of a recovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Number of accounts to derive and look for.
    pub account_target: u32,
    /// Lowest expiry height considered.
    pub first_block: u32,
    /// Highest expiry height considered.
    pub last_block: u32,
    /// Number of batch key generations searched.
    pub generation_ceiling: u32,
    /// Batch key at the first block.
    pub initial_batch_key: PublicKey,
    pub auctioneer_key: PublicKey,
}

impl RecoveryConfig {
    /// A config with the default key window and generation ceiling.
    pub fn new(
        first_block: u32,
        last_block: u32,
        initial_batch_key: PublicKey,
        auctioneer_key: PublicKey,
    ) -> Self {
        Self {
            account_target: DEFAULT_ACCOUNT_KEY_WINDOW,
            first_block,
            last_block,
            generation_ceiling: DEFAULT_GENERATION_CEILING,
            initial_batch_key,
            auctioneer_key,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_block > self.last_block {
            return Err(Error::Config(format!(
                "first block {} is above last block {}",
                self.first_block, self.last_block
            )));
        }
        if self.generation_ceiling == 0 {
            return Err(Error::Config("generation ceiling must be positive".into()));
        }
        Ok(())
    }
}

/// What a recovery run produced.
#[derive(Debug, Clone)]
pub struct RecoveryReport {
    /// Recovered accounts in their latest known state, in discovery order.
    pub accounts: Vec<Account>,
    /// Candidates never matched on chain.
    pub unresolved: Vec<CandidateAccount>,
    /// Number of candidates derived.
    pub candidates: u32,
    pub search: SearchStats,
}

/// Recover the wallet's accounts from `txs`.
///
/// Derives the candidate window, searches for each candidate's creation
/// output, then replays every found account forward. Only setup failures
/// (invalid config, key derivation, batch key step) and cancellation return
/// an error; per-candidate and per-account failures just leave that entry
/// unresolved.
pub fn recover_accounts<W, S>(
    cfg: &RecoveryConfig,
    txs: &[Transaction],
    wallet: &W,
    script: &S,
    cancel: Option<&CancellationToken>,
) -> Result<RecoveryReport>
where
    W: KeyDerivation + SharedSecretDerivation,
    S: AccountScriptBuilder + BatchKeyEvolution,
{
    cfg.validate()?;

    log::info!(
        "recovering up to {} accounts from {} transactions, expiry range {}..{}",
        cfg.account_target,
        txs.len(),
        cfg.first_block,
        cfg.last_block
    );

    let candidates = generate_candidates(
        cfg.account_target,
        wallet,
        wallet,
        &cfg.auctioneer_key,
        cancel,
    )?;
    let candidate_count = candidates.len() as u32;

    let outcome = find_accounts(cfg, candidates, txs, script, script)?;
    log::info!(
        "found {} of {} accounts after {} batch key generations",
        outcome.accounts.len(),
        candidate_count,
        outcome.stats.generations
    );

    let accounts = update_account_states(cfg, outcome.accounts, txs, script, script);

    Ok(RecoveryReport {
        accounts,
        unresolved: outcome.unresolved,
        candidates: candidate_count,
        search: outcome.stats,
    })
}
