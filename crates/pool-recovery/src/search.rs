//! Initial state search: find the creation output of each candidate account.
//!
//! The search space is (batch key generation × block height × candidate).
//! For every point the candidate's account script is rebuilt and looked up
//! in the wallet's transactions. The walk stops as soon as the requested
//! number of accounts has been found.

use std::collections::BTreeMap;

use bitcoin::{Script, Transaction};

use crate::account::{Account, CandidateAccount};
use crate::error::Result;
use crate::recovery::RecoveryConfig;
use crate::script::{AccountScriptBuilder, BatchKeyEvolution, locate_output_script};

/// Counters describing how much of the search space was visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub generations: u32,
    pub heights: u64,
    pub scripts_built: u64,
    pub script_failures: u64,
}

/// Result of the initial state search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Accounts in the order they were matched.
    pub accounts: Vec<Account>,
    /// Candidates that were never matched, by ascending index.
    pub unresolved: Vec<CandidateAccount>,
    pub stats: SearchStats,
}

/// Search for the creation output of each candidate.
///
/// Candidates are visited in ascending derivation index. The only error is a
/// failure to step the initial batch key backwards, which happens before any
/// search work.
pub fn find_accounts(
    cfg: &RecoveryConfig,
    candidates: Vec<CandidateAccount>,
    txs: &[Transaction],
    scripts: &dyn AccountScriptBuilder,
    batch_keys: &dyn BatchKeyEvolution,
) -> Result<SearchOutcome> {
    let target = cfg.account_target as usize;
    let mut unresolved: BTreeMap<u32, CandidateAccount> =
        candidates.into_iter().map(|c| (c.index(), c)).collect();
    let mut accounts: Vec<Account> = Vec::with_capacity(target.min(unresolved.len()));
    let mut stats = SearchStats::default();

    if target == 0 || unresolved.is_empty() {
        return Ok(SearchOutcome {
            accounts,
            unresolved: unresolved.into_values().collect(),
            stats,
        });
    }

    // Step back once so the first generation below starts at the initial key.
    let mut batch_key = batch_keys.decrement(&cfg.initial_batch_key)?;

    'search: for generation in 0..cfg.generation_ceiling {
        batch_key = match batch_keys.increment(&batch_key) {
            Ok(key) => key,
            Err(e) => {
                log::warn!("stopping search at generation {generation}: {e}");
                break;
            }
        };
        stats.generations += 1;

        for height in cfg.first_block..cfg.last_block {
            stats.heights += 1;
            let mut matched: Vec<(u32, &Transaction, u32)> = Vec::new();

            for (index, candidate) in &unresolved {
                stats.scripts_built += 1;
                let script = match scripts.account_script(
                    height,
                    &candidate.trader_key.pubkey,
                    &cfg.auctioneer_key,
                    &batch_key,
                    &candidate.secret,
                ) {
                    Ok(script) => script,
                    Err(e) => {
                        stats.script_failures += 1;
                        log::debug!(
                            "unable to generate script: height={height} batch_key={batch_key} \
                             trader_key={}: {e}",
                            candidate.trader_key.pubkey
                        );
                        continue;
                    }
                };

                if let Some((tx, vout)) = appears_in_txs(&script, txs) {
                    matched.push((*index, tx, vout));
                    if accounts.len() + matched.len() == target {
                        break;
                    }
                }
            }

            for (index, tx, vout) in matched {
                if let Some(candidate) = unresolved.remove(&index) {
                    log::debug!(
                        "found account {index} with trader key {} at height {height}, \
                         generation {generation}",
                        candidate.trader_key.pubkey
                    );
                    accounts.push(candidate.into_account(height, batch_key, tx, vout));
                }
            }

            if accounts.len() >= target || unresolved.is_empty() {
                break 'search;
            }
        }
    }

    log::debug!(
        "search visited {} generations, {} heights, built {} scripts ({} failed)",
        stats.generations,
        stats.heights,
        stats.scripts_built,
        stats.script_failures
    );

    Ok(SearchOutcome {
        accounts,
        unresolved: unresolved.into_values().collect(),
        stats,
    })
}

/// Locate `script` in any of the transactions.
fn appears_in_txs<'a>(script: &Script, txs: &'a [Transaction]) -> Option<(&'a Transaction, u32)> {
    txs.iter()
        .find_map(|tx| locate_output_script(tx, script).map(|vout| (tx, vout)))
}
