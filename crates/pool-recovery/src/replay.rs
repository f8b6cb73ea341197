//! Forward replay: walk recovered accounts from creation to their latest state.
//!
//! Every batch that touches an account spends its current output and
//! re-creates it under the next batch key, possibly with a new expiry. We
//! follow those spends through the wallet's transactions until the account
//! output is unspent.

use bitcoin::Transaction;
use bitcoin::secp256k1::PublicKey;

use crate::account::Account;
use crate::error::{Error, Result};
use crate::recovery::RecoveryConfig;
use crate::script::{
    AccountScriptBuilder, BatchKeyEvolution, locate_output_script, spends_outpoint,
};

/// Bring every account up to its most recent observable state.
///
/// Accounts are processed independently; an unresolvable update freezes only
/// the affected account at its last good snapshot.
pub fn update_account_states(
    cfg: &RecoveryConfig,
    accounts: Vec<Account>,
    txs: &[Transaction],
    scripts: &dyn AccountScriptBuilder,
    batch_keys: &dyn BatchKeyEvolution,
) -> Vec<Account> {
    accounts
        .into_iter()
        .map(|acc| replay_account(cfg, acc, txs, scripts, batch_keys))
        .collect()
}

/// Follow a single account through the spends of its outputs.
pub fn replay_account(
    cfg: &RecoveryConfig,
    account: Account,
    txs: &[Transaction],
    scripts: &dyn AccountScriptBuilder,
    batch_keys: &dyn BatchKeyEvolution,
) -> Account {
    log::debug!(
        "updating state for account with trader key {}",
        account.trader_key.pubkey
    );

    let mut current = account;
    // Each step moves to a transaction spending the previous one, so no
    // transaction can be visited twice.
    for _ in 0..txs.len() {
        let Some(spend) = txs.iter().find(|tx| spends_outpoint(tx, &current.outpoint)) else {
            break;
        };
        match find_account_update(cfg, &current, spend, scripts, batch_keys) {
            Ok(next) => current = next,
            Err(e) => {
                log::debug!("unable to find account update: {e}");
                break;
            }
        }
    }

    log::debug!(
        "latest state for account {}: value={} expiry={} outpoint={}",
        current.trader_key.pubkey,
        current.value,
        current.expiry,
        current.outpoint
    );
    current
}

/// Find the account output re-created by `tx`, which spends the account's
/// current outpoint.
///
/// The batch key always advances by one generation. The unchanged expiry is
/// tried first; if the update renewed the account, every height in
/// `[first_block, last_block]` is tried.
pub fn find_account_update(
    cfg: &RecoveryConfig,
    account: &Account,
    tx: &Transaction,
    scripts: &dyn AccountScriptBuilder,
    batch_keys: &dyn BatchKeyEvolution,
) -> Result<Account> {
    let batch_key = batch_keys.increment(&account.batch_key)?;

    if let Some(vout) = match_script(account, &batch_key, account.expiry, tx, scripts) {
        return Ok(account.advance(batch_key, account.expiry, tx, vout));
    }

    for height in cfg.first_block..=cfg.last_block {
        if height == account.expiry {
            continue;
        }
        if let Some(vout) = match_script(account, &batch_key, height, tx, scripts) {
            return Ok(account.advance(batch_key, height, tx, vout));
        }
    }

    Err(Error::UpdateNotFound(tx.compute_txid()))
}

fn match_script(
    account: &Account,
    batch_key: &PublicKey,
    expiry: u32,
    tx: &Transaction,
    scripts: &dyn AccountScriptBuilder,
) -> Option<u32> {
    let script = match scripts.account_script(
        expiry,
        &account.trader_key.pubkey,
        &account.auctioneer_key,
        batch_key,
        &account.secret,
    ) {
        Ok(script) => script,
        Err(e) => {
            log::debug!("{e}");
            return None;
        }
    };
    locate_output_script(tx, &script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::PoolAccountScript;
    use crate::testing::{account_tx, test_batch_key, test_candidates, test_config, update_tx};
    use bitcoin::hashes::Hash;
    use bitcoin::{Amount, OutPoint, ScriptBuf, Txid};

    fn opened(protocol: &PoolAccountScript) -> (Account, Transaction) {
        let candidate = test_candidates(1).remove(0);
        let tx = account_tx(protocol, &candidate, 150, &test_batch_key(), 100_000);
        let acc = candidate.into_account(150, test_batch_key(), &tx, 0);
        (acc, tx)
    }

    #[test]
    fn unspent_account_is_a_fixed_point() {
        let protocol = PoolAccountScript::new();
        let (acc, creation) = opened(&protocol);
        let cfg = test_config(1);

        let once = replay_account(&cfg, acc.clone(), &[creation.clone()], &protocol, &protocol);
        assert_eq!(once, acc);
        let twice = replay_account(&cfg, once.clone(), &[creation], &protocol, &protocol);
        assert_eq!(twice, once);
    }

    #[test]
    fn follows_a_chain_of_updates() {
        let protocol = PoolAccountScript::new();
        let cfg = test_config(1);
        let (acc, creation) = opened(&protocol);

        let key1 = protocol.increment(&acc.batch_key).unwrap();
        let tx1 = update_tx(&protocol, &acc, 150, &key1, 90_000);
        let step1 = acc.advance(key1, 150, &tx1, 0);

        let key2 = protocol.increment(&key1).unwrap();
        let tx2 = update_tx(&protocol, &step1, 180, &key2, 80_000);

        // Order of the supplied transactions does not matter.
        let txs = vec![tx2.clone(), creation, tx1];
        let last = replay_account(&cfg, acc, &txs, &protocol, &protocol);

        assert_eq!(last.batch_key, key2);
        assert_eq!(last.expiry, 180);
        assert_eq!(last.value, Amount::from_sat(80_000));
        assert_eq!(last.outpoint, OutPoint::new(tx2.compute_txid(), 0));
        assert_eq!(last.latest_tx, tx2);
    }

    #[test]
    fn unmatched_spend_freezes_last_good_snapshot() {
        let protocol = PoolAccountScript::new();
        let cfg = test_config(1);
        let (acc, creation) = opened(&protocol);

        // Spends the account but pays somewhere unrelated (e.g. a close).
        let close = crate::testing::spending_tx(
            acc.outpoint,
            vec![(99_000, ScriptBuf::from_bytes(vec![0x00, 0x14, 0x01]))],
        );
        let result = find_account_update(&cfg, &acc, &close, &protocol, &protocol);
        assert!(matches!(result, Err(Error::UpdateNotFound(_))));

        let last = replay_account(&cfg, acc.clone(), &[creation, close], &protocol, &protocol);
        assert_eq!(last, acc);
    }

    #[test]
    fn renewal_outside_window_is_unresolved() {
        let protocol = PoolAccountScript::new();
        let cfg = test_config(1);
        let (acc, _) = opened(&protocol);
        let key1 = protocol.increment(&acc.batch_key).unwrap();
        let tx1 = update_tx(&protocol, &acc, cfg.last_block + 1, &key1, 90_000);

        let last = replay_account(&cfg, acc.clone(), &[tx1], &protocol, &protocol);
        assert_eq!(last, acc);
    }

    #[test]
    fn renewal_at_last_block_is_found() {
        let protocol = PoolAccountScript::new();
        let cfg = test_config(1);
        let (acc, _) = opened(&protocol);
        let key1 = protocol.increment(&acc.batch_key).unwrap();
        let tx1 = update_tx(&protocol, &acc, cfg.last_block, &key1, 90_000);

        let last = replay_account(&cfg, acc, &[tx1], &protocol, &protocol);
        assert_eq!(last.expiry, cfg.last_block);
    }

    #[test]
    fn accounts_are_independent() {
        let protocol = PoolAccountScript::new();
        let cfg = test_config(2);
        let mut candidates = test_candidates(2);
        let c1 = candidates.remove(1);
        let c0 = candidates.remove(0);

        let t0 = account_tx(&protocol, &c0, 110, &test_batch_key(), 1_000);
        let t1 = account_tx(&protocol, &c1, 120, &test_batch_key(), 2_000);
        let a0 = c0.into_account(110, test_batch_key(), &t0, 0);
        let a1 = c1.into_account(120, test_batch_key(), &t1, 0);

        // a0 is spent by something unrecognisable, a1 is updated normally.
        let broken = crate::testing::spending_tx(a0.outpoint, vec![(1, ScriptBuf::new())]);
        let key1 = protocol.increment(&a1.batch_key).unwrap();
        let good = update_tx(&protocol, &a1, 120, &key1, 1_500);

        let result = update_account_states(
            &cfg,
            vec![a0.clone(), a1],
            &[t0, t1, broken, good],
            &protocol,
            &protocol,
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], a0);
        assert_eq!(result[1].batch_key, key1);
        assert_eq!(result[1].value, Amount::from_sat(1_500));
    }

    #[test]
    fn spends_of_other_outpoints_are_ignored() {
        let protocol = PoolAccountScript::new();
        let cfg = test_config(1);
        let (acc, _) = opened(&protocol);
        let unrelated = crate::testing::spending_tx(
            OutPoint::new(Txid::all_zeros(), 0),
            vec![(1, ScriptBuf::new())],
        );
        let last = replay_account(&cfg, acc.clone(), &[unrelated], &protocol, &protocol);
        assert_eq!(last, acc);
    }
}
