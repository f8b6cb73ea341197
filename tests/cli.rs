use std::path::PathBuf;

use pool_recovery::bitcoin::bip32::Xpriv;
use pool_recovery::bitcoin::consensus::encode::serialize_hex;
use pool_recovery::testing::{account_tx, test_auctioneer_key, test_batch_key};
use pool_recovery::{Network, PoolAccountScript, SeedKeyRing, generate_candidates};
use pool_recovery_store::AccountStore;

use pool_recover_lib::{KeySource, Settings, run};

const SEED: [u8; 32] = [0x33; 32];

fn settings(xprv: String, tx_file: PathBuf, db: Option<PathBuf>) -> Settings {
    Settings {
        network: Network::Regtest,
        electrum_url: "tcp://127.0.0.1:1".into(),
        key_source: KeySource::Xprv(xprv),
        auctioneer_key: Some(hex::encode(test_auctioneer_key().serialize())),
        initial_batch_key: hex::encode(test_batch_key().serialize()),
        first_block: 100,
        last_block: Some(200),
        account_target: 2,
        generation_ceiling: 2,
        txids: Vec::new(),
        addresses: Vec::new(),
        tx_files: vec![tx_file],
        db,
    }
}

#[test]
fn recovers_from_tx_file_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let xprv = Xpriv::new_master(Network::Regtest.into_bitcoin(), &SEED)
        .unwrap()
        .to_string();

    let ring = SeedKeyRing::from_seed(&SEED, Network::Regtest).unwrap();
    let cands = generate_candidates(2, &ring, &ring, &test_auctioneer_key(), None).unwrap();
    let tx = account_tx(
        &PoolAccountScript::new(),
        &cands[0],
        150,
        &test_batch_key(),
        250_000,
    );

    let tx_file = dir.path().join("txs.hex");
    // The same transaction twice: duplicates are dropped before the search.
    std::fs::write(&tx_file, format!("{0}\n{0}\n", serialize_hex(&tx))).unwrap();
    let db = dir.path().join("accounts.db");

    let out = run(&settings(xprv, tx_file, Some(db.clone()))).unwrap();

    assert_eq!(out.network, "regtest");
    assert_eq!(out.candidates, 2);
    assert_eq!(out.accounts.len(), 1);
    assert_eq!(out.accounts[0].index, 0);
    assert_eq!(out.accounts[0].expiry, 150);
    assert_eq!(out.accounts[0].value_sat, 250_000);
    assert_eq!(out.unresolved, vec![1]);

    let mut store = AccountStore::open(db.to_str().unwrap()).unwrap();
    let stored = store.list_accounts().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].outpoint.txid, tx.compute_txid());
}

#[test]
fn missing_auctioneer_key_on_regtest_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let tx_file = dir.path().join("empty.hex");
    std::fs::write(&tx_file, "").unwrap();
    let xprv = Xpriv::new_master(Network::Regtest.into_bitcoin(), &SEED)
        .unwrap()
        .to_string();

    let mut s = settings(xprv, tx_file, None);
    s.auctioneer_key = None;
    let err = run(&s).unwrap_err();
    assert!(err.to_string().contains("auctioneer"));
}

#[test]
fn unreadable_tx_file_is_reported() {
    let xprv = Xpriv::new_master(Network::Regtest.into_bitcoin(), &SEED)
        .unwrap()
        .to_string();
    let err = run(&settings(xprv, PathBuf::from("/nonexistent/txs.hex"), None)).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/txs.hex"));
}
