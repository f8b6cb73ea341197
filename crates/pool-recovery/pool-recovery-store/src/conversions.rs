use pool_recovery::bitcoin::consensus::{deserialize, serialize};
use pool_recovery::bitcoin::hashes::Hash;
use pool_recovery::bitcoin::secp256k1::PublicKey;
use pool_recovery::bitcoin::{Amount, OutPoint, Transaction, Txid};
use pool_recovery::{Account, AccountState, KeyDescriptor, KeyLocator};

use crate::error::StoreError;
use crate::models::{AccountRow, AccountSnapshotRow, NewAccountRow, NewAccountSnapshotRow};
use crate::store::AccountSnapshot;

pub fn vec_to_array32(v: &[u8], field: &str) -> std::result::Result<[u8; 32], StoreError> {
    v.try_into().map_err(|_| {
        StoreError::InvalidData(format!("{field}: expected 32 bytes, got {}", v.len()))
    })
}

fn pubkey_from_vec(v: &[u8], field: &str) -> std::result::Result<PublicKey, StoreError> {
    PublicKey::from_slice(v).map_err(|e| StoreError::InvalidData(format!("{field}: {e}")))
}

fn u32_from_i32(v: i32, field: &str) -> std::result::Result<u32, StoreError> {
    u32::try_from(v).map_err(|_| StoreError::InvalidData(format!("{field}: negative value {v}")))
}

fn outpoint_from_row(txid: &[u8], vout: i32) -> std::result::Result<OutPoint, StoreError> {
    let txid = Txid::from_byte_array(vec_to_array32(txid, "outpoint_txid")?);
    Ok(OutPoint::new(txid, u32_from_i32(vout, "outpoint_vout")?))
}

pub fn state_to_i32(state: AccountState) -> i32 {
    match state {
        AccountState::Candidate => 0,
        AccountState::Open => 1,
    }
}

pub fn state_from_i32(v: i32) -> std::result::Result<AccountState, StoreError> {
    match v {
        0 => Ok(AccountState::Candidate),
        1 => Ok(AccountState::Open),
        other => Err(StoreError::InvalidData(format!(
            "invalid account state: {other}"
        ))),
    }
}

// --- Account -> rows ---

pub fn new_account_row(account: &Account) -> NewAccountRow {
    NewAccountRow {
        trader_key_index: account.trader_key.locator.index as i32,
        trader_key_family: account.trader_key.locator.family as i32,
        trader_key: account.trader_key.pubkey.serialize().to_vec(),
        auctioneer_key: account.auctioneer_key.serialize().to_vec(),
        secret: account.secret.to_vec(),
        batch_key: account.batch_key.serialize().to_vec(),
        expiry: account.expiry as i32,
        value: account.value.to_sat() as i64,
        outpoint_txid: account.outpoint.txid.to_byte_array().to_vec(),
        outpoint_vout: account.outpoint.vout as i32,
        latest_tx: serialize(&account.latest_tx),
        state: state_to_i32(account.state),
    }
}

pub fn new_snapshot_row(account: &Account) -> NewAccountSnapshotRow {
    NewAccountSnapshotRow {
        trader_key_index: account.trader_key.locator.index as i32,
        batch_key: account.batch_key.serialize().to_vec(),
        expiry: account.expiry as i32,
        value: account.value.to_sat() as i64,
        outpoint_txid: account.outpoint.txid.to_byte_array().to_vec(),
        outpoint_vout: account.outpoint.vout as i32,
    }
}

// --- rows -> Account ---

impl TryFrom<&AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: &AccountRow) -> std::result::Result<Self, Self::Error> {
        let latest_tx: Transaction = deserialize(&row.latest_tx)
            .map_err(|e| StoreError::InvalidData(format!("latest_tx: {e}")))?;
        let outpoint = outpoint_from_row(&row.outpoint_txid, row.outpoint_vout)?;
        if latest_tx.compute_txid() != outpoint.txid {
            return Err(StoreError::InvalidData(format!(
                "latest_tx does not match outpoint {outpoint}"
            )));
        }

        Ok(Account {
            trader_key: KeyDescriptor {
                locator: KeyLocator {
                    family: u32_from_i32(row.trader_key_family, "trader_key_family")?,
                    index: u32_from_i32(row.trader_key_index, "trader_key_index")?,
                },
                pubkey: pubkey_from_vec(&row.trader_key, "trader_key")?,
            },
            auctioneer_key: pubkey_from_vec(&row.auctioneer_key, "auctioneer_key")?,
            secret: vec_to_array32(&row.secret, "secret")?,
            batch_key: pubkey_from_vec(&row.batch_key, "batch_key")?,
            expiry: u32_from_i32(row.expiry, "expiry")?,
            value: Amount::from_sat(row.value as u64),
            outpoint,
            latest_tx,
            state: state_from_i32(row.state)?,
        })
    }
}

impl TryFrom<&AccountSnapshotRow> for AccountSnapshot {
    type Error = StoreError;

    fn try_from(row: &AccountSnapshotRow) -> std::result::Result<Self, Self::Error> {
        Ok(AccountSnapshot {
            index: u32_from_i32(row.trader_key_index, "trader_key_index")?,
            batch_key: pubkey_from_vec(&row.batch_key, "batch_key")?,
            expiry: u32_from_i32(row.expiry, "expiry")?,
            value: Amount::from_sat(row.value as u64),
            outpoint: outpoint_from_row(&row.outpoint_txid, row.outpoint_vout)?,
            created_at: row.created_at.clone(),
        })
    }
}
