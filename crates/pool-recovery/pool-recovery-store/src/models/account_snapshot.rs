use diesel::prelude::*;

use crate::schema::account_snapshots;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = account_snapshots)]
pub struct AccountSnapshotRow {
    pub id: i32,
    pub trader_key_index: i32,
    pub batch_key: Vec<u8>,
    pub expiry: i32,
    pub value: i64,
    pub outpoint_txid: Vec<u8>,
    pub outpoint_vout: i32,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = account_snapshots)]
pub struct NewAccountSnapshotRow {
    pub trader_key_index: i32,
    pub batch_key: Vec<u8>,
    pub expiry: i32,
    pub value: i64,
    pub outpoint_txid: Vec<u8>,
    pub outpoint_vout: i32,
}
