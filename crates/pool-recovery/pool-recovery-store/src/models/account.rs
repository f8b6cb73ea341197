use diesel::prelude::*;

use crate::schema::accounts;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = accounts)]
pub struct AccountRow {
    pub trader_key_index: i32,
    pub trader_key_family: i32,
    pub trader_key: Vec<u8>,
    pub auctioneer_key: Vec<u8>,
    pub secret: Vec<u8>,
    pub batch_key: Vec<u8>,
    pub expiry: i32,
    pub value: i64,
    pub outpoint_txid: Vec<u8>,
    pub outpoint_vout: i32,
    pub latest_tx: Vec<u8>,
    pub state: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = accounts)]
pub struct NewAccountRow {
    pub trader_key_index: i32,
    pub trader_key_family: i32,
    pub trader_key: Vec<u8>,
    pub auctioneer_key: Vec<u8>,
    pub secret: Vec<u8>,
    pub batch_key: Vec<u8>,
    pub expiry: i32,
    pub value: i64,
    pub outpoint_txid: Vec<u8>,
    pub outpoint_vout: i32,
    pub latest_tx: Vec<u8>,
    pub state: i32,
}
