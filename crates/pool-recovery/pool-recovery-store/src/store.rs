use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use pool_recovery::Account;
use pool_recovery::bitcoin::secp256k1::PublicKey;
use pool_recovery::bitcoin::{Amount, OutPoint};

use crate::conversions::{new_account_row, new_snapshot_row};
use crate::error::StoreError;
use crate::models::{AccountRow, AccountSnapshotRow};
use crate::schema::{account_snapshots, accounts};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// SQL expression for SQLite's `datetime('now')`.
const DATETIME_NOW: &str = "datetime('now')";

/// One recorded state of an account's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub index: u32,
    pub batch_key: PublicKey,
    pub expiry: u32,
    pub value: Amount,
    pub outpoint: OutPoint,
    pub created_at: String,
}

/// Persistent store for recovered accounts.
///
/// All methods take `&mut self` because Diesel's `SqliteConnection` requires
/// `&mut` for all operations, including reads.
pub struct AccountStore {
    conn: SqliteConnection,
}

impl AccountStore {
    /// Open (or create) a store at the given file path. Runs migrations automatically.
    pub fn open(path: &str) -> crate::Result<Self> {
        let mut conn = SqliteConnection::establish(path)?;
        diesel::sql_query("PRAGMA foreign_keys = ON").execute(&mut conn)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(AccountStore { conn })
    }

    /// Open an in-memory store for tests.
    pub fn open_in_memory() -> crate::Result<Self> {
        Self::open(":memory:")
    }

    /// Insert or update an account, keyed by its trader key index, and record
    /// its current output as a snapshot. Saving the same state twice records
    /// a single snapshot.
    ///
    /// An account whose trader key, key family, auctioneer key or secret
    /// differs from the row already stored at its index is rejected with
    /// [`StoreError::InvalidData`].
    pub fn save_account(&mut self, account: &Account) -> crate::Result<()> {
        self.conn
            .transaction(|conn| save_account_inner(conn, account))
    }

    /// Save several accounts atomically.
    pub fn save_accounts(&mut self, accounts: &[Account]) -> crate::Result<()> {
        self.conn.transaction(|conn| {
            for account in accounts {
                save_account_inner(conn, account)?;
            }
            Ok(())
        })
    }

    pub fn get_account(&mut self, index: u32) -> crate::Result<Option<Account>> {
        let row: Option<AccountRow> = accounts::table
            .filter(accounts::trader_key_index.eq(index as i32))
            .select(AccountRow::as_select())
            .first(&mut self.conn)
            .optional()?;

        row.as_ref().map(Account::try_from).transpose()
    }

    /// All stored accounts by ascending trader key index.
    pub fn list_accounts(&mut self) -> crate::Result<Vec<Account>> {
        let rows: Vec<AccountRow> = accounts::table
            .order(accounts::trader_key_index.asc())
            .select(AccountRow::as_select())
            .load(&mut self.conn)?;

        rows.iter().map(Account::try_from).collect()
    }

    /// Snapshots of one account in the order they were recorded.
    pub fn snapshots(&mut self, index: u32) -> crate::Result<Vec<AccountSnapshot>> {
        let rows: Vec<AccountSnapshotRow> = account_snapshots::table
            .filter(account_snapshots::trader_key_index.eq(index as i32))
            .order(account_snapshots::id.asc())
            .select(AccountSnapshotRow::as_select())
            .load(&mut self.conn)?;

        rows.iter().map(AccountSnapshot::try_from).collect()
    }
}

fn save_account_inner(conn: &mut SqliteConnection, account: &Account) -> crate::Result<()> {
    let row = new_account_row(account);

    let stored: Option<(i32, Vec<u8>, Vec<u8>, Vec<u8>)> = accounts::table
        .filter(accounts::trader_key_index.eq(row.trader_key_index))
        .select((
            accounts::trader_key_family,
            accounts::trader_key,
            accounts::auctioneer_key,
            accounts::secret,
        ))
        .first(conn)
        .optional()?;

    if let Some((family, trader_key, auctioneer_key, secret)) = stored {
        if family != row.trader_key_family
            || trader_key != row.trader_key
            || auctioneer_key != row.auctioneer_key
            || secret != row.secret
        {
            return Err(StoreError::InvalidData(format!(
                "account {} is already stored with a different identity",
                row.trader_key_index
            )));
        }
    }

    diesel::insert_into(accounts::table)
        .values(&row)
        .on_conflict(accounts::trader_key_index)
        .do_update()
        .set((
            accounts::batch_key.eq(row.batch_key.clone()),
            accounts::expiry.eq(row.expiry),
            accounts::value.eq(row.value),
            accounts::outpoint_txid.eq(row.outpoint_txid.clone()),
            accounts::outpoint_vout.eq(row.outpoint_vout),
            accounts::latest_tx.eq(row.latest_tx.clone()),
            accounts::state.eq(row.state),
            accounts::updated_at
                .eq(diesel::dsl::sql::<diesel::sql_types::Text>(DATETIME_NOW)),
        ))
        .execute(conn)?;

    diesel::insert_or_ignore_into(account_snapshots::table)
        .values(&new_snapshot_row(account))
        .execute(conn)?;

    Ok(())
}

