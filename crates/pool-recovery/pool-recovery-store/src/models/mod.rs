pub mod account;
pub mod account_snapshot;

pub use account::{AccountRow, NewAccountRow};
pub use account_snapshot::{AccountSnapshotRow, NewAccountSnapshotRow};
