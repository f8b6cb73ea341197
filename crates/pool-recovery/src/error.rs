use bitcoin::Txid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key derivation failed for index {index}: {reason}")]
    KeyDerivation { index: u32, reason: String },

    #[error("shared key derivation failed for index {index}: {reason}")]
    SharedSecret { index: u32, reason: String },

    #[error("recovery cancelled before the search started")]
    Cancelled,

    #[error("invalid recovery config: {0}")]
    Config(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("batch key step failed: {0}")]
    BatchKey(String),

    #[error("account script construction failed: {0}")]
    Script(String),

    #[error("account update not found in transaction {0}")]
    UpdateNotFound(Txid),

    #[error("keyring error: {0}")]
    KeyRing(String),

    #[error("electrum error: {0}")]
    Electrum(String),

    #[error("query error: {0}")]
    Query(String),
}

impl Error {
    /// Whether this error aborts a recovery run, as opposed to being skipped
    /// for a single candidate or account.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Error::KeyDerivation { .. }
                | Error::SharedSecret { .. }
                | Error::Cancelled
                | Error::Config(_)
                | Error::InvalidKey(_)
                | Error::BatchKey(_)
                | Error::KeyRing(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
