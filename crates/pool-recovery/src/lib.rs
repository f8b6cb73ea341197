pub use bitcoin;

pub mod account;
pub mod cancel;
pub mod candidates;
pub mod chain;
pub mod error;
pub mod keychain;
pub mod network;
pub mod recovery;
pub mod replay;
pub mod script;
pub mod search;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Core types
pub use account::{
    ACCOUNT_KEY_FAMILY, Account, AccountState, CandidateAccount, DEFAULT_ACCOUNT_KEY_WINDOW,
    DEFAULT_GENERATION_CEILING, KeyDescriptor, KeyLocator,
};
pub use cancel::CancellationToken;
pub use error::{Error, Result};
pub use network::{Network, decode_public_key};

// Collaborator seams and their implementations
pub use chain::{
    ElectrumBackend, ElectrumTransactions, StaticTransactions, TransactionSource,
    address_script, decode_transaction, dedup_transactions,
};
pub use keychain::{KEY_PURPOSE, KeyDerivation, SeedKeyRing, SharedSecretDerivation};
pub use script::{
    AccountScriptBuilder, BatchKeyEvolution, PoolAccountScript, locate_output_script,
    spends_outpoint,
};

// Recovery pipeline
pub use candidates::generate_candidates;
pub use recovery::{RecoveryConfig, RecoveryReport, recover_accounts};
pub use replay::{find_account_update, replay_account, update_account_states};
pub use search::{SearchOutcome, SearchStats, find_accounts};
