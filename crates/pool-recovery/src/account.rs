use bitcoin::secp256k1::PublicKey;
use bitcoin::{Amount, OutPoint, Transaction};

/// Key family the wallet uses for trader account keys.
pub const ACCOUNT_KEY_FAMILY: u32 = 220;

/// Number of account keys derived and checked on recovery. This is the
/// absolute maximum number of accounts that can be restored in one run.
pub const DEFAULT_ACCOUNT_KEY_WINDOW: u32 = 500;

/// Upper bound on the number of batch key generations searched.
pub const DEFAULT_GENERATION_CEILING: u32 = 5000;

/// Position of a key inside the wallet's key tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyLocator {
    pub family: u32,
    pub index: u32,
}

impl KeyLocator {
    pub fn account(index: u32) -> Self {
        Self {
            family: ACCOUNT_KEY_FAMILY,
            index,
        }
    }
}

/// A derived public key together with the locator it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub locator: KeyLocator,
    pub pubkey: PublicKey,
}

/// Recovery-relevant account lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountState {
    /// Derived from a key index, not yet seen on chain.
    Candidate,
    /// Creation output found; the account is live.
    Open,
}

/// A hypothesized account: everything that can be derived without the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAccount {
    pub trader_key: KeyDescriptor,
    pub auctioneer_key: PublicKey,
    pub secret: [u8; 32],
}

impl CandidateAccount {
    pub fn index(&self) -> u32 {
        self.trader_key.locator.index
    }

    pub fn state(&self) -> AccountState {
        AccountState::Candidate
    }

    /// Promote the candidate once its creation output has been located.
    pub fn into_account(
        self,
        expiry: u32,
        batch_key: PublicKey,
        tx: &Transaction,
        vout: u32,
    ) -> Account {
        let value = tx.output[vout as usize].value;
        Account {
            trader_key: self.trader_key,
            auctioneer_key: self.auctioneer_key,
            secret: self.secret,
            batch_key,
            expiry,
            value,
            outpoint: OutPoint::new(tx.compute_txid(), vout),
            latest_tx: tx.clone(),
            state: AccountState::Open,
        }
    }
}

/// A recovered account snapshot. Every field is populated; later states are
/// produced as new snapshots rather than by mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub trader_key: KeyDescriptor,
    pub auctioneer_key: PublicKey,
    pub secret: [u8; 32],
    /// Batch key in effect for the current output.
    pub batch_key: PublicKey,
    /// Block height encoded in the current output's script.
    pub expiry: u32,
    pub value: Amount,
    pub outpoint: OutPoint,
    /// The transaction that created `outpoint`.
    pub latest_tx: Transaction,
    pub state: AccountState,
}

impl Account {
    pub fn index(&self) -> u32 {
        self.trader_key.locator.index
    }

    /// Produce the snapshot that follows this one after `tx` re-created the
    /// account at output `vout`.
    pub fn advance(
        &self,
        batch_key: PublicKey,
        expiry: u32,
        tx: &Transaction,
        vout: u32,
    ) -> Account {
        Account {
            batch_key,
            expiry,
            value: tx.output[vout as usize].value,
            outpoint: OutPoint::new(tx.compute_txid(), vout),
            latest_tx: tx.clone(),
            ..self.clone()
        }
    }
}
