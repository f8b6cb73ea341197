use std::collections::HashSet;
use std::str::FromStr;

use bitcoin::{Address, ScriptBuf, Transaction, Txid};

use crate::error::{Error, Result};
use crate::network::Network;

/// Supplies the wallet-relevant transactions searched during recovery.
pub trait TransactionSource {
    fn transactions(&self) -> Result<Vec<Transaction>>;
}

/// A fixed set of transactions, e.g. read from a file.
#[derive(Debug, Clone, Default)]
pub struct StaticTransactions {
    txs: Vec<Transaction>,
}

impl StaticTransactions {
    pub fn new(txs: Vec<Transaction>) -> Self {
        Self { txs }
    }

    /// Parse hex-encoded raw transactions, one per line. Blank lines and
    /// lines starting with `#` are ignored.
    pub fn from_hex_lines(input: &str) -> Result<Self> {
        let mut txs = Vec::new();
        for (lineno, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            txs.push(decode_transaction(line).map_err(|e| {
                Error::Query(format!("line {}: {e}", lineno + 1))
            })?);
        }
        Ok(Self { txs })
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

impl TransactionSource for StaticTransactions {
    fn transactions(&self) -> Result<Vec<Transaction>> {
        Ok(self.txs.clone())
    }
}

/// Decode a hex-encoded consensus-serialized transaction.
pub fn decode_transaction(raw: &str) -> Result<Transaction> {
    let bytes = hex::decode(raw).map_err(|e| Error::Query(format!("bad hex: {e}")))?;
    bitcoin::consensus::deserialize(&bytes)
        .map_err(|e| Error::Query(format!("bad transaction: {e}")))
}

/// Script pubkey of an address, checked against the expected network.
pub fn address_script(address: &str, network: Network) -> Result<ScriptBuf> {
    let addr = Address::from_str(address)
        .map_err(|e| Error::Query(format!("bad address {address}: {e}")))?
        .require_network(network.into_bitcoin())
        .map_err(|e| Error::Query(format!("address {address}: {e}")))?;
    Ok(addr.script_pubkey())
}

/// Drop repeated transactions, keeping the first occurrence of each txid.
pub fn dedup_transactions(txs: Vec<Transaction>) -> Vec<Transaction> {
    let mut seen = HashSet::new();
    txs.into_iter()
        .filter(|tx| seen.insert(tx.compute_txid()))
        .collect()
}

/// Electrum-based chain backend.
pub struct ElectrumBackend {
    electrum_url: String,
}

impl ElectrumBackend {
    pub fn new(electrum_url: &str) -> Self {
        Self {
            electrum_url: electrum_url.to_string(),
        }
    }

    pub fn electrum_url(&self) -> &str {
        &self.electrum_url
    }

    fn client(&self) -> Result<electrum_client::Client> {
        electrum_client::Client::new(&self.electrum_url).map_err(|e| Error::Electrum(e.to_string()))
    }

    /// Fetch transactions by txid, in the order given.
    pub fn fetch_transactions(&self, txids: &[Txid]) -> Result<Vec<Transaction>> {
        use electrum_client::ElectrumApi;

        if txids.is_empty() {
            return Ok(Vec::new());
        }
        self.client()?
            .batch_transaction_get(txids)
            .map_err(|e| Error::Electrum(e.to_string()))
    }

    /// Every transaction in the history of any of `scripts`, confirmed or not.
    pub fn script_history_transactions(&self, scripts: &[ScriptBuf]) -> Result<Vec<Transaction>> {
        use electrum_client::ElectrumApi;

        if scripts.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.client()?;
        let mut txids = Vec::new();
        for script in scripts {
            let history = client
                .script_get_history(script)
                .map_err(|e| Error::Electrum(e.to_string()))?;
            log::debug!("script {script} has {} history entries", history.len());
            txids.extend(history.into_iter().map(|entry| entry.tx_hash));
        }
        let mut seen = HashSet::new();
        txids.retain(|txid| seen.insert(*txid));

        client
            .batch_transaction_get(&txids)
            .map_err(|e| Error::Electrum(e.to_string()))
    }

    /// Height of the current chain tip.
    pub fn tip_height(&self) -> Result<u32> {
        use electrum_client::ElectrumApi;

        let header = self
            .client()?
            .block_headers_subscribe()
            .map_err(|e| Error::Electrum(e.to_string()))?;
        u32::try_from(header.height)
            .map_err(|_| Error::Query(format!("tip height {} out of range", header.height)))
    }

    /// A source pulling the given txids and script histories from this
    /// backend.
    pub fn source(&self, txids: Vec<Txid>, scripts: Vec<ScriptBuf>) -> ElectrumTransactions<'_> {
        ElectrumTransactions {
            backend: self,
            txids,
            scripts,
        }
    }
}

/// Transactions known to an Electrum server for a set of txids and scripts.
pub struct ElectrumTransactions<'a> {
    backend: &'a ElectrumBackend,
    txids: Vec<Txid>,
    scripts: Vec<ScriptBuf>,
}

impl TransactionSource for ElectrumTransactions<'_> {
    fn transactions(&self) -> Result<Vec<Transaction>> {
        let mut txs = self.backend.fetch_transactions(&self.txids)?;
        txs.extend(self.backend.script_history_transactions(&self.scripts)?);
        let txs = dedup_transactions(txs);
        log::info!("fetched {} transactions from {}", txs.len(), self.backend.electrum_url());
        Ok(txs)
    }
}
