pub mod config;
mod error;
pub mod report;

use std::str::FromStr;

use pool_recovery::bitcoin::{ScriptBuf, Transaction, Txid};
use pool_recovery::{
    ElectrumBackend, PoolAccountScript, RecoveryConfig, SeedKeyRing, StaticTransactions,
    TransactionSource, address_script, decode_public_key, dedup_transactions, recover_accounts,
};
use pool_recovery_store::AccountStore;

pub use config::{Cli, FileConfig, KeySource, Settings};
pub use error::AppError;
pub use report::{AccountReport, RecoveryOutput, SearchReport};

/// Resolve settings, gather transactions, recover accounts and optionally
/// persist them.
pub fn run(settings: &Settings) -> Result<RecoveryOutput, AppError> {
    let network = settings.network;
    let backend = ElectrumBackend::new(&settings.electrum_url);

    let auctioneer_key = match &settings.auctioneer_key {
        Some(hex) => decode_public_key(hex)?,
        None => network.auctioneer_key().ok_or_else(|| {
            AppError::Config(format!(
                "no well-known auctioneer key on {}, pass --auctioneer-key",
                network.as_str()
            ))
        })??,
    };
    let initial_batch_key = decode_public_key(&settings.initial_batch_key)?;

    let last_block = match settings.last_block {
        Some(height) => height,
        None => {
            let tip = backend.tip_height()?;
            log::info!("using chain tip {tip} as last block");
            tip
        }
    };

    let wallet = match &settings.key_source {
        KeySource::Xprv(xprv) => SeedKeyRing::from_xpriv_str(xprv, network)?,
        KeySource::Mnemonic { phrase, passphrase } => {
            SeedKeyRing::from_mnemonic(phrase, passphrase, network)?
        }
    };

    let txs = load_transactions(settings, &backend)?;

    let cfg = RecoveryConfig {
        account_target: settings.account_target,
        first_block: settings.first_block,
        last_block,
        generation_ceiling: settings.generation_ceiling,
        initial_batch_key,
        auctioneer_key,
    };
    let report = recover_accounts(&cfg, &txs, &wallet, &PoolAccountScript::new(), None)?;

    if let Some(path) = &settings.db {
        let mut store = AccountStore::open(&path.to_string_lossy())?;
        store.save_accounts(&report.accounts)?;
        log::info!(
            "saved {} accounts to {}",
            report.accounts.len(),
            path.display()
        );
    }

    Ok(RecoveryOutput::new(
        network.as_str(),
        cfg.first_block,
        cfg.last_block,
        &report,
    ))
}

/// Transactions from every configured source, without duplicates.
pub fn load_transactions(
    settings: &Settings,
    backend: &ElectrumBackend,
) -> Result<Vec<Transaction>, AppError> {
    let mut txs = Vec::new();

    for path in &settings.tx_files {
        let raw = std::fs::read_to_string(path).map_err(|source| AppError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file = StaticTransactions::from_hex_lines(&raw)?;
        log::debug!("read {} transactions from {}", file.len(), path.display());
        txs.extend(file.transactions()?);
    }

    if settings.needs_electrum() {
        let txids = settings
            .txids
            .iter()
            .map(|s| Txid::from_str(s).map_err(|e| AppError::Config(format!("bad txid {s}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        let scripts = settings
            .addresses
            .iter()
            .map(|a| address_script(a, settings.network))
            .collect::<Result<Vec<ScriptBuf>, _>>()?;
        txs.extend(backend.source(txids, scripts).transactions()?);
    }

    Ok(dedup_transactions(txs))
}
