//! Command line flags, the optional JSON config file, and their merge.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use pool_recovery::{DEFAULT_ACCOUNT_KEY_WINDOW, DEFAULT_GENERATION_CEILING, Network};

use crate::error::AppError;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Network the accounts live on
    #[arg(long, help = "Network: mainnet, testnet or regtest (default mainnet)")]
    pub network: Option<Network>,

    #[arg(long, help = "Electrum server URL (defaults to a public server for the network)")]
    pub electrum_url: Option<String>,

    #[arg(long, conflicts_with = "mnemonic", help = "Wallet extended private key")]
    pub xprv: Option<String>,

    #[arg(long, help = "Wallet BIP39 mnemonic")]
    pub mnemonic: Option<String>,

    #[arg(long, help = "Optional BIP39 passphrase for the mnemonic")]
    pub passphrase: Option<String>,

    #[arg(long, help = "Auctioneer public key in hex (required on regtest)")]
    pub auctioneer_key: Option<String>,

    #[arg(long, help = "Batch key at the first block, in hex")]
    pub initial_batch_key: Option<String>,

    #[arg(long, help = "Lowest account expiry height (defaults to the network's first block)")]
    pub first_block: Option<u32>,

    #[arg(long, help = "Highest account expiry height (defaults to current tip)")]
    pub last_block: Option<u32>,

    #[arg(long, help = "Number of account keys to derive and search for")]
    pub account_target: Option<u32>,

    #[arg(long, help = "Number of batch key generations to search")]
    pub generation_ceiling: Option<u32>,

    #[arg(long = "txid", help = "Wallet transaction id to fetch (repeatable)")]
    pub txids: Vec<String>,

    #[arg(long = "address", help = "Wallet address whose history to fetch (repeatable)")]
    pub addresses: Vec<String>,

    #[arg(long = "tx-file", help = "File of hex raw transactions, one per line (repeatable)")]
    pub tx_files: Vec<PathBuf>,

    #[arg(long, help = "SQLite database to store recovered accounts in")]
    pub db: Option<PathBuf>,

    #[arg(long, help = "JSON config file; command line flags take precedence")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Log at debug level")]
    pub verbose: bool,
}

/// Contents of a `--config` file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    pub network: Option<Network>,
    pub electrum_url: Option<String>,
    pub xprv: Option<String>,
    pub mnemonic: Option<String>,
    pub passphrase: Option<String>,
    pub auctioneer_key: Option<String>,
    pub initial_batch_key: Option<String>,
    pub first_block: Option<u32>,
    pub last_block: Option<u32>,
    pub account_target: Option<u32>,
    pub generation_ceiling: Option<u32>,
    #[serde(default)]
    pub txids: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub tx_files: Vec<PathBuf>,
    pub db: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AppError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Where the wallet's root key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Xprv(String),
    Mnemonic { phrase: String, passphrase: String },
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub network: Network,
    pub electrum_url: String,
    pub key_source: KeySource,
    pub auctioneer_key: Option<String>,
    pub initial_batch_key: String,
    pub first_block: u32,
    pub last_block: Option<u32>,
    pub account_target: u32,
    pub generation_ceiling: u32,
    pub txids: Vec<String>,
    pub addresses: Vec<String>,
    pub tx_files: Vec<PathBuf>,
    pub db: Option<PathBuf>,
}

impl Settings {
    /// Load the config file named by `--config`, if any, and merge it.
    pub fn from_cli(cli: Cli) -> Result<Self, AppError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Combine flags and file values; a flag always wins over the file.
    /// Repeatable flags replace the file's list when given at all.
    pub fn merge(cli: Cli, file: FileConfig) -> Result<Self, AppError> {
        let network = cli.network.or(file.network).unwrap_or(Network::Mainnet);

        let xprv = cli.xprv.or(file.xprv);
        let mnemonic = cli.mnemonic.or(file.mnemonic);
        let key_source = match (xprv, mnemonic) {
            (Some(_), Some(_)) => {
                return Err(AppError::Config(
                    "only one of xprv and mnemonic may be given".into(),
                ));
            }
            (Some(xprv), None) => KeySource::Xprv(xprv),
            (None, Some(phrase)) => KeySource::Mnemonic {
                phrase,
                passphrase: cli.passphrase.or(file.passphrase).unwrap_or_default(),
            },
            (None, None) => {
                return Err(AppError::Config("one of xprv or mnemonic is required".into()));
            }
        };

        let initial_batch_key = cli
            .initial_batch_key
            .or(file.initial_batch_key)
            .ok_or_else(|| AppError::Config("initial batch key is required".into()))?;

        let pick = |cli: Vec<String>, file: Vec<String>| if cli.is_empty() { file } else { cli };

        Ok(Settings {
            network,
            electrum_url: cli
                .electrum_url
                .or(file.electrum_url)
                .unwrap_or_else(|| network.default_electrum_url().to_string()),
            key_source,
            auctioneer_key: cli.auctioneer_key.or(file.auctioneer_key),
            initial_batch_key,
            first_block: cli
                .first_block
                .or(file.first_block)
                .unwrap_or_else(|| network.first_block()),
            last_block: cli.last_block.or(file.last_block),
            account_target: cli
                .account_target
                .or(file.account_target)
                .unwrap_or(DEFAULT_ACCOUNT_KEY_WINDOW),
            generation_ceiling: cli
                .generation_ceiling
                .or(file.generation_ceiling)
                .unwrap_or(DEFAULT_GENERATION_CEILING),
            txids: pick(cli.txids, file.txids),
            addresses: pick(cli.addresses, file.addresses),
            tx_files: if cli.tx_files.is_empty() {
                file.tx_files
            } else {
                cli.tx_files
            },
            db: cli.db.or(file.db),
        })
    }

    /// Whether any transactions must be fetched from Electrum.
    pub fn needs_electrum(&self) -> bool {
        !self.txids.is_empty() || !self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH_KEY: &str = "02824d0cbac65e01712124c50ff2cc74ce22851d7b444c1bf2ae66afefb8eaf27f";

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["pool-recover"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn file(json: &str) -> FileConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn defaults_follow_network() {
        let s = Settings::merge(
            cli(&["--xprv", "xprv1", "--initial-batch-key", BATCH_KEY, "--network", "testnet"]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(s.network, Network::Testnet);
        assert_eq!(s.first_block, 1_834_898);
        assert_eq!(s.electrum_url, Network::Testnet.default_electrum_url());
        assert_eq!(s.account_target, 500);
        assert_eq!(s.generation_ceiling, 5000);
        assert_eq!(s.last_block, None);
        assert_eq!(s.key_source, KeySource::Xprv("xprv1".into()));
    }

    #[test]
    fn flags_override_file() {
        let f = file(
            r#"{
                "network": "regtest",
                "mnemonic": "from file",
                "initialBatchKey": "filekey",
                "firstBlock": 10,
                "lastBlock": 20,
                "accountTarget": 3,
                "txids": ["aa", "bb"],
                "addresses": ["addr1"]
            }"#,
        );
        let s = Settings::merge(
            cli(&["--first-block", "15", "--txid", "cc", "--initial-batch-key", BATCH_KEY]),
            f,
        )
        .unwrap();

        assert_eq!(s.network, Network::Regtest);
        assert_eq!(s.initial_batch_key, BATCH_KEY);
        assert_eq!(s.first_block, 15);
        assert_eq!(s.last_block, Some(20));
        assert_eq!(s.account_target, 3);
        assert_eq!(s.txids, vec!["cc".to_string()]);
        assert_eq!(s.addresses, vec!["addr1".to_string()]);
        assert_eq!(
            s.key_source,
            KeySource::Mnemonic {
                phrase: "from file".into(),
                passphrase: String::new(),
            }
        );
        assert!(s.needs_electrum());
    }

    #[test]
    fn key_source_is_required_and_exclusive() {
        let missing = Settings::merge(
            cli(&["--initial-batch-key", BATCH_KEY]),
            FileConfig::default(),
        );
        assert!(matches!(missing, Err(AppError::Config(_))));

        let both = Settings::merge(
            cli(&["--xprv", "x", "--initial-batch-key", BATCH_KEY]),
            file(r#"{ "mnemonic": "m" }"#),
        );
        assert!(matches!(both, Err(AppError::Config(_))));
    }

    #[test]
    fn initial_batch_key_is_required() {
        let err = Settings::merge(cli(&["--xprv", "x"]), FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("initial batch key"));
    }

    #[test]
    fn conflicting_flags_are_rejected_by_parser() {
        assert!(
            Cli::try_parse_from(["pool-recover", "--xprv", "x", "--mnemonic", "m"]).is_err()
        );
    }

    #[test]
    fn passphrase_flag_applies_to_mnemonic_from_file() {
        let s = Settings::merge(
            cli(&["--passphrase", "pw", "--initial-batch-key", BATCH_KEY]),
            file(r#"{ "mnemonic": "words", "passphrase": "ignored" }"#),
        )
        .unwrap();
        assert_eq!(
            s.key_source,
            KeySource::Mnemonic {
                phrase: "words".into(),
                passphrase: "pw".into(),
            }
        );
    }

    #[test]
    fn unknown_file_fields_are_rejected() {
        assert!(serde_json::from_str::<FileConfig>(r#"{ "netwrok": "mainnet" }"#).is_err());
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recover.json");
        std::fs::write(&path, r#"{ "xprv": "fromfile", "initialBatchKey": "k" }"#).unwrap();

        let args = cli(&["--config", path.to_str().unwrap()]);
        let s = Settings::from_cli(args).unwrap();
        assert_eq!(s.key_source, KeySource::Xprv("fromfile".into()));
        assert_eq!(s.initial_batch_key, "k");
        assert!(!s.needs_electrum());
    }
}
