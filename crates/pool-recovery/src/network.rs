use bitcoin::secp256k1::PublicKey;
use serde::Deserialize;

use crate::error::{Error, Result};

const MAINNET_AUCTIONEER_KEY: &str =
    "028e87bdd134238f8347f845d9ecc827b843d0d1e27cdcb46da704d916613f4fce";
const TESTNET_AUCTIONEER_KEY: &str =
    "025dea8f5c67fb3bdfffb3123d2b7045dc0a3c75e822fabb39eb357480e64c4a8a";

/// Network variants the auctioneer runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn into_bitcoin(self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }

    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// BIP32 coin type used in the wallet's key derivation path.
    pub fn coin_type(self) -> u32 {
        if self.is_mainnet() { 0 } else { 1 }
    }

    /// Hex-encoded auctioneer public key. Regtest auctioneers are local, so
    /// there is no well-known key.
    pub fn auctioneer_key_hex(self) -> Option<&'static str> {
        match self {
            Network::Mainnet => Some(MAINNET_AUCTIONEER_KEY),
            Network::Testnet => Some(TESTNET_AUCTIONEER_KEY),
            Network::Regtest => None,
        }
    }

    pub fn auctioneer_key(self) -> Option<Result<PublicKey>> {
        self.auctioneer_key_hex().map(decode_public_key)
    }

    /// Height of the first block that can contain an account.
    pub fn first_block(self) -> u32 {
        match self {
            Network::Mainnet => 648_168,
            Network::Testnet => 1_834_898,
            Network::Regtest => 0,
        }
    }

    pub fn default_electrum_url(self) -> &'static str {
        match self {
            Network::Mainnet => "ssl://electrum.blockstream.info:50002",
            Network::Testnet => "ssl://electrum.blockstream.info:60002",
            Network::Regtest => "tcp://localhost:50001",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "bitcoin" => Ok(Network::Mainnet),
            "testnet" | "testnet3" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            _ => Err(format!("invalid network: {}", s)),
        }
    }
}

/// Parse a hex-encoded compressed secp256k1 public key.
pub fn decode_public_key(key: &str) -> Result<PublicKey> {
    let bytes = hex::decode(key).map_err(|e| Error::InvalidKey(format!("bad hex: {e}")))?;
    PublicKey::from_slice(&bytes).map_err(|e| Error::InvalidKey(e.to_string()))
}
