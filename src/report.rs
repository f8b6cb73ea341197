use serde::Serialize;

use pool_recovery::{Account, AccountState, RecoveryReport, SearchStats};

/// JSON document printed after a recovery run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryOutput {
    pub network: String,
    pub generated_at: String,
    pub first_block: u32,
    pub last_block: u32,
    pub candidates: u32,
    pub accounts: Vec<AccountReport>,
    /// Indices of candidates that were never found on chain.
    pub unresolved: Vec<u32>,
    pub search: SearchReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReport {
    pub index: u32,
    pub trader_key: String,
    pub auctioneer_key: String,
    pub batch_key: String,
    pub expiry: u32,
    pub value_sat: u64,
    pub outpoint: String,
    pub latest_txid: String,
    pub state: String,
}

impl From<&Account> for AccountReport {
    fn from(acc: &Account) -> Self {
        AccountReport {
            index: acc.index(),
            trader_key: hex::encode(acc.trader_key.pubkey.serialize()),
            auctioneer_key: hex::encode(acc.auctioneer_key.serialize()),
            batch_key: hex::encode(acc.batch_key.serialize()),
            expiry: acc.expiry,
            value_sat: acc.value.to_sat(),
            outpoint: acc.outpoint.to_string(),
            latest_txid: acc.latest_tx.compute_txid().to_string(),
            state: state_label(acc.state).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub generations: u32,
    pub heights: u64,
    pub scripts_built: u64,
    pub script_failures: u64,
}

impl From<SearchStats> for SearchReport {
    fn from(stats: SearchStats) -> Self {
        SearchReport {
            generations: stats.generations,
            heights: stats.heights,
            scripts_built: stats.scripts_built,
            script_failures: stats.script_failures,
        }
    }
}

fn state_label(state: AccountState) -> &'static str {
    match state {
        AccountState::Candidate => "candidate",
        AccountState::Open => "open",
    }
}

impl RecoveryOutput {
    pub fn new(
        network: &str,
        first_block: u32,
        last_block: u32,
        report: &RecoveryReport,
    ) -> Self {
        RecoveryOutput {
            network: network.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            first_block,
            last_block,
            candidates: report.candidates,
            accounts: report.accounts.iter().map(AccountReport::from).collect(),
            unresolved: report.unresolved.iter().map(|c| c.index()).collect(),
            search: report.search.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_recovery::bitcoin::ScriptBuf;
    use pool_recovery::testing::{test_batch_key, test_candidates, tx_with_outputs};

    #[test]
    fn account_report_is_camel_case_hex() {
        let tx = tx_with_outputs(vec![(21_000, ScriptBuf::new())]);
        let acc = test_candidates(1)
            .remove(0)
            .into_account(150, test_batch_key(), &tx, 0);

        let json = serde_json::to_value(AccountReport::from(&acc)).unwrap();
        assert_eq!(json["index"], 0);
        assert_eq!(json["valueSat"], 21_000);
        assert_eq!(json["expiry"], 150);
        assert_eq!(json["state"], "open");
        assert_eq!(json["batchKey"], hex::encode(test_batch_key().serialize()));
        assert_eq!(json["outpoint"], format!("{}:0", tx.compute_txid()));
        assert!(json.get("secret").is_none());
    }

    #[test]
    fn output_lists_unresolved_indices() {
        let report = RecoveryReport {
            accounts: Vec::new(),
            unresolved: test_candidates(3),
            candidates: 3,
            search: SearchStats::default(),
        };
        let out = RecoveryOutput::new("regtest", 100, 200, &report);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["unresolved"], serde_json::json!([0, 1, 2]));
        assert_eq!(json["firstBlock"], 100);
        assert_eq!(json["search"]["scriptsBuilt"], 0);
    }
}
