//! # Contract Program Records
//!
//! Serde model of the payload handed over by the contract data source: a map
//! of program paths, each carrying an ordered list of transaction records
//! that are alternative signings of the transactions belonging to that path.
//!
//! The schema is dictated by the upstream source and treated as an opaque
//! input contract here. Display-only fields (labels, colors, per-output
//! annotations) and the per-path continuation/metadata maps are carried
//! through unmodified; the graph engine never interprets them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full contract payload from the data source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractData {
    /// Program paths keyed by path name
    pub program: BTreeMap<String, ProgramPath>,
}

/// One program path: the alternative signings of the transactions that spend
/// a single coin along this path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramPath {
    /// Key of the outpoint this path continues from; used to key the
    /// continuation and metadata passthrough maps. Falls back to the path
    /// name when absent.
    #[serde(default)]
    pub out: Option<String>,

    /// Ordered transaction records of this path
    #[serde(default)]
    pub txs: Vec<TransactionRecord>,

    /// Continuation APIs, passed through unmodified
    #[serde(default)]
    pub continue_apis: serde_json::Value,

    /// Object metadata, passed through unmodified
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One raw transaction record: a partially-signed artifact plus the
/// finalized transaction it completes to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Base64-encoded PSBT (the signing artifact for this variant)
    pub psbt: String,

    /// Consensus-encoded finalized transaction, hex
    pub hex: String,

    /// Display metadata (label, color); not interpreted
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Per-output display metadata; not interpreted
    #[serde(default)]
    pub output_metadata: serde_json::Value,
}

impl ContractData {
    /// Parse a contract payload from a JSON document
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Total number of transaction records across all paths
    pub fn record_count(&self) -> usize {
        self.program.values().map(|p| p.txs.len()).sum()
    }
}
