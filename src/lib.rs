//! # Lattice: Pre-signed Bitcoin Contract Graph Engine
//!
//! Core library for exploring families of pre-signed Bitcoin transactions
//! that belong to one logical contract (a transaction template expanded into
//! concrete candidate transactions, e.g. a vault).
//!
//! The engine ingests raw transaction/witness records, reconstructs the
//! canonical transaction DAG (deduplicating signature variants, linking
//! outputs to their spenders, synthesizing placeholders for externally-funded
//! inputs) and answers timelock reachability queries: for a hypothetical
//! future time/height, which transactions of the contract can never become
//! valid.
//!
//! The engine performs no network I/O, no script validation and no signing;
//! confirmation data comes from the [`services`] collaborators and is fed in
//! as plain txid sets.

pub mod config;
pub mod contract;
pub mod error;
pub mod graph;
pub mod program;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use contract::ContractModel;
pub use error::{GraphError, GraphResult, ServiceError, ServiceResult};
pub use graph::{NodeId, SignatureVariant, SpendLink, TimingData, TxNode, UtxoId, UtxoNode};
pub use program::ContractData;
pub use services::NodeClient;
