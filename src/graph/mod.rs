//! # Contract Graph
//!
//! The transaction DAG of one loaded contract and the analyses over it.
//!
//! ## Components
//!
//! - [`node`]: canonical transaction nodes and their signature variants
//! - [`utxo`]: one output node per transaction output
//! - [`index`]: txid/wtxid and outpoint-spender lookup structures
//! - [`builder`]: record grouping, placeholder synthesis, output linking
//! - [`timing`]: timelock extraction and horizon reachability queries

pub mod builder;
pub mod index;
pub mod node;
pub mod timing;
pub mod utxo;

pub use index::{SpendIndex, TxidIndex};
pub use node::{NodeId, SignatureVariant, SpendLink, TxNode};
pub use timing::{TimingCache, TimingData};
pub use utxo::{UtxoId, UtxoNode};
