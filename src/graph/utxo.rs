//! # Output Nodes
//!
//! A [`UtxoNode`] is one output of one transaction node. Every transaction
//! node materializes exactly one output node per output of its body; only
//! placeholder-owned outputs that nobody spends are kept out of the
//! contract's visible output list.

use bitcoin::{Amount, OutPoint, ScriptBuf};

use super::node::{NodeId, SpendLink};

/// Stable handle to an output node within one loaded contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtxoId(pub(crate) usize);

impl UtxoId {
    /// Position of the output node in the contract's output arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// One output of one transaction node
#[derive(Debug, Clone)]
pub struct UtxoNode {
    pub(crate) id: UtxoId,
    pub(crate) owner: NodeId,
    pub(crate) outpoint: OutPoint,
    /// Output value. Mutable only for placeholder-owned outputs, which get a
    /// speculative value inferred from their spenders during linking.
    pub(crate) value: Amount,
    /// Output script. Same mutability rule as `value`.
    pub(crate) script_pubkey: ScriptBuf,
    /// Transactions spending this output, in spend-index order. More than
    /// one entry means alternative pre-signed spends of the same coin.
    pub(crate) spenders: Vec<NodeId>,
    /// One link per (spender, variant) pair
    pub(crate) spent_by: Vec<SpendLink>,
}

impl UtxoNode {
    /// Handle of this output node in the contract's output arena
    pub fn id(&self) -> UtxoId {
        self.id
    }

    /// The transaction node defining this output
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// The (txid, vout) reference of this output
    pub fn outpoint(&self) -> OutPoint {
        self.outpoint
    }

    /// Output index within the owning transaction
    pub fn vout(&self) -> u32 {
        self.outpoint.vout
    }

    /// Output value (speculative for placeholder-owned outputs)
    pub fn value(&self) -> Amount {
        self.value
    }

    /// Output script (speculative for placeholder-owned outputs)
    pub fn script_pubkey(&self) -> &ScriptBuf {
        &self.script_pubkey
    }

    /// Transactions spending this output
    pub fn spenders(&self) -> &[NodeId] {
        &self.spenders
    }

    /// Spend links, one per (spender, variant) pair
    pub fn spend_links(&self) -> &[SpendLink] {
        &self.spent_by
    }

    /// Whether no known transaction spends this output
    pub fn is_unspent(&self) -> bool {
        self.spenders.is_empty()
    }
}
