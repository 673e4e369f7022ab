//! # Transaction Nodes
//!
//! A [`TxNode`] is one canonical on-chain transaction of a loaded contract.
//! One transaction identifier may have several valid witness realizations
//! signed independently; they all feed the same node as
//! [`SignatureVariant`]s. Nodes are immutable after construction except for
//! the link records appended during output linking.
//!
//! Nodes are addressed by [`NodeId`] handles into the contract's node arena
//! rather than by shared pointers, so the spend graph and the memoized
//! descendant closures never form reference cycles.

use bitcoin::{Psbt, Transaction, Txid, Witness, Wtxid};

use super::utxo::UtxoId;

/// Stable handle to a transaction node within one loaded contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the contract's node arena
    pub fn index(self) -> usize {
        self.0
    }
}

/// One independently-signed realization of a transaction
#[derive(Debug, Clone)]
pub struct SignatureVariant {
    /// Content hash including this variant's witness data
    pub wtxid: Wtxid,
    /// One witness stack per input of the transaction
    pub witnesses: Vec<Witness>,
    /// The signing artifact this variant was collected from
    pub psbt: Psbt,
}

/// Bidirectional link between an output node and one spending variant.
///
/// `spend_variant` is the position of the spender within the output's
/// spender list; `input_index` is the input of the spender whose outpoint
/// matches the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendLink {
    /// The output being spent
    pub utxo: UtxoId,
    /// The transaction spending it
    pub spender: NodeId,
    /// Position of the spender in the output's spender list
    pub spend_variant: usize,
    /// Input index of the spender whose outpoint matches the output
    pub input_index: usize,
}

/// One canonical transaction of a loaded contract
#[derive(Debug, Clone)]
pub struct TxNode {
    pub(crate) id: NodeId,
    pub(crate) txid: Txid,
    /// Canonical witness-stripped transaction body. For placeholder nodes
    /// this is a synthetic body; its computed txid is meaningless and `txid`
    /// carries the referenced identifier instead.
    pub(crate) tx: Transaction,
    pub(crate) variants: Vec<SignatureVariant>,
    pub(crate) placeholder: bool,
    /// One output node per transaction output, filled during linking
    pub(crate) outputs: Vec<UtxoId>,
    /// Links to the output nodes this transaction spends
    pub(crate) input_links: Vec<SpendLink>,
}

impl TxNode {
    pub(crate) fn new(
        id: NodeId,
        txid: Txid,
        tx: Transaction,
        variants: Vec<SignatureVariant>,
        placeholder: bool,
    ) -> Self {
        Self {
            id,
            txid,
            tx,
            variants,
            placeholder,
            outputs: Vec::new(),
            input_links: Vec::new(),
        }
    }

    /// Handle of this node in the contract's node arena
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Witness-independent transaction identifier, stable across all
    /// signature variants
    pub fn txid(&self) -> Txid {
        self.txid
    }

    /// The canonical witness-stripped transaction body
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    /// All known signature variants of this transaction
    pub fn variants(&self) -> &[SignatureVariant] {
        &self.variants
    }

    /// Witness identifiers of all known signature variants
    pub fn wtxids(&self) -> impl Iterator<Item = Wtxid> + '_ {
        self.variants.iter().map(|v| v.wtxid)
    }

    /// Whether this node stands in for an input whose true source
    /// transaction is not present in the loaded data
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Handles of the output nodes this transaction defines, one per output
    pub fn outputs(&self) -> &[UtxoId] {
        &self.outputs
    }

    /// Links to the output nodes this transaction spends
    pub fn input_links(&self) -> &[SpendLink] {
        &self.input_links
    }
}
